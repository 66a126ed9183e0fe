use crate::client::ApiClient;
use crossbeam_channel::{unbounded, Receiver, Sender};
use ecgview_lib::api::{ResultVectorReport, VectorGraphRequest, VectorGraphResponse};
use ecgview_lib::session::Reporter;
use log::{error, info};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Completion of one background request, tagged with the pipeline run that issued it.
#[derive(Debug, Clone)]
pub enum ReportEvent {
    ResultVector {
        seq: u64,
        outcome: Result<Value, String>,
    },
    VectorGraph {
        seq: u64,
        outcome: Result<VectorGraphResponse, String>,
    },
}

impl ReportEvent {
    pub fn seq(&self) -> u64 {
        match self {
            ReportEvent::ResultVector { seq, .. } | ReportEvent::VectorGraph { seq, .. } => *seq,
        }
    }
}

/// Issues each backend call on its own thread so the review loop never waits on the network.
/// Failures are logged and reported once; nothing is retried.
pub struct AsyncReporter {
    client: ApiClient,
    events: Sender<ReportEvent>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AsyncReporter {
    pub fn new(client: ApiClient) -> (Self, Receiver<ReportEvent>) {
        let (tx, rx) = unbounded();
        (
            Self {
                client,
                events: tx,
                workers: Mutex::new(Vec::new()),
            },
            rx,
        )
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce(ApiClient, Sender<ReportEvent>) + Send + 'static,
    {
        let client = self.client.clone();
        let events = self.events.clone();
        let handle = thread::spawn(move || job(client, events));
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Wait for every request issued so far.
    pub fn join_all(&self) {
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("reporter worker panicked");
            }
        }
    }
}

impl Reporter for AsyncReporter {
    fn post_result_vector(&self, seq: u64, report: ResultVectorReport) {
        self.spawn(move |client, events| {
            let outcome = client
                .post_result_vector(&report)
                .map_err(|err| err.to_string());
            match &outcome {
                Ok(_) => info!(
                    "posted {} lead rows for {} (seq {})",
                    report.lead_data_array.len(),
                    report.anonymous_id,
                    seq
                ),
                Err(err) => error!("failed to post result vector (seq {}): {}", seq, err),
            }
            let _ = events.send(ReportEvent::ResultVector { seq, outcome });
        });
    }

    fn request_vector_graph(&self, seq: u64, request: VectorGraphRequest) {
        self.spawn(move |client, events| {
            let outcome = client.vector_graph(&request).map_err(|err| err.to_string());
            if let Err(err) = &outcome {
                error!("vector graph request failed (seq {}): {}", seq, err);
            }
            let _ = events.send(ReportEvent::VectorGraph { seq, outcome });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{serve_in_order as serve, Canned};

    #[test]
    fn delivers_events_tagged_with_seq() {
        let (url, _rx) = serve(vec![Canned {
            status: 200,
            body: r#"{"image":"","magnitude":1.0,"angle":90.0,"diagnose":"Normal"}"#.into(),
        }]).unwrap();
        let (reporter, events) = AsyncReporter::new(ApiClient::new(url));
        reporter.request_vector_graph(
            3,
            VectorGraphRequest {
                lead1: 0.0,
                lead3: 1.0,
            },
        );
        reporter.join_all();
        let event = events.try_recv().unwrap();
        assert_eq!(event.seq(), 3);
        match event {
            ReportEvent::VectorGraph { outcome, .. } => {
                assert_eq!(outcome.unwrap().angle, 90.0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn failures_are_reported_not_retried() {
        let (url, requests) = serve(vec![Canned {
            status: 500,
            body: r#"{"error":"database unavailable"}"#.into(),
        }]).unwrap();
        let (reporter, events) = AsyncReporter::new(ApiClient::new(url));
        reporter.post_result_vector(
            1,
            ResultVectorReport {
                anonymous_id: "Unknown".into(),
                lead_data_array: Vec::new(),
            },
        );
        reporter.join_all();
        match events.try_recv().unwrap() {
            ReportEvent::ResultVector { seq, outcome } => {
                assert_eq!(seq, 1);
                assert!(outcome.unwrap_err().contains("database unavailable"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(events.try_recv().is_err());
        assert_eq!(requests.iter().count(), 1);
    }
}
