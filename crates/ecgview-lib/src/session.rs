use crate::api::{LeadResultRow, ResultVectorReport, VectorGraphRequest, VectorGraphResponse};
use crate::axis::{axis_from_selection, AxisDeviation, AxisVector};
use crate::baseline::lead_rows;
use crate::extract::{extract_window, restrict_segments, SegmentMap};
use crate::lead::Lead;
use crate::signal::{TimeSeries, Window};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Destination for pipeline results. Implementations must not block the caller.
pub trait Reporter {
    fn post_result_vector(&self, seq: u64, report: ResultVectorReport);
    fn request_vector_graph(&self, seq: u64, request: VectorGraphRequest);
}

/// Reporter that drops everything; used for offline reviews.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn post_result_vector(&self, seq: u64, report: ResultVectorReport) {
        debug!(
            "offline: not posting {} lead rows (seq {})",
            report.lead_data_array.len(),
            seq
        );
    }

    fn request_vector_graph(&self, seq: u64, request: VectorGraphRequest) {
        debug!(
            "offline: not requesting vector graph for ({}, {}) (seq {})",
            request.lead1, request.lead3, seq
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Beat,
    Flat,
    Qrs,
}

impl SelectionMode {
    pub fn leads(&self) -> &'static [Lead] {
        match self {
            SelectionMode::Beat => &Lead::ALL,
            SelectionMode::Flat | SelectionMode::Qrs => &Lead::LIMB,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a beat must be selected before narrowing to the QRS complex")]
    NoBeat,
}

/// What one pipeline run produced and handed to the reporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub seq: u64,
    pub rows: Vec<LeadResultRow>,
    pub axis: Option<AxisVector>,
}

/// State of one ECG review: the loaded record and the latest beat/flat selections.
pub struct ReviewSession<R> {
    series: TimeSeries,
    anonymous_id: String,
    reporter: R,
    beat: Option<SegmentMap>,
    qrs: Option<SegmentMap>,
    flat: Option<SegmentMap>,
    seq: u64,
    last_output: Option<PipelineOutput>,
    vector_graph: Option<VectorGraphResponse>,
}

impl<R: Reporter> ReviewSession<R> {
    pub fn new(series: TimeSeries, anonymous_id: impl Into<String>, reporter: R) -> Self {
        Self {
            series,
            anonymous_id: anonymous_id.into(),
            reporter,
            beat: None,
            qrs: None,
            flat: None,
            seq: 0,
            last_output: None,
            vector_graph: None,
        }
    }

    /// Replace the slot for `mode` and re-run the pipeline when both slots hold data.
    pub fn select(
        &mut self,
        mode: SelectionMode,
        window: Window,
    ) -> Result<Option<PipelineOutput>, SessionError> {
        match mode {
            SelectionMode::Beat => {
                self.beat = Some(extract_window(&self.series, mode.leads(), &window));
                self.qrs = None;
            }
            SelectionMode::Flat => {
                self.flat = Some(extract_window(&self.series, mode.leads(), &window));
            }
            SelectionMode::Qrs => {
                let beat = self.beat.as_ref().ok_or(SessionError::NoBeat)?;
                self.qrs = Some(restrict_segments(beat, mode.leads(), &window));
            }
        }
        debug!(
            "{:?} selection [{}, {}] stored",
            mode, window.x_min, window.x_max
        );
        Ok(self.fire())
    }

    fn fire(&mut self) -> Option<PipelineOutput> {
        let beat = self
            .qrs
            .as_ref()
            .or(self.beat.as_ref())
            .filter(|m| !m.is_empty());
        let flat = self.flat.as_ref().filter(|m| !m.is_empty());
        let (rows, axis) = match (beat, flat) {
            (Some(beat), Some(flat)) => {
                (lead_rows(beat, flat), axis_from_selection(beat, flat).ok())
            }
            _ => {
                // results of the replaced selection no longer describe the slots
                if self.last_output.take().is_some() {
                    debug!("pipeline idle; dropping results of seq {}", self.seq);
                }
                self.vector_graph = None;
                return None;
            }
        };
        self.vector_graph = None;
        self.seq += 1;
        let seq = self.seq;
        info!(
            "pipeline #{}: {} lead rows, axis {}",
            seq,
            rows.len(),
            axis.map(|a| format!("{:.2} mV @ {:.2} deg", a.magnitude, a.angle_degrees))
                .unwrap_or_else(|| "unavailable".into())
        );
        self.reporter.post_result_vector(
            seq,
            ResultVectorReport {
                anonymous_id: self.anonymous_id.clone(),
                lead_data_array: rows.clone(),
            },
        );
        if let Some(axis) = axis {
            self.reporter.request_vector_graph(seq, axis.graph_request());
        }
        let output = PipelineOutput { seq, rows, axis };
        self.last_output = Some(output.clone());
        Some(output)
    }

    /// Accept a vector-graph response unless a newer pipeline run superseded it.
    pub fn apply_vector_graph(&mut self, seq: u64, response: VectorGraphResponse) -> bool {
        if seq != self.seq {
            debug!(
                "discarding stale vector graph (seq {}, current {})",
                seq, self.seq
            );
            return false;
        }
        self.vector_graph = Some(response);
        true
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn anonymous_id(&self) -> &str {
        &self.anonymous_id
    }

    pub fn beat(&self) -> Option<&SegmentMap> {
        self.beat.as_ref()
    }

    pub fn flat(&self) -> Option<&SegmentMap> {
        self.flat.as_ref()
    }

    pub fn qrs(&self) -> Option<&SegmentMap> {
        self.qrs.as_ref()
    }

    /// Segments the pipeline treats as the beat (QRS refinement when present).
    pub fn effective_beat(&self) -> Option<&SegmentMap> {
        self.qrs.as_ref().or(self.beat.as_ref())
    }

    pub fn latest_seq(&self) -> u64 {
        self.seq
    }

    pub fn last_output(&self) -> Option<&PipelineOutput> {
        self.last_output.as_ref()
    }

    pub fn vector_graph(&self) -> Option<&VectorGraphResponse> {
        self.vector_graph.as_ref()
    }

    pub fn deviation(&self) -> Option<AxisDeviation> {
        self.vector_graph
            .as_ref()
            .map(|graph| AxisDeviation::from_diagnose(graph.diagnose.as_deref()))
    }
}
