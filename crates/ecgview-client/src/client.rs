use crate::config::Config;
use crate::error::ApiError;
use ecgview_lib::api::{
    LoadEcgResponse, PatientInfo, PatientList, ResultVectorReport, VectorGraphRequest,
    VectorGraphResponse,
};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Blocking client for the review backend's JSON API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self, what: &str) -> Result<T, ApiError> {
        if let Some(error) = self.error {
            return Err(ApiError::Rejected(error));
        }
        if self.success == Some(false) {
            return Err(ApiError::Rejected(format!("{} request was not successful", what)));
        }
        self.data
            .ok_or_else(|| ApiError::Rejected(format!("{} response carried no data", what)))
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.agent.get(&url).call()?;
        Ok(response.into_json()?)
    }

    fn post_json<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.agent.post(&url).send_json(body)?;
        Ok(response.into_json()?)
    }

    /// `GET /api/patients_info`
    pub fn patients(&self) -> Result<Vec<PatientInfo>, ApiError> {
        let list: PatientList = self.get_json("api/patients_info")?;
        if !list.success {
            return Err(ApiError::Rejected("patient list request was not successful".into()));
        }
        info!("fetched {} patients", list.data.len());
        Ok(list.data)
    }

    /// `GET /api/load_ecg_data/{patient_id}`
    pub fn load_ecg(&self, patient_id: &str) -> Result<LoadEcgResponse, ApiError> {
        let value: Value = self.get_json(&format!("api/load_ecg_data/{}", patient_id))?;
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(ApiError::Rejected(error.to_string()));
        }
        let response: LoadEcgResponse =
            serde_json::from_value(value).map_err(ApiError::InvalidBody)?;
        info!(
            "loaded patient {}: {} samples, {} signals",
            patient_id,
            response.ecg_data.time.len(),
            response.ecg_data.signals.len()
        );
        Ok(response)
    }

    /// `POST /api/post_result_vector`; the acknowledgement is returned as-is.
    pub fn post_result_vector(&self, report: &ResultVectorReport) -> Result<Value, ApiError> {
        self.post_json("api/post_result_vector", serde_json::to_value(report)?)
    }

    /// `POST /api/vector-graph`
    pub fn vector_graph(
        &self,
        request: &VectorGraphRequest,
    ) -> Result<VectorGraphResponse, ApiError> {
        self.post_json("api/vector-graph", serde_json::to_value(request)?)
    }

    /// `GET /api/result_vectors/{patient_id}`
    pub fn result_vectors(&self, patient_id: &str) -> Result<Vec<Value>, ApiError> {
        let envelope: Envelope<Vec<Value>> =
            self.get_json(&format!("api/result_vectors/{}", patient_id))?;
        envelope.into_data("result vector")
    }

    /// `DELETE /api/delete_patient/{patient_id}`
    pub fn delete_patient(&self, patient_id: &str) -> Result<String, ApiError> {
        let url = self.url(&format!("api/delete_patient/{}", patient_id));
        debug!("DELETE {}", url);
        let envelope: Envelope<Value> = self.agent.delete(&url).call()?.into_json()?;
        if let Some(error) = envelope.error {
            return Err(ApiError::Rejected(error));
        }
        Ok(envelope
            .message
            .unwrap_or_else(|| "Patient deleted successfully".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{serve_in_order as serve, Canned};
    use ecgview_lib::api::LeadResultRow;

    fn ok(body: &str) -> Canned {
        Canned::ok(body)
    }

    #[test]
    fn trims_trailing_slash() {
        let client = ApiClient::new("http://host:5000/");
        assert_eq!(client.url("/api/x"), "http://host:5000/api/x");
        assert_eq!(client.base_url(), "http://host:5000");
    }

    #[test]
    fn loads_ecg_record() {
        let (url, rx) = serve(vec![ok(
            r#"{"success":true,"patient_info":{"patient_id":4,"sex":"M"},"ecg_data":{"time":[0,0.1],"signals":{"i":[0.1,0.2]}}}"#,
        )]).unwrap();
        let client = ApiClient::new(url);
        let response = client.load_ecg("4").unwrap();
        assert_eq!(response.ecg_data.time, vec![0.0, 0.1]);
        let patient = response.patient_info.unwrap();
        assert_eq!(patient.gender.as_deref(), Some("M"));
        let recorded = rx.recv().unwrap();
        assert_eq!(recorded.request_line, "GET /api/load_ecg_data/4 HTTP/1.1");
    }

    #[test]
    fn maps_not_found_to_status_error() {
        let (url, _rx) = serve(vec![Canned {
            status: 404,
            body: r#"{"error":"ECG data not found"}"#.into(),
        }]).unwrap();
        let err = ApiClient::new(url).load_ecg("99").unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "ECG data not found");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn malformed_record_is_a_body_error() {
        let (url, _rx) = serve(vec![ok(r#"{"success":true}"#)]).unwrap();
        let err = ApiClient::new(url).load_ecg("4").unwrap_err();
        assert!(matches!(err, ApiError::InvalidBody(_)), "{:?}", err);
        assert!(err.to_string().starts_with("unexpected response body"));
    }

    #[test]
    fn posts_result_vector_body() {
        let (url, rx) = serve(vec![ok(r#"{"success":true}"#)]).unwrap();
        let report = ResultVectorReport {
            anonymous_id: "12".into(),
            lead_data_array: vec![LeadResultRow {
                lead: "III".into(),
                start_time: 1.0,
                end_time: 1.2,
                avg_baseline: 0.05,
                max_beat: 0.7,
                min_beat: -0.3,
                corrected_max_peak: 0.65,
                corrected_min_peak: -0.35,
                lead_vector: 0.3,
            }],
        };
        let ack = ApiClient::new(url).post_result_vector(&report).unwrap();
        assert_eq!(ack["success"], true);
        let recorded = rx.recv().unwrap();
        assert_eq!(recorded.request_line, "POST /api/post_result_vector HTTP/1.1");
        let sent: Value = serde_json::from_str(&recorded.body).unwrap();
        assert_eq!(sent["anonymous_id"], "12");
        assert_eq!(sent["leadDataArray"][0]["lead"], "III");
        assert_eq!(sent["leadDataArray"][0]["minBeat"], -0.3);
    }

    #[test]
    fn vector_graph_round_trip() {
        let (url, rx) = serve(vec![ok(
            r#"{"image":"iVBORw0KGgo=","magnitude":0.14,"angle":-45,"diagnose":"Abnormal Left Axis Deviation"}"#,
        )]).unwrap();
        let response = ApiClient::new(url)
            .vector_graph(&VectorGraphRequest {
                lead1: 0.1,
                lead3: -0.1,
            })
            .unwrap();
        assert_eq!(response.angle, -45.0);
        assert_eq!(
            response.diagnose.as_deref(),
            Some("Abnormal Left Axis Deviation")
        );
        let sent: Value = serde_json::from_str(&rx.recv().unwrap().body).unwrap();
        assert_eq!(sent["lead1"], 0.1);
        assert_eq!(sent["lead3"], -0.1);
    }

    #[test]
    fn patient_list_and_delete() {
        let (url, rx) = serve(vec![
            ok(r#"{"success":true,"data":[{"patient_id":1,"age":"70","gender":"F","hypertrophies":"[]"}]}"#),
            ok(r#"{"success":true,"message":"Patient deleted successfully"}"#),
            Canned {
                status: 400,
                body: r#"{"error":"Patient not found"}"#.into(),
            },
        ]).unwrap();
        let client = ApiClient::new(url);
        let patients = client.patients().unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].identifier(), Some("1"));
        assert_eq!(
            client.delete_patient("1").unwrap(),
            "Patient deleted successfully"
        );
        let err = client.delete_patient("1").unwrap_err();
        assert!(err.to_string().contains("Patient not found"));
        let lines: Vec<_> = rx.iter().take(3).map(|r| r.request_line).collect();
        assert_eq!(lines[1], "DELETE /api/delete_patient/1 HTTP/1.1");
    }

    #[test]
    fn result_vectors_unwrap_envelope() {
        let (url, _rx) = serve(vec![
            ok(r#"{"success":true,"data":[{"patient_id":2,"lead_1_data":"{}"}]}"#),
            ok(r#"{"success":false,"error":"boom"}"#),
        ]).unwrap();
        let client = ApiClient::new(url);
        let rows = client.result_vectors("2").unwrap();
        assert_eq!(rows[0]["patient_id"], 2);
        assert!(matches!(
            client.result_vectors("2"),
            Err(ApiError::Rejected(msg)) if msg == "boom"
        ));
    }
}
