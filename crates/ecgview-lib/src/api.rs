//! Payload shapes exchanged with the review backend.

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `ecg_data` object: shared time axis plus lead-keyed samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcgData {
    pub time: Vec<f64>,
    #[serde(default)]
    pub signals: BTreeMap<String, Vec<f64>>,
    /// Server-side annotations (maxima, minima, baselines) passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Response of `GET /api/load_ecg_data/{patientId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadEcgResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub patient_info: Option<PatientInfo>,
    pub ecg_data: EcgData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default, deserialize_with = "opt_text")]
    pub patient_id: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub anonymous_id: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub age: Option<String>,
    #[serde(default, alias = "sex", deserialize_with = "opt_text")]
    pub gender: Option<String>,
    #[serde(default, alias = "rhythm", deserialize_with = "opt_text")]
    pub heart_rhythm: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub repolarization_abnormalities: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub hypertrophies: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub ischemia: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub conduction_system_disease: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub cardiac_pacing: Vec<String>,
}

impl PatientInfo {
    /// Identifier reported with result vectors.
    pub fn identifier(&self) -> Option<&str> {
        self.anonymous_id
            .as_deref()
            .or(self.patient_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}

/// Response of `GET /api/patients_info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<PatientInfo>,
}

/// One row of the corrected-peak table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadResultRow {
    pub lead: String,
    pub start_time: f64,
    pub end_time: f64,
    pub avg_baseline: f64,
    pub max_beat: f64,
    pub min_beat: f64,
    pub corrected_max_peak: f64,
    pub corrected_min_peak: f64,
    pub lead_vector: f64,
}

/// Body of `POST /api/post_result_vector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultVectorReport {
    pub anonymous_id: String,
    #[serde(rename = "leadDataArray")]
    pub lead_data_array: Vec<LeadResultRow>,
}

/// Body of `POST /api/vector-graph`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorGraphRequest {
    pub lead1: f64,
    pub lead3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorGraphResponse {
    /// Base64-encoded PNG of the triaxial diagram.
    pub image: String,
    pub magnitude: f64,
    pub angle: f64,
    #[serde(default)]
    pub diagnose: Option<String>,
}

/// `{ "error": ... }` body returned by failing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn describe(&self) -> Option<String> {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => Some(format!("{}: {}", error, message)),
            (Some(error), None) => Some(error.clone()),
            (None, Some(message)) => Some(message.clone()),
            (None, None) => None,
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(value) => Some(value_text(value)),
    })
}

// List columns are stored as JSON-encoded strings by the backend.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().map(value_text).collect(),
        Some(Value::String(encoded)) => match serde_json::from_str::<Vec<Value>>(&encoded) {
            Ok(items) => items.into_iter().map(value_text).collect(),
            Err(err) => {
                debug!("unparseable list field {:?}: {}", encoded, err);
                Vec::new()
            }
        },
        _ => Vec::new(),
    })
}
