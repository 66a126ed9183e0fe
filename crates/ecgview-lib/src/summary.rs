use crate::api::PatientInfo;
use crate::axis::AxisDeviation;
use crate::extract::SegmentMap;
use serde::Serialize;

/// Round for display; arithmetic always uses the unrounded value.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Per-lead overview of a loaded record.
#[derive(Debug, Clone, Serialize)]
pub struct LeadOverview {
    pub lead: String,
    pub samples: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

pub fn lead_overview(segments: &SegmentMap) -> Vec<LeadOverview> {
    segments
        .values()
        .map(|s| LeadOverview {
            lead: s.lead.label(),
            samples: s.len(),
            min: s.min,
            max: s.max,
            mean: round_to(s.mean, 4),
        })
        .collect()
}

fn or_default<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback)
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".into()
    } else {
        items.join(", ")
    }
}

/// Plain-language request text combining the patient record with the axis result.
pub fn interpretation_summary(
    patient: &PatientInfo,
    magnitude: f64,
    angle: f64,
    deviation: AxisDeviation,
) -> String {
    let mut out = String::from(
        "Interpret this ECG data and explain it in easy-to-understand terms. \
         Include a summary at the end.\n\n",
    );
    out.push_str("Patient Information:\n");
    out.push_str(&format!("- Age: {}\n", or_default(patient.age.as_deref(), "N/A")));
    out.push_str(&format!(
        "- Gender: {}\n",
        or_default(patient.gender.as_deref(), "N/A")
    ));
    out.push_str(&format!(
        "- Heart Rhythm: {}\n",
        or_default(patient.heart_rhythm.as_deref(), "N/A")
    ));
    out.push_str(&format!(
        "- Repolarization Abnormalities: {}\n",
        or_default(patient.repolarization_abnormalities.as_deref(), "None")
    ));
    out.push_str(&format!(
        "- Hypertrophies: {}\n",
        list_or_none(&patient.hypertrophies)
    ));
    out.push_str(&format!("- Ischemia: {}\n", list_or_none(&patient.ischemia)));
    out.push_str(&format!(
        "- Conduction System Disease: {}\n",
        list_or_none(&patient.conduction_system_disease)
    ));
    out.push_str(&format!(
        "- Cardiac Pacing: {}\n\n",
        list_or_none(&patient.cardiac_pacing)
    ));
    out.push_str("Electrical Axis Analysis:\n");
    out.push_str(&format!(
        "- Resultant Vector Magnitude: {:.2} mV\n",
        magnitude
    ));
    out.push_str(&format!("- Electrical Axis Angle: {:.2} degrees\n", angle));
    out.push_str(&format!("- Axis Deviation: {}\n", deviation));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_is_display_only() {
        assert_eq!(round_to(0.123456, 2), 0.12);
        assert_eq!(round_to(-0.125001, 2), -0.13);
        assert_eq!(round_to(3.0, 4), 3.0);
    }

    #[test]
    fn summary_fills_missing_fields() {
        let patient = PatientInfo {
            age: Some("54".into()),
            ischemia: vec!["Inferior".into(), "Lateral".into()],
            ..PatientInfo::default()
        };
        let text = interpretation_summary(&patient, 1.23456, -45.0, AxisDeviation::LeftAxis);
        assert!(text.contains("- Age: 54\n"));
        assert!(text.contains("- Gender: N/A\n"));
        assert!(text.contains("- Ischemia: Inferior, Lateral\n"));
        assert!(text.contains("- Hypertrophies: None\n"));
        assert!(text.contains("- Resultant Vector Magnitude: 1.23 mV\n"));
        assert!(text.contains("- Axis Deviation: Abnormal Left Axis Deviation\n"));
    }
}
