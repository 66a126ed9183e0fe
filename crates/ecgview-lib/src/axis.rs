use crate::api::VectorGraphRequest;
use crate::extract::{ExtractedSegment, SegmentMap};
use crate::lead::Lead;
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AxisError {
    #[error("missing data for lead {0}")]
    MissingLead(Lead),
}

/// Resultant of the corrected lead I (`dx`) and lead III (`dy`) deflections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisVector {
    pub dx: f64,
    pub dy: f64,
    pub magnitude: f64,
    pub angle_degrees: f64,
}

impl AxisVector {
    pub fn from_components(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            magnitude: dx.hypot(dy),
            angle_degrees: dy.atan2(dx).to_degrees(),
        }
    }

    pub fn graph_request(&self) -> VectorGraphRequest {
        VectorGraphRequest {
            lead1: self.dx,
            lead3: self.dy,
        }
    }
}

/// Axis from lead I/III peaks corrected by plain baseline subtraction.
pub fn compute_axis(
    lead_i: &ExtractedSegment,
    lead_iii: &ExtractedSegment,
    baseline_i: f64,
    baseline_iii: f64,
) -> AxisVector {
    let dx = net_deflection(lead_i, baseline_i);
    let dy = net_deflection(lead_iii, baseline_iii);
    AxisVector::from_components(dx, dy)
}

fn net_deflection(segment: &ExtractedSegment, baseline: f64) -> f64 {
    let corrected_max = segment.max - baseline;
    let corrected_min = segment.min - baseline;
    corrected_max - corrected_min.abs()
}

/// Axis for a beat/flat pair. Absent flat leads count as a zero baseline.
pub fn axis_from_selection(beat: &SegmentMap, flat: &SegmentMap) -> Result<AxisVector, AxisError> {
    let lead_i = beat.get(&Lead::I).ok_or(AxisError::MissingLead(Lead::I));
    let lead_iii = beat.get(&Lead::III).ok_or(AxisError::MissingLead(Lead::III));
    let (lead_i, lead_iii) = match (lead_i, lead_iii) {
        (Ok(i), Ok(iii)) => (i, iii),
        (Err(err), _) | (_, Err(err)) => {
            error!("cannot compute axis: {}", err);
            return Err(err);
        }
    };
    let baseline_i = flat.get(&Lead::I).map(|s| s.mean).unwrap_or(0.0);
    let baseline_iii = flat.get(&Lead::III).map(|s| s.mean).unwrap_or(0.0);
    Ok(compute_axis(lead_i, lead_iii, baseline_i, baseline_iii))
}

// `x.5` goes to `x`, matching the service.
fn whole_degrees(angle: f64) -> f64 {
    (angle - 0.5).ceil()
}

/// Side opposite `angle` (degrees) between sides `b` and `c`.
fn cosine_side(b: f64, c: f64, angle: f64) -> f64 {
    (b * b + c * c - 2.0 * b * c * angle.to_radians().cos()).sqrt()
}

/// Angle (degrees) opposite side `a`; NaN for a degenerate triangle.
fn cosine_angle(a: f64, b: f64, c: f64) -> f64 {
    let denominator = 2.0 * b * c;
    if denominator == 0.0 {
        return f64::NAN;
    }
    ((b * b + c * c - a * a) / denominator)
        .clamp(-1.0, 1.0)
        .acos()
        .to_degrees()
}

/// Resultant as the vector-graph service derives it: lead I at 0 degrees and
/// lead III at 120 degrees on the hexaxial frame, solved with the law of cosines.
/// This differs from the plain `atan2` angle of [`AxisVector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HexaxialAxis {
    pub magnitude: f64,
    /// Whole degrees.
    pub angle: f64,
}

impl HexaxialAxis {
    /// A zero component matches no quadrant and yields a zero resultant.
    pub fn from_components(lead1: f64, lead3: f64) -> Self {
        let dc = lead1.abs();
        let da = lead3.abs();
        let ac = cosine_side(dc, da, 120.0);
        let c2 = cosine_angle(da, dc, ac);
        let a1 = cosine_angle(dc, da, ac);
        let db = cosine_side(da, dc, a1 + c2);
        let d1 = cosine_angle(da, dc, db);
        let d2 = cosine_angle(dc, da, db);

        let (magnitude, angle) = if lead1 > 0.0 && lead3 > 0.0 {
            (db, d1)
        } else if lead1 > 0.0 && lead3 < 0.0 {
            (ac, -c2)
        } else if lead1 < 0.0 && lead3 > 0.0 {
            (ac, a1 + 120.0)
        } else if lead1 < 0.0 && lead3 < 0.0 {
            (db, -(d2 + 60.0))
        } else {
            (0.0, 0.0)
        };
        Self {
            magnitude,
            angle: whole_degrees(angle),
        }
    }
}

impl AxisVector {
    pub fn hexaxial(&self) -> HexaxialAxis {
        HexaxialAxis::from_components(self.dx, self.dy)
    }
}

/// Axis deviation labels as issued by the vector-graph service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisDeviation {
    None,
    LeftAxis,
    RightAxis,
    Extreme,
    Superior,
    Inferior,
    Unclassified,
}

impl AxisDeviation {
    pub fn label(&self) -> &'static str {
        match self {
            AxisDeviation::None => "No Axis Deviation",
            AxisDeviation::LeftAxis => "Abnormal Left Axis Deviation",
            AxisDeviation::RightAxis => "Abnormal Right Axis Deviation",
            AxisDeviation::Extreme => "Extreme Axis Deviation",
            AxisDeviation::Superior => "Superior Axis Deviation",
            AxisDeviation::Inferior => "Inferior Axis Deviation",
            AxisDeviation::Unclassified => "ERROR",
        }
    }

    /// Map the service's `diagnose` string; a missing one reads as no deviation.
    pub fn from_diagnose(diagnose: Option<&str>) -> Self {
        let Some(text) = diagnose.map(str::trim).filter(|t| !t.is_empty()) else {
            return AxisDeviation::None;
        };
        [
            AxisDeviation::None,
            AxisDeviation::LeftAxis,
            AxisDeviation::RightAxis,
            AxisDeviation::Extreme,
            AxisDeviation::Superior,
            AxisDeviation::Inferior,
        ]
        .into_iter()
        .find(|d| d.label().eq_ignore_ascii_case(text))
        .unwrap_or(AxisDeviation::Unclassified)
    }

    /// Deviation the vector-graph service assigns to these lead I/III components.
    pub fn for_components(lead1: f64, lead3: f64) -> Self {
        Self::classify(HexaxialAxis::from_components(lead1, lead3).angle)
    }

    /// Classify an angle (degrees) after rounding to a whole degree, halves downward.
    pub fn classify(angle_degrees: f64) -> Self {
        let a = whole_degrees(angle_degrees);
        if (-29.0..=80.0).contains(&a) {
            AxisDeviation::None
        } else if (-80.0..=-30.0).contains(&a) {
            AxisDeviation::LeftAxis
        } else if (-180.0..=-100.0).contains(&a) {
            AxisDeviation::Extreme
        } else if (100.0..=180.0).contains(&a) {
            AxisDeviation::RightAxis
        } else if (-99.0..=-81.0).contains(&a) {
            AxisDeviation::Superior
        } else if (81.0..=99.0).contains(&a) {
            AxisDeviation::Inferior
        } else {
            AxisDeviation::Unclassified
        }
    }
}

impl fmt::Display for AxisDeviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "{} vs {}", a, b);
    }

    fn peaks(lead: Lead, max: f64, min: f64) -> ExtractedSegment {
        ExtractedSegment::from_samples(lead, vec![0.0, 0.01], vec![max, min]).unwrap()
    }

    #[test]
    fn worked_example_points_to_minus_45() {
        let lead_i = peaks(Lead::I, 0.5, -0.2);
        let lead_iii = peaks(Lead::III, 0.4, -0.3);
        let axis = compute_axis(&lead_i, &lead_iii, 0.1, 0.1);
        assert_close(axis.dx, 0.1, 1e-12);
        assert_close(axis.dy, -0.1, 1e-12);
        assert_close(axis.magnitude, 0.02_f64.sqrt(), 1e-12);
        assert_close(axis.angle_degrees, -45.0, 1e-9);
        let req = axis.graph_request();
        assert_eq!(req.lead1, axis.dx);
        assert_eq!(req.lead3, axis.dy);
    }

    #[test]
    fn negating_components_rotates_by_half_turn() {
        for (dx, dy) in [(0.3, 0.7), (-1.2, 0.4), (0.5, -0.5), (2.0, 0.0001)] {
            let a = AxisVector::from_components(dx, dy);
            let b = AxisVector::from_components(-dx, -dy);
            assert_close(a.magnitude, b.magnitude, 1e-12);
            let diff = (a.angle_degrees - b.angle_degrees).abs();
            assert_close(diff, 180.0, 1e-9);
        }
    }

    #[test]
    fn selection_axis_ignores_lead_i_fallback() {
        let mut beat = SegmentMap::new();
        beat.insert(Lead::I, peaks(Lead::I, 0.5, -0.2));
        beat.insert(Lead::III, peaks(Lead::III, 0.4, -0.3));
        let mut flat = SegmentMap::new();
        flat.insert(
            Lead::I,
            ExtractedSegment::from_samples(Lead::I, vec![0.0], vec![0.1]).unwrap(),
        );
        let axis = axis_from_selection(&beat, &flat).unwrap();
        assert_close(axis.dx, 0.1, 1e-12);
        // lead III baseline is zero, not lead I's 0.1
        assert_close(axis.dy, 0.1, 1e-12);
    }

    #[test]
    fn missing_lead_iii_aborts() {
        let mut beat = SegmentMap::new();
        beat.insert(Lead::I, peaks(Lead::I, 0.5, -0.2));
        let err = axis_from_selection(&beat, &SegmentMap::new()).unwrap_err();
        assert_eq!(err, AxisError::MissingLead(Lead::III));
    }

    #[test]
    fn classification_ranges() {
        assert_eq!(AxisDeviation::classify(45.0), AxisDeviation::None);
        assert_eq!(AxisDeviation::classify(-29.4), AxisDeviation::None);
        assert_eq!(AxisDeviation::classify(-45.0), AxisDeviation::LeftAxis);
        assert_eq!(AxisDeviation::classify(-90.0), AxisDeviation::Superior);
        assert_eq!(AxisDeviation::classify(90.0), AxisDeviation::Inferior);
        assert_eq!(AxisDeviation::classify(135.0), AxisDeviation::RightAxis);
        assert_eq!(AxisDeviation::classify(-150.0), AxisDeviation::Extreme);
        assert_eq!(AxisDeviation::classify(80.4), AxisDeviation::None);
        assert_eq!(AxisDeviation::classify(80.6), AxisDeviation::Inferior);
    }

    #[test]
    fn hexaxial_angles_follow_the_service_quadrants() {
        let cases = [
            ((1.0, 3.0), 101.0, AxisDeviation::RightAxis),
            ((1.0, -1.0), -30.0, AxisDeviation::LeftAxis),
            ((-1.0, 1.0), 150.0, AxisDeviation::RightAxis),
            ((-1.0, -1.0), -120.0, AxisDeviation::Extreme),
            ((0.66, 0.2), 17.0, AxisDeviation::None),
        ];
        for ((lead1, lead3), angle, deviation) in cases {
            let hex = HexaxialAxis::from_components(lead1, lead3);
            assert_eq!(hex.angle, angle, "angle for ({}, {})", lead1, lead3);
            assert_eq!(AxisDeviation::for_components(lead1, lead3), deviation);
        }
        assert_close(HexaxialAxis::from_components(1.0, 3.0).magnitude, 7f64.sqrt(), 1e-9);
        assert_close(HexaxialAxis::from_components(1.0, -1.0).magnitude, 3f64.sqrt(), 1e-9);
    }

    #[test]
    fn hexaxial_label_can_differ_from_atan2_label() {
        let axis = AxisVector::from_components(1.0, 3.0);
        assert_eq!(AxisDeviation::classify(axis.angle_degrees), AxisDeviation::None);
        assert_eq!(
            AxisDeviation::classify(axis.hexaxial().angle),
            AxisDeviation::RightAxis
        );
    }

    #[test]
    fn zero_component_has_no_quadrant() {
        let hex = HexaxialAxis::from_components(0.0, 0.4);
        assert_eq!(hex, HexaxialAxis { magnitude: 0.0, angle: 0.0 });
    }

    #[test]
    fn diagnose_strings_round_trip() {
        assert_eq!(AxisDeviation::from_diagnose(None), AxisDeviation::None);
        assert_eq!(
            AxisDeviation::from_diagnose(Some("Abnormal Left Axis Deviation")),
            AxisDeviation::LeftAxis
        );
        assert_eq!(
            AxisDeviation::from_diagnose(Some("ERROR")),
            AxisDeviation::Unclassified
        );
    }
}
