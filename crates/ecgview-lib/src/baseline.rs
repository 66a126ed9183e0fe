use crate::api::LeadResultRow;
use crate::extract::{ExtractedSegment, SegmentMap};
use crate::lead::Lead;
use serde::{Deserialize, Serialize};

/// Peak values adjusted by the flat-region average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineCorrection {
    pub corrected_max: f64,
    pub corrected_min: f64,
}

impl BaselineCorrection {
    /// Per-lead resultant shown in the peak table.
    pub fn resultant(&self) -> f64 {
        self.corrected_max - self.corrected_min.abs()
    }
}

/// Correct a segment's peaks against `flat_avg`.
///
/// The branch on the sign of `flat_avg` is not a plain subtraction: for a
/// non-positive baseline the magnitude is added to the maximum and removed from
/// the minimum's magnitude, and the other way round for a positive one.
pub fn correct(segment: &ExtractedSegment, flat_avg: f64) -> BaselineCorrection {
    correct_peaks(segment.max, segment.min, flat_avg)
}

pub fn correct_peaks(max: f64, min: f64, flat_avg: f64) -> BaselineCorrection {
    let offset = flat_avg.abs();
    if flat_avg <= 0.0 {
        BaselineCorrection {
            corrected_max: max + offset,
            corrected_min: -(min.abs() - offset),
        }
    } else {
        BaselineCorrection {
            corrected_max: max - offset,
            corrected_min: -(min.abs() + offset),
        }
    }
}

/// Flat average for `lead`, falling back to lead I's flat segment, then to zero.
pub fn flat_baseline(flat: &SegmentMap, lead: Lead) -> f64 {
    flat.get(&lead)
        .or_else(|| flat.get(&Lead::I))
        .map(|segment| segment.mean)
        .unwrap_or(0.0)
}

/// One table row per beat lead, in lead order.
pub fn lead_rows(beat: &SegmentMap, flat: &SegmentMap) -> Vec<LeadResultRow> {
    beat.values()
        .map(|segment| {
            let flat_avg = flat_baseline(flat, segment.lead);
            let corrected = correct(segment, flat_avg);
            LeadResultRow {
                lead: segment.lead.label(),
                start_time: segment.start_time,
                end_time: segment.end_time,
                avg_baseline: flat_avg,
                max_beat: segment.max,
                min_beat: segment.min,
                corrected_max_peak: corrected.corrected_max,
                corrected_min_peak: corrected.corrected_min,
                lead_vector: corrected.resultant(),
            }
        })
        .collect()
}
