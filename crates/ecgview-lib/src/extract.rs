use crate::lead::Lead;
use crate::signal::{TimeSeries, Window};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type SegmentMap = BTreeMap<Lead, ExtractedSegment>;

/// In-window samples of one lead plus their summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSegment {
    pub lead: Lead,
    pub time: Vec<f64>,
    pub signal: Vec<f64>,
    pub min: f64,
    pub max: f64,
    pub start_time: f64,
    pub end_time: f64,
    /// Unrounded mean amplitude; used as the baseline of flat selections.
    pub mean: f64,
    /// Population standard deviation of the samples.
    pub std_dev: f64,
}

impl ExtractedSegment {
    /// Builds a segment from collected samples; `None` when nothing was collected.
    pub fn from_samples(lead: Lead, time: Vec<f64>, signal: Vec<f64>) -> Option<Self> {
        let start_time = *time.first()?;
        let end_time = *time.last()?;
        let n = signal.len() as f64;
        let min = signal.iter().copied().fold(f64::INFINITY, f64::min);
        let max = signal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = signal.iter().sum::<f64>() / n;
        let std_dev = (signal.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
        Some(Self {
            lead,
            time,
            signal,
            min,
            max,
            start_time,
            end_time,
            mean,
            std_dev,
        })
    }

    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    /// Time of the first sample reaching the maximum.
    pub fn max_time(&self) -> f64 {
        self.time_of(self.max)
    }

    /// Time of the first sample reaching the minimum.
    pub fn min_time(&self) -> f64 {
        self.time_of(self.min)
    }

    fn time_of(&self, value: f64) -> f64 {
        self.signal
            .iter()
            .position(|&s| s == value)
            .map(|idx| self.time[idx])
            .unwrap_or(self.start_time)
    }

    /// Sub-segment restricted to `window`, same inclusive rule as [`extract_window`].
    pub fn restrict(&self, window: &Window) -> Option<Self> {
        let (time, signal): (Vec<f64>, Vec<f64>) = self
            .time
            .iter()
            .zip(&self.signal)
            .filter(|(t, _)| window.contains(**t))
            .map(|(t, s)| (*t, *s))
            .unzip();
        Self::from_samples(self.lead, time, signal)
    }
}

/// Extract every requested lead's samples whose time lies in `window` (both ends inclusive).
///
/// Requested leads missing from the series are skipped with a warning; leads
/// without any in-window sample are left out of the result.
pub fn extract_window(series: &TimeSeries, leads: &[Lead], window: &Window) -> SegmentMap {
    let mut out = SegmentMap::new();
    for &lead in leads {
        let Some(samples) = series.lead(lead) else {
            warn!("lead {} not found in ECG signals", lead);
            continue;
        };
        let mut time = Vec::new();
        let mut signal = Vec::new();
        for (&t, &v) in series.time.iter().zip(samples) {
            if window.contains(t) {
                time.push(t);
                signal.push(v);
            }
        }
        match ExtractedSegment::from_samples(lead, time, signal) {
            Some(segment) => {
                out.insert(lead, segment);
            }
            None => debug!(
                "lead {} has no samples in [{}, {}]",
                lead, window.x_min, window.x_max
            ),
        }
    }
    out
}

/// Narrow already-extracted segments to `window`, keeping only `leads`.
pub fn restrict_segments(segments: &SegmentMap, leads: &[Lead], window: &Window) -> SegmentMap {
    let mut out = SegmentMap::new();
    for &lead in leads {
        match segments.get(&lead) {
            Some(segment) => {
                if let Some(narrowed) = segment.restrict(window) {
                    out.insert(lead, narrowed);
                }
            }
            None => warn!("skipping lead {} due to missing selection data", lead),
        }
    }
    out
}
