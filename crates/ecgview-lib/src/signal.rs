use crate::api::EcgData;
use crate::lead::Lead;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalError {
    #[error("ECG record has no time samples")]
    EmptyTime,
    #[error("time samples must be strictly increasing (index {index})")]
    NonMonotonicTime { index: usize },
    #[error("invalid window [{x_min}, {x_max}]")]
    InvalidWindow { x_min: f64, x_max: f64 },
}

/// Multi-lead recording sharing one time axis (seconds, amplitudes in mV).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub time: Vec<f64>,
    pub signals: BTreeMap<Lead, Vec<f64>>,
}

impl TimeSeries {
    /// Validates the time axis and keeps every lead whose length matches it.
    pub fn new(time: Vec<f64>, signals: BTreeMap<Lead, Vec<f64>>) -> Result<Self, SignalError> {
        if time.is_empty() {
            return Err(SignalError::EmptyTime);
        }
        if let Some(index) = time.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(SignalError::NonMonotonicTime { index: index + 1 });
        }
        let mut kept = BTreeMap::new();
        for (lead, samples) in signals {
            if samples.len() != time.len() {
                warn!(
                    "lead {} has {} samples but the time axis has {}; skipping",
                    lead,
                    samples.len(),
                    time.len()
                );
                continue;
            }
            kept.insert(lead, samples);
        }
        Ok(Self {
            time,
            signals: kept,
        })
    }

    pub fn from_wire(data: &EcgData) -> Result<Self, SignalError> {
        let mut signals = BTreeMap::new();
        for (key, samples) in &data.signals {
            match key.parse::<Lead>() {
                Ok(lead) => {
                    signals.insert(lead, samples.clone());
                }
                Err(_) => debug!("ignoring unrecognised signal '{}'", key),
            }
        }
        Self::new(data.time.clone(), signals)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn lead(&self, lead: Lead) -> Option<&[f64]> {
        self.signals.get(&lead).map(Vec::as_slice)
    }

    pub fn leads(&self) -> impl Iterator<Item = Lead> + '_ {
        self.signals.keys().copied()
    }

    /// First and last time sample.
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((*self.time.first()?, *self.time.last()?))
    }
}

/// Closed time interval picked by the reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub x_min: f64,
    pub x_max: f64,
}

impl Window {
    pub fn new(x_min: f64, x_max: f64) -> Result<Self, SignalError> {
        if !x_min.is_finite() || !x_max.is_finite() || x_min > x_max {
            return Err(SignalError::InvalidWindow { x_min, x_max });
        }
        Ok(Self { x_min, x_max })
    }

    pub fn contains(&self, t: f64) -> bool {
        self.x_min <= t && t <= self.x_max
    }
}
