use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard 12-lead ECG channels, declared in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lead {
    I,
    II,
    III,
    AVR,
    AVL,
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl Lead {
    /// Full lead set used by beat selections.
    pub const ALL: [Lead; 12] = [
        Lead::I,
        Lead::II,
        Lead::III,
        Lead::AVR,
        Lead::AVL,
        Lead::AVF,
        Lead::V1,
        Lead::V2,
        Lead::V3,
        Lead::V4,
        Lead::V5,
        Lead::V6,
    ];

    /// Limb leads used by flat and QRS selections.
    pub const LIMB: [Lead; 3] = [Lead::I, Lead::II, Lead::III];

    /// Lowercase key used by the backend payloads.
    pub fn key(&self) -> &'static str {
        match self {
            Lead::I => "i",
            Lead::II => "ii",
            Lead::III => "iii",
            Lead::AVR => "avr",
            Lead::AVL => "avl",
            Lead::AVF => "avf",
            Lead::V1 => "v1",
            Lead::V2 => "v2",
            Lead::V3 => "v3",
            Lead::V4 => "v4",
            Lead::V5 => "v5",
            Lead::V6 => "v6",
        }
    }

    pub fn label(&self) -> String {
        self.key().to_ascii_uppercase()
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lead '{0}'")]
pub struct UnknownLead(pub String);

impl FromStr for Lead {
    type Err = UnknownLead;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Lead::ALL
            .iter()
            .copied()
            .find(|lead| lead.key() == normalized)
            .ok_or_else(|| UnknownLead(s.to_string()))
    }
}
