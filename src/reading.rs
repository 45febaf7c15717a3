use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

/// One timestamped sample reported under an asset name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub asset: String,
    /// Serialised as RFC 3339 with the local offset.
    pub timestamp: DateTime<Local>,
    pub key: Uuid,
    pub readings: BTreeMap<&'static str, f64>,
}

impl Reading {
    pub fn new(
        asset: String,
        timestamp: DateTime<Local>,
        readings: BTreeMap<&'static str, f64>,
    ) -> Self {
        Self {
            asset,
            timestamp,
            key: Uuid::new_v4(),
            readings,
        }
    }
}

/// The readings of one poll cycle, in channel order.
pub type ReadingBatch = Vec<Reading>;
