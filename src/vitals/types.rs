//! Core vitals data types
//!
//! This module defines the fundamental types used throughout the pipeline:
//! - `VitalsRecord`: one fused observation of a user's physiological state
//! - `VitalsQuality`: quality envelope attached to each record
//! - `ConnectionStatus`: acquisition-mode states owned by the controller
//! - `TimeRange`: a time interval for historical queries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fused physiological snapshot at a point in time
///
/// Every field except the timestamp is optional: adapters emit partial
/// records carrying only the fields implied by the upstream metric, and the
/// aggregator fills in the rest from the previous current record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalsRecord {
    /// Heart rate in beats per minute
    pub heart_rate: Option<f64>,
    /// Step count since local midnight
    pub steps: Option<u64>,
    /// Heart-rate variability (SDNN, milliseconds)
    pub hrv: Option<f64>,
    /// Sleep duration in hours (converted from source minutes)
    pub sleep_hours: Option<f64>,
    /// Active energy burned in kilocalories
    pub active_energy: Option<f64>,
    /// Body weight in pounds (converted from source kilograms)
    pub weight_lbs: Option<f64>,
    /// Observation instant
    pub timestamp: DateTime<Utc>,
    /// Quality envelope
    pub quality: VitalsQuality,
    /// Provenance-only metadata (source adapter, sleep stage, sample id).
    /// Consumers must tolerate its absence.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl VitalsRecord {
    /// Create an empty record at a specific instant
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            heart_rate: None,
            steps: None,
            hrv: None,
            sleep_hours: None,
            active_energy: None,
            weight_lbs: None,
            timestamp,
            quality: VitalsQuality::Unknown,
            metadata: HashMap::new(),
        }
    }

    /// Create an empty record stamped with the current time
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Builder method: set heart rate (bpm)
    pub fn heart_rate(mut self, bpm: f64) -> Self {
        self.heart_rate = Some(bpm);
        self
    }

    /// Builder method: set step count
    pub fn steps(mut self, steps: u64) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Builder method: set heart-rate variability (ms)
    pub fn hrv(mut self, hrv: f64) -> Self {
        self.hrv = Some(hrv);
        self
    }

    /// Builder method: set sleep duration (hours)
    pub fn sleep_hours(mut self, hours: f64) -> Self {
        self.sleep_hours = Some(hours);
        self
    }

    /// Builder method: set active energy (kcal)
    pub fn active_energy(mut self, kcal: f64) -> Self {
        self.active_energy = Some(kcal);
        self
    }

    /// Builder method: set body weight (lb)
    pub fn weight_lbs(mut self, lbs: f64) -> Self {
        self.weight_lbs = Some(lbs);
        self
    }

    /// Builder method: set quality
    pub fn quality(mut self, quality: VitalsQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Builder method: add a metadata entry
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True when every optional field is absent
    ///
    /// Adapters discard such records instead of forwarding them.
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none()
            && self.steps.is_none()
            && self.hrv.is_none()
            && self.sleep_hours.is_none()
            && self.active_energy.is_none()
            && self.weight_lbs.is_none()
    }

    /// Merge an incoming partial record over this one, field by field
    ///
    /// Last writer wins per field: the incoming value is taken when present,
    /// otherwise the existing value is kept. Metadata is replaced wholesale
    /// by the incoming map, not deep-merged, so it reflects only the most
    /// recent contributing message. Produces a new record; history entries
    /// stay immutable.
    pub fn merged_with(&self, incoming: &VitalsRecord) -> VitalsRecord {
        VitalsRecord {
            heart_rate: incoming.heart_rate.or(self.heart_rate),
            steps: incoming.steps.or(self.steps),
            hrv: incoming.hrv.or(self.hrv),
            sleep_hours: incoming.sleep_hours.or(self.sleep_hours),
            active_energy: incoming.active_energy.or(self.active_energy),
            weight_lbs: incoming.weight_lbs.or(self.weight_lbs),
            timestamp: incoming.timestamp,
            quality: incoming.quality,
            metadata: incoming.metadata.clone(),
        }
    }
}

/// Quality envelope for a vitals record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VitalsQuality {
    Good,
    Degraded,
    Stale,
    Unknown,
}

impl VitalsQuality {
    /// Stable integer code used in the persisted snapshot payload
    pub fn code(&self) -> u8 {
        match self {
            VitalsQuality::Unknown => 0,
            VitalsQuality::Good => 1,
            VitalsQuality::Degraded => 2,
            VitalsQuality::Stale => 3,
        }
    }

    /// Decode a persisted quality code; unrecognized codes map to Unknown
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => VitalsQuality::Good,
            2 => VitalsQuality::Degraded,
            3 => VitalsQuality::Stale,
            _ => VitalsQuality::Unknown,
        }
    }
}

/// Acquisition-mode connection state
///
/// Initial state is `Disconnected`; a session always ends back in
/// `Disconnected` via an explicit stop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// Live telemetry feed is the primary source
    Connected,
    /// Periodic historical queries are the primary source
    Polling,
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Polling => write!(f, "polling"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Time interval for historical queries (half-open: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Trailing window of `duration` ending at `end`
    pub fn trailing(end: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start: end - duration,
            end,
        }
    }

    /// Check if an instant falls within this range
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Duration covered by this range
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
