//! Persistent Snapshot Cache
//!
//! Durable storage for the single most recent vitals record, so the facade
//! has something non-empty to show immediately after process start, before
//! any live or polled data arrives. Everything here is best-effort: a failed
//! write is swallowed, and a corrupt stored payload reads as absence.

mod store;

pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::vitals::{VitalsQuality, VitalsRecord};

/// Fixed store key for the persisted snapshot
pub const SNAPSHOT_CACHE_KEY: &str = "vitals.snapshot";

/// Best-effort cache of the last-known vitals record
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SnapshotCache {
    /// Create a cache over a durable store, using the default key
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, SNAPSHOT_CACHE_KEY)
    }

    /// Create a cache with an explicit store key
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Read the persisted record, or `None` if absent or corrupt
    pub async fn read(&self) -> Option<VitalsRecord> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<CachedSnapshot>(&raw) {
            Ok(snapshot) => Some(snapshot.into_record()),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding corrupt cached snapshot");
                None
            }
        }
    }

    /// Persist a record, overwriting any prior value; failures are swallowed
    pub async fn write(&self, record: &VitalsRecord) {
        let snapshot = CachedSnapshot::from_record(record);

        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot serialization failed");
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &raw).await {
            tracing::warn!(error = %e, "Snapshot cache write failed");
        }
    }
}

/// Persisted snapshot payload: flat record fields plus an integer quality
/// code and an RFC 3339 timestamp
#[derive(Debug, Serialize, Deserialize)]
struct CachedSnapshot {
    heart_rate: Option<f64>,
    steps: Option<u64>,
    hrv: Option<f64>,
    sleep_hours: Option<f64>,
    active_energy: Option<f64>,
    weight_lbs: Option<f64>,
    timestamp: String,
    quality: u8,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl CachedSnapshot {
    fn from_record(record: &VitalsRecord) -> Self {
        Self {
            heart_rate: record.heart_rate,
            steps: record.steps,
            hrv: record.hrv,
            sleep_hours: record.sleep_hours,
            active_energy: record.active_energy,
            weight_lbs: record.weight_lbs,
            timestamp: record.timestamp.to_rfc3339(),
            quality: record.quality.code(),
            metadata: record.metadata.clone(),
        }
    }

    fn into_record(self) -> VitalsRecord {
        // An unparsable stored timestamp is reconstructed as "now"
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        VitalsRecord {
            heart_rate: self.heart_rate,
            steps: self.steps,
            hrv: self.hrv,
            sleep_hours: self.sleep_hours,
            active_energy: self.active_energy,
            weight_lbs: self.weight_lbs,
            timestamp,
            quality: VitalsQuality::from_code(self.quality),
            metadata: self.metadata,
        }
    }
}
