//! Vitals Aggregator
//!
//! Owns the authoritative "current" vitals record and a bounded history.
//! Both adapters feed partial records into `add()`, which merges them field
//! by field and fans the new current record out to subscribers over a
//! broadcast channel.

use chrono::{Duration, Utc};
use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};

use super::types::VitalsRecord;

/// Configuration for the aggregator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AggregatorConfig {
    /// How long merged records are retained in the in-memory history
    #[serde(default = "default_history_retention")]
    pub history_retention_secs: u64,

    /// Capacity of the live-update broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_history_retention() -> u64 {
    24 * 3600
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            history_retention_secs: default_history_retention(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Merges partial vitals records into a continuously-updated snapshot
pub struct VitalsAggregator {
    state: RwLock<AggregatorState>,
    updates: broadcast::Sender<VitalsRecord>,
    config: AggregatorConfig,
}

struct AggregatorState {
    current: Option<VitalsRecord>,
    /// Append-ordered merged records, pruned by timestamp age
    history: VecDeque<VitalsRecord>,
}

impl VitalsAggregator {
    /// Create a new aggregator
    pub fn new(config: AggregatorConfig) -> Self {
        let (updates, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            state: RwLock::new(AggregatorState {
                current: None,
                history: VecDeque::new(),
            }),
            updates,
            config,
        }
    }

    /// Merge an incoming partial record into the current snapshot
    ///
    /// Field-level last writer wins: fields present in `record` overwrite the
    /// current record, absent fields are preserved. The merged result is
    /// appended to the history and published to subscribers. Merges are
    /// applied in invocation order; no cross-adapter ordering is assumed.
    pub async fn add(&self, record: VitalsRecord) {
        let merged = {
            let mut state = self.state.write().await;

            let merged = match &state.current {
                Some(current) => current.merged_with(&record),
                None => record,
            };

            state.current = Some(merged.clone());
            state.history.push_back(merged.clone());

            let cutoff = Utc::now() - Duration::seconds(self.config.history_retention_secs as i64);
            state.history.retain(|r| r.timestamp > cutoff);

            merged
        };

        tracing::trace!(timestamp = %merged.timestamp, "Merged vitals record");

        // No receivers is fine; subscribers come and go
        let _ = self.updates.send(merged);
    }

    /// The latest merged record, or `None` if nothing has ever been added
    pub async fn current(&self) -> Option<VitalsRecord> {
        self.state.read().await.current.clone()
    }

    /// Retained records whose timestamp falls within the trailing `window`
    ///
    /// Returned in append order; callers must not rely on timestamp ordering
    /// since polled samples can arrive with older timestamps.
    pub async fn records_within(&self, window: Duration) -> Vec<VitalsRecord> {
        let cutoff = Utc::now() - window;
        self.state
            .read()
            .await
            .history
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Subscribe to the live-update channel
    pub fn subscribe(&self) -> broadcast::Receiver<VitalsRecord> {
        self.updates.subscribe()
    }

    /// Number of records currently retained
    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }
}

impl Default for VitalsAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}
