//! External collaborator seams
//!
//! The aggregation pipeline treats its upstreams as interfaces only:
//! - `TelemetrySource`: push-style live telemetry feed from a wearable
//! - `HealthRepository`: pull-style historical sample queries
//! - `PreferenceStore`: user preference flags
//!
//! The durable key-value store behind the snapshot cache lives in
//! [`crate::cache`].

mod simulated;

pub use simulated::{SimulatedWearable, SimulatedWearableConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::vitals::{MetricKind, TimeRange};

/// Preference key read once per subscription start
pub const PREFER_POLLING_KEY: &str = "prefer_polling";

/// One raw message from the live telemetry feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryMessage {
    /// Upstream metric-kind tag (e.g. "HEART_RATE")
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

/// One sample returned by a historical query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSample {
    /// Upstream metric-kind tag (e.g. "WEIGHT")
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub id: String,
}

/// Errors from upstream data sources
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Stream start failed: {0}")]
    StreamStart(String),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Push-style live telemetry feed
///
/// Delivery reliability is the source's responsibility; the live adapter is
/// purely a translator over `messages()`.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Begin streaming for a user; an error here means live mode cannot start
    async fn start_streaming(&self, user: &str) -> Result<(), SourceError>;

    /// Stop streaming; safe to call when not streaming
    async fn stop_streaming(&self);

    /// Batches of raw telemetry messages
    fn messages(&self) -> BoxStream<'static, Vec<TelemetryMessage>>;
}

/// Pull-style historical sample repository
#[async_trait]
pub trait HealthRepository: Send + Sync {
    fn is_initialized(&self) -> bool;

    async fn initialize(&self) -> Result<(), SourceError>;

    /// Samples of the given kinds whose timestamps fall within `range`
    async fn health_data(
        &self,
        kinds: &[MetricKind],
        range: TimeRange,
    ) -> Result<Vec<HealthSample>, SourceError>;
}

/// User preference flags
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Returns `None` when the key has never been set
    async fn get_bool(&self, key: &str) -> Option<bool>;
}
