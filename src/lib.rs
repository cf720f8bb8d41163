//! # Vitalsync
//!
//! Vitals stream aggregation and dual-source synchronization: produces a
//! single, continuously-updated physiological snapshot (heart rate, steps,
//! HRV, sleep, active energy, weight) by reconciling two independent,
//! unreliable feeds — a push-style live telemetry stream and a pull-style
//! periodic historical query — while surviving connectivity loss, process
//! restarts, and partial or missing metrics.
//!
//! ## Features
//!
//! - **Field-level merging**: partial records fuse last-writer-wins per field
//! - **Dual acquisition modes**: live streaming with a polling fallback,
//!   chosen per session by stored preference
//! - **Composite fetches**: five differently-windowed queries per poll cycle,
//!   matched to each metric class's notion of freshness
//! - **Cold-start restore**: the last snapshot persists across restarts
//! - **Graceful degradation**: transient fetch failures, corrupt cache
//!   payloads, and unknown metric kinds never surface as errors
//!
//! ## Modules
//!
//! - [`vitals`]: canonical record, translation, and the aggregator
//! - [`adapters`]: live and polling feed translators
//! - [`controller`]: connection-status state machine and adapter lifecycle
//! - [`cache`]: persistent snapshot cache and key-value stores
//! - [`service`]: the facade the application talks to
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vitalsync::{Config, MemoryStore, SimulatedWearable, VitalsService};
//! use vitalsync::sources::PreferenceStore;
//!
//! struct NoPrefs;
//!
//! #[async_trait::async_trait]
//! impl PreferenceStore for NoPrefs {
//!     async fn get_bool(&self, _key: &str) -> Option<bool> {
//!         None
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let wearable = Arc::new(SimulatedWearable::default());
//!
//!     let service = VitalsService::new(
//!         wearable.clone(),
//!         wearable,
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(NoPrefs),
//!         &Config::default(),
//!     );
//!
//!     service.initialize().await;
//!     service.start_subscription("demo-user").await?;
//!
//!     let mut updates = service.subscribe_updates();
//!     let record = updates.recv().await?;
//!     println!("heart rate: {:?}", record.heart_rate);
//!
//!     service.dispose().await;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cache;
pub mod config;
pub mod controller;
pub mod service;
pub mod sources;
pub mod vitals;

// Re-export top-level types for convenience
pub use vitals::{
    AggregatorConfig, ConnectionStatus, MetricKind, TimeRange, VitalsAggregator, VitalsQuality,
    VitalsRecord,
};

pub use adapters::{LiveAdapter, PollingAdapter, PollingConfig};

pub use cache::{
    JsonFileStore, KeyValueStore, MemoryStore, SnapshotCache, StoreError, SNAPSHOT_CACHE_KEY,
};

pub use controller::{ControllerError, ModeController};

pub use service::VitalsService;

pub use sources::{
    HealthRepository, HealthSample, PreferenceStore, SimulatedWearable, SimulatedWearableConfig,
    SourceError, TelemetryMessage, TelemetrySource, PREFER_POLLING_KEY,
};

pub use config::{CacheConfig, Config, ConfigError, LoggingConfig};
