//! Vitals data model and aggregation
//!
//! - [`types`]: canonical record, quality, connection status, time ranges
//! - [`translate`]: upstream metric classification and unit conversion
//! - [`aggregator`]: field-level merge, bounded history, live-update channel

pub mod aggregator;
pub mod translate;
pub mod types;

pub use aggregator::{AggregatorConfig, VitalsAggregator};
pub use translate::{MetricKind, KG_TO_LB, MINUTES_PER_HOUR};
pub use types::{ConnectionStatus, TimeRange, VitalsQuality, VitalsRecord};
