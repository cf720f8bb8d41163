//! Source adapters
//!
//! Translators between the two upstream feeds and the aggregator:
//! - [`live`]: push-style telemetry message consumption
//! - [`polling`]: pull-style composite historical fetches on a cadence
//!
//! Adapter lifecycles are owned by the mode controller; nothing else should
//! start or stop them.

pub mod live;
pub mod polling;

pub use live::LiveAdapter;
pub use polling::{PollingAdapter, PollingConfig};
