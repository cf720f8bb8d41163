//! Live Adapter
//!
//! Consumes batches of raw telemetry messages from the push feed and forwards
//! translated partial records to the aggregator. Purely a translator: no
//! retries, no buffering; delivery reliability belongs to the upstream
//! source.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::sources::TelemetryMessage;
use crate::vitals::{translate, VitalsAggregator};

/// Push-feed consumer
pub struct LiveAdapter {
    aggregator: Arc<VitalsAggregator>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveAdapter {
    pub fn new(aggregator: Arc<VitalsAggregator>) -> Self {
        Self {
            aggregator,
            task: Mutex::new(None),
        }
    }

    /// Begin consuming a stream of message batches
    ///
    /// Replaces any previous consumer. Messages of unrecognized metric kinds
    /// and messages yielding no populated field are dropped silently.
    pub async fn start(&self, mut stream: BoxStream<'static, Vec<TelemetryMessage>>) {
        self.stop().await;

        let aggregator = Arc::clone(&self.aggregator);
        let handle = tokio::spawn(async move {
            while let Some(batch) = stream.next().await {
                for msg in &batch {
                    match translate::from_message(msg) {
                        Some(record) => aggregator.add(record.meta("adapter", "live")).await,
                        None => {
                            tracing::trace!(kind = %msg.kind, "Dropped unrecognized telemetry message");
                        }
                    }
                }
            }
            tracing::debug!("Live telemetry stream ended");
        });

        *self.task.lock().await = Some(handle);
    }

    /// Cancel consumption; idempotent and safe when never started
    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
    }

    /// True while a consumer task is attached
    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }
}
