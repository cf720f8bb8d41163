//! Mode Controller
//!
//! Owns the connection-status state machine and the lifecycle of both
//! adapters. The acquisition mode (live vs poll-only) is chosen once at
//! `start()` and not re-evaluated mid-session; only one adapter is the
//! primary feed at a time.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

use crate::adapters::{LiveAdapter, PollingAdapter, PollingConfig};
use crate::sources::{HealthRepository, SourceError, TelemetrySource};
use crate::vitals::{ConnectionStatus, VitalsAggregator};

/// Capacity of the status-change broadcast channel
const STATUS_CHANNEL_CAPACITY: usize = 16;

/// Errors from subscription control
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Subscription already active (status: {0})")]
    AlreadyStarted(ConnectionStatus),

    #[error("Live source failed to start: {0}")]
    LiveStartFailed(#[from] SourceError),
}

/// Supervises adapter lifecycles and the connection-status state machine
///
/// Sole owner of adapter start/stop; callers must never drive an adapter
/// directly, or two feeds could race on the same aggregator.
pub struct ModeController {
    live_source: Arc<dyn TelemetrySource>,
    live: LiveAdapter,
    polling: Arc<PollingAdapter>,
    status: RwLock<ConnectionStatus>,
    status_tx: broadcast::Sender<ConnectionStatus>,
}

impl ModeController {
    /// Wire a controller over its sources and the shared aggregator
    pub fn new(
        live_source: Arc<dyn TelemetrySource>,
        repository: Arc<dyn HealthRepository>,
        aggregator: Arc<VitalsAggregator>,
        polling_config: PollingConfig,
    ) -> Self {
        let live = LiveAdapter::new(Arc::clone(&aggregator));
        let polling = Arc::new(PollingAdapter::new(repository, aggregator, polling_config));

        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        Self {
            live_source,
            live,
            polling,
            status: RwLock::new(ConnectionStatus::Disconnected),
            status_tx,
        }
    }

    /// Start acquisition for a user
    ///
    /// With `prefer_polling` the polling adapter becomes the primary feed and
    /// the live source is never contacted. Otherwise the live feed is
    /// attached and one priming poll runs so consumers have data before the
    /// first live message arrives. A live source that fails to start leaves
    /// the controller in the `Error` state; retry policy is the caller's.
    pub async fn start(&self, user: &str, prefer_polling: bool) -> Result<(), ControllerError> {
        self.begin_connecting().await?;

        if prefer_polling {
            Arc::clone(&self.polling).start().await;
            self.set_status(ConnectionStatus::Polling).await;
            tracing::info!(user, "Vitals acquisition started in poll-only mode");
            return Ok(());
        }

        match self.live_source.start_streaming(user).await {
            Ok(()) => {
                self.live.start(self.live_source.messages()).await;
                // Priming poll: one immediate snapshot ahead of the live feed
                self.polling.poll_once().await;
                self.set_status(ConnectionStatus::Connected).await;
                tracing::info!(user, "Vitals acquisition started in live mode");
                Ok(())
            }
            Err(e) => {
                self.set_status(ConnectionStatus::Error).await;
                tracing::warn!(user, error = %e, "Live telemetry source failed to start");
                Err(ControllerError::LiveStartFailed(e))
            }
        }
    }

    /// Halt whichever adapters are running
    ///
    /// Safe to call repeatedly or when never started.
    pub async fn stop(&self) {
        self.live.stop().await;
        self.polling.stop().await;
        self.live_source.stop_streaming().await;
        self.set_status(ConnectionStatus::Disconnected).await;
    }

    /// The current connection status
    pub async fn status(&self) -> ConnectionStatus {
        *self.status.read().await
    }

    /// Subscribe to status changes
    ///
    /// Exactly one event is emitted per actual transition; repeated calls
    /// producing the same state emit nothing.
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Atomically claim the `Connecting` state, so concurrent `start` calls
    /// cannot both attach a feed
    async fn begin_connecting(&self) -> Result<(), ControllerError> {
        {
            let mut status = self.status.write().await;
            match *status {
                ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                    *status = ConnectionStatus::Connecting;
                }
                other => return Err(ControllerError::AlreadyStarted(other)),
            }
        }

        tracing::debug!(status = %ConnectionStatus::Connecting, "Connection status changed");
        let _ = self.status_tx.send(ConnectionStatus::Connecting);
        Ok(())
    }

    async fn set_status(&self, next: ConnectionStatus) {
        let mut status = self.status.write().await;
        if *status == next {
            return;
        }
        *status = next;
        drop(status);

        tracing::debug!(status = %next, "Connection status changed");
        let _ = self.status_tx.send(next);
    }
}
