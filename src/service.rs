//! Vitals Service
//!
//! Single entry point for the rest of the application. Wires the aggregator,
//! controller, and snapshot cache together, restores the cached snapshot on
//! startup, and offers the convenience reads the UI binds to.

use chrono::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::adapters::PollingConfig;
use crate::cache::{KeyValueStore, SnapshotCache};
use crate::config::Config;
use crate::controller::{ControllerError, ModeController};
use crate::sources::{HealthRepository, PreferenceStore, TelemetrySource, PREFER_POLLING_KEY};
use crate::vitals::{AggregatorConfig, ConnectionStatus, VitalsAggregator, VitalsRecord};

/// Latest heart rate above this multiple of the trailing mean flags stress
const STRESS_THRESHOLD: f64 = 1.15;

/// Facade over the vitals aggregation pipeline
///
/// All dependencies are injected at construction; there are no global
/// service instances.
pub struct VitalsService {
    aggregator: Arc<VitalsAggregator>,
    controller: ModeController,
    cache: SnapshotCache,
    prefs: Arc<dyn PreferenceStore>,
    initialized: AtomicBool,
    persist_task: Mutex<Option<JoinHandle<()>>>,
}

impl VitalsService {
    /// Wire a service from its collaborators and configuration
    pub fn new(
        live_source: Arc<dyn TelemetrySource>,
        repository: Arc<dyn HealthRepository>,
        store: Arc<dyn KeyValueStore>,
        prefs: Arc<dyn PreferenceStore>,
        config: &Config,
    ) -> Self {
        Self::with_configs(
            live_source,
            repository,
            store,
            prefs,
            config.aggregator.clone(),
            config.polling.clone(),
            config.cache.key.clone(),
        )
    }

    fn with_configs(
        live_source: Arc<dyn TelemetrySource>,
        repository: Arc<dyn HealthRepository>,
        store: Arc<dyn KeyValueStore>,
        prefs: Arc<dyn PreferenceStore>,
        aggregator_config: AggregatorConfig,
        polling_config: PollingConfig,
        cache_key: String,
    ) -> Self {
        let aggregator = Arc::new(VitalsAggregator::new(aggregator_config));
        let controller = ModeController::new(
            live_source,
            repository,
            Arc::clone(&aggregator),
            polling_config,
        );

        Self {
            aggregator,
            controller,
            cache: SnapshotCache::with_key(store, cache_key),
            prefs,
            initialized: AtomicBool::new(false),
            persist_task: Mutex::new(None),
        }
    }

    /// Restore the cached snapshot and start opportunistic write-back
    ///
    /// Idempotent; later calls are no-ops until `dispose()`. After this
    /// returns, `current()` is non-empty whenever a prior session persisted
    /// anything.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(snapshot) = self.cache.read().await {
            tracing::info!(timestamp = %snapshot.timestamp, "Restored cached vitals snapshot");
            self.aggregator.add(snapshot).await;
        }

        // Persist every new current record; subscribing after the restore
        // keeps the restored record from being written straight back.
        let mut updates = self.aggregator.subscribe();
        let cache = self.cache.clone();
        let handle = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(record) => cache.write(&record).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Snapshot write-back lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *self.persist_task.lock().await = Some(handle);
    }

    /// Start acquisition, honoring the stored poll-only preference
    pub async fn start_subscription(&self, user: &str) -> Result<(), ControllerError> {
        let prefer_polling = self
            .prefs
            .get_bool(PREFER_POLLING_KEY)
            .await
            .unwrap_or(false);

        self.controller.start(user, prefer_polling).await
    }

    /// Stop acquisition; safe to call at any time
    pub async fn stop_subscription(&self) {
        self.controller.stop().await;
    }

    /// Tear down completely: stop acquisition and the write-back task
    pub async fn dispose(&self) {
        self.stop_subscription().await;

        if let Some(handle) = self.persist_task.lock().await.take() {
            handle.abort();
        }
        self.initialized.store(false, Ordering::SeqCst);
    }

    /// The latest merged record
    pub async fn current(&self) -> Option<VitalsRecord> {
        self.aggregator.current().await
    }

    /// Records within the trailing `window`
    pub async fn records_within(&self, window: Duration) -> Vec<VitalsRecord> {
        self.aggregator.records_within(window).await
    }

    /// Mean heart rate over the trailing `window`
    ///
    /// `None` when no heart-rate-bearing records fall in the window.
    pub async fn mean_heart_rate(&self, window: Duration) -> Option<f64> {
        let rates = self.heart_rates_within(window).await;
        if rates.is_empty() {
            return None;
        }
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    }

    /// Heuristic flag for possibly elevated stress
    ///
    /// True when the most recent heart rate exceeds 115% of the mean of the
    /// earlier readings in the window. Needs at least two heart-rate samples
    /// to evaluate; returns false otherwise, never an error.
    pub async fn stress_indicator(&self, window: Duration) -> bool {
        let rates = self.heart_rates_within(window).await;
        let Some((latest, earlier)) = rates.split_last() else {
            return false;
        };
        if earlier.is_empty() {
            return false;
        }

        let mean = earlier.iter().sum::<f64>() / earlier.len() as f64;
        *latest > mean * STRESS_THRESHOLD
    }

    /// Subscribe to merged record updates
    pub fn subscribe_updates(&self) -> broadcast::Receiver<VitalsRecord> {
        self.aggregator.subscribe()
    }

    /// Subscribe to connection-status changes
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.controller.subscribe_status()
    }

    /// The current connection status
    pub async fn status(&self) -> ConnectionStatus {
        self.controller.status().await
    }

    /// Heart-rate values in append order within the window
    async fn heart_rates_within(&self, window: Duration) -> Vec<f64> {
        self.aggregator
            .records_within(window)
            .await
            .iter()
            .filter_map(|r| r.heart_rate)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::sources::{HealthSample, SourceError, TelemetryMessage};
    use crate::vitals::{MetricKind, TimeRange};
    use async_trait::async_trait;
    use chrono::Utc;
    use futures_util::stream::BoxStream;

    struct SilentSource;

    #[async_trait]
    impl TelemetrySource for SilentSource {
        async fn start_streaming(&self, _user: &str) -> Result<(), SourceError> {
            Ok(())
        }
        async fn stop_streaming(&self) {}
        fn messages(&self) -> BoxStream<'static, Vec<TelemetryMessage>> {
            Box::pin(futures_util::stream::pending())
        }
    }

    struct BareRepository;

    #[async_trait]
    impl HealthRepository for BareRepository {
        fn is_initialized(&self) -> bool {
            true
        }
        async fn initialize(&self) -> Result<(), SourceError> {
            Ok(())
        }
        async fn health_data(
            &self,
            _kinds: &[MetricKind],
            _range: TimeRange,
        ) -> Result<Vec<HealthSample>, SourceError> {
            Ok(Vec::new())
        }
    }

    struct FixedPrefs {
        prefer_polling: Option<bool>,
    }

    #[async_trait]
    impl PreferenceStore for FixedPrefs {
        async fn get_bool(&self, key: &str) -> Option<bool> {
            if key == PREFER_POLLING_KEY {
                self.prefer_polling
            } else {
                None
            }
        }
    }

    fn service_over(store: Arc<dyn KeyValueStore>, prefer_polling: Option<bool>) -> VitalsService {
        VitalsService::new(
            Arc::new(SilentSource),
            Arc::new(BareRepository),
            store,
            Arc::new(FixedPrefs { prefer_polling }),
            &Config::default(),
        )
    }

    async fn add_rates(service: &VitalsService, rates: &[f64]) {
        for rate in rates {
            service
                .aggregator
                .add(VitalsRecord::now().heart_rate(*rate))
                .await;
        }
    }

    #[tokio::test]
    async fn test_initialize_restores_cached_snapshot() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

        // A prior session persisted a record
        {
            let cache = SnapshotCache::new(Arc::clone(&store));
            cache
                .write(&VitalsRecord::now().heart_rate(58.0).steps(12000))
                .await;
        }

        let service = service_over(Arc::clone(&store), None);
        assert!(service.current().await.is_none());

        service.initialize().await;

        let current = service.current().await.unwrap();
        assert_eq!(current.heart_rate, Some(58.0));
        assert_eq!(current.steps, Some(12000));

        service.dispose().await;
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let service = service_over(Arc::new(MemoryStore::new()), None);

        service.initialize().await;
        service.initialize().await;

        assert!(service.current().await.is_none());
        service.dispose().await;
    }

    #[tokio::test]
    async fn test_updates_written_back_to_cache() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let service = service_over(Arc::clone(&store), None);
        service.initialize().await;

        add_rates(&service, &[64.0]).await;
        // Give the write-back task a turn
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        service.dispose().await;

        let cache = SnapshotCache::new(store);
        let restored = cache.read().await.unwrap();
        assert_eq!(restored.heart_rate, Some(64.0));
    }

    #[tokio::test]
    async fn test_prefer_polling_routes_to_poll_mode() {
        let service = service_over(Arc::new(MemoryStore::new()), Some(true));
        service.initialize().await;

        service.start_subscription("user-1").await.unwrap();
        assert_eq!(service.status().await, ConnectionStatus::Polling);

        service.dispose().await;
        assert_eq!(service.status().await, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_unset_preference_defaults_to_live() {
        let service = service_over(Arc::new(MemoryStore::new()), None);
        service.initialize().await;

        service.start_subscription("user-1").await.unwrap();
        assert_eq!(service.status().await, ConnectionStatus::Connected);

        service.dispose().await;
    }

    #[tokio::test]
    async fn test_mean_heart_rate() {
        let service = service_over(Arc::new(MemoryStore::new()), None);

        assert!(service.mean_heart_rate(Duration::minutes(30)).await.is_none());

        add_rates(&service, &[60.0, 70.0, 80.0]).await;
        let mean = service.mean_heart_rate(Duration::minutes(30)).await.unwrap();
        assert!((mean - 70.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stress_indicator() {
        let service = service_over(Arc::new(MemoryStore::new()), None);

        // No samples, then one sample: always false
        assert!(!service.stress_indicator(Duration::minutes(30)).await);
        add_rates(&service, &[150.0]).await;
        assert!(!service.stress_indicator(Duration::minutes(30)).await);

        // 90 > 1.15 * mean(70, 70, 70) = 80.5
        let service = service_over(Arc::new(MemoryStore::new()), None);
        add_rates(&service, &[70.0, 70.0, 70.0, 90.0]).await;
        assert!(service.stress_indicator(Duration::minutes(30)).await);

        // 75 < 80.5: within normal variation
        let service = service_over(Arc::new(MemoryStore::new()), None);
        add_rates(&service, &[70.0, 70.0, 70.0, 75.0]).await;
        assert!(!service.stress_indicator(Duration::minutes(30)).await);
    }

    #[tokio::test]
    async fn test_stop_subscription_when_never_started() {
        let service = service_over(Arc::new(MemoryStore::new()), None);

        service.stop_subscription().await;
        service.stop_subscription().await;
        assert_eq!(service.status().await, ConnectionStatus::Disconnected);
    }
}
