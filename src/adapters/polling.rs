//! Polling Adapter
//!
//! Issues a composite set of time-windowed historical queries on a fixed
//! cadence and forwards every translated sample to the aggregator. Each
//! metric class gets its own window because freshness means something
//! different per class: a five-minute-old heart rate is stale, while a
//! thirty-day-old weight is the best available data.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::sources::{HealthRepository, HealthSample, SourceError};
use crate::vitals::{translate, MetricKind, TimeRange, VitalsAggregator};

/// Configuration for the polling cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between composite fetches
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_interval() -> u64 {
    300
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

/// Pull-feed translator running composite fetches
pub struct PollingAdapter {
    repository: Arc<dyn HealthRepository>,
    aggregator: Arc<VitalsAggregator>,
    config: PollingConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingAdapter {
    pub fn new(
        repository: Arc<dyn HealthRepository>,
        aggregator: Arc<VitalsAggregator>,
        config: PollingConfig,
    ) -> Self {
        Self {
            repository,
            aggregator,
            config,
            task: Mutex::new(None),
        }
    }

    /// Begin recurring composite fetches
    ///
    /// The first fetch runs immediately so callers get data without waiting a
    /// full interval. Replaces any previous schedule.
    pub async fn start(self: Arc<Self>) {
        self.stop().await;

        let adapter = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(adapter.config.interval_secs));

            loop {
                // First tick fires immediately
                ticker.tick().await;
                adapter.poll_once().await;
            }
        });

        *self.task.lock().await = Some(handle);
    }

    /// Cancel the recurring timer; idempotent and safe when never started
    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
    }

    /// True while the recurring schedule is attached
    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Perform exactly one best-effort composite fetch
    ///
    /// Never fails: an unavailable repository skips the cycle, and the first
    /// failed query abandons the remainder of it. Samples already forwarded
    /// before a failure stay merged; the next scheduled cycle proceeds
    /// normally.
    pub async fn poll_once(&self) {
        if let Err(e) = self.ensure_initialized().await {
            tracing::debug!(error = %e, "Historical repository unavailable, skipping poll");
            return;
        }

        let now = Utc::now();
        let windows = CompositeWindows::compute(now, local_midnight(now));

        // The five queries are independent; issue them concurrently to bound
        // cycle latency.
        let (point, cumulative, weight, sleep, resting) = tokio::join!(
            self.repository.health_data(
                &[MetricKind::HeartRate, MetricKind::HeartRateVariability],
                windows.point_in_time,
            ),
            self.repository.health_data(
                &[MetricKind::Steps, MetricKind::ActiveEnergy],
                windows.cumulative,
            ),
            self.repository
                .health_data(&[MetricKind::Weight], windows.slow_changing),
            self.repository.health_data(
                &[
                    MetricKind::SleepAsleep,
                    MetricKind::SleepDeep,
                    MetricKind::SleepLight,
                    MetricKind::SleepRem,
                    MetricKind::SleepAwake,
                    MetricKind::SleepInBed,
                ],
                windows.sleep,
            ),
            self.repository
                .health_data(&[MetricKind::RestingHeartRate], windows.resting),
        );

        // Weight and resting heart rate keep only the most recent sample;
        // sleep keeps every stage-level sample individually.
        let batches = [
            point,
            cumulative,
            weight.map(keep_most_recent),
            sleep,
            resting.map(keep_most_recent),
        ];

        let mut forwarded = 0;
        for result in batches {
            match result {
                Ok(samples) => {
                    for sample in &samples {
                        if let Some(record) = translate::from_sample(sample) {
                            self.aggregator.add(record.meta("adapter", "polling")).await;
                            forwarded += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, forwarded, "Composite fetch failed, abandoning cycle");
                    return;
                }
            }
        }

        tracing::debug!(forwarded, "Composite fetch completed");
    }

    async fn ensure_initialized(&self) -> Result<(), SourceError> {
        if !self.repository.is_initialized() {
            self.repository.initialize().await?;
        }
        Ok(())
    }
}

/// The five query windows of one composite fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CompositeWindows {
    /// Point-in-time metrics (heart rate, HRV): trailing 5 minutes
    point_in_time: TimeRange,
    /// Cumulative metrics (steps, active energy): local midnight to now
    cumulative: TimeRange,
    /// Slowly-changing metrics (weight): trailing 30 days
    slow_changing: TimeRange,
    /// Sleep: 6 hours before local midnight to now, so the prior night is
    /// captured even when queried mid-morning
    sleep: TimeRange,
    /// Resting heart rate: trailing 24 hours
    resting: TimeRange,
}

impl CompositeWindows {
    fn compute(now: DateTime<Utc>, midnight: DateTime<Utc>) -> Self {
        Self {
            point_in_time: TimeRange::trailing(now, Duration::minutes(5)),
            cumulative: TimeRange::new(midnight, now),
            slow_changing: TimeRange::trailing(now, Duration::days(30)),
            sleep: TimeRange::new(midnight - Duration::hours(6), now),
            resting: TimeRange::trailing(now, Duration::hours(24)),
        }
    }
}

/// Start of the current day in the machine's local timezone, as UTC
fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    let midnight = local.date_naive().and_time(NaiveTime::MIN);

    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // A skipped local midnight (DST gap); fall back to a trailing day
        LocalResult::None => now - Duration::hours(24),
    }
}

fn keep_most_recent(samples: Vec<HealthSample>) -> Vec<HealthSample> {
    samples
        .into_iter()
        .max_by_key(|s| s.timestamp)
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeRepository {
        initialized: AtomicBool,
        queries: std::sync::Mutex<Vec<(Vec<MetricKind>, TimeRange)>>,
        fail_kind: Option<MetricKind>,
    }

    impl FakeRepository {
        fn new() -> Self {
            Self {
                initialized: AtomicBool::new(false),
                queries: std::sync::Mutex::new(Vec::new()),
                fail_kind: None,
            }
        }

        fn failing_on(kind: MetricKind) -> Self {
            Self {
                fail_kind: Some(kind),
                ..Self::new()
            }
        }

        fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HealthRepository for FakeRepository {
        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::SeqCst)
        }

        async fn initialize(&self) -> Result<(), SourceError> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn health_data(
            &self,
            kinds: &[MetricKind],
            range: TimeRange,
        ) -> Result<Vec<HealthSample>, SourceError> {
            self.queries
                .lock()
                .unwrap()
                .push((kinds.to_vec(), range));

            if let Some(fail) = self.fail_kind {
                if kinds.contains(&fail) {
                    return Err(SourceError::Query("boom".into()));
                }
            }

            let mut samples = Vec::new();
            for kind in kinds {
                let value = match kind {
                    MetricKind::HeartRate => 66.0,
                    MetricKind::HeartRateVariability => 41.0,
                    MetricKind::Steps => 5200.0,
                    MetricKind::ActiveEnergy => 310.0,
                    MetricKind::Weight => 70.0,
                    MetricKind::RestingHeartRate => 53.0,
                    _ => 90.0, // sleep stages, minutes
                };
                samples.push(HealthSample {
                    kind: kind.as_str().to_string(),
                    value,
                    timestamp: range.end - Duration::minutes(1),
                    source: "fake-repo".to_string(),
                    id: format!("{}-1", kind.as_str()),
                });
            }
            Ok(samples)
        }
    }

    fn adapter_over(repo: FakeRepository) -> (Arc<PollingAdapter>, Arc<VitalsAggregator>, Arc<FakeRepository>) {
        let repo = Arc::new(repo);
        let aggregator = Arc::new(VitalsAggregator::default());
        let adapter = Arc::new(PollingAdapter::new(
            Arc::clone(&repo) as Arc<dyn HealthRepository>,
            Arc::clone(&aggregator),
            PollingConfig::default(),
        ));
        (adapter, aggregator, repo)
    }

    #[tokio::test]
    async fn test_poll_once_issues_five_queries() {
        let (adapter, aggregator, repo) = adapter_over(FakeRepository::new());

        adapter.poll_once().await;

        assert_eq!(repo.query_count(), 5);
        assert!(repo.is_initialized());

        let current = aggregator.current().await.unwrap();
        assert_eq!(current.heart_rate, Some(53.0)); // resting sample forwarded last
        assert_eq!(current.steps, Some(5200));
        assert_eq!(current.active_energy, Some(310.0));
        assert!(current.weight_lbs.is_some());
        assert!(current.sleep_hours.is_some());
        assert_eq!(current.metadata.get("adapter").map(String::as_str), Some("polling"));
    }

    #[tokio::test]
    async fn test_query_windows() {
        let now = Utc::now();
        let midnight = local_midnight(now);
        let windows = CompositeWindows::compute(now, midnight);

        assert_eq!(windows.point_in_time.duration(), Duration::minutes(5));
        assert_eq!(windows.cumulative.start, midnight);
        assert_eq!(windows.cumulative.end, now);
        assert_eq!(windows.slow_changing.duration(), Duration::days(30));
        assert_eq!(windows.sleep.start, midnight - Duration::hours(6));
        assert_eq!(windows.resting.duration(), Duration::hours(24));
    }

    #[tokio::test]
    async fn test_failed_query_abandons_cycle_keeps_partials() {
        // Weight query (third) fails: the first two batches stay merged,
        // sleep and resting are abandoned.
        let (adapter, aggregator, _repo) = adapter_over(FakeRepository::failing_on(MetricKind::Weight));

        adapter.poll_once().await;

        let current = aggregator.current().await.unwrap();
        assert_eq!(current.heart_rate, Some(66.0));
        assert_eq!(current.steps, Some(5200));
        assert!(current.weight_lbs.is_none());
        assert!(current.sleep_hours.is_none());
    }

    #[tokio::test]
    async fn test_poll_once_swallows_total_failure() {
        struct DeadRepository;

        #[async_trait]
        impl HealthRepository for DeadRepository {
            fn is_initialized(&self) -> bool {
                false
            }
            async fn initialize(&self) -> Result<(), SourceError> {
                Err(SourceError::Unavailable("no device".into()))
            }
            async fn health_data(
                &self,
                _kinds: &[MetricKind],
                _range: TimeRange,
            ) -> Result<Vec<HealthSample>, SourceError> {
                Err(SourceError::Unavailable("no device".into()))
            }
        }

        let aggregator = Arc::new(VitalsAggregator::default());
        let adapter = PollingAdapter::new(
            Arc::new(DeadRepository),
            Arc::clone(&aggregator),
            PollingConfig::default(),
        );

        // Must not panic or propagate
        adapter.poll_once().await;
        assert!(aggregator.current().await.is_none());
    }

    #[tokio::test]
    async fn test_start_polls_immediately() {
        let (adapter, aggregator, _repo) = adapter_over(FakeRepository::new());

        Arc::clone(&adapter).start().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        adapter.stop().await;

        // Data arrived well before the five-minute interval elapsed
        assert!(aggregator.current().await.is_some());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (adapter, _aggregator, _repo) = adapter_over(FakeRepository::new());

        adapter.stop().await;
        adapter.stop().await;
        assert!(!adapter.is_running().await);

        Arc::clone(&adapter).start().await;
        assert!(adapter.is_running().await);
        adapter.stop().await;
        adapter.stop().await;
        assert!(!adapter.is_running().await);
    }

    #[tokio::test]
    async fn test_keep_most_recent() {
        let now = Utc::now();
        let mk = |mins: i64| HealthSample {
            kind: "WEIGHT".to_string(),
            value: mins as f64,
            timestamp: now - Duration::minutes(mins),
            source: "s".to_string(),
            id: mins.to_string(),
        };

        let kept = keep_most_recent(vec![mk(30), mk(5), mk(90)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].value, 5.0);

        assert!(keep_most_recent(Vec::new()).is_empty());
    }
}
