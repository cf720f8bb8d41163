//! Simulated wearable
//!
//! In-process stand-in for a real wearable: implements both the live
//! telemetry feed and the historical repository with plausible vitals, so the
//! pipeline can run without device integration.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures_util::stream::BoxStream;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::{HealthRepository, HealthSample, SourceError, TelemetryMessage, TelemetrySource};
use crate::vitals::{MetricKind, TimeRange};

/// Configuration for the simulated wearable
#[derive(Debug, Clone)]
pub struct SimulatedWearableConfig {
    /// Delay between live message batches
    pub message_period: std::time::Duration,
    /// Provenance tag carried by every message and sample
    pub source_name: String,
}

impl Default for SimulatedWearableConfig {
    fn default() -> Self {
        Self {
            message_period: std::time::Duration::from_secs(1),
            source_name: "simulated-watch".to_string(),
        }
    }
}

/// A fake wearable producing plausible vitals
pub struct SimulatedWearable {
    config: SimulatedWearableConfig,
    streaming: AtomicBool,
    initialized: AtomicBool,
}

impl SimulatedWearable {
    pub fn new(config: SimulatedWearableConfig) -> Self {
        Self {
            config,
            streaming: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    fn sample(&self, kind: MetricKind, value: f64, timestamp: chrono::DateTime<Utc>) -> HealthSample {
        HealthSample {
            kind: kind.as_str().to_string(),
            value,
            timestamp,
            source: self.config.source_name.clone(),
            id: Uuid::new_v4().to_string(),
        }
    }
}

impl Default for SimulatedWearable {
    fn default() -> Self {
        Self::new(SimulatedWearableConfig::default())
    }
}

#[async_trait]
impl TelemetrySource for SimulatedWearable {
    async fn start_streaming(&self, user: &str) -> Result<(), SourceError> {
        tracing::debug!(user, "Simulated wearable streaming started");
        self.streaming.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_streaming(&self) {
        self.streaming.store(false, Ordering::SeqCst);
    }

    fn messages(&self) -> BoxStream<'static, Vec<TelemetryMessage>> {
        let period = self.config.message_period;
        let source = self.config.source_name.clone();

        Box::pin(futures_util::stream::unfold(
            (72.0_f64, 0_u64),
            move |(bpm, tick)| {
                let source = source.clone();
                async move {
                    tokio::time::sleep(period).await;

                    let bpm = (bpm + (jitter() - 0.5) * 6.0).clamp(52.0, 140.0);
                    let now = Utc::now();
                    let mut batch = vec![TelemetryMessage {
                        kind: "HEART_RATE".to_string(),
                        value: bpm,
                        timestamp: now,
                        source: source.clone(),
                    }];

                    // A step-count reading every tenth batch
                    if tick % 10 == 9 {
                        batch.push(TelemetryMessage {
                            kind: "STEPS".to_string(),
                            value: 3000.0 + tick as f64 * 12.0,
                            timestamp: now,
                            source: source.clone(),
                        });
                    }

                    Some((batch, (bpm, tick + 1)))
                }
            },
        ))
    }
}

#[async_trait]
impl HealthRepository for SimulatedWearable {
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
        if !self.is_initialized() {
            return Err(SourceError::Unavailable("repository not initialized".into()));
        }

        let mut samples = Vec::new();
        let end = range.end;

        for kind in kinds {
            match kind {
                MetricKind::HeartRate => {
                    for i in 1..=3 {
                        let ts = end - Duration::minutes(i);
                        if range.contains(ts) {
                            samples.push(self.sample(*kind, 64.0 + jitter() * 12.0, ts));
                        }
                    }
                }
                MetricKind::HeartRateVariability => {
                    let ts = end - Duration::minutes(2);
                    if range.contains(ts) {
                        samples.push(self.sample(*kind, 38.0 + jitter() * 20.0, ts));
                    }
                }
                MetricKind::Steps => {
                    let hours = range.duration().num_minutes() as f64 / 60.0;
                    samples.push(self.sample(*kind, (hours * 420.0).round(), end - Duration::minutes(1)));
                }
                MetricKind::ActiveEnergy => {
                    let hours = range.duration().num_minutes() as f64 / 60.0;
                    samples.push(self.sample(*kind, (hours * 28.0).round(), end - Duration::minutes(1)));
                }
                MetricKind::Weight => {
                    samples.push(self.sample(*kind, 70.0, end - Duration::days(2)));
                }
                MetricKind::RestingHeartRate => {
                    samples.push(self.sample(*kind, 54.0 + jitter() * 4.0, end - Duration::hours(8)));
                }
                MetricKind::SleepDeep => {
                    samples.push(self.sample(*kind, 85.0, range.start + Duration::hours(2)));
                }
                MetricKind::SleepLight => {
                    samples.push(self.sample(*kind, 220.0, range.start + Duration::hours(3)));
                }
                MetricKind::SleepRem => {
                    samples.push(self.sample(*kind, 95.0, range.start + Duration::hours(4)));
                }
                MetricKind::SleepAwake => {
                    samples.push(self.sample(*kind, 25.0, range.start + Duration::hours(5)));
                }
                MetricKind::SleepAsleep => {
                    samples.push(self.sample(*kind, 400.0, range.start + Duration::hours(6)));
                }
                MetricKind::SleepInBed => {
                    samples.push(self.sample(*kind, 455.0, range.start + Duration::hours(6)));
                }
            }
        }

        Ok(samples)
    }
}

/// Simple time-seeded noise (0.0 to 1.0)
fn jitter() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}
