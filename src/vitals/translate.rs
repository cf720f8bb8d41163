//! Metric translation
//!
//! Maps raw upstream telemetry messages and historical samples onto partial
//! `VitalsRecord`s. This is the single place where metric-kind classification
//! and unit conversion happen; the live and polling adapters share it so both
//! paths agree on field mapping.

use crate::sources::{HealthSample, TelemetryMessage};
use crate::vitals::types::{VitalsQuality, VitalsRecord};

/// Kilograms to pounds
pub const KG_TO_LB: f64 = 2.20462;

/// Minutes per hour, for sleep-duration conversion
pub const MINUTES_PER_HOUR: f64 = 60.0;

/// Classified upstream metric kinds
///
/// Upstream sources tag messages and samples with free-form type strings;
/// `parse` maps the known ones onto this enum and returns `None` for
/// everything else. Unknown kinds are silently dropped at the adapter
/// boundary so new sensor types do not break ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    HeartRate,
    RestingHeartRate,
    Steps,
    HeartRateVariability,
    ActiveEnergy,
    Weight,
    SleepAsleep,
    SleepDeep,
    SleepLight,
    SleepRem,
    SleepAwake,
    SleepInBed,
}

impl MetricKind {
    /// Parse an upstream metric-kind tag
    pub fn parse(raw: &str) -> Option<MetricKind> {
        match raw {
            "HEART_RATE" => Some(MetricKind::HeartRate),
            "RESTING_HEART_RATE" => Some(MetricKind::RestingHeartRate),
            "STEPS" => Some(MetricKind::Steps),
            "HEART_RATE_VARIABILITY_SDNN" => Some(MetricKind::HeartRateVariability),
            "ACTIVE_ENERGY_BURNED" => Some(MetricKind::ActiveEnergy),
            "WEIGHT" => Some(MetricKind::Weight),
            "SLEEP_ASLEEP" => Some(MetricKind::SleepAsleep),
            "SLEEP_DEEP" => Some(MetricKind::SleepDeep),
            "SLEEP_LIGHT" => Some(MetricKind::SleepLight),
            "SLEEP_REM" => Some(MetricKind::SleepRem),
            "SLEEP_AWAKE" => Some(MetricKind::SleepAwake),
            "SLEEP_IN_BED" => Some(MetricKind::SleepInBed),
            _ => None,
        }
    }

    /// The upstream tag for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "HEART_RATE",
            MetricKind::RestingHeartRate => "RESTING_HEART_RATE",
            MetricKind::Steps => "STEPS",
            MetricKind::HeartRateVariability => "HEART_RATE_VARIABILITY_SDNN",
            MetricKind::ActiveEnergy => "ACTIVE_ENERGY_BURNED",
            MetricKind::Weight => "WEIGHT",
            MetricKind::SleepAsleep => "SLEEP_ASLEEP",
            MetricKind::SleepDeep => "SLEEP_DEEP",
            MetricKind::SleepLight => "SLEEP_LIGHT",
            MetricKind::SleepRem => "SLEEP_REM",
            MetricKind::SleepAwake => "SLEEP_AWAKE",
            MetricKind::SleepInBed => "SLEEP_IN_BED",
        }
    }

    /// True for the stage-level sleep kinds
    pub fn is_sleep_stage(&self) -> bool {
        matches!(
            self,
            MetricKind::SleepAsleep
                | MetricKind::SleepDeep
                | MetricKind::SleepLight
                | MetricKind::SleepRem
                | MetricKind::SleepAwake
                | MetricKind::SleepInBed
        )
    }
}

/// Translate a live telemetry message into a partial record
///
/// Returns `None` for unrecognized metric kinds and for messages that yield
/// no populated field.
pub fn from_message(msg: &TelemetryMessage) -> Option<VitalsRecord> {
    let kind = MetricKind::parse(&msg.kind)?;

    let record = VitalsRecord::new(msg.timestamp)
        .quality(VitalsQuality::Good)
        .meta("source", msg.source.as_str());
    let record = apply_metric(record, kind, msg.value);

    if record.is_empty() {
        return None;
    }
    Some(record)
}

/// Translate a historical sample into a partial record
///
/// Same field mapping and unit conversion as `from_message`, plus the
/// originating sample id in metadata so stage-level sleep samples stay
/// distinguishable downstream.
pub fn from_sample(sample: &HealthSample) -> Option<VitalsRecord> {
    let kind = MetricKind::parse(&sample.kind)?;

    let record = VitalsRecord::new(sample.timestamp)
        .quality(VitalsQuality::Good)
        .meta("source", sample.source.as_str())
        .meta("sample_id", sample.id.as_str());
    let record = apply_metric(record, kind, sample.value);

    if record.is_empty() {
        return None;
    }
    Some(record)
}

/// Populate the field implied by a metric kind, converting units
fn apply_metric(record: VitalsRecord, kind: MetricKind, value: f64) -> VitalsRecord {
    if kind.is_sleep_stage() {
        // Upstream reports sleep in minutes per stage sample
        return record
            .sleep_hours(value / MINUTES_PER_HOUR)
            .meta("sleep_stage", kind.as_str());
    }

    match kind {
        MetricKind::HeartRate => record.heart_rate(value),
        // Resting heart rate lands in the same field, tagged so consumers
        // can tell it apart from a live reading
        MetricKind::RestingHeartRate => record
            .heart_rate(value)
            .meta("metric", "resting_heart_rate"),
        MetricKind::Steps => record.steps(value.round().max(0.0) as u64),
        MetricKind::HeartRateVariability => record.hrv(value),
        MetricKind::ActiveEnergy => record.active_energy(value),
        // Upstream reports weight in kilograms
        MetricKind::Weight => record.weight_lbs(value * KG_TO_LB),
        _ => record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(kind: &str, value: f64) -> TelemetryMessage {
        TelemetryMessage {
            kind: kind.to_string(),
            value,
            timestamp: Utc::now(),
            source: "test-watch".to_string(),
        }
    }

    fn sample(kind: &str, value: f64) -> HealthSample {
        HealthSample {
            kind: kind.to_string(),
            value,
            timestamp: Utc::now(),
            source: "test-repo".to_string(),
            id: "sample-1".to_string(),
        }
    }

    #[test]
    fn test_heart_rate_message() {
        let record = from_message(&message("HEART_RATE", 72.0)).unwrap();

        assert_eq!(record.heart_rate, Some(72.0));
        assert!(record.steps.is_none());
        assert_eq!(record.metadata.get("source").map(String::as_str), Some("test-watch"));
    }

    #[test]
    fn test_unknown_kind_is_dropped() {
        assert!(from_message(&message("BLOOD_GLUCOSE", 5.4)).is_none());
        assert!(from_sample(&sample("VO2_MAX", 41.0)).is_none());
    }

    #[test]
    fn test_weight_kg_to_lb() {
        let record = from_sample(&sample("WEIGHT", 70.0)).unwrap();

        let lbs = record.weight_lbs.unwrap();
        assert!((lbs - 154.32).abs() < 0.01, "70 kg should be ~154.32 lb, got {lbs}");
    }

    #[test]
    fn test_sleep_minutes_to_hours() {
        let record = from_message(&message("SLEEP_ASLEEP", 450.0)).unwrap();
        assert_eq!(record.sleep_hours, Some(7.5));
    }

    #[test]
    fn test_sleep_stage_tagging() {
        let record = from_sample(&sample("SLEEP_DEEP", 90.0)).unwrap();

        assert_eq!(record.sleep_hours, Some(1.5));
        assert_eq!(record.metadata.get("sleep_stage").map(String::as_str), Some("SLEEP_DEEP"));
        assert_eq!(record.metadata.get("sample_id").map(String::as_str), Some("sample-1"));
    }

    #[test]
    fn test_resting_heart_rate_tagging() {
        let record = from_sample(&sample("RESTING_HEART_RATE", 54.0)).unwrap();

        assert_eq!(record.heart_rate, Some(54.0));
        assert_eq!(
            record.metadata.get("metric").map(String::as_str),
            Some("resting_heart_rate")
        );
    }

    #[test]
    fn test_steps_rounding() {
        let record = from_message(&message("STEPS", 4211.7)).unwrap();
        assert_eq!(record.steps, Some(4212));

        // Garbage negative counts clamp to zero rather than wrapping
        let record = from_message(&message("STEPS", -3.0)).unwrap();
        assert_eq!(record.steps, Some(0));
    }

    #[test]
    fn test_kind_round_trip() {
        let kinds = [
            "HEART_RATE",
            "RESTING_HEART_RATE",
            "STEPS",
            "HEART_RATE_VARIABILITY_SDNN",
            "ACTIVE_ENERGY_BURNED",
            "WEIGHT",
            "SLEEP_ASLEEP",
            "SLEEP_IN_BED",
        ];
        for raw in kinds {
            assert_eq!(MetricKind::parse(raw).map(|k| k.as_str()), Some(raw));
        }
    }
}
