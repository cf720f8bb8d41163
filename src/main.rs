//! Vitalsync demo
//!
//! Runs the aggregation pipeline against a simulated wearable, printing
//! merged snapshots and status changes as they arrive.

use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitalsync::sources::PreferenceStore;
use vitalsync::{
    Config, HealthRepository, JsonFileStore, SimulatedWearable, SimulatedWearableConfig,
    TelemetrySource, VitalsService,
};

#[derive(Debug, Parser)]
#[command(name = "vitalsync", about = "Vitals stream aggregation demo")]
struct Args {
    /// Path to a TOML config file (defaults to the standard locations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use poll-only mode instead of live streaming
    #[arg(long)]
    poll_only: bool,

    /// How long to run before shutting down
    #[arg(long, default_value_t = 20)]
    run_secs: u64,

    /// User to subscribe for
    #[arg(long, default_value = "demo-user")]
    user: String,
}

/// Fixed preference flags for the demo
struct FlagPreferences {
    prefer_polling: bool,
}

#[async_trait::async_trait]
impl PreferenceStore for FlagPreferences {
    async fn get_bool(&self, key: &str) -> Option<bool> {
        (key == vitalsync::PREFER_POLLING_KEY).then_some(self.prefer_polling)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_logging(&config);
    tracing::info!("Vitalsync v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(
        JsonFileStore::open(&config.cache.path)
            .await
            .with_context(|| format!("opening snapshot store at {}", config.cache.path))?,
    );

    let wearable = Arc::new(SimulatedWearable::new(SimulatedWearableConfig::default()));
    let prefs = Arc::new(FlagPreferences {
        prefer_polling: args.poll_only,
    });

    let live_source: Arc<dyn TelemetrySource> = Arc::clone(&wearable) as Arc<dyn TelemetrySource>;
    let repository: Arc<dyn HealthRepository> = Arc::clone(&wearable) as Arc<dyn HealthRepository>;
    let service = VitalsService::new(
        live_source,
        repository,
        store,
        prefs,
        &config,
    );

    service.initialize().await;
    match service.current().await {
        Some(record) => tracing::info!(
            timestamp = %record.timestamp,
            heart_rate = ?record.heart_rate,
            "Restored snapshot from previous run"
        ),
        None => tracing::info!("No cached snapshot, starting cold"),
    }

    // Print every merged record and status change while the demo runs
    let mut updates = service.subscribe_updates();
    tokio::spawn(async move {
        while let Ok(record) = updates.recv().await {
            tracing::info!(
                heart_rate = ?record.heart_rate,
                steps = ?record.steps,
                sleep_hours = ?record.sleep_hours,
                weight_lbs = ?record.weight_lbs,
                "Vitals update"
            );
        }
    });

    let mut statuses = service.subscribe_status();
    tokio::spawn(async move {
        while let Ok(status) = statuses.recv().await {
            tracing::info!(%status, "Status");
        }
    });

    service.start_subscription(&args.user).await?;

    tokio::time::sleep(std::time::Duration::from_secs(args.run_secs)).await;

    let window = Duration::minutes(10);
    if let Some(mean) = service.mean_heart_rate(window).await {
        tracing::info!(
            mean_heart_rate = %format!("{mean:.1}"),
            stress = service.stress_indicator(window).await,
            "Session summary"
        );
    }

    service.dispose().await;
    tracing::info!("Vitalsync shutdown complete");
    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vitalsync={}", config.logging.level)),
    );

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
