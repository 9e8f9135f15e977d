//! Stockwatch watcher
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - STOCKWATCH_CONFIG: Path to the JSON config (default: config.json)
//! - RUST_LOG: Log level (default: stockwatch=info)

use stockwatch::alerts::{DiscordNotifier, LogNotifier, Notifier};
use stockwatch::config::MonitorConfig;
use stockwatch::ingest::CsvLogSource;
use stockwatch::monitor::MonitorLoop;
use stockwatch::storage::JsonCursorStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = MonitorConfig::path_from_env();
    let config = match MonitorConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_path.display(), error = %e, "Cannot start");
            return Err(e.into());
        }
    };

    tracing::info!("Stockwatch configuration:");
    tracing::info!("  Config: {}", config_path.display());
    tracing::info!("  Log: {}", config.log_path.display());
    tracing::info!("  State: {}", config.state_path.display());
    tracing::info!("  Timezone: {}", config.timezone.name());
    tracing::info!("  Poll interval: {:?}", config.poll_interval);
    tracing::info!("  Window: {} minutes", config.window.num_minutes());
    tracing::info!("  Threshold mode: {}", config.threshold_mode.as_str());
    tracing::info!("  Tracked items: {}", config.items.len());
    let mut items: Vec<_> = config.items.iter().collect();
    items.sort_by_key(|(id, _)| **id);
    for (id, rule) in items {
        tracing::info!("    - {} ({}): max {}", rule.name, id, rule.max_per_window);
    }
    tracing::info!("  Alert roles: {}", config.alert_roles.len());
    if config.evict_stale_days {
        tracing::info!("  Stale day eviction: ENABLED");
    }

    let notifier = if config.dry_run {
        tracing::info!("  Delivery: DRY RUN (alerts are only logged)");
        Notifier::Log(LogNotifier)
    } else {
        Notifier::Discord(DiscordNotifier::new(
            config.webhook_url.clone(),
            config.alert_roles.clone(),
            config.window,
            config.delivery_timeout,
        )?)
    };

    let source = CsvLogSource::new(&config.log_path, config.timezone);
    let store = JsonCursorStore::new(&config.state_path);
    let mut monitor = MonitorLoop::new(config, source, notifier, store);

    monitor.run(shutdown_signal()).await;

    tracing::info!("Stockwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
