use anyhow::Result;
use std::path::Path;

use tourhub_engine::config::EngineConfig;
use tourhub_engine::module::scheduled::ScheduledTaskManager;
use tourhub_engine::service::PackageService;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        EngineConfig::from_file(&config_path)?
    } else {
        let config = EngineConfig::default();
        config.validate()?;
        config
    };

    // Initialize logging
    let _logging_guard = tourhub_engine::logging::init_logging(&config.logging, "tourhub-engine")?;

    tracing::info!("TourHub engine starting...");
    if config_found {
        tracing::info!("Loaded configuration from {}", config_path);
    } else {
        tracing::warn!("Config file {} not found, running with defaults", config_path);
    }
    tracing::info!("Provider endpoint: {}", config.provider.base_url);

    let service = PackageService::from_config(&config)?;

    // Warm-up runs inside the refresh task so startup is not blocked on the provider
    let mut task_manager = ScheduledTaskManager::new(config.scheduler.clone(), service.catalog());
    task_manager.start_all();
    tracing::info!("All scheduled tasks started successfully");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    task_manager.shutdown().await;

    let stats = service.get_stats().await;
    tracing::info!(
        "Final stats: hit rate {:.1}%, {} provider calls, {} refresh runs",
        stats.cache_hit_rate * 100.0,
        stats.remote_calls,
        stats.refresh_runs
    );

    Ok(())
}
