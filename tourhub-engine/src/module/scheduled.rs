//! Scheduled task manager - periodic catalog maintenance
//!
//! - Full catalog refresh (every `refresh_interval_minutes`, aligned to the clock)
//! - Expired cache entry purge (every few minutes)

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::catalog::CatalogManager;
use crate::config::SchedulerConfig;

const REFRESH_TIMEOUT_SECONDS: u64 = 300;
const PURGE_INTERVAL_MINUTES: u64 = 5;

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: SchedulerConfig,
    catalog: Arc<CatalogManager>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    pub fn new(config: SchedulerConfig, catalog: Arc<CatalogManager>) -> Self {
        Self {
            config,
            catalog,
            task_handles: Vec::new(),
        }
    }

    /// Start all scheduled tasks
    pub fn start_all(&mut self) {
        tracing::info!("Starting scheduled task manager...");

        let refresh_handle = self.start_refresh_task();
        self.task_handles.push(refresh_handle);

        let purge_handle = self.start_purge_task();
        self.task_handles.push(purge_handle);

        tracing::info!(
            "Started {} scheduled tasks (catalog refresh every {} min, cache purge every {} min)",
            self.task_handles.len(),
            self.config.refresh_interval_minutes,
            PURGE_INTERVAL_MINUTES
        );
    }

    fn start_refresh_task(&self) -> JoinHandle<()> {
        let catalog = Arc::clone(&self.catalog);
        let interval_minutes = self.config.refresh_interval_minutes.max(1);
        let warm_up = self.config.warm_up_on_start;

        tracing::info!(
            "Scheduling catalog refresh task (interval: {} minutes, warm-up: {})",
            interval_minutes,
            warm_up
        );

        tokio::spawn(async move {
            if warm_up {
                catalog.warm_up().await;
            }
            Self::refresh_loop(catalog, interval_minutes).await;
        })
    }

    async fn refresh_loop(catalog: Arc<CatalogManager>, interval_minutes: u64) {
        loop {
            let now = Utc::now();
            let next_trigger = Self::calculate_next_trigger(now, interval_minutes);
            let sleep_duration = (next_trigger - now)
                .to_std()
                .unwrap_or(Duration::from_secs(60));

            tracing::info!(
                "Next catalog refresh at: {} (in {:.1} min)",
                next_trigger.format("%Y-%m-%d %H:%M:%S UTC"),
                sleep_duration.as_secs_f64() / 60.0
            );

            tokio::time::sleep(sleep_duration).await;
            Self::run_refresh(&catalog).await;
        }
    }

    async fn run_refresh(catalog: &Arc<CatalogManager>) {
        let timeout_duration = Duration::from_secs(REFRESH_TIMEOUT_SECONDS);

        match tokio::time::timeout(timeout_duration, catalog.refresh_all()).await {
            Ok(report) => {
                tracing::info!(
                    "Scheduled refresh {}: {} packages, {} featured, source {}, {:.2}s",
                    report.run_id,
                    report.packages_refreshed,
                    report.featured_count,
                    report.source,
                    report.duration_seconds
                );
            }
            Err(_) => {
                tracing::error!(
                    "Scheduled catalog refresh timed out after {} seconds",
                    timeout_duration.as_secs()
                );
            }
        }
    }

    fn start_purge_task(&self) -> JoinHandle<()> {
        let catalog = Arc::clone(&self.catalog);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(PURGE_INTERVAL_MINUTES * 60));
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let purged = catalog.purge_expired().await;
                if purged > 0 {
                    tracing::info!("Cache purge removed {} expired entries", purged);
                } else {
                    tracing::debug!("Cache purge: nothing expired");
                }
            }
        })
    }

    /// Next multiple of `interval_minutes` counted from midnight UTC
    fn calculate_next_trigger(now: DateTime<Utc>, interval_minutes: u64) -> DateTime<Utc> {
        let interval = i64::try_from(interval_minutes.max(1)).unwrap_or(i64::MAX).min(24 * 60);
        let minute_of_day = i64::from(now.hour()) * 60 + i64::from(now.minute());
        let next_slot = (minute_of_day / interval + 1) * interval;

        let midnight = now
            .with_hour(0)
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);

        if next_slot >= 24 * 60 {
            midnight + TimeDelta::days(1)
        } else {
            midnight + TimeDelta::minutes(next_slot)
        }
    }

    /// Gracefully shutdown all tasks
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}
