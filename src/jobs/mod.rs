use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_refresh_token_job(Arc::clone(&self)));
        tokio::spawn(Self::rate_limit_prune_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Delete expired refresh token rows (runs every hour)
    async fn expired_refresh_token_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            info!("Running expired refresh token cleanup");

            match tasks::cleanup_expired_refresh_tokens(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired refresh tokens", count);
                    }
                }
                Err(e) => error!("Failed to cleanup expired refresh tokens: {}", e),
            }
        }
    }

    /// Drop stale rate limit windows (runs every 15 minutes)
    async fn rate_limit_prune_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(900));

        loop {
            interval.tick().await;

            let pruned = tasks::prune_rate_limit_windows(&scheduler.context);
            if pruned > 0 {
                info!("Pruned {} stale rate limit windows", pruned);
            }
        }
    }

    /// Periodic health check (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}
