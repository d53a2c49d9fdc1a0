/// Tradepost - marketplace platform backend
///
/// Accounts, purpose-tagged session tokens, email verification and
/// password reset flows, signed avatar uploads and an admin audit trail.

mod account;
mod api;
mod audit;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod mailer;
mod metrics;
mod password;
mod rate_limit;
mod server;
mod session;
mod storage;
mod token;
mod verify;

use config::ServerConfig;
use context::AppContext;
use error::MarketResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> MarketResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradepost=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ______               __                           __
 /_  __/________ _____/ /__  ____  ____  _____/ /_
  / / / ___/ __ `/ __  / _ \/ __ \/ __ \/ ___/ __/
 / / / /  / /_/ / /_/ /  __/ /_/ / /_/ (__  ) /_
/_/ /_/   \__,_/\__,_/\___/ .___/\____/____/\__/
                         /_/

        Tradepost marketplace backend v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
