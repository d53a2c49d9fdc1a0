/// Application context and dependency injection
use crate::{
    account::AccountManager,
    audit::AuditLog,
    config::{ServerConfig, UploadBackendConfig},
    db,
    error::{MarketError, MarketResult},
    mailer::Mailer,
    rate_limit::RateLimiter,
    session::SessionManager,
    storage::{self, UploadSigner},
    token::TokenCodec,
    verify::VerificationManager,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub codec: Arc<TokenCodec>,
    pub accounts: Arc<AccountManager>,
    pub sessions: Arc<SessionManager>,
    pub verification: Arc<VerificationManager>,
    pub audit: Arc<AuditLog>,
    pub rate_limiter: Arc<RateLimiter>,
    pub mailer: Arc<Mailer>,
    pub upload_signer: Arc<dyn UploadSigner>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> MarketResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let codec = Arc::new(TokenCodec::new(&config.auth.jwt_secret));
        let accounts = Arc::new(AccountManager::new(db.clone()));
        let sessions = Arc::new(SessionManager::new(
            db.clone(),
            Arc::clone(&codec),
            config.auth.clone(),
        ));
        let verification = Arc::new(VerificationManager::new(
            Arc::clone(&codec),
            config.auth.clone(),
        ));
        let audit = Arc::new(AuditLog::new(db.clone()));

        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.max_attempts,
            Duration::from_secs(config.rate_limit.window_seconds),
        ));

        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        let upload_signer = storage::create_signer(
            &config.storage.uploads,
            &config.service.public_url,
            &config.auth.jwt_secret,
        )
        .await?;

        Ok(Self {
            config: Arc::new(config),
            db,
            codec,
            accounts,
            sessions,
            verification,
            audit,
            rate_limiter,
            mailer,
            upload_signer,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> MarketResult<()> {
        if let Some(parent) = config.storage.database.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    MarketError::Internal(format!("Failed to create directory {:?}: {}", parent, e))
                })?;
            }
        }

        if let UploadBackendConfig::Disk { location } = &config.storage.uploads {
            tokio::fs::create_dir_all(location).await?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
