/// Configuration management for the Tradepost backend
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub email: Option<EmailConfig>,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub public_url: String,
    pub cors_origins: Vec<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub uploads: UploadBackendConfig,
    /// Lifetime of signed upload URLs in seconds
    pub upload_url_ttl: u64,
}

/// Upload storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UploadBackendConfig {
    Disk {
        location: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint: Option<String>,
    },
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub email_verification_minutes: i64,
    pub password_reset_minutes: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Rate limiting configuration for guarded auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MarketResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("TRADEPOST_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("TRADEPOST_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| MarketError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("TRADEPOST_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let cors_origins = env::var("TRADEPOST_CORS_ORIGINS")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database = env::var("TRADEPOST_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/tradepost.sqlite"));

        let uploads = if let Ok(bucket) = env::var("TRADEPOST_S3_BUCKET") {
            UploadBackendConfig::S3 {
                bucket,
                region: env::var("TRADEPOST_S3_REGION")
                    .unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: env::var("TRADEPOST_S3_ACCESS_KEY_ID")
                    .map_err(|_| MarketError::Validation("S3 access key required".to_string()))?,
                secret_access_key: env::var("TRADEPOST_S3_SECRET_ACCESS_KEY")
                    .map_err(|_| MarketError::Validation("S3 secret key required".to_string()))?,
                endpoint: env::var("TRADEPOST_S3_ENDPOINT").ok(),
            }
        } else {
            UploadBackendConfig::Disk {
                location: env::var("TRADEPOST_UPLOADS_LOCATION")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./data/uploads")),
            }
        };

        let upload_url_ttl = env::var("TRADEPOST_UPLOAD_URL_TTL")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let jwt_secret = env::var("TRADEPOST_JWT_SECRET")
            .map_err(|_| MarketError::Validation("JWT secret required".to_string()))?;
        let access_token_minutes = env::var("TRADEPOST_ACCESS_TOKEN_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);
        let refresh_token_days = env::var("TRADEPOST_REFRESH_TOKEN_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);
        let email_verification_minutes = env::var("TRADEPOST_EMAIL_VERIFICATION_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);
        let password_reset_minutes = env::var("TRADEPOST_PASSWORD_RESET_MINUTES")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let email = if let Ok(smtp_url) = env::var("TRADEPOST_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("TRADEPOST_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let max_attempts = env::var("TRADEPOST_RATE_LIMIT_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let window_seconds = env::var("TRADEPOST_RATE_LIMIT_WINDOW_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                cors_origins,
            },
            storage: StorageConfig {
                database,
                uploads,
                upload_url_ttl,
            },
            auth: AuthConfig {
                jwt_secret,
                access_token_minutes,
                refresh_token_days,
                email_verification_minutes,
                password_reset_minutes,
            },
            email,
            rate_limit: RateLimitConfig {
                max_attempts,
                window_seconds,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> MarketResult<()> {
        if self.service.hostname.is_empty() {
            return Err(MarketError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(MarketError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.rate_limit.max_attempts == 0 || self.rate_limit.window_seconds == 0 {
            return Err(MarketError::Validation(
                "Rate limit attempts and window must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8080,
                public_url: "http://localhost:8080".to_string(),
                cors_origins: vec![],
            },
            storage: StorageConfig {
                database: PathBuf::from(":memory:"),
                uploads: UploadBackendConfig::Disk {
                    location: PathBuf::from("./data/uploads"),
                },
                upload_url_ttl: 300,
            },
            auth: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                access_token_minutes: 15,
                refresh_token_days: 30,
                email_verification_minutes: 60,
                password_reset_minutes: 10,
            },
            email: None,
            rate_limit: RateLimitConfig {
                max_attempts: 5,
                window_seconds: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = test_config();
        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = test_config();
        config.rate_limit.window_seconds = 0;
        assert!(config.validate().is_err());
    }
}
