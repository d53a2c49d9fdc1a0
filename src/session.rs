/// Session lifecycle management
///
/// Owns login, refresh rotation, logout and bulk revocation. Access
/// tokens are stateless and expire on their own; refresh tokens are
/// backed by database rows so they can be rotated and revoked. The
/// blacklisted flag on a row is monotonic, which is what makes a stolen
/// old token useless after rotation.
use crate::{
    config::AuthConfig,
    db::models::{Account, RefreshTokenRecord},
    error::{MarketError, MarketResult},
    password,
    token::{TokenCodec, TokenPurpose},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Token pair returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Session manager service
pub struct SessionManager {
    db: SqlitePool,
    codec: Arc<TokenCodec>,
    auth: AuthConfig,
}

impl SessionManager {
    pub fn new(db: SqlitePool, codec: Arc<TokenCodec>, auth: AuthConfig) -> Self {
        Self { db, codec, auth }
    }

    /// Authenticate credentials and open a session
    ///
    /// The same error comes back whether the account is missing or the
    /// password is wrong, so login failures never confirm that an
    /// identifier exists. Inactive accounts are the one distinguishable
    /// case, and only after the password verified.
    pub async fn login(
        &self,
        account: Option<&Account>,
        plaintext: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> MarketResult<TokenPair> {
        let account = match account {
            Some(account) => account,
            None => {
                crate::metrics::LOGINS_TOTAL.with_label_values(&["failure"]).inc();
                return Err(MarketError::Authentication);
            }
        };

        if !password::verify(plaintext, &account.password_hash) {
            crate::metrics::LOGINS_TOTAL.with_label_values(&["failure"]).inc();
            return Err(MarketError::Authentication);
        }

        if !account.is_active {
            crate::metrics::LOGINS_TOTAL.with_label_values(&["inactive"]).inc();
            return Err(MarketError::AccountInactive);
        }

        self.record_login(&account.id, ip_address, user_agent).await?;

        let pair = self.mint_pair(&account.id).await?;
        crate::metrics::LOGINS_TOTAL.with_label_values(&["success"]).inc();
        tracing::info!(account_id = %account.id, "Session opened");

        Ok(pair)
    }

    /// Rotate a refresh token
    ///
    /// The presented token must decode as a refresh token and match a
    /// live row. The old row is blacklisted before the new pair is
    /// minted, so presenting the same token twice fails the second time.
    pub async fn refresh(&self, refresh_token: &str) -> MarketResult<TokenPair> {
        let claims = self.codec.decode(refresh_token, TokenPurpose::Refresh)?;

        let blacklisted = sqlx::query(
            "UPDATE refresh_token SET blacklisted = TRUE
             WHERE token = ?1 AND blacklisted = FALSE",
        )
        .bind(refresh_token)
        .execute(&self.db)
        .await?;

        if blacklisted.rows_affected() == 0 {
            tracing::warn!(account_id = %claims.sub, "Refresh with unknown or spent token");
            return Err(MarketError::TokenNotFound);
        }

        let pair = self.mint_pair(&claims.sub).await?;
        crate::metrics::TOKEN_ROTATIONS_TOTAL.inc();

        Ok(pair)
    }

    /// Close one session by blacklisting its refresh token
    ///
    /// The row must belong to the calling account; an account cannot
    /// revoke another account's session.
    pub async fn logout(&self, refresh_token: &str, account_id: &str) -> MarketResult<()> {
        let result = sqlx::query(
            "UPDATE refresh_token SET blacklisted = TRUE
             WHERE token = ?1 AND account_id = ?2 AND blacklisted = FALSE",
        )
        .bind(refresh_token)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::TokenNotFound);
        }

        tracing::info!(%account_id, "Session closed");
        Ok(())
    }

    /// Blacklist every live refresh token an account holds
    ///
    /// Used after a password reset; returns the number of sessions
    /// revoked.
    pub async fn revoke_all(&self, account_id: &str) -> MarketResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_token SET blacklisted = TRUE
             WHERE account_id = ?1 AND blacklisted = FALSE",
        )
        .bind(account_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete refresh rows past their expiry; called by the GC job
    pub async fn cleanup_expired(&self) -> MarketResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_token WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn find_refresh_record(
        &self,
        refresh_token: &str,
    ) -> MarketResult<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT * FROM refresh_token WHERE token = ?1",
        )
        .bind(refresh_token)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    /// Mint an access/refresh pair and persist the refresh row
    async fn mint_pair(&self, account_id: &str) -> MarketResult<TokenPair> {
        let access_token = self.codec.issue(
            account_id,
            TokenPurpose::Access,
            Duration::minutes(self.auth.access_token_minutes),
        )?;

        let refresh_ttl = Duration::days(self.auth.refresh_token_days);
        let refresh_token =
            self.codec
                .issue(account_id, TokenPurpose::Refresh, refresh_ttl)?;

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO refresh_token (id, token, account_id, created_at, expires_at, blacklisted)
             VALUES (?1, ?2, ?3, ?4, ?5, FALSE)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&refresh_token)
        .bind(account_id)
        .bind(now)
        .bind(now + refresh_ttl)
        .execute(&self.db)
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        })
    }

    async fn record_login(
        &self,
        account_id: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> MarketResult<()> {
        sqlx::query(
            "INSERT INTO login_history (id, account_id, ip_address, user_agent, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(account_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::{AccountManager, RegisterRequest},
        db::test_pool,
    };

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-test-secret-test-secret".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 30,
            email_verification_minutes: 60,
            password_reset_minutes: 10,
        }
    }

    async fn setup() -> (SessionManager, AccountManager, Account) {
        let db = test_pool().await;
        let accounts = AccountManager::new(db.clone());
        let account = accounts
            .create_account(&RegisterRequest {
                email: "alice@x.com".to_string(),
                username: "alice".to_string(),
                full_name: "Alice".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        accounts.mark_verified_and_active("alice@x.com").await.unwrap();
        let account = accounts.get_account(&account.id).await.unwrap();

        let config = auth_config();
        let codec = Arc::new(TokenCodec::new(&config.jwt_secret));
        let sessions = SessionManager::new(db, codec, config);
        (sessions, accounts, account)
    }

    #[tokio::test]
    async fn test_login_returns_bearer_pair_with_refresh_row() {
        let (sessions, _, account) = setup().await;

        let pair = sessions
            .login(Some(&account), "password123", Some("1.2.3.4"), None)
            .await
            .unwrap();

        assert_eq!(pair.token_type, "bearer");
        let record = sessions
            .find_refresh_record(&pair.refresh_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.account_id, account.id);
        assert!(!record.blacklisted);
    }

    #[tokio::test]
    async fn test_rapid_logins_mint_distinct_tokens() {
        let (sessions, _, account) = setup().await;

        // Both logins land within the same second; each must still get
        // its own refresh row
        let a = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();
        let b = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();

        assert_ne!(a.refresh_token, b.refresh_token);
        assert_ne!(a.access_token, b.access_token);
        assert!(sessions
            .find_refresh_record(&a.refresh_token)
            .await
            .unwrap()
            .is_some());
        assert!(sessions
            .find_refresh_record(&b.refresh_token)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (sessions, _, account) = setup().await;

        let missing = sessions.login(None, "password123", None, None).await.unwrap_err();
        let wrong = sessions
            .login(Some(&account), "wrongpassword", None, None)
            .await
            .unwrap_err();

        assert!(matches!(missing, MarketError::Authentication));
        assert!(matches!(wrong, MarketError::Authentication));
    }

    #[tokio::test]
    async fn test_inactive_account_rejected_only_after_password_check() {
        let (sessions, accounts, account) = setup().await;
        accounts
            .admin_update(
                &account.id,
                &crate::account::AdminUpdateRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let account = accounts.get_account(&account.id).await.unwrap();

        // Wrong password against an inactive account still looks like
        // plain bad credentials
        assert!(matches!(
            sessions
                .login(Some(&account), "wrongpassword", None, None)
                .await
                .unwrap_err(),
            MarketError::Authentication
        ));
        assert!(matches!(
            sessions
                .login(Some(&account), "password123", None, None)
                .await
                .unwrap_err(),
            MarketError::AccountInactive
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_spends_old_token() {
        let (sessions, _, account) = setup().await;
        let pair = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();

        let rotated = sessions.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        // The spent token cannot rotate again
        assert!(matches!(
            sessions.refresh(&pair.refresh_token).await.unwrap_err(),
            MarketError::TokenNotFound
        ));

        // The new one can
        sessions.refresh(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (sessions, _, account) = setup().await;
        let pair = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();

        assert!(matches!(
            sessions.refresh(&pair.access_token).await.unwrap_err(),
            MarketError::InvalidToken
        ));
    }

    #[tokio::test]
    async fn test_logout_requires_matching_owner() {
        let (sessions, _, account) = setup().await;
        let pair = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();

        assert!(matches!(
            sessions
                .logout(&pair.refresh_token, "someone-else")
                .await
                .unwrap_err(),
            MarketError::TokenNotFound
        ));

        sessions.logout(&pair.refresh_token, &account.id).await.unwrap();

        // Already blacklisted
        assert!(matches!(
            sessions
                .logout(&pair.refresh_token, &account.id)
                .await
                .unwrap_err(),
            MarketError::TokenNotFound
        ));
    }

    #[tokio::test]
    async fn test_revoke_all_kills_every_session() {
        let (sessions, _, account) = setup().await;
        let a = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();
        let b = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();

        assert_eq!(sessions.revoke_all(&account.id).await.unwrap(), 2);

        assert!(sessions.refresh(&a.refresh_token).await.is_err());
        assert!(sessions.refresh(&b.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_expired_leaves_live_rows() {
        let (sessions, _, account) = setup().await;
        sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();

        assert_eq!(sessions.cleanup_expired().await.unwrap(), 0);
    }
}
