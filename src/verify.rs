/// Email verification and password reset flows
///
/// Both flows ride on single-purpose signed tokens whose subject is the
/// account email. The tokens themselves stay valid until expiry; replay
/// protection comes from the database effect being single-shot, not from
/// consuming the token.
use crate::{
    account::AccountManager,
    config::AuthConfig,
    error::{MarketError, MarketResult},
    password,
    session::SessionManager,
    token::{TokenCodec, TokenPurpose},
};
use chrono::Duration;
use std::sync::Arc;

/// Verification and reset flow manager
pub struct VerificationManager {
    codec: Arc<TokenCodec>,
    auth: AuthConfig,
}

impl VerificationManager {
    pub fn new(codec: Arc<TokenCodec>, auth: AuthConfig) -> Self {
        Self { codec, auth }
    }

    /// Mint an email verification token for an address
    pub fn issue_email_verification(&self, email: &str) -> MarketResult<String> {
        self.codec.issue(
            email,
            TokenPurpose::VerifyEmail,
            Duration::minutes(self.auth.email_verification_minutes),
        )
    }

    /// Redeem an email verification token
    ///
    /// Activates and verifies the account in one update. A second
    /// redemption of the same token matches no rows and fails, so a
    /// valid token cannot be replayed to any observable effect.
    pub async fn redeem_email_verification(
        &self,
        accounts: &AccountManager,
        token: &str,
    ) -> MarketResult<String> {
        let claims = self.codec.decode(token, TokenPurpose::VerifyEmail)?;

        let changed = accounts.mark_verified_and_active(&claims.sub).await?;
        if changed == 0 {
            return Err(MarketError::NotFound(
                "User not found or already verified".to_string(),
            ));
        }

        tracing::info!(email = %claims.sub, "Email verified");
        Ok(claims.sub)
    }

    /// Mint a password reset token for an address
    pub fn issue_password_reset(&self, email: &str) -> MarketResult<String> {
        self.codec.issue(
            email,
            TokenPurpose::ResetPassword,
            Duration::minutes(self.auth.password_reset_minutes),
        )
    }

    /// Redeem a password reset token and set a new password
    ///
    /// Every live session is revoked afterwards, keyed on the account id
    /// resolved from the token subject, so a stolen refresh token stops
    /// working the moment the owner resets their password.
    pub async fn redeem_password_reset(
        &self,
        accounts: &AccountManager,
        sessions: &SessionManager,
        token: &str,
        new_password: &str,
    ) -> MarketResult<()> {
        let claims = self.codec.decode(token, TokenPurpose::ResetPassword)?;

        if new_password.len() < 8 {
            return Err(MarketError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let account = accounts
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(|| MarketError::NotFound("User not found".to_string()))?;

        let password_hash = password::hash(new_password)?;
        accounts.set_password_hash(&account.id, &password_hash).await?;

        let revoked = sessions.revoke_all(&account.id).await?;
        tracing::info!(account_id = %account.id, revoked, "Password reset, sessions revoked");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::RegisterRequest,
        db::test_pool,
    };
    use sqlx::SqlitePool;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-test-secret-test-secret".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 30,
            email_verification_minutes: 60,
            password_reset_minutes: 10,
        }
    }

    async fn setup() -> (VerificationManager, AccountManager, SessionManager, SqlitePool) {
        let db = test_pool().await;
        let config = auth_config();
        let codec = Arc::new(TokenCodec::new(&config.jwt_secret));
        let accounts = AccountManager::new(db.clone());
        let sessions = SessionManager::new(db.clone(), Arc::clone(&codec), config.clone());
        let flows = VerificationManager::new(codec, config);
        (flows, accounts, sessions, db)
    }

    async fn register(accounts: &AccountManager, email: &str) {
        accounts
            .create_account(&RegisterRequest {
                email: email.to_string(),
                username: "alice".to_string(),
                full_name: "Alice".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_email_verification_activates_account() {
        let (flows, accounts, _, _) = setup().await;
        register(&accounts, "alice@x.com").await;

        let token = flows.issue_email_verification("alice@x.com").unwrap();
        let email = flows
            .redeem_email_verification(&accounts, &token)
            .await
            .unwrap();
        assert_eq!(email, "alice@x.com");

        let account = accounts.find_by_email("alice@x.com").await.unwrap().unwrap();
        assert!(account.is_active);
        assert!(account.is_verified);
    }

    #[tokio::test]
    async fn test_verification_replay_fails() {
        let (flows, accounts, _, _) = setup().await;
        register(&accounts, "alice@x.com").await;

        let token = flows.issue_email_verification("alice@x.com").unwrap();
        flows.redeem_email_verification(&accounts, &token).await.unwrap();

        assert!(matches!(
            flows
                .redeem_email_verification(&accounts, &token)
                .await
                .unwrap_err(),
            MarketError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_verification_for_unknown_email_fails() {
        let (flows, accounts, _, _) = setup().await;

        let token = flows.issue_email_verification("ghost@x.com").unwrap();
        assert!(flows
            .redeem_email_verification(&accounts, &token)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_reset_token_is_not_a_verification_token() {
        let (flows, accounts, _, _) = setup().await;
        register(&accounts, "alice@x.com").await;

        let token = flows.issue_password_reset("alice@x.com").unwrap();
        assert!(matches!(
            flows
                .redeem_email_verification(&accounts, &token)
                .await
                .unwrap_err(),
            MarketError::InvalidToken
        ));
    }

    #[tokio::test]
    async fn test_password_reset_changes_password_and_revokes_sessions() {
        let (flows, accounts, sessions, _) = setup().await;
        register(&accounts, "alice@x.com").await;
        accounts.mark_verified_and_active("alice@x.com").await.unwrap();
        let account = accounts.find_by_email("alice@x.com").await.unwrap().unwrap();

        let a = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();
        let b = sessions
            .login(Some(&account), "password123", None, None)
            .await
            .unwrap();

        let token = flows.issue_password_reset("alice@x.com").unwrap();
        flows
            .redeem_password_reset(&accounts, &sessions, &token, "newpassword1")
            .await
            .unwrap();

        // Old password gone, new one works
        let account = accounts.find_by_email("alice@x.com").await.unwrap().unwrap();
        assert!(!crate::password::verify("password123", &account.password_hash));
        assert!(crate::password::verify("newpassword1", &account.password_hash));

        // Both pre-reset sessions are dead
        assert!(sessions.refresh(&a.refresh_token).await.is_err());
        assert!(sessions.refresh(&b.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_rejects_weak_password() {
        let (flows, accounts, sessions, _) = setup().await;
        register(&accounts, "alice@x.com").await;

        let token = flows.issue_password_reset("alice@x.com").unwrap();
        assert!(matches!(
            flows
                .redeem_password_reset(&accounts, &sessions, &token, "short")
                .await
                .unwrap_err(),
            MarketError::Validation(_)
        ));
    }
}
