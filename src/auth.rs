/// Authentication extractors
use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    db::models::{Account, Role},
    error::MarketError,
    token::TokenPurpose,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - validates the bearer access token and loads
/// the account behind it
///
/// Only access-purpose tokens pass; a refresh or flow token in the
/// Authorization header is rejected like any other invalid token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: Account,
}

impl AuthContext {
    pub fn account_id(&self) -> &str {
        &self.account.id
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or(MarketError::InvalidToken)?;

        let claims = state.codec.decode(&token, TokenPurpose::Access)?;

        let account = state
            .accounts
            .find_by_id(&claims.sub)
            .await?
            .ok_or(MarketError::InvalidToken)?;

        // A deactivated account keeps its unexpired access tokens but
        // they no longer authenticate
        if !account.is_active {
            return Err(MarketError::AccountInactive);
        }

        Ok(AuthContext { account })
    }
}

/// Admin authentication context - requires the admin role
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub account: Account,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;

        let role = auth.account.role();
        if !role.is_admin() {
            tracing::warn!(account_id = %auth.account.id, "Non-admin hit an admin endpoint");
            return Err(MarketError::Authorization("Admin role required".to_string()));
        }

        Ok(AdminAuthContext {
            account: auth.account,
            role,
        })
    }
}
