/// Signed token codec
///
/// Encodes and decodes the short-lived bearer credentials used across the
/// service: access and refresh tokens for sessions, and the single-purpose
/// email-verification and password-reset tokens. All tokens are HS256 JWTs
/// signed with one process-wide secret; an explicit purpose claim keeps a
/// token minted for one flow from being accepted by another.
use crate::error::{MarketError, MarketResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose tag embedded in every token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    VerifyEmail,
    ResetPassword,
}

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: account id for session tokens, email for flow tokens
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    /// Unique token id; timestamps alone have second resolution, so two
    /// tokens minted in the same second would otherwise be identical
    pub jti: String,
    pub purpose: TokenPurpose,
}

/// Stateless JWT codec
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a signed token for a subject
    pub fn issue(
        &self,
        subject: &str,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> MarketResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            exp: now + ttl.num_seconds(),
            iat: now,
            jti: Uuid::new_v4().to_string(),
            purpose,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| MarketError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Decode and verify a token, enforcing the expected purpose
    ///
    /// Signature failures, malformed tokens, expired tokens and purpose
    /// mismatches all collapse into the same InvalidToken error so the
    /// caller cannot tell which check failed.
    pub fn decode(&self, token: &str, expected: TokenPurpose) -> MarketResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is the contract; no clock-skew grace
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!("Token verification failed: {}", e);
            MarketError::InvalidToken
        })?;

        if data.claims.purpose != expected {
            tracing::warn!(
                expected = ?expected,
                got = ?data.claims.purpose,
                "Token presented to the wrong flow"
            );
            return Err(MarketError::InvalidToken);
        }

        Ok(data.claims)
    }
}
