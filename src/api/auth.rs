/// Authentication endpoints
///
/// Registration, email verification, the session lifecycle and the
/// password reset flow. The credential-guessing surfaces among these
/// are wrapped by the rate limiting middleware in the server router.
use crate::{
    account::{RegisterRequest, UserView},
    api::middleware::{client_ip, user_agent},
    auth::AuthContext,
    context::AppContext,
    error::MarketResult,
    session::TokenPair,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// POST /register
async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> MarketResult<impl IntoResponse> {
    let account = ctx.accounts.create_account(&req).await?;
    crate::metrics::REGISTRATIONS_TOTAL.inc();

    let token = ctx.verification.issue_email_verification(&account.email)?;

    // Fire and forget; registration never fails on mail trouble
    let mailer = ctx.mailer.clone();
    let public_url = ctx.config.service.public_url.clone();
    let email = account.email.clone();
    let username = account.username.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer
            .send_verification_email(&email, &username, &token, &public_url)
            .await
        {
            tracing::error!("Failed to send verification email: {}", e);
        }
    });

    Ok((StatusCode::CREATED, Json(UserView::from(account))))
}

#[derive(Debug, Deserialize)]
struct VerifyEmailRequest {
    token: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

/// POST /verify-email
async fn verify_email(
    State(ctx): State<AppContext>,
    Json(req): Json<VerifyEmailRequest>,
) -> MarketResult<Json<MessageResponse>> {
    ctx.verification
        .redeem_email_verification(&ctx.accounts, &req.token)
        .await?;

    Ok(Json(MessageResponse {
        message: "Email verified successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    /// Email address or username
    identifier: String,
    password: String,
}

/// POST /login
async fn login(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> MarketResult<Json<TokenPair>> {
    let account = ctx.accounts.find_by_identifier(&req.identifier).await?;

    let pair = ctx
        .sessions
        .login(
            account.as_ref(),
            &req.password,
            client_ip(&headers).as_deref(),
            user_agent(&headers).as_deref(),
        )
        .await?;

    Ok(Json(pair))
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

/// POST /refresh
async fn refresh(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshRequest>,
) -> MarketResult<Json<TokenPair>> {
    let pair = ctx.sessions.refresh(&req.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /logout
async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<RefreshRequest>,
) -> MarketResult<Json<MessageResponse>> {
    ctx.sessions
        .logout(&req.refresh_token, auth.account_id())
        .await?;

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

/// POST /forgot-password
///
/// Responds identically whether or not the email matches an account, so
/// this endpoint cannot be used to enumerate addresses. The reset token
/// only ever leaves through email.
async fn forgot_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ForgotPasswordRequest>,
) -> MarketResult<Json<MessageResponse>> {
    if let Some(account) = ctx.accounts.find_by_email(&req.email).await? {
        let token = ctx.verification.issue_password_reset(&account.email)?;

        let mailer = ctx.mailer.clone();
        let public_url = ctx.config.service.public_url.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_password_reset_email(&account.email, &account.username, &token, &public_url)
                .await
            {
                tracing::error!("Failed to send password reset email: {}", e);
            }
        });
    } else {
        tracing::debug!("Password reset requested for unknown email");
    }

    Ok(Json(MessageResponse {
        message: "If the email exists, a password reset link has been sent".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct ResetPasswordRequest {
    token: String,
    new_password: String,
}

/// POST /reset-password
async fn reset_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ResetPasswordRequest>,
) -> MarketResult<Json<MessageResponse>> {
    ctx.verification
        .redeem_password_reset(&ctx.accounts, &ctx.sessions, &req.token, &req.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}
