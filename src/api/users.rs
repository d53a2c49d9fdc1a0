/// User profile and admin endpoints
use crate::{
    account::{
        AdminUpdateRequest, ListAccountsQuery, PublicProfile, UpdateProfileRequest, UserView,
    },
    audit::AuditLogQuery,
    auth::{AdminAuthContext, AuthContext},
    context::AppContext,
    db::models::AuditLogEntry,
    error::MarketResult,
    storage::{avatar_key, SignedUpload},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::time::Duration;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users/me", get(get_me).patch(update_me))
        .route("/users/me/avatar-upload-url", post(avatar_upload_url))
        .route("/users/profile/:id", get(get_profile))
        .route("/users", get(list_users))
        .route("/users/:id", patch(admin_update_user))
        .route("/users/audit-logs", get(list_audit_logs))
}

/// GET /users/me
async fn get_me(auth: AuthContext) -> Json<UserView> {
    Json(UserView::from(auth.account))
}

/// PATCH /users/me
async fn update_me(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<UpdateProfileRequest>,
) -> MarketResult<Json<UserView>> {
    let update = ctx.accounts.update_profile(auth.account_id(), &req).await?;
    Ok(Json(UserView::from(update.account)))
}

#[derive(Debug, Deserialize)]
struct AvatarUploadRequest {
    content_type: String,
}

/// POST /users/me/avatar-upload-url
///
/// Hands back a short-lived signed PUT URL; the avatar bytes never pass
/// through this endpoint.
async fn avatar_upload_url(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<AvatarUploadRequest>,
) -> MarketResult<Json<SignedUpload>> {
    let key = avatar_key(auth.account_id(), &req.content_type)?;
    let ttl = Duration::from_secs(ctx.config.storage.upload_url_ttl);

    let signed = ctx
        .upload_signer
        .sign_upload(&key, &req.content_type, ttl)
        .await?;

    Ok(Json(signed))
}

/// GET /users/profile/:id
///
/// Public, unauthenticated view of an account.
async fn get_profile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> MarketResult<Json<PublicProfile>> {
    let account = ctx.accounts.get_account(&id).await?;
    Ok(Json(PublicProfile::from(account)))
}

/// GET /users (admin)
async fn list_users(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Query(query): Query<ListAccountsQuery>,
) -> MarketResult<Json<Vec<UserView>>> {
    let accounts = ctx.accounts.list_accounts(&query).await?;
    Ok(Json(accounts.into_iter().map(UserView::from).collect()))
}

/// PATCH /users/:id (admin)
///
/// Every change lands in the audit log with the acting admin and a
/// summary of the supplied fields.
async fn admin_update_user(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<AdminUpdateRequest>,
) -> MarketResult<Json<UserView>> {
    let update = ctx.accounts.admin_update(&id, &req).await?;

    ctx.audit
        .record("admin_update_user", &id, &admin.account.id, update.summary)
        .await?;

    Ok(Json(UserView::from(update.account)))
}

/// GET /users/audit-logs (admin)
async fn list_audit_logs(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Query(query): Query<AuditLogQuery>,
) -> MarketResult<Json<Vec<AuditLogEntry>>> {
    let entries = ctx.audit.list(&query).await?;
    Ok(Json(entries))
}
