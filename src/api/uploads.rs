/// Upload receiver and file server for the disk backend
///
/// Terminates the signed PUT URLs produced by the disk signer and serves
/// the stored files back. With the S3 backend clients talk to the bucket
/// directly and both endpoints refuse.
use crate::{
    context::AppContext,
    error::{MarketError, MarketResult},
    storage::content_type_for,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/uploads/*key", put(receive_upload))
        .route("/files/*key", get(get_file))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    expires: i64,
    signature: String,
}

/// PUT /uploads/*key
async fn receive_upload(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> MarketResult<StatusCode> {
    ctx.upload_signer
        .receive_upload(&key, query.expires, &query.signature, body.to_vec())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /files/*key
async fn get_file(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
) -> MarketResult<impl IntoResponse> {
    let data = ctx
        .upload_signer
        .fetch(&key)
        .await?
        .ok_or_else(|| MarketError::NotFound("File not found".to_string()))?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], data))
}
