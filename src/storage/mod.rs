/// Upload storage backends
///
/// Avatar uploads never stream through the API handlers. The server
/// hands out a short-lived signed PUT URL and the client uploads
/// directly: to this server's upload receiver for the disk backend, or
/// straight to the bucket for the S3 backend.
use crate::{
    config::UploadBackendConfig,
    error::{MarketError, MarketResult},
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};

mod disk;
mod s3;

pub use disk::DiskSigner;
pub use s3::S3Signer;

/// Signed upload URL handed back to the client
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SignedUpload {
    pub upload_url: String,
    /// Object key the upload lands under, stored as the avatar URL path
    pub key: String,
    pub expires_in: u64,
}

/// Upload URL signer
#[async_trait]
pub trait UploadSigner: Send + Sync {
    /// Produce a signed PUT URL for an object key
    async fn sign_upload(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> MarketResult<SignedUpload>;

    /// Accept an upload against a previously signed URL
    ///
    /// Only the disk backend handles uploads itself; the S3 backend
    /// rejects this since clients talk to the bucket directly.
    async fn receive_upload(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        data: Vec<u8>,
    ) -> MarketResult<()>;

    /// Read a stored object back
    ///
    /// Returns None when the key does not exist. The S3 backend always
    /// returns None; its objects are served from the bucket.
    async fn fetch(&self, key: &str) -> MarketResult<Option<Vec<u8>>>;
}

/// Content type for a stored object, from its extension
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Build the configured signer backend
pub async fn create_signer(
    config: &UploadBackendConfig,
    public_url: &str,
    secret: &str,
) -> MarketResult<Arc<dyn UploadSigner>> {
    match config {
        UploadBackendConfig::Disk { location } => {
            tracing::info!("Using disk upload backend at {}", location.display());
            Ok(Arc::new(DiskSigner::new(
                location.clone(),
                public_url.to_string(),
                secret.to_string(),
            )))
        }
        UploadBackendConfig::S3 {
            bucket,
            region,
            access_key_id,
            secret_access_key,
            endpoint,
        } => {
            tracing::info!("Using S3 upload backend (bucket: {}, region: {})", bucket, region);
            let signer = S3Signer::new(
                bucket.clone(),
                region.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                endpoint.clone(),
            )
            .await?;
            Ok(Arc::new(signer))
        }
    }
}

/// Build the object key for an account's avatar
pub fn avatar_key(account_id: &str, content_type: &str) -> MarketResult<String> {
    let extension = match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => {
            return Err(MarketError::Validation(
                "Unsupported avatar content type".to_string(),
            ))
        }
    };

    Ok(format!("avatars/{}.{}", account_id, extension))
}
