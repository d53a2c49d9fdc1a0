/// Disk-based upload backend
///
/// Signs upload URLs pointing back at this server's upload receiver.
/// The signature is an HMAC-SHA256 over the object key and expiry, so a
/// signed URL cannot be replayed for a different key or after it lapses.
use crate::{
    error::{MarketError, MarketResult},
    storage::{SignedUpload, UploadSigner},
};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::{path::PathBuf, time::Duration};
use tokio::fs;

type HmacSha256 = Hmac<Sha256>;

/// Disk upload signer and receiver
#[derive(Clone)]
pub struct DiskSigner {
    base_path: PathBuf,
    public_url: String,
    secret: String,
}

impl DiskSigner {
    pub fn new(base_path: PathBuf, public_url: String, secret: String) -> Self {
        Self {
            base_path,
            public_url,
            secret,
        }
    }

    fn sign(&self, key: &str, expires: i64) -> MarketResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| MarketError::Internal(format!("HMAC setup failed: {}", e)))?;
        mac.update(key.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, key: &str, expires: i64, signature: &str) -> MarketResult<()> {
        if expires < Utc::now().timestamp() {
            return Err(MarketError::Validation("Upload URL expired".to_string()));
        }

        let raw = hex::decode(signature)
            .map_err(|_| MarketError::Validation("Invalid upload signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| MarketError::Internal(format!("HMAC setup failed: {}", e)))?;
        mac.update(key.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());

        mac.verify_slice(&raw)
            .map_err(|_| MarketError::Validation("Invalid upload signature".to_string()))
    }

    /// File path for a key, sharded by the first two characters of the
    /// final path segment
    fn object_path(&self, key: &str) -> MarketResult<PathBuf> {
        // Keys are server-generated, but the receiver is reachable with
        // arbitrary paths
        if key.split('/').any(|seg| seg == ".." || seg.is_empty()) {
            return Err(MarketError::Validation("Invalid object key".to_string()));
        }

        let name = key.rsplit('/').next().unwrap_or(key);
        let shard = if name.len() >= 2 { &name[0..2] } else { "_" };

        Ok(self.base_path.join(shard).join(key))
    }
}

#[async_trait]
impl UploadSigner for DiskSigner {
    async fn sign_upload(
        &self,
        key: &str,
        _content_type: &str,
        ttl: Duration,
    ) -> MarketResult<SignedUpload> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.sign(key, expires)?;

        Ok(SignedUpload {
            upload_url: format!(
                "{}/api/v1/uploads/{}?expires={}&signature={}",
                self.public_url, key, expires, signature
            ),
            key: key.to_string(),
            expires_in: ttl.as_secs(),
        })
    }

    async fn receive_upload(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        data: Vec<u8>,
    ) -> MarketResult<()> {
        self.verify(key, expires, signature)?;

        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MarketError::Storage(format!("Failed to create upload dir: {}", e)))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| MarketError::Storage(format!("Failed to write upload {}: {}", key, e)))?;

        tracing::debug!(%key, "Stored upload");
        Ok(())
    }

    async fn fetch(&self, key: &str) -> MarketResult<Option<Vec<u8>>> {
        let path = self.object_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MarketError::Storage(format!(
                "Failed to read object {}: {}",
                key, e
            ))),
        }
    }
}
