/// S3-compatible upload backend
///
/// Supports AWS S3 and S3-compatible providers (MinIO, DigitalOcean
/// Spaces, etc.). Clients receive a presigned PUT URL and upload
/// straight to the bucket.
use crate::{
    error::{MarketError, MarketResult},
    storage::{SignedUpload, UploadSigner},
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::{sync::Arc, time::Duration};

/// S3 presigning backend
#[derive(Clone)]
pub struct S3Signer {
    client: Arc<Client>,
    bucket: String,
}

impl S3Signer {
    pub async fn new(
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint: Option<String>,
    ) -> MarketResult<Self> {
        let credentials = Credentials::new(
            &access_key_id,
            &secret_access_key,
            None,
            None,
            "tradepost",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut builder = S3ConfigBuilder::from(&aws_config);
        if let Some(endpoint) = &endpoint {
            tracing::debug!("Using custom S3 endpoint: {}", endpoint);
            // Path style is required for MinIO and some compatible services
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Arc::new(Client::from_conf(builder.build())),
            bucket,
        })
    }
}

#[async_trait]
impl UploadSigner for S3Signer {
    async fn sign_upload(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> MarketResult<SignedUpload> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| MarketError::Storage(format!("Invalid presign TTL: {}", e)))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| MarketError::Storage(format!("Failed to presign upload: {}", e)))?;

        Ok(SignedUpload {
            upload_url: presigned.uri().to_string(),
            key: key.to_string(),
            expires_in: ttl.as_secs(),
        })
    }

    async fn receive_upload(
        &self,
        _key: &str,
        _expires: i64,
        _signature: &str,
        _data: Vec<u8>,
    ) -> MarketResult<()> {
        // Clients upload to the bucket directly
        Err(MarketError::Validation(
            "Uploads are not handled by this server".to_string(),
        ))
    }

    async fn fetch(&self, _key: &str) -> MarketResult<Option<Vec<u8>>> {
        // Objects are served from the bucket, not by this server
        Ok(None)
    }
}
