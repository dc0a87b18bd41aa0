use async_trait::async_trait;
use aws_sdk_s3::{Client, config::Region, config::Credentials, config::BehaviorVersion};
use aws_sdk_s3::config::Builder;
use tracing::info;

use crate::common::error::{DispatchError, DispatchResult};
use crate::modules::dispatch::ports::ArtifactStore;
use crate::modules::jobs::model::SourceRef;

/// Client for the upload store. Sources may live in any bucket the
/// notifications name, so the bucket comes with each call.
#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
}

impl StorageService {
    pub async fn new(
        region: &str,
        endpoint: Option<&str>,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials);

        if let Some(endpoint) = endpoint {
            // S3-compatible stores (MinIO) need path-style addressing.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!("✅ S3 client ready");

        Self { client }
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), aws_sdk_s3::Error> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;

        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for StorageService {
    async fn delete(&self, source: &SourceRef) -> DispatchResult<()> {
        self.delete_object(&source.bucket, &source.key)
            .await
            .map_err(|e| DispatchError::storage(format!("delete {} failed: {}", source, e)))
    }
}
