//! S3-backed photo store.

use super::{PhotoStore, StoreError, StoreResult, public_object_url};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use bytes::Bytes;
use tracing::debug;

/// Connection settings for the photo bucket.
#[derive(Clone)]
pub struct S3Settings {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Domain appended to the bucket name in returned URLs.
    pub domain: String,
}

#[derive(Clone)]
pub struct S3PhotoStore {
    client: Client,
    bucket: String,
    domain: String,
}

impl S3PhotoStore {
    /// Build a client with static credentials for the configured region.
    pub async fn connect(settings: S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key,
            settings.secret_key,
            None,
            None,
            "student-service-static",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region))
            .credentials_provider(credentials)
            .load()
            .await;

        Self {
            client: Client::new(&shared),
            bucket: settings.bucket,
            domain: settings.domain,
        }
    }
}

#[async_trait]
impl PhotoStore for S3PhotoStore {
    async fn store(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> StoreResult<String> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .acl(ObjectCannedAcl::PublicRead)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| StoreError::ObjectStore(DisplayErrorContext(&err).to_string()))?;

        debug!(bucket = %self.bucket, key = name, size, "uploaded photo");
        Ok(public_object_url(&self.bucket, &self.domain, name))
    }
}
