use super::{ObjectStore, PutObject, StorageError};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ChecksumAlgorithm;
use std::time::Duration;
use tracing::{debug, warn};

/// Object store backed by AWS S3 or an S3-compatible service.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS provider chain, with the region,
    /// endpoint, and addressing style overridden by `config` where set.
    pub async fn connect(config: &StorageConfig) -> Self {
        let region_provider = match &config.region {
            Some(region) => RegionProviderChain::first_try(Region::new(region.clone())),
            None => RegionProviderChain::default_provider(),
        };
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        // Required for MinIO and LocalStack.
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        let timeout = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_seconds))
            .build();
        builder = builder.timeout_config(timeout);

        Self::from_client(Client::from_conf(builder.build()))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                get_error(bucket, key, e.as_service_error(), || {
                    DisplayErrorContext(&e).to_string()
                })
            })?;

        let reported_length = response.content_length();
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Sdk(format!("failed to read object body: {e}")))?
            .into_bytes()
            .to_vec();

        // The buffer is authoritative; the header is only compared.
        if let Some(reported) = reported_length.filter(|&n| n != body.len() as i64) {
            warn!(
                bucket,
                key,
                reported,
                actual = body.len(),
                "object content length differs from fetched body"
            );
        }
        Ok(body)
    }

    async fn put(&self, object: PutObject) -> Result<(), StorageError> {
        debug!(
            bucket = %object.bucket,
            key = %object.key,
            content_length = object.content_length,
            "putting object"
        );
        self.put_request(object)
            .send()
            .await
            .map_err(|e| StorageError::Sdk(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

impl S3Store {
    /// PutObject request carrying the content type, exact length, and
    /// SHA-256 checksum of `object`.
    fn put_request(&self, object: PutObject) -> PutObjectFluentBuilder {
        let PutObject {
            bucket,
            key,
            body,
            content_type,
            content_length,
            checksum_sha256,
        } = object;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(content_length as i64)
            .checksum_algorithm(ChecksumAlgorithm::Sha256)
            .checksum_sha256(checksum_sha256)
            .body(ByteStream::from(body))
    }
}

/// `NoSuchKey` is a missing object; every other failure is a transport or
/// service error described by `detail`.
fn get_error(
    bucket: &str,
    key: &str,
    service: Option<&GetObjectError>,
    detail: impl FnOnce() -> String,
) -> StorageError {
    if service.is_some_and(|e| e.is_no_such_key()) {
        StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        StorageError::Sdk(detail())
    }
}
