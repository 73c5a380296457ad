//! S3 and CloudFront implementations of the core store and CDN contracts.
//!
//! Credentials and region come from the standard AWS environment through
//! `aws-config`. The bucket is named after the domain being deployed.

use async_trait::async_trait;
use aws_sdk_cloudfront::error::ProvideErrorMetadata;
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;
use website_deployer_core::contract::{
    Cdn, CdnError, Distribution, InvalidationStatus, ObjectStore, PutObject, RemoteObject,
    StoreError,
};

/// Load the shared AWS config once for both clients.
pub async fn load_sdk_config() -> aws_config::SdkConfig {
    aws_config::load_from_env().await
}

/// The site's bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    pub fn new(sdk_config: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self) -> Result<Vec<RemoteObject>, StoreError> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                // Listings carry no object metadata; unknown metadata is not compared.
                objects.push(RemoteObject {
                    key: key.to_string(),
                    etag: object.e_tag().unwrap_or_default().to_string(),
                    content_type: None,
                    cache_control: None,
                });
            }
        }
        debug!(bucket = %self.bucket, count = objects.len(), "Listed bucket");
        Ok(objects)
    }

    async fn redirect_location(&self, key: &str) -> Result<Option<String>, StoreError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(head.website_redirect_location().map(str::to_string))
    }

    async fn put_object(&self, request: PutObject) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(request.key)
            .body(ByteStream::from(request.body))
            .content_type(request.content_type)
            .cache_control(request.cache_control)
            .set_website_redirect_location(request.redirect_location)
            .send()
            .await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CloudFrontCdn {
    client: aws_sdk_cloudfront::Client,
}

impl CloudFrontCdn {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudfront::Client::new(sdk_config),
        }
    }
}

/// Map a CloudFront failure onto the classes the retry policy understands.
fn classify<E>(err: E) -> CdnError
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    match err.code() {
        Some("ServiceUnavailable") | Some("Throttling") => CdnError::ServiceUnavailable(message),
        Some("InvalidArgument") => CdnError::InvalidArgument(message),
        _ => CdnError::Other(message),
    }
}

#[async_trait]
impl Cdn for CloudFrontCdn {
    async fn list_distributions(&self) -> Result<Vec<Distribution>, CdnError> {
        let mut distributions = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(classify)?;
            let Some(list) = output.distribution_list() else { break };
            for summary in list.items() {
                distributions.push(Distribution {
                    id: summary.id().to_string(),
                    aliases: summary
                        .aliases()
                        .map(|aliases| aliases.items().to_vec())
                        .unwrap_or_default(),
                });
            }
            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        debug!(count = distributions.len(), "Listed distributions");
        Ok(distributions)
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<String, CdnError> {
        let quantity = i32::try_from(paths.len())
            .map_err(|_| CdnError::InvalidArgument(format!("too many paths: {}", paths.len())))?;
        let paths = Paths::builder()
            .quantity(quantity)
            .set_items(Some(paths.to_vec()))
            .build()
            .map_err(|e| CdnError::Other(e.to_string()))?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(caller_reference)
            .build()
            .map_err(|e| CdnError::Other(e.to_string()))?;

        let output = self
            .client
            .create_invalidation()
            .distribution_id(distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(classify)?;
        output
            .invalidation()
            .map(|invalidation| invalidation.id().to_string())
            .ok_or_else(|| CdnError::Other("invalidation response without an id".to_string()))
    }

    async fn invalidation_status(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<InvalidationStatus, CdnError> {
        let output = self
            .client
            .get_invalidation()
            .distribution_id(distribution_id)
            .id(invalidation_id)
            .send()
            .await
            .map_err(classify)?;
        output
            .invalidation()
            .map(|invalidation| InvalidationStatus::from(invalidation.status()))
            .ok_or_else(|| CdnError::Other("invalidation response without a status".to_string()))
    }
}
