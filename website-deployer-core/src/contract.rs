//! # contract: interfaces between the pipeline and the outside world
//!
//! This module defines the traits the deploy pipeline is written against and the
//! plain data types that cross them:
//!
//! - [`SiteBuilder`]: produces the static site on local disk (render + crawl).
//! - [`ObjectStore`]: the bucket the site is published to.
//! - [`Cdn`]: the cache in front of the bucket.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, so tests (and downstream crates with the
//!   default `test-export-mocks` feature) get `MockSiteBuilder`, `MockObjectStore` and
//!   `MockCdn` for deterministic pipeline tests without a cloud account.
//!
//! ## Implementations
//! - [`crate::render::DefaultSiteBuilder`] drives a local server and the mirroring tool.
//! - The CLI crate implements [`ObjectStore`] for S3 and [`Cdn`] for CloudFront.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::error::DeployError;

/// Boxed error returned by object store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Output of a successful render: the root of the static file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSite {
    pub root: PathBuf,
}

/// Trait for producing the static site on local disk.
/// Allows plugging in the real render/crawl pipeline or a mock.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SiteBuilder: Send + Sync {
    /// Render and crawl the site, returning where the files ended up.
    async fn build(&self) -> Result<RenderedSite, DeployError>;
}

/// An object as reported by the store's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Object key, the site-relative path without a leading slash.
    pub key: String,
    /// Content fingerprint as stored, usually a quoted MD5 hex string.
    pub etag: String,
    /// Stored metadata; `None` when the store's listing does not report it.
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

impl RemoteObject {
    /// The ETag without surrounding quotes.
    pub fn unquoted_etag(&self) -> &str {
        self.etag.trim_matches('"')
    }
}

/// A full write of one object. Redirect objects carry an empty body.
#[derive(Clone, PartialEq, Eq)]
pub struct PutObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
    /// Website redirect target stored as object metadata.
    pub redirect_location: Option<String>,
}

impl fmt::Debug for PutObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutObject")
            .field("key", &self.key)
            .field("body_len", &self.body.len())
            .field("content_type", &self.content_type)
            .field("cache_control", &self.cache_control)
            .field("redirect_location", &self.redirect_location)
            .finish()
    }
}

/// Trait for the bucket holding the published site.
///
/// The trait is implemented by real clients and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object in the bucket.
    async fn list_objects(&self) -> Result<Vec<RemoteObject>, StoreError>;

    /// Fetch the website redirect target stored on an object, if any.
    ///
    /// Listings do not include it, so it is looked up per key.
    async fn redirect_location(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Create or replace an object.
    async fn put_object(&self, req: PutObject) -> Result<(), StoreError>;

    /// Delete an object by key.
    async fn delete_object(&self, key: &str) -> Result<(), StoreError>;
}

/// A CDN distribution and the domain aliases it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub id: String,
    pub aliases: Vec<String>,
}

/// State of a submitted invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationStatus {
    InProgress,
    Completed,
    Other(String),
}

impl From<&str> for InvalidationStatus {
    fn from(s: &str) -> Self {
        match s {
            "InProgress" => InvalidationStatus::InProgress,
            "Completed" => InvalidationStatus::Completed,
            other => InvalidationStatus::Other(other.to_string()),
        }
    }
}

/// CDN failures, classified so callers can decide whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CdnError {
    /// The service is throttling or temporarily unavailable; retry later.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The request was rejected as malformed, e.g. nothing to invalidate.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

/// Trait for the CDN in front of the bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Cdn: Send + Sync {
    /// List all distributions with their aliases.
    async fn list_distributions(&self) -> Result<Vec<Distribution>, CdnError>;

    /// Submit an invalidation batch; returns the invalidation id.
    ///
    /// `caller_reference` makes the submission idempotent on the CDN side.
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<String, CdnError>;

    /// Current status of an invalidation.
    async fn invalidation_status(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<InvalidationStatus, CdnError>;
}
