//! Error types for the deploy pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::contract::{CdnError, StoreError};

/// All errors that can end a deploy run.
#[derive(Debug, Error)]
pub enum DeployError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file or directory the render expected was not there.
    /// Carries the working directory listing at the time of failure.
    #[error("missing {path}: {source}\nworking directory contains: {listing:?}")]
    MissingPath {
        path: PathBuf,
        listing: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    /// An external program (site server, mirroring tool) could not be started.
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The mirroring tool reported a fatal error while crawling.
    #[error("aborting crawl, error detected:\n\n{log}")]
    CrawlAborted { log: String },

    /// The render produced no home page; nothing is published.
    #[error("render failed: no file ending in {index_file} among {file_count} rendered files")]
    NoHomePage { index_file: String, file_count: usize },

    /// The redirect mapping file exists but is not a JSON object of strings.
    #[error("invalid redirects file {path}: {source}")]
    Redirects {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The crawl fatal-line patterns do not compile.
    #[error("invalid crawl error pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An object store call failed.
    #[error("object store error during {operation} `{key}`: {source}")]
    Store {
        operation: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    /// A CDN call failed and was not recoverable.
    #[error("CDN error: {0}")]
    Cdn(#[from] CdnError),

    /// No CDN distribution serves the domain and the config demands one.
    #[error("no CDN distribution found with alias {domain}")]
    NoDistribution { domain: String },
}

/// Convenience constructor for [`DeployError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`DeployError::Store`].
pub(crate) fn store_err(operation: &'static str, key: &str, source: StoreError) -> DeployError {
    DeployError::Store {
        operation,
        key: key.to_string(),
        source,
    }
}
