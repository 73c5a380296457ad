use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CACHE_CONTROL: &str =
    "public, max-age=60, s-maxage=60, stale-while-revalidate=60, stale-if-error=60";

/// The full deploy configuration. Every section falls back to defaults, so an
/// empty YAML document is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub site: SiteConfig,
    pub server: ServerConfig,
    pub crawl: CrawlConfig,
    pub upload: UploadConfig,
    pub cdn: CdnConfig,
}

impl DeployConfig {
    pub fn trace_loaded(&self) {
        info!(
            work_dir = %self.site.work_dir.display(),
            host = %self.server.host,
            server = %self.server.program,
            crawler = %self.crawl.program,
            wait = self.cdn.wait,
            "Loaded DeployConfig"
        );
        debug!(?self, "DeployConfig loaded (full debug)");
    }
}

/// Where the site lives and which well-known files it uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Directory the server runs in and the crawl output is written under.
    pub work_dir: PathBuf,
    /// Static assets copied into the output before crawling, relative to `work_dir`.
    pub static_dir: Option<PathBuf>,
    /// Top-level entries of `static_dir` that are not published.
    pub static_excludes: Vec<String>,
    pub index_file: String,
    pub not_found_file: String,
    /// Optional list of extra paths to crawl, relative to `work_dir`.
    pub extra_seeds_file: PathBuf,
    /// Seed list written for the mirroring tool, relative to `work_dir`.
    pub seeds_file: PathBuf,
    /// Optional JSON object of source path to redirect target, relative to `work_dir`.
    pub redirects_file: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            static_dir: Some(PathBuf::from("public")),
            static_excludes: vec!["scss".to_string()],
            index_file: "index.html".to_string(),
            not_found_file: "404.html".to_string(),
            extra_seeds_file: PathBuf::from("Extrafiles"),
            seeds_file: PathBuf::from("Files"),
            redirects_file: PathBuf::from("redirects.json"),
        }
    }
}

/// The local process serving the site during the crawl.
///
/// `{host}` and `{port}` in `args` are replaced at launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub program: String,
    pub args: Vec<String>,
    /// How long to wait after launch before crawling.
    pub settle_ms: u64,
}

impl ServerConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            program: "ruby".to_string(),
            args: ["app.rb", "-p", "{port}", "-q", "-e", "production"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            settle_ms: 1000,
        }
    }
}

/// The mirroring tool. The seed file is appended as `--input-file <path>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Regex patterns; a crawl output line matching any of them aborts the deploy.
    pub fatal_patterns: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            program: "wget".to_string(),
            args: [
                "--mirror",
                "--page-requisites",
                "--no-verbose",
                "--execute",
                "robots=off",
                "--no-http-keep-alive",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            fatal_patterns: vec!["ERROR 500: Internal Server Error".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub cache_control: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
        }
    }
}

/// Cache invalidation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnConfig {
    /// Poll the invalidation until it completes.
    pub wait: bool,
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    /// Treat a domain without a distribution as a configuration error.
    pub require_distribution: bool,
    pub retry: RetryPolicy,
}

impl CdnConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            wait: true,
            poll_interval_secs: 20,
            max_polls: 30,
            require_distribution: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// Capped exponential backoff for CDN throttling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total submissions including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}
