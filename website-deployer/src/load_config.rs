/// `load_config` module: reads the YAML deploy config and applies environment overrides.
///
/// This is the only place where user-supplied YAML is parsed into the core
/// [`DeployConfig`]. Every section and field has a default, so the file itself is
/// optional: a missing file yields the defaults.
///
/// # Environment
/// - `LOCALHOST` replaces `server.host`, the hostname the site is served and crawled on.
///
/// # Errors
/// Read and parse failures are returned as `anyhow::Error` with the path attached,
/// and surface at the CLI boundary.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{error, info};
use website_deployer_core::config::DeployConfig;

/// Environment variable overriding the render/crawl hostname.
pub const LOCALHOST_ENV: &str = "LOCALHOST";

/// Loads the deploy config from `path`, falling back to defaults when it does not exist.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DeployConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let mut config = if path_ref.exists() {
        let content = fs::read_to_string(path_ref).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            e
        });
        let content =
            content.with_context(|| format!("Failed to read config file {:?}", path_ref))?;
        parse_config(&content)
            .map_err(|e| {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                e
            })
            .with_context(|| format!("Failed to parse config YAML {:?}", path_ref))?
    } else {
        info!(config_path = ?path_ref, "No config file, using defaults");
        DeployConfig::default()
    };

    apply_env_overrides(&mut config);
    config.trace_loaded();
    Ok(config)
}

fn parse_config(content: &str) -> Result<DeployConfig, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(DeployConfig::default());
    }
    serde_yaml::from_str(content)
}

fn apply_env_overrides(config: &mut DeployConfig) {
    if let Ok(host) = std::env::var(LOCALHOST_ENV) {
        let host = host.trim();
        if !host.is_empty() {
            info!(host, "Using hostname from {LOCALHOST_ENV}");
            config.server.host = host.to_string();
        }
    }
}
