//! Redirect rules: source path to target, stored as website-redirect objects.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use crate::error::{io_err, DeployError};

/// Source key to redirect target. Ordered so new redirects are created deterministically.
pub type RedirectRules = BTreeMap<String, String>;

/// Load the redirect mapping; a missing file means no redirects.
pub fn load(path: &Path) -> Result<RedirectRules, DeployError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No redirects file, continuing without redirects");
            return Ok(RedirectRules::new());
        }
        Err(e) => return Err(io_err(path, e)),
    };
    let rules: RedirectRules = serde_json::from_str(&content).map_err(|source| DeployError::Redirects {
        path: path.to_path_buf(),
        source,
    })?;
    info!(count = rules.len(), path = %path.display(), "Found redirects");
    Ok(rules)
}
