//! Local view of the rendered site: files, their content types and hashes.

use std::path::Path;

use md5::{Digest, Md5};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{io_err, DeployError};

pub const HTML_CONTENT_TYPE: &str = "text/html;charset=utf-8";
const JS_CONTENT_TYPE: &str = "application/javascript";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A file produced by the render, ready to be compared and uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path relative to the rendered root, `/`-separated.
    pub path: String,
    pub content: Vec<u8>,
    pub content_type: String,
    /// Lower-case hex MD5 of `content`, comparable to an unquoted ETag.
    pub md5: String,
}

impl LocalFile {
    pub fn new(path: impl Into<String>, content: Vec<u8>) -> Self {
        let path = path.into();
        let content_type = content_type(&path);
        let md5 = md5_hex(&content);
        Self {
            path,
            content,
            content_type,
            md5,
        }
    }
}

/// Content type by extension. JavaScript is pinned, HTML gets an explicit charset.
pub fn content_type(path: &str) -> String {
    if Path::new(path).extension().and_then(|e| e.to_str()) == Some("js") {
        return JS_CONTENT_TYPE.to_string();
    }
    match mime_guess::from_path(path).first() {
        Some(mime) if mime.essence_str() == "text/html" => HTML_CONTENT_TYPE.to_string(),
        Some(mime) => mime.essence_str().to_string(),
        None => FALLBACK_CONTENT_TYPE.to_string(),
    }
}

pub fn md5_hex(content: &[u8]) -> String {
    format!("{:x}", Md5::digest(content))
}

/// Read every regular file below `root`, sorted by path.
pub fn scan(root: &Path) -> Result<Vec<LocalFile>, DeployError> {
    info!(root = %root.display(), "Scanning rendered site");
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let content = std::fs::read(entry.path()).map_err(|e| io_err(entry.path(), e))?;
        let file = LocalFile::new(rel_path, content);
        debug!(
            path = %file.path,
            size = file.content.len(),
            content_type = %file.content_type,
            "Scanned file"
        );
        files.push(file);
    }
    info!(count = files.len(), "Completed scanning rendered site");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type("index.html"), "text/html;charset=utf-8");
        assert_eq!(content_type("blog/post/index.html"), "text/html;charset=utf-8");
        assert_eq!(content_type("js/app.js"), "application/javascript");
        assert_eq!(content_type("css/site.css"), "text/css");
        assert_eq!(content_type("img/logo.png"), "image/png");
        assert_eq!(content_type("CNAME"), "application/octet-stream");
    }

    #[test]
    fn md5_matches_known_digest() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"hello"), "5d41402abc4b2a76b9719d911017c592");
    }
}
