use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::config::{CrawlConfig, ServerConfig, SiteConfig};
use crate::contract::{RenderedSite, SiteBuilder};
use crate::crawl;
use crate::error::{io_err, DeployError};
use crate::server::{free_port, LocalServer};

/// Renders the site by serving it locally and mirroring it with the crawler.
pub struct DefaultSiteBuilder {
    site: SiteConfig,
    server: ServerConfig,
    crawl: CrawlConfig,
}

impl DefaultSiteBuilder {
    pub fn new(site: SiteConfig, server: ServerConfig, crawl: CrawlConfig) -> Self {
        Self { site, server, crawl }
    }

    async fn render(&self) -> Result<RenderedSite, DeployError> {
        let work_dir = &self.site.work_dir;
        let host = self.server.host.as_str();
        let port = free_port(host)?;
        // The mirroring tool names its output directory after the host and port.
        let output_dir = work_dir.join(format!("{host}:{port}"));

        if output_dir.exists() {
            std::fs::remove_dir_all(&output_dir).map_err(|e| io_err(&output_dir, e))?;
            debug!(path = %output_dir.display(), "Removed stale output directory");
        }
        match &self.site.static_dir {
            Some(static_dir) => {
                copy_static(&work_dir.join(static_dir), &output_dir, &self.site.static_excludes)?
            }
            None => std::fs::create_dir_all(&output_dir).map_err(|e| io_err(&output_dir, e))?,
        }

        let extra = crawl::read_extra_seeds(&work_dir.join(&self.site.extra_seeds_file))?;
        let urls = crawl::seed_urls(
            host,
            port,
            &self.site.index_file,
            &self.site.not_found_file,
            &extra,
        );
        let seed_file = work_dir.join(&self.site.seeds_file);
        crawl::write_seed_file(&seed_file, &urls)?;
        info!(seeds = urls.len(), path = %seed_file.display(), "Wrote crawl seed list");

        let server = LocalServer::start(&self.server, work_dir, port).await?;
        let crawled = crawl::crawl(&self.crawl, work_dir, &self.site.seeds_file).await;
        server.shutdown().await;
        crawled?;

        crawl::remove_query_artifacts(&output_dir)?;
        info!(root = %output_dir.display(), "Render complete");
        Ok(RenderedSite { root: output_dir })
    }
}

#[async_trait]
impl SiteBuilder for DefaultSiteBuilder {
    async fn build(&self) -> Result<RenderedSite, DeployError> {
        match self.render().await {
            Err(DeployError::Io { path, source }) if source.kind() == ErrorKind::NotFound => {
                let listing = list_dir(&self.site.work_dir);
                error!(path = %path.display(), error = %source, ?listing, "Render failed on a missing path");
                Err(DeployError::MissingPath {
                    path,
                    listing,
                    source,
                })
            }
            other => other,
        }
    }
}

/// Copy the static tree into `dest`, skipping excluded top-level entries.
/// A missing source directory only creates `dest`.
pub fn copy_static(src: &Path, dest: &Path, excludes: &[String]) -> Result<(), DeployError> {
    std::fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
    if !src.is_dir() {
        debug!(path = %src.display(), "No static directory to copy");
        return Ok(());
    }

    let walker = WalkDir::new(src).min_depth(1).into_iter().filter_entry(|entry| {
        let top_level_excluded = entry.depth() == 1
            && excludes
                .iter()
                .any(|x| entry.file_name().to_str() == Some(x.as_str()));
        !top_level_excluded
    });

    let mut copied = 0usize;
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            io_err(path, e.into())
        })?;
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target: PathBuf = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| io_err(entry.path(), e))?;
            copied += 1;
        }
    }
    info!(from = %src.display(), to = %dest.display(), files = copied, "Copied static files");
    Ok(())
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
