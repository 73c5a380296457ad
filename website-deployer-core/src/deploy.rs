//! High-level pipeline: render → crawl → sync → invalidate.
//!
//! This module provides the top-level orchestration of a deploy run. It:
//!   - Builds the static site via a [`SiteBuilder`] (local server + mirroring tool)
//!   - Scans the rendered files and loads the redirect rules
//!   - Lists the bucket, plans the incremental sync and applies it via an [`ObjectStore`]
//!   - Invalidates the changed paths on the [`Cdn`]
//!
//! # Responsibilities
//! - Strictly sequential, fail-fast orchestration; each step returns immediately on error
//! - A render without a home page stops the run before the first store call
//! - A dry run stops after planning and mutates nothing
//!
//! # Callable From
//! - The CLI crate, with S3/CloudFront implementations of the contracts
//! - Integration tests, with the `mockall` mocks from [`crate::contract`]

use tracing::info;

use crate::config::DeployConfig;
use crate::contract::{Cdn, ObjectStore, RenderedSite, SiteBuilder};
use crate::error::{store_err, DeployError};
use crate::invalidate::{invalidate, InvalidationOutcome};
use crate::sync::{self, SyncAction, SyncOptions, SyncReport};
use crate::{redirects, site};

/// Per-run options from the command line.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// The site's domain; also the bucket name and the CDN alias.
    pub domain: String,
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct DeployReport {
    pub site: RenderedSite,
    pub sync: SyncReport,
    /// Planned actions; filled for dry runs only.
    pub planned: Vec<SyncAction>,
    /// `None` for dry runs.
    pub invalidation: Option<InvalidationOutcome>,
}

/// Run the whole deploy for one domain.
pub async fn deploy<B, S, C>(
    config: &DeployConfig,
    options: &DeployOptions,
    builder: &B,
    store: &S,
    cdn: &C,
) -> Result<DeployReport, DeployError>
where
    B: SiteBuilder + ?Sized,
    S: ObjectStore + ?Sized,
    C: Cdn + ?Sized,
{
    info!(domain = %options.domain, force = options.force, dry_run = options.dry_run, "[DEPLOY] Starting deploy");

    let rendered = builder.build().await?;
    info!(root = %rendered.root.display(), "[DEPLOY] Site rendered");

    let local_files = site::scan(&rendered.root)?;
    sync::ensure_home_page(&local_files, &config.site.index_file)?;

    let rules = redirects::load(&config.site.work_dir.join(&config.site.redirects_file))?;
    let remote_objects = store
        .list_objects()
        .await
        .map_err(|e| store_err("list", &options.domain, e))?;
    info!(
        local = local_files.len(),
        remote = remote_objects.len(),
        redirects = rules.len(),
        "[DEPLOY] Comparing local files with bucket"
    );

    let sync_options = SyncOptions {
        force: options.force,
        index_file: config.site.index_file.clone(),
        cache_control: config.upload.cache_control.clone(),
    };
    let plan = sync::plan(store, local_files, &remote_objects, rules, &sync_options).await?;

    if options.dry_run {
        let report = SyncReport::from(&plan);
        info!(changed_paths = report.change_set.len(), "[DEPLOY] Dry run, nothing published");
        return Ok(DeployReport {
            site: rendered,
            sync: report,
            planned: plan.actions,
            invalidation: None,
        });
    }

    let report = sync::apply(store, plan, &sync_options).await?;
    let outcome = invalidate(cdn, &options.domain, &report.change_set, options.force, &config.cdn).await?;
    info!(?outcome, "[DEPLOY] Deploy complete");

    Ok(DeployReport {
        site: rendered,
        sync: report,
        planned: Vec::new(),
        invalidation: Some(outcome),
    })
}
