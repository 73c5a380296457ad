//! Incremental sync between the rendered files and the object store.
//!
//! The engine runs in two phases:
//!   - [`plan`] walks the remote listing once, matching each object by key against the
//!     rendered files and the redirect rules, and decides one [`SyncAction`] per key.
//!     It only reads from the store.
//!   - [`apply`] executes the plan's actions in order.
//!
//! Matching is by key equality, so the plan does not depend on listing order. The
//! pending local files and pending redirect rules are working collections owned by a
//! single [`plan`] call; whatever is left of them after the pass becomes new uploads
//! and new redirects.
//!
//! Every key whose published content changes is recorded in the plan's [`ChangeSet`]
//! for cache invalidation.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::change_set::{encode_key, ChangeSet};
use crate::contract::{ObjectStore, PutObject, RemoteObject};
use crate::error::{store_err, DeployError};
use crate::redirects::RedirectRules;
use crate::site::{LocalFile, HTML_CONTENT_TYPE};

/// Knobs for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Re-publish everything regardless of detected differences.
    pub force: bool,
    pub index_file: String,
    pub cache_control: String,
}

/// Why an object is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Not in the store yet.
    New,
    /// Stored content or redirect target differs.
    Changed,
    /// Identical, but the run is forced.
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Upload { file: LocalFile, reason: ChangeReason },
    Redirect { key: String, target: String, reason: ChangeReason },
    Delete { key: String },
    Unchanged { key: String },
}

impl SyncAction {
    pub fn key(&self) -> &str {
        match self {
            SyncAction::Upload { file, .. } => &file.path,
            SyncAction::Redirect { key, .. }
            | SyncAction::Delete { key }
            | SyncAction::Unchanged { key } => key,
        }
    }
}

/// Everything a sync run would do, computed before any mutation.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub actions: Vec<SyncAction>,
    pub change_set: ChangeSet,
    /// Local files with no remote counterpart.
    pub new_files: Vec<String>,
    /// Redirect rules with no remote counterpart.
    pub new_redirects: Vec<String>,
}

/// Counts of what a sync did (or, for a dry run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    pub updated: usize,
    pub redirected: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub change_set: ChangeSet,
}

impl From<&SyncPlan> for SyncReport {
    fn from(plan: &SyncPlan) -> Self {
        let mut report = SyncReport {
            change_set: plan.change_set.clone(),
            ..SyncReport::default()
        };
        for action in &plan.actions {
            match action {
                SyncAction::Upload {
                    reason: ChangeReason::New,
                    ..
                } => report.uploaded += 1,
                SyncAction::Upload { .. } => report.updated += 1,
                SyncAction::Redirect { .. } => report.redirected += 1,
                SyncAction::Delete { .. } => report.deleted += 1,
                SyncAction::Unchanged { .. } => report.unchanged += 1,
            }
        }
        report
    }
}

/// Fail when no rendered file is a home page. Checked before touching the store.
pub fn ensure_home_page(files: &[LocalFile], index_file: &str) -> Result<(), DeployError> {
    if files.iter().any(|f| f.path.ends_with(index_file)) {
        return Ok(());
    }
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    debug!(?paths, "No index found among rendered files");
    Err(DeployError::NoHomePage {
        index_file: index_file.to_string(),
        file_count: files.len(),
    })
}

/// Stored metadata differs from what an upload would write. Unknown metadata never counts.
fn metadata_drifted(object: &RemoteObject, file: &LocalFile, options: &SyncOptions) -> bool {
    let differs = |stored: &Option<String>, wanted: &str| stored.as_deref().is_some_and(|s| s != wanted);
    differs(&object.content_type, &file.content_type) || differs(&object.cache_control, &options.cache_control)
}

/// Decide the action for every remote object, local file and redirect rule.
pub async fn plan<S>(
    store: &S,
    local_files: Vec<LocalFile>,
    remote_objects: &[RemoteObject],
    redirect_rules: RedirectRules,
    options: &SyncOptions,
) -> Result<SyncPlan, DeployError>
where
    S: ObjectStore + ?Sized,
{
    let mut pending_files: BTreeMap<String, LocalFile> = local_files
        .into_iter()
        .map(|f| (f.path.clone(), f))
        .collect();
    let mut pending_redirects = redirect_rules;
    let mut plan = SyncPlan::default();

    for object in remote_objects {
        if let Some(file) = pending_files.remove(&object.key) {
            let changed = object.unquoted_etag() != file.md5 || metadata_drifted(object, &file, options);
            if changed || options.force {
                let reason = if changed {
                    ChangeReason::Changed
                } else {
                    ChangeReason::Forced
                };
                plan.change_set.insert_key(&object.key, &options.index_file);
                plan.actions.push(SyncAction::Upload { file, reason });
            } else {
                plan.actions.push(SyncAction::Unchanged {
                    key: object.key.clone(),
                });
            }
        } else if let Some(target) = pending_redirects.remove(&object.key) {
            let current = store
                .redirect_location(&object.key)
                .await
                .map_err(|e| store_err("redirect lookup", &object.key, e))?;
            let changed = current.as_deref() != Some(target.as_str());
            if changed || options.force {
                let reason = if changed {
                    ChangeReason::Changed
                } else {
                    ChangeReason::Forced
                };
                plan.change_set.insert(encode_key(&object.key));
                plan.actions.push(SyncAction::Redirect {
                    key: object.key.clone(),
                    target,
                    reason,
                });
            } else {
                plan.actions.push(SyncAction::Unchanged {
                    key: object.key.clone(),
                });
            }
        } else {
            plan.change_set.insert_key(&object.key, &options.index_file);
            plan.actions.push(SyncAction::Delete {
                key: object.key.clone(),
            });
        }
    }

    for (path, file) in pending_files {
        plan.change_set.insert_key(&path, &options.index_file);
        plan.new_files.push(path);
        plan.actions.push(SyncAction::Upload {
            file,
            reason: ChangeReason::New,
        });
    }

    // Runs after the uploads, so a rule sharing a key with a rendered file wins.
    for (source, target) in pending_redirects {
        plan.change_set.insert(encode_key(&source));
        plan.new_redirects.push(source.clone());
        plan.actions.push(SyncAction::Redirect {
            key: source,
            target,
            reason: ChangeReason::New,
        });
    }

    info!(
        actions = plan.actions.len(),
        new_files = plan.new_files.len(),
        new_redirects = plan.new_redirects.len(),
        changed_paths = plan.change_set.len(),
        "Sync plan computed"
    );
    Ok(plan)
}

/// Execute a plan against the store, in plan order.
pub async fn apply<S>(store: &S, plan: SyncPlan, options: &SyncOptions) -> Result<SyncReport, DeployError>
where
    S: ObjectStore + ?Sized,
{
    let report = SyncReport::from(&plan);

    for action in plan.actions {
        match action {
            SyncAction::Upload { file, reason } => {
                let verb = match reason {
                    ChangeReason::New => "Uploading",
                    ChangeReason::Changed | ChangeReason::Forced => "Updating",
                };
                info!(key = %file.path, content_type = %file.content_type, ?reason, "{verb}");
                let key = file.path;
                store
                    .put_object(PutObject {
                        key: key.clone(),
                        body: file.content,
                        content_type: file.content_type,
                        cache_control: options.cache_control.clone(),
                        redirect_location: None,
                    })
                    .await
                    .map_err(|e| store_err("put", &key, e))?;
            }
            SyncAction::Redirect { key, target, reason } => {
                info!(key = %key, target = %target, ?reason, "Redirecting");
                store
                    .put_object(PutObject {
                        key: key.clone(),
                        body: Vec::new(),
                        content_type: HTML_CONTENT_TYPE.to_string(),
                        cache_control: options.cache_control.clone(),
                        redirect_location: Some(target),
                    })
                    .await
                    .map_err(|e| store_err("put redirect", &key, e))?;
            }
            SyncAction::Delete { key } => {
                info!(key = %key, "Deleting");
                store
                    .delete_object(&key)
                    .await
                    .map_err(|e| store_err("delete", &key, e))?;
            }
            SyncAction::Unchanged { key } => {
                debug!(key = %key, "Not changed");
            }
        }
    }

    info!(
        uploaded = report.uploaded,
        updated = report.updated,
        redirected = report.redirected,
        deleted = report.deleted,
        unchanged = report.unchanged,
        "Sync applied"
    );
    Ok(report)
}

/// Plan and apply in one go, refusing to run without a home page.
pub async fn sync<S>(
    store: &S,
    local_files: Vec<LocalFile>,
    remote_objects: &[RemoteObject],
    redirect_rules: RedirectRules,
    options: &SyncOptions,
) -> Result<SyncReport, DeployError>
where
    S: ObjectStore + ?Sized,
{
    ensure_home_page(&local_files, &options.index_file)?;
    let plan = plan(store, local_files, remote_objects, redirect_rules, options).await?;
    apply(store, plan, options).await
}
