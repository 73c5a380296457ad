//! CDN cache invalidation for the paths a deploy changed.

use std::future::Future;

use tracing::{info, warn};
use uuid::Uuid;

use crate::change_set::ChangeSet;
use crate::config::{CdnConfig, RetryPolicy};
use crate::contract::{Cdn, CdnError, InvalidationStatus};
use crate::error::DeployError;

pub const WILDCARD_PATH: &str = "/*";

/// What happened to the invalidation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// Nothing changed and the run was not forced; no CDN calls were made.
    Skipped,
    /// No distribution serves the domain.
    NoDistribution,
    /// The CDN refused the batch as invalid; the deploy itself stands.
    Rejected { message: String },
    /// Submitted, not waited for (or polling gave up).
    Pending { distribution_id: String, invalidation_id: String, paths: usize },
    Completed { distribution_id: String, invalidation_id: String, paths: usize },
}

/// Invalidate the changed paths (or everything, when forced) on the domain's distribution.
pub async fn invalidate<C>(
    cdn: &C,
    domain: &str,
    change_set: &ChangeSet,
    force: bool,
    config: &CdnConfig,
) -> Result<InvalidationOutcome, DeployError>
where
    C: Cdn + ?Sized,
{
    if change_set.is_empty() && !force {
        info!("No changed paths, skipping invalidation");
        return Ok(InvalidationOutcome::Skipped);
    }

    let distributions = with_retry(&config.retry, "list distributions", move || cdn.list_distributions()).await?;
    let Some(distribution) = distributions
        .into_iter()
        .find(|d| d.aliases.iter().any(|alias| alias == domain))
    else {
        if config.require_distribution {
            return Err(DeployError::NoDistribution {
                domain: domain.to_string(),
            });
        }
        warn!(domain, "Couldn't find a CDN distribution for domain");
        return Ok(InvalidationOutcome::NoDistribution);
    };

    let paths = if force {
        vec![WILDCARD_PATH.to_string()]
    } else {
        change_set.to_vec()
    };
    let caller_reference = Uuid::new_v4().to_string();

    let submitted = {
        let (id, batch, reference) = (distribution.id.as_str(), paths.as_slice(), caller_reference.as_str());
        with_retry(&config.retry, "create invalidation", move || cdn.create_invalidation(id, batch, reference)).await
    };
    let invalidation_id = match submitted {
        Ok(id) => id,
        Err(CdnError::InvalidArgument(message)) => {
            warn!(distribution_id = %distribution.id, message = %message, "CDN rejected invalidation");
            return Ok(InvalidationOutcome::Rejected { message });
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        distribution_id = %distribution.id,
        invalidation_id = %invalidation_id,
        paths = paths.len(),
        changed = change_set.len(),
        "Invalidating changed items on CDN"
    );

    if config.wait && wait_for_completion(cdn, &distribution.id, &invalidation_id, config).await {
        info!(invalidation_id = %invalidation_id, "Invalidation done");
        return Ok(InvalidationOutcome::Completed {
            distribution_id: distribution.id,
            invalidation_id,
            paths: paths.len(),
        });
    }
    Ok(InvalidationOutcome::Pending {
        distribution_id: distribution.id,
        invalidation_id,
        paths: paths.len(),
    })
}

/// Run a CDN call, retrying throttling under the policy. Other errors return at once.
///
/// `call` is invoked once per attempt with unchanged arguments, so an invalidation
/// keeps its caller reference across retries.
async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T, CdnError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CdnError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Err(CdnError::ServiceUnavailable(message)) if attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    message = %message,
                    "CDN unavailable, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Poll until the invalidation leaves `InProgress`. Returns false when polling gives up.
///
/// The invalidation is already submitted at this point, so a failed status call
/// ends the wait without failing the deploy.
async fn wait_for_completion<C>(
    cdn: &C,
    distribution_id: &str,
    invalidation_id: &str,
    config: &CdnConfig,
) -> bool
where
    C: Cdn + ?Sized,
{
    for poll in 1..=config.max_polls {
        tokio::time::sleep(config.poll_interval()).await;
        let status = with_retry(&config.retry, "invalidation status", move || {
            cdn.invalidation_status(distribution_id, invalidation_id)
        })
        .await;
        match status {
            Ok(InvalidationStatus::InProgress) => {
                info!(poll, "Waiting for CDN invalidation");
            }
            Ok(status) => {
                info!(?status, "Invalidation finished");
                return true;
            }
            Err(e) => {
                warn!(invalidation_id, error = %e, "Could not read invalidation status, no longer waiting");
                return false;
            }
        }
    }
    warn!(
        invalidation_id,
        polls = config.max_polls,
        "Invalidation still in progress, no longer waiting"
    );
    false
}
