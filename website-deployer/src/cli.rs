/// CLI interface for website-deployer: command parsing and the async entrypoint.
///
/// All pipeline logic (render, crawl, sync, invalidation) lives in
/// [`website_deployer_core`]. This module loads the config, wires the AWS
/// clients into the core contracts and reports the outcome.
///
/// ## How To Use
/// - From the shell: `website-deployer deploy www.example.com`, or `--help`.
/// - Programmatically and in tests: call [`run`] with a constructed [`Cli`].
use crate::aws::{load_sdk_config, CloudFrontCdn, S3Store};
use crate::load_config::load_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use website_deployer_core::contract::SiteBuilder;
use website_deployer_core::deploy::{deploy, DeployOptions, DeployReport};
use website_deployer_core::invalidate::InvalidationOutcome;
use website_deployer_core::render::DefaultSiteBuilder;
use website_deployer_core::sync::SyncAction;

const DEFAULT_CONFIG: &str = "deploy.yaml";

/// CLI for website-deployer: render a dynamic site to static files and publish it.
#[derive(Parser)]
#[clap(
    name = "website-deployer",
    version,
    about = "Render a website to static files, sync it to S3 and invalidate CloudFront"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render, crawl, publish and invalidate the site for a domain
    Deploy {
        /// Domain of the site; also the bucket name and the CloudFront alias
        domain: String,
        /// Re-upload every file and invalidate everything
        #[clap(long)]
        force: bool,
        /// Compute and print the sync plan without publishing
        #[clap(long)]
        dry_run: bool,
        /// Do not wait for the invalidation to complete
        #[clap(long)]
        no_wait: bool,
        /// Path to the YAML config file
        #[clap(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Render and crawl the site only, printing the output directory
    Render {
        /// Path to the YAML config file
        #[clap(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

/// Async CLI entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Deploy {
            domain,
            force,
            dry_run,
            no_wait,
            config,
        } => {
            let mut config = load_config(config)?;
            if no_wait {
                config.cdn.wait = false;
            }
            tracing::info!(command = "deploy", domain = %domain, "Starting deploy");

            let builder = DefaultSiteBuilder::new(
                config.site.clone(),
                config.server.clone(),
                config.crawl.clone(),
            );
            let sdk_config = load_sdk_config().await;
            let store = S3Store::new(&sdk_config, domain.clone());
            let cdn = CloudFrontCdn::new(&sdk_config);
            let options = DeployOptions {
                domain,
                force,
                dry_run,
            };

            match deploy(&config, &options, &builder, &store, &cdn).await {
                Ok(report) => {
                    print_report(&report);
                    tracing::info!(command = "deploy", "Deploy complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "deploy", error = %e, "Deploy failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Render { config } => {
            let config = load_config(config)?;
            let builder = DefaultSiteBuilder::new(config.site, config.server, config.crawl);
            match builder.build().await {
                Ok(site) => {
                    println!("{}", site.root.display());
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "render", error = %e, "Render failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}

fn print_report(report: &DeployReport) {
    let sync = &report.sync;
    println!(
        "uploaded {}, updated {}, redirected {}, deleted {}, unchanged {}",
        sync.uploaded, sync.updated, sync.redirected, sync.deleted, sync.unchanged
    );
    for action in &report.planned {
        println!("  {} {}", action_label(action), action.key());
    }
    for path in sync.change_set.iter() {
        println!("  changed {path}");
    }
    match &report.invalidation {
        None => println!("dry run: nothing published"),
        Some(InvalidationOutcome::Skipped) => println!("nothing to invalidate"),
        Some(InvalidationOutcome::NoDistribution) => println!("no distribution found, cache not invalidated"),
        Some(InvalidationOutcome::Rejected { message }) => println!("invalidation rejected: {message}"),
        Some(InvalidationOutcome::Pending {
            invalidation_id,
            paths,
            ..
        }) => println!("invalidation {invalidation_id} in progress for {paths} paths"),
        Some(InvalidationOutcome::Completed {
            invalidation_id,
            paths,
            ..
        }) => println!("invalidation {invalidation_id} completed for {paths} paths"),
    }
}

fn action_label(action: &SyncAction) -> &'static str {
    match action {
        SyncAction::Upload { .. } => "upload",
        SyncAction::Redirect { .. } => "redirect",
        SyncAction::Delete { .. } => "delete",
        SyncAction::Unchanged { .. } => "unchanged",
    }
}
