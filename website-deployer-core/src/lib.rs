#![doc = "website-deployer-core: core pipeline for website-deployer."]

//! This crate contains the deploy pipeline: rendering the site through a local
//! server and a mirroring tool, syncing the result to an object store, and
//! invalidating the CDN. Cloud SDK clients are not included here; they live in
//! the CLI crate and plug in through the traits in [`contract`].
//!
//! # Usage
//! Call [`deploy::deploy`] with a config, a [`contract::SiteBuilder`],
//! an [`contract::ObjectStore`] and a [`contract::Cdn`].

pub mod change_set;
pub mod config;
pub mod contract;
pub mod crawl;
pub mod deploy;
pub mod error;
pub mod invalidate;
pub mod redirects;
pub mod render;
pub mod server;
pub mod site;
pub mod sync;

pub use error::DeployError;
