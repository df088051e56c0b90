//! 🌊 aqua: a model-catalog client for OCI Data Science, plus the REST handlers
//! the AQUA console leans on.
//!
//! 🎬 *[narrator voice]* "Somewhere in a bucket, 40 GB of weights waited to be cataloged..."
//!
//! The layers, bottom up:
//! - [`oci`]: one thin client per cloud service, sharing a transport
//! - [`model`]: the `DataScienceModel` value object and the [`model::ModelCatalog`] that
//!   creates, syncs, deletes and ships artifacts for it
//! - [`artifact`]: small/large/by-reference transfers and the zip plumbing under them
//! - [`aqua`] and [`server`]: console lookups and the axum router that serves them
//! - [`operators`]: the forecast operator's YAML config

pub mod app_config;
pub mod aqua;
pub mod artifact;
pub mod error;
pub mod model;
pub mod object_storage_uri;
pub mod oci;
pub mod operators;
pub mod progress;
pub mod server;
pub mod work_request;

use anyhow::{Context, Result};

pub use error::{AquaError, AquaResult};

/// 🚀 Serve the `/aqua` handlers until the process is stopped.
pub async fn run(app_config: app_config::AppConfig) -> Result<()> {
    server::serve(&app_config)
        .await
        .context("💀 The AQUA handler server stopped unexpectedly")
}
