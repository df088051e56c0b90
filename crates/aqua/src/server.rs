//! 🌐 The REST surface the AQUA console talks to.

pub mod error;
pub mod routes;

pub use error::HttpError;
pub use routes::{router, service};

use anyhow::Context;
use axum::ServiceExt;
use axum::extract::Request;
use tokio::net::TcpListener;
use tracing::info;

use crate::app_config::AppConfig;
use crate::aqua::AquaUiApp;
use crate::oci::OciClients;

/// 🚀 Bind `config.server.bind` and serve until the process is told to stop.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let clients = OciClients::from_config(&config.oci).context("💀 Failed to build the OCI clients")?;
    let app = AquaUiApp::new(clients, config.defaults.clone());

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("💀 Failed to bind {}", config.server.bind))?;
    info!("🌐 AQUA handlers listening on http://{}/aqua", config.server.bind);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(service(app)))
        .await
        .context("💀 The HTTP server fell over")
}
