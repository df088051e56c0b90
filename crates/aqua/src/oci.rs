//! ☁️ OCI service clients.
//!
//! One struct per remote service, all sharing one [`transport::OciTransport`].
//! [`OciClients`] bundles them so the rest of the crate can ask for "the cloud"
//! without caring which of eight hostnames answers.

pub mod compute;
pub mod data_science;
pub mod identity;
pub mod limits;
pub mod logging;
pub mod object_storage;
pub mod search;
pub mod transport;
pub mod virtual_network;

pub use compute::ComputeClient;
pub use data_science::DataScienceClient;
pub use identity::IdentityClient;
pub use limits::LimitsClient;
pub use logging::LoggingClient;
pub use object_storage::ObjectStorageClient;
pub use search::SearchClient;
pub use transport::OciTransport;
pub use virtual_network::VirtualNetworkClient;

use std::sync::Arc;

use crate::app_config::OciConfig;
use crate::error::AquaResult;
use transport::{RequestSigner, resolve_endpoint};

/// 🎒 Every service client, packed for the trip.
#[derive(Debug, Clone)]
pub struct OciClients {
    pub region: String,
    pub data_science: DataScienceClient,
    pub object_storage: ObjectStorageClient,
    pub identity: IdentityClient,
    pub logging: LoggingClient,
    pub virtual_network: VirtualNetworkClient,
    pub limits: LimitsClient,
    pub compute: ComputeClient,
    pub search: SearchClient,
}

impl OciClients {
    pub fn from_config(config: &OciConfig) -> AquaResult<Self> {
        Ok(Self::with_transport(config, OciTransport::new(config)?))
    }

    /// 🔏 Same as [`OciClients::from_config`] but with a caller-supplied signer.
    pub fn with_signer(config: &OciConfig, signer: Arc<dyn RequestSigner>) -> AquaResult<Self> {
        Ok(Self::with_transport(
            config,
            OciTransport::with_signer(config, signer)?,
        ))
    }

    fn with_transport(config: &OciConfig, transport: OciTransport) -> Self {
        let region = config.region.as_str();
        let the_overrides = &config.endpoints;
        Self {
            region: config.region.clone(),
            data_science: DataScienceClient::new(
                transport.clone(),
                resolve_endpoint(
                    the_overrides.data_science.as_ref(),
                    DataScienceClient::ENDPOINT_TEMPLATE,
                    region,
                ),
            ),
            object_storage: ObjectStorageClient::new(
                transport.clone(),
                resolve_endpoint(
                    the_overrides.object_storage.as_ref(),
                    ObjectStorageClient::ENDPOINT_TEMPLATE,
                    region,
                ),
            ),
            identity: IdentityClient::new(
                transport.clone(),
                resolve_endpoint(
                    the_overrides.identity.as_ref(),
                    IdentityClient::ENDPOINT_TEMPLATE,
                    region,
                ),
            ),
            logging: LoggingClient::new(
                transport.clone(),
                resolve_endpoint(
                    the_overrides.logging.as_ref(),
                    LoggingClient::ENDPOINT_TEMPLATE,
                    region,
                ),
            ),
            virtual_network: VirtualNetworkClient::new(
                transport.clone(),
                resolve_endpoint(
                    the_overrides.virtual_network.as_ref(),
                    VirtualNetworkClient::ENDPOINT_TEMPLATE,
                    region,
                ),
            ),
            limits: LimitsClient::new(
                transport.clone(),
                resolve_endpoint(
                    the_overrides.limits.as_ref(),
                    LimitsClient::ENDPOINT_TEMPLATE,
                    region,
                ),
            ),
            compute: ComputeClient::new(
                transport.clone(),
                resolve_endpoint(
                    the_overrides.compute.as_ref(),
                    ComputeClient::ENDPOINT_TEMPLATE,
                    region,
                ),
            ),
            search: SearchClient::new(
                transport,
                resolve_endpoint(
                    the_overrides.search.as_ref(),
                    SearchClient::ENDPOINT_TEMPLATE,
                    region,
                ),
            ),
        }
    }
}

/// 🧪 Shared test helper: every endpoint pointed at one mock server.
#[cfg(test)]
pub(crate) fn mocked_config(base: &str) -> OciConfig {
    let mut config = OciConfig::default();
    let the_base = Some(base.to_string());
    config.endpoints.data_science = the_base.clone();
    config.endpoints.object_storage = the_base.clone();
    config.endpoints.identity = the_base.clone();
    config.endpoints.logging = the_base.clone();
    config.endpoints.virtual_network = the_base.clone();
    config.endpoints.limits = the_base.clone();
    config.endpoints.compute = the_base.clone();
    config.endpoints.search = the_base;
    config
}
