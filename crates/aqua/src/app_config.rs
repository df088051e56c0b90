//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing.": every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Two kinds of environment live here:
//! - `AQUA_*` vars, which Figment maps straight onto [`AppConfig`] (`__` nests)
//! - the notebook/job vars the platform injects (`NB_SESSION_COMPARTMENT_OCID`
//!   and friends), which only fill gaps the config left open

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// 📏 2 GiB. Beyond this line the catalog refuses to take bytes directly.
pub const MAX_ARTIFACT_SIZE_IN_BYTES: u64 = 2_147_483_648;

/// 🪣 The bucket the service ships its own models from. Users may not be able to
/// read its versioning flag, so by-reference checks wave it through.
pub const DEFAULT_SERVICE_MODELS_BUCKET: &str = "service-managed-models";

/// 🧭 Where the platform hides the compartment, in order of trust.
const COMPARTMENT_ENV_VARS: [&str; 4] = [
    "NB_SESSION_COMPARTMENT_OCID",
    "PROJECT_COMPARTMENT_OCID",
    "JOB_RUN_COMPARTMENT_OCID",
    "PIPELINE_RUN_COMPARTMENT_OCID",
];

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// 📡 Region, auth and endpoints. The "how do we reach the cloud" drawer.
    #[serde(default)]
    pub oci: OciConfig,
    /// 🧭 Compartment/project/tenancy the UI falls back to.
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    /// 🔄 What happens when a nested response field refuses to parse.
    #[serde(default)]
    pub conversion_policy: ConversionPolicy,
    #[serde(default)]
    pub server: ServerConfig,
}

/// 📡 OCI connection knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct OciConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub auth: AuthConfig,
    /// 🧪 Per-service base URL overrides. Tests point these at wiremock; humans rarely touch them.
    #[serde(default)]
    pub endpoints: EndpointOverrides,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OciConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            auth: AuthConfig::default(),
            endpoints: EndpointOverrides::default(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_region() -> String {
    "us-ashburn-1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    // ⏳ artifact uploads are slow, the default is generous on purpose
    600
}

/// 🔒 How outgoing requests get their credentials.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    /// 🙈 No credentials. Fine for mocks, fatal for the real cloud.
    #[default]
    Anonymous,
    /// 🎟️ A pre-minted session/delegation token sent as a bearer header.
    SecurityToken { token: String },
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EndpointOverrides {
    pub data_science: Option<String>,
    pub object_storage: Option<String>,
    pub identity: Option<String>,
    pub logging: Option<String>,
    pub virtual_network: Option<String>,
    pub limits: Option<String>,
    pub compute: Option<String>,
    pub search: Option<String>,
}

/// 🧭 The "if nobody told us, use this" section.
#[derive(Debug, Deserialize, Clone)]
pub struct DefaultsConfig {
    pub compartment_id: Option<String>,
    pub project_id: Option<String>,
    pub tenancy_id: Option<String>,
    /// 🎟️ Bring-your-own-reservation allowlisting.
    #[serde(default)]
    pub byor_enabled: bool,
    #[serde(default = "default_service_models_bucket")]
    pub service_models_bucket: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            compartment_id: None,
            project_id: None,
            tenancy_id: None,
            byor_enabled: false,
            service_models_bucket: default_service_models_bucket(),
        }
    }
}

fn default_service_models_bucket() -> String {
    DEFAULT_SERVICE_MODELS_BUCKET.to_string()
}

/// 🚚 Artifact transfer tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct TransferConfig {
    #[serde(default = "default_max_artifact_size_bytes")]
    pub max_artifact_size_bytes: u64,
    /// 🧵 Concurrent part uploads for multipart transfers.
    #[serde(default = "default_parallel_process_count")]
    pub parallel_process_count: usize,
    #[serde(default = "default_part_size_bytes")]
    pub part_size_bytes: usize,
    /// ⏱️ Seconds between work-request polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_artifact_size_bytes: default_max_artifact_size_bytes(),
            parallel_process_count: default_parallel_process_count(),
            part_size_bytes: default_part_size_bytes(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_max_artifact_size_bytes() -> u64 {
    MAX_ARTIFACT_SIZE_IN_BYTES
}

fn default_parallel_process_count() -> usize {
    9
}

fn default_part_size_bytes() -> usize {
    // 🍰 128 MiB slices
    128 * 1024 * 1024
}

fn default_poll_interval_secs() -> u64 {
    3
}

/// 🔄 Conversion-failure policy for nested response fields.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversionPolicy {
    /// 💥 Bubble up an `AquaError::Conversion`.
    Propagate,
    /// 🙈 Warn and leave the field unset.
    #[default]
    LogAndContinue,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl AppConfig {
    /// 🧭 Fill the gaps from the platform's own environment variables.
    ///
    /// Explicit config always wins. The lookup is injected so tests don't have to
    /// mutate the process environment (which is `unsafe` in edition 2024 anyway).
    pub fn apply_platform_environment<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let the_non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.defaults.compartment_id.is_none() {
            self.defaults.compartment_id = COMPARTMENT_ENV_VARS.iter().find_map(|k| the_non_empty(k));
        }
        if self.defaults.project_id.is_none() {
            self.defaults.project_id = the_non_empty("PROJECT_OCID");
        }
        if self.defaults.tenancy_id.is_none() {
            self.defaults.tenancy_id = the_non_empty("TENANCY_OCID");
        }
        if let Some(byor) = the_non_empty("ALLOWLISTED_FOR_BYOR") {
            self.defaults.byor_enabled = byor.trim().eq_ignore_ascii_case("true");
        }
        if let Some(bucket) = the_non_empty("AQUA_SERVICE_MODELS_BUCKET") {
            self.defaults.service_models_bucket = bucket;
        }
    }
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges `AQUA_*` environment variables with an optional TOML file (TOML wins),
/// then lets the platform's notebook/job variables fill whatever is still empty.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("AQUA_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (AQUA_*). \
             The file exists in our hearts, but apparently not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (AQUA_*). \
                 No file was provided: this one's all on the environment. Classic."
            .to_string(),
    };

    let mut app_config: AppConfig = config.extract().context(context_msg)?;
    app_config.apply_platform_environment(|key| std::env::var(key).ok());
    Ok(app_config)
}
