//! 💀 Errors: the taxonomy of sadness, sorted by who to blame.
//!
//! 🎬 COLD OPEN: INT. SUPPORT QUEUE: MONDAY
//!
//! "It said ServiceError." "Which one?" "...the service one."
//!
//! Never again. Every failure gets a name here, split four ways:
//! - local preconditions: raised before a single byte leaves the building
//! - remote not-found: a 404 with a story attached
//! - state conflicts: the remote is fine, your request is the problem
//! - size limits: 2 GiB walked into a bar without a bucket
//!
//! Anything the service throws that we don't have a name for rides along as
//! [`AquaError::Service`] with the status, code and message untouched. 🦆

use thiserror::Error;

/// 📦 One enum to hold every way a catalog conversation can go sideways.
#[derive(Debug, Error)]
pub enum AquaError {
    // ===== 🧷 local preconditions =====
    /// 🧷 A required identifier or field was never set.
    #[error("{0}")]
    MissingField(String),

    /// 🚫 The caller handed us something we refuse to work with.
    #[error("{0}")]
    InvalidArgument(String),

    /// 📐 A value object or config failed its own validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    InvalidArtifactType(String),

    #[error("{0}")]
    InvalidArtifactPathTypeOrContent(String),

    #[error("Path : {0} does not exist")]
    PathNotFound(String),

    #[error(
        "File already exists: {0}. Please use boolean override parameter to override the file content."
    )]
    FileExists(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// 💾 The model lives only in RAM and hopes; it has no id yet.
    #[error("{0}")]
    ModelNotSaved(String),

    // ===== 🔍 remote not-found =====
    #[error("The model artifact was not found.")]
    ModelArtifactNotFound,

    #[error("The model provenance was not found.")]
    ModelProvenanceNotFound,

    #[error("The model {model_id} does not contain the metadata with key {key}.")]
    MetadataArtifactNotFound { model_id: String, key: String },

    // ===== ⚔️ state conflicts =====
    #[error(
        "The model has active model deployments. Set `delete_associated_model_deployment` to delete them together with the model."
    )]
    ModelWithActiveDeployment,

    #[error("{0}")]
    BucketNotVersioned(String),

    // ===== 📏 size limits =====
    #[error(
        "The model artifacts size is greater than `{max_size}`. The `bucket_uri` needs to be specified to copy artifacts to the object storage bucket. Example: `bucket_uri=oci://<bucket_name>@<namespace>/prefix/`"
    )]
    ModelArtifactSizeError { max_size: String },

    /// 📜 The by-reference manifest is missing, empty or malformed.
    #[error("{0}")]
    ModelFileDescription(String),

    // ===== 📡 remote, generic =====
    /// 📡 The service answered, just not with good news.
    #[error("Service error {status} ({code}) from {url}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
        url: String,
    },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Work request {id} finished with status {status}: {message}")]
    WorkRequestFailed {
        id: String,
        status: String,
        message: String,
    },

    /// 🔄 A nested field refused to convert and the policy said "tell someone".
    #[error("Failed to convert field `{field}`: {reason}")]
    Conversion { field: String, reason: String },

    // ===== 🧰 plumbing =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl AquaError {
    /// 🔢 The HTTP status the service returned, if this error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AquaError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 🔍 True for a remote 404. Used by every "translate the not-found" call site.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// 🧷 True when the error was raised locally, before any network call.
    pub fn is_local_precondition(&self) -> bool {
        matches!(
            self,
            AquaError::MissingField(_)
                | AquaError::InvalidArgument(_)
                | AquaError::Validation(_)
                | AquaError::InvalidArtifactType(_)
                | AquaError::InvalidArtifactPathTypeOrContent(_)
                | AquaError::PathNotFound(_)
                | AquaError::FileExists(_)
                | AquaError::FileNotFound(_)
                | AquaError::ModelNotSaved(_)
                | AquaError::ModelArtifactSizeError { .. }
        )
    }
}

/// 🎯 Convenience alias. Typing `Result<T, AquaError>` forty times builds character, not software.
pub type AquaResult<T> = std::result::Result<T, AquaError>;
