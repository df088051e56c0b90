//! 📦 Models: the local record, its remote twin, and the catalog that keeps them in step.

pub mod by_reference;
pub mod catalog;
pub mod datascience_model;
pub mod metadata;
pub mod metadata_artifact;
pub mod oci_model;
pub mod settings;

pub use by_reference::{ArtifactReference, ModelFileDescription};
pub use catalog::{CreateOptions, DownloadOptions, ModelCatalog};
pub use datascience_model::{ArtifactLocation, DataScienceModel};
pub use metadata::{MetadataItem, MetadataList, ModelProvenanceMetadata};
pub use metadata_artifact::{MetadataArtifactDetails, MetadataArtifactKind, MetadataArtifactSource};
