//! 🏷️ Metadata artifacts: named blobs hanging off a model's metadata keys.
//!
//! A README under custom metadata `README`, a license under defined metadata
//! `License`. Same five verbs for both families (create, update, get, head,
//! delete); the family is a [`MetadataArtifactKind`] argument instead of ten
//! near-identical methods.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::catalog::ModelCatalog;
use super::datascience_model::DataScienceModel;
use crate::error::{AquaError, AquaResult};
use crate::object_storage_uri::ObjectStorageUri;
use crate::oci::transport::RawResponse;

pub use crate::oci::data_science::MetadataArtifactKind;

/// 📎 The service only cares that it is a form upload with *a* filename.
pub const METADATA_CONTENT_DISPOSITION: &str = "form-data; name=\"file\"; filename=\"readme.*\"";

/// 📦 Where the artifact bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataArtifactSource {
    Content(Vec<u8>),
    Local(PathBuf),
    /// 🪣 `oci://bucket@namespace/object`
    ObjectStorage(String),
}

/// 🧾 What the service said back: every header plus the status code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataArtifactDetails {
    pub headers: BTreeMap<String, String>,
    pub status: String,
}

impl From<RawResponse> for MetadataArtifactDetails {
    fn from(response: RawResponse) -> Self {
        Self {
            headers: response.headers,
            status: response.status.to_string(),
        }
    }
}

fn family(kind: MetadataArtifactKind) -> &'static str {
    match kind {
        MetadataArtifactKind::Custom => "custom",
        MetadataArtifactKind::Defined => "defined",
    }
}

impl ModelCatalog {
    /// 📖 Resolve a source to bytes before anything is sent.
    async fn read_metadata_source(&self, source: &MetadataArtifactSource) -> AquaResult<Vec<u8>> {
        match source {
            MetadataArtifactSource::Content(bytes) => Ok(bytes.clone()),
            MetadataArtifactSource::Local(path) => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(AquaError::FileNotFound(path.display().to_string()));
                }
                Ok(tokio::fs::read(path).await?)
            }
            MetadataArtifactSource::ObjectStorage(uri) => {
                let the_object = ObjectStorageUri::parse(uri)?;
                let object_storage = &self.clients().object_storage;
                object_storage
                    .get_object(&the_object.namespace, &the_object.bucket, &the_object.prefix, None)
                    .await
                    .map_err(|e| {
                        if e.is_not_found() {
                            AquaError::FileNotFound(uri.clone())
                        } else {
                            e
                        }
                    })
            }
        }
    }

    pub async fn create_metadata_artifact(
        &self,
        model: &DataScienceModel,
        kind: MetadataArtifactKind,
        key: &str,
        source: &MetadataArtifactSource,
    ) -> AquaResult<MetadataArtifactDetails> {
        let model_id = model.require_id(&format!(
            "creating a {} metadata artifact for it",
            family(kind)
        ))?;
        let content = self.read_metadata_source(source).await?;
        info!("🏷️ creating {} metadata artifact `{}` on {}", family(kind), key, model_id);
        self.clients()
            .data_science
            .create_metadata_artifact(kind, model_id, key, content, METADATA_CONTENT_DISPOSITION)
            .await
            .map(MetadataArtifactDetails::from)
    }

    pub async fn update_metadata_artifact(
        &self,
        model: &DataScienceModel,
        kind: MetadataArtifactKind,
        key: &str,
        source: &MetadataArtifactSource,
    ) -> AquaResult<MetadataArtifactDetails> {
        let model_id = model.require_id(&format!(
            "updating a {} metadata artifact for it",
            family(kind)
        ))?;
        let content = self.read_metadata_source(source).await?;
        info!("🏷️ updating {} metadata artifact `{}` on {}", family(kind), key, model_id);
        self.clients()
            .data_science
            .update_metadata_artifact(kind, model_id, key, content, METADATA_CONTENT_DISPOSITION)
            .await
            .map(MetadataArtifactDetails::from)
    }

    /// 📥 Raw artifact bytes. Missing means [`AquaError::MetadataArtifactNotFound`].
    pub async fn get_metadata_artifact_content(
        &self,
        model: &DataScienceModel,
        kind: MetadataArtifactKind,
        key: &str,
    ) -> AquaResult<Vec<u8>> {
        let model_id = model.require_id(&format!(
            "fetching a {} metadata artifact for it",
            family(kind)
        ))?;
        self.clients()
            .data_science
            .get_metadata_artifact_content(kind, model_id, key)
            .await
            .map_err(|e| {
                // -- 🤷 defined metadata answers 400 for keys it has never heard of
                let is_missing = match kind {
                    MetadataArtifactKind::Custom => e.status() == Some(404),
                    MetadataArtifactKind::Defined => matches!(e.status(), Some(404) | Some(400)),
                };
                if is_missing {
                    AquaError::MetadataArtifactNotFound {
                        model_id: model_id.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    e
                }
            })
    }

    /// 💾 Fetch the artifact and save it as `target_dir/{key}`.
    pub async fn get_metadata_artifact(
        &self,
        model: &DataScienceModel,
        kind: MetadataArtifactKind,
        key: &str,
        target_dir: &Path,
        override_existing: bool,
    ) -> AquaResult<Vec<u8>> {
        if !is_plain_file_name(key) {
            return Err(AquaError::InvalidArgument(format!(
                "The metadata key `{key}` cannot be used as a file name inside `{}`.",
                target_dir.display()
            )));
        }
        if !tokio::fs::try_exists(target_dir).await.unwrap_or(false) {
            return Err(AquaError::PathNotFound(target_dir.display().to_string()));
        }
        let content = self.get_metadata_artifact_content(model, kind, key).await?;
        let the_file = target_dir.join(key);
        if !override_existing && tokio::fs::try_exists(&the_file).await.unwrap_or(false) {
            return Err(AquaError::FileExists(the_file.display().to_string()));
        }
        tokio::fs::write(&the_file, &content).await?;
        debug!("💾 metadata artifact saved to {}", the_file.display());
        Ok(content)
    }

    pub async fn head_metadata_artifact(
        &self,
        model: &DataScienceModel,
        kind: MetadataArtifactKind,
        key: &str,
    ) -> AquaResult<MetadataArtifactDetails> {
        let model_id = model.require_id(&format!(
            "fetching a {} metadata artifact for it",
            family(kind)
        ))?;
        self.clients()
            .data_science
            .head_metadata_artifact(kind, model_id, key)
            .await
            .map(MetadataArtifactDetails::from)
    }

    pub async fn delete_metadata_artifact(
        &self,
        model: &DataScienceModel,
        kind: MetadataArtifactKind,
        key: &str,
    ) -> AquaResult<MetadataArtifactDetails> {
        let model_id = model.require_id(&format!(
            "deleting a {} metadata artifact for it",
            family(kind)
        ))?;
        info!("🗑️ deleting {} metadata artifact `{}` on {}", family(kind), key, model_id);
        self.clients()
            .data_science
            .delete_metadata_artifact(kind, model_id, key)
            .await
            .map(MetadataArtifactDetails::from)
    }

    /// ❓ True only on a 200 HEAD; any error counts as "no".
    pub async fn if_model_custom_metadata_artifact_exist(&self, model: &DataScienceModel, key: &str) -> bool {
        match self
            .head_metadata_artifact(model, MetadataArtifactKind::Custom, key)
            .await
        {
            Ok(details) => details.status == "200",
            Err(e) => {
                info!(
                    "Error fetching custom metadata: {} for model {}. {}",
                    key,
                    model.id().unwrap_or_default(),
                    e
                );
                false
            }
        }
    }
}

/// 📛 One path component, no separators, no `.`/`..` tricks.
fn is_plain_file_name(key: &str) -> bool {
    !key.is_empty() && key != "." && key != ".." && !key.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::AppConfig;
    use crate::oci::mocked_config;
    use serde_json::json;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn the_catalog(server: &MockServer) -> ModelCatalog {
        let mut config = AppConfig::default();
        config.oci = mocked_config(&server.uri());
        ModelCatalog::from_config(&config).unwrap()
    }

    fn saved() -> DataScienceModel {
        DataScienceModel::new().with_id("m1")
    }

    #[tokio::test]
    async fn the_one_where_the_readme_goes_up_as_a_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/m1/customMetadata/README/artifact"))
            .and(header("content-disposition", METADATA_CONTENT_DISPOSITION))
            .and(body_bytes(b"# hello".to_vec()))
            .respond_with(ResponseTemplate::new(204).insert_header("etag", "e1"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let the_readme = dir.path().join("README.md");
        std::fs::write(&the_readme, b"# hello").unwrap();

        let details = the_catalog(&server)
            .create_metadata_artifact(
                &saved(),
                MetadataArtifactKind::Custom,
                "README",
                &MetadataArtifactSource::Local(the_readme),
            )
            .await
            .unwrap();
        assert_eq!(details.status, "204");
        assert_eq!(details.headers.get("etag").map(String::as_str), Some("e1"));
    }

    #[tokio::test]
    async fn the_one_where_the_local_file_was_a_lie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let err = the_catalog(&server)
            .create_metadata_artifact(
                &saved(),
                MetadataArtifactKind::Custom,
                "README",
                &MetadataArtifactSource::Local(PathBuf::from("/definitely/not/here.md")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::FileNotFound(_)));

        let err = the_catalog(&server)
            .create_metadata_artifact(
                &DataScienceModel::new(),
                MetadataArtifactKind::Defined,
                "License",
                &MetadataArtifactSource::Content(b"MIT".to_vec()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::ModelNotSaved(_)));
    }

    #[tokio::test]
    async fn the_one_where_a_404_means_the_metadata_is_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/m1/customMetadata/README/artifact/content"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": "NotFound", "message": "no"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/m1/definedMetadata/License/artifact/content"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"code": "InvalidParameter", "message": "no"})))
            .mount(&server)
            .await;

        let catalog = the_catalog(&server);
        let err = catalog
            .get_metadata_artifact_content(&saved(), MetadataArtifactKind::Custom, "README")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The model m1 does not contain the metadata with key README."
        );
        let err = catalog
            .get_metadata_artifact_content(&saved(), MetadataArtifactKind::Defined, "License")
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::MetadataArtifactNotFound { ref key, .. } if key == "License"));
    }

    #[tokio::test]
    async fn the_one_where_saving_respects_what_is_already_there() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/m1/customMetadata/README/artifact/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .mount(&server)
            .await;

        let catalog = the_catalog(&server);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README"), b"stale").unwrap();

        let err = catalog
            .get_metadata_artifact(&saved(), MetadataArtifactKind::Custom, "README", dir.path(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::FileExists(_)));

        catalog
            .get_metadata_artifact(&saved(), MetadataArtifactKind::Custom, "README", dir.path(), true)
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("README")).unwrap(), b"fresh");

        let err = catalog
            .get_metadata_artifact(
                &saved(),
                MetadataArtifactKind::Custom,
                "README",
                &dir.path().join("missing"),
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn the_one_where_the_key_tries_to_climb_out_of_the_folder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"gotcha".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let catalog = the_catalog(&server);
        let outer = tempfile::tempdir().unwrap();
        let target = outer.path().join("inner");
        std::fs::create_dir(&target).unwrap();

        for the_key in ["../escaped", "nested/README", "..", "a\\b"] {
            let err = catalog
                .get_metadata_artifact(&saved(), MetadataArtifactKind::Custom, the_key, &target, true)
                .await
                .unwrap_err();
            assert!(matches!(err, AquaError::InvalidArgument(_)), "{the_key} slipped through");
        }
        assert!(!outer.path().join("escaped").exists());
    }

    #[tokio::test]
    async fn the_one_where_existence_is_a_200_and_nothing_else() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/models/m1/customMetadata/README/artifact/head"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/models/m1/customMetadata/LICENSE/artifact/head"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let catalog = the_catalog(&server);
        assert!(catalog.if_model_custom_metadata_artifact_exist(&saved(), "README").await);
        assert!(!catalog.if_model_custom_metadata_artifact_exist(&saved(), "LICENSE").await);
    }

    #[tokio::test]
    async fn the_one_where_object_storage_feeds_the_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/docs/o/readme.md"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"from the bucket".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/models/m1/definedMetadata/Readme/artifact"))
            .and(body_bytes(b"from the bucket".to_vec()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        the_catalog(&server)
            .update_metadata_artifact(
                &saved(),
                MetadataArtifactKind::Defined,
                "Readme",
                &MetadataArtifactSource::ObjectStorage("oci://docs@ns/readme.md".into()),
            )
            .await
            .unwrap();
    }
}
