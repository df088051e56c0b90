//! 📥 Getting model bytes back *out* of the catalog.
//!
//! Three roads home, picked by [`crate::artifact::selector::select_download`]:
//! - small: GET the zip, unzip it
//! - large: import into a bucket, wait, stream the zip down, unzip it
//! - by reference: walk the manifest and fetch every pinned object version
//!
//! The caller checks the target directory first; by the time we get here
//! the human has already agreed to lose whatever was in it.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::artifact::archive;
use crate::artifact::uploader::staged_object;
use crate::error::{AquaError, AquaResult};
use crate::model::by_reference::ModelFileDescription;
use crate::oci::data_science::ArtifactBucketDetails;
use crate::oci::{DataScienceClient, ObjectStorageClient};
use crate::object_storage_uri::ObjectStorageUri;
use crate::progress::TransferProgress;
use crate::work_request::WorkRequestPoller;

#[derive(Debug, Clone)]
pub struct ArtifactDownloader {
    data_science: DataScienceClient,
    object_storage: ObjectStorageClient,
    poller: WorkRequestPoller,
}

/// 📌 One pinned object on its way to disk.
#[derive(Debug, Clone)]
struct PinnedObject {
    namespace: String,
    bucket: String,
    name: String,
    version: String,
    size: u64,
}

impl ArtifactDownloader {
    pub fn new(
        data_science: DataScienceClient,
        object_storage: ObjectStorageClient,
        poller: WorkRequestPoller,
    ) -> Self {
        Self {
            data_science,
            object_storage,
            poller,
        }
    }

    pub async fn download_small(&self, model_id: &str, target_dir: &Path) -> AquaResult<()> {
        let bytes = self
            .data_science
            .get_model_artifact_content(model_id)
            .await
            .map_err(not_found_is_missing_artifact)?;
        info!("📥 fetched {} artifact bytes for {}", bytes.len(), model_id);
        let the_target = target_dir.to_path_buf();
        tokio::task::spawn_blocking(move || archive::unzip_bytes(bytes, &the_target))
            .await
            .map_err(|e| AquaError::Io(std::io::Error::other(e)))?
    }

    /// 🚛 Import into `bucket_uri`, stream the zip down, unzip, optionally tidy up.
    pub async fn download_large(
        &self,
        model_id: &str,
        bucket_uri: &ObjectStorageUri,
        target_dir: &Path,
        region: &str,
        remove_existing_artifact: bool,
    ) -> AquaResult<()> {
        let the_object = staged_object(bucket_uri, model_id);
        let details = ArtifactBucketDetails {
            namespace: the_object.namespace.clone(),
            bucket: the_object.bucket.clone(),
            object_name: the_object.prefix.clone(),
            region: region.to_string(),
        };
        let work_request_id = self
            .data_science
            .import_model_artifact(model_id, &details)
            .await
            .map_err(not_found_is_missing_artifact)?;
        self.poller
            .wait(&work_request_id, &format!("Importing model artifact into {the_object}"))
            .await?;

        let the_scratch = tempfile::tempdir()?;
        let the_zip = the_scratch.path().join("artifact.zip");
        let written = self
            .object_storage
            .get_object_to_file(
                &the_object.namespace,
                &the_object.bucket,
                &the_object.prefix,
                None,
                &the_zip,
            )
            .await?;
        debug!("💾 streamed {} bytes from {}", written, the_object);

        let the_target = target_dir.to_path_buf();
        tokio::task::spawn_blocking(move || archive::unzip_file(&the_zip, &the_target))
            .await
            .map_err(|e| AquaError::Io(std::io::Error::other(e)))??;

        if remove_existing_artifact {
            debug!("🧹 removing imported artifact {}", the_object);
            self.object_storage
                .delete_object(&the_object.namespace, &the_object.bucket, &the_object.prefix)
                .await?;
        }
        Ok(())
    }

    /// 🔗 Fetch every object the manifest pins, `parallelism` at a time.
    ///
    /// Objects land at `target_dir/<object name>`, prefixes included.
    pub async fn download_by_reference(
        &self,
        description: &ModelFileDescription,
        target_dir: &Path,
        parallelism: usize,
    ) -> AquaResult<u64> {
        let the_objects: Vec<PinnedObject> = description
            .models
            .iter()
            .flat_map(|model| {
                model.objects.iter().map(|object| PinnedObject {
                    namespace: model.namespace.clone(),
                    bucket: model.bucket_name.clone(),
                    name: object.name.clone(),
                    version: object.version.clone(),
                    size: object.size_in_bytes,
                })
            })
            .collect();
        let (the_locations, total) = description.download_summary();
        info!(
            "🔗 downloading {} objects ({} bytes) from {}",
            the_objects.len(),
            total,
            the_locations.join(", ")
        );

        let progress = TransferProgress::new("Downloading referenced artifacts", total);
        let result = stream::iter(the_objects)
            .map(|object| {
                let the_progress = progress.clone();
                let destination = destination_for(target_dir, &object.name);
                async move {
                    let written = self
                        .object_storage
                        .get_object_to_file(
                            &object.namespace,
                            &object.bucket,
                            &object.name,
                            Some(&object.version),
                            &destination,
                        )
                        .await?;
                    the_progress.advance(object.size);
                    Ok::<u64, AquaError>(written)
                }
            })
            .buffer_unordered(parallelism.max(1))
            .try_fold(0u64, |sum, written| async move { Ok::<u64, AquaError>(sum + written) })
            .await;

        match &result {
            Ok(written) => progress.finish(format!("✅ Downloaded {written} bytes")),
            Err(_) => progress.abandon("💀 Download failed"),
        }
        result
    }
}

fn destination_for(target_dir: &Path, object_name: &str) -> PathBuf {
    object_name
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .fold(target_dir.to_path_buf(), |path, part| path.join(part))
}

fn not_found_is_missing_artifact(e: AquaError) -> AquaError {
    if e.is_not_found() {
        AquaError::ModelArtifactNotFound
    } else {
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::OciConfig;
    use crate::model::by_reference::{ReferencedModel, ReferencedObject};
    use crate::oci::OciTransport;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn the_downloader(server: &MockServer) -> ArtifactDownloader {
        let transport = OciTransport::new(&OciConfig::default()).unwrap();
        let data_science = DataScienceClient::new(transport.clone(), server.uri());
        let object_storage = ObjectStorageClient::new(transport, server.uri());
        let poller = WorkRequestPoller::new(data_science.clone(), Duration::from_millis(5));
        ArtifactDownloader::new(data_science, object_storage, poller)
    }

    fn zipped(name: &str, content: &[u8]) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(name), content).unwrap();
        archive::zip_to_bytes(dir.path()).unwrap()
    }

    #[tokio::test]
    async fn the_one_where_a_small_artifact_unzips_in_place() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/m1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zipped("score.py", b"ok")))
            .mount(&server)
            .await;

        let target = tempfile::tempdir().unwrap();
        the_downloader(&server).download_small("m1", target.path()).await.unwrap();
        assert_eq!(std::fs::read(target.path().join("score.py")).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn the_one_where_there_was_never_an_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/m1/content"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": "NotFound", "message": "nope"})))
            .mount(&server)
            .await;

        let target = tempfile::tempdir().unwrap();
        let err = the_downloader(&server).download_small("m1", target.path()).await.unwrap_err();
        assert!(matches!(err, AquaError::ModelArtifactNotFound));
    }

    #[tokio::test]
    async fn the_one_where_the_big_one_goes_through_the_bucket() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/m1/actions/importArtifact"))
            .respond_with(ResponseTemplate::new(200).insert_header("opc-work-request-id", "wr-i"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/workRequests/wr-i"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wr-i", "status": "SUCCEEDED"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/stage/o/m1.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zipped("weights.bin", b"0101")))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/n/ns/b/stage/o/m1.zip"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let target = tempfile::tempdir().unwrap();
        the_downloader(&server)
            .download_large(
                "m1",
                &ObjectStorageUri::new("stage", "ns", ""),
                target.path(),
                "us-ashburn-1",
                false,
            )
            .await
            .unwrap();
        assert_eq!(std::fs::read(target.path().join("weights.bin")).unwrap(), b"0101");
    }

    #[tokio::test]
    async fn the_one_where_every_pinned_version_comes_home() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/models/o/llama%2Fconfig.json"))
            .and(query_param("versionId", "v1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{}".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/models/o/llama%2Fweights.bin"))
            .and(query_param("versionId", "v2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 16]))
            .expect(1)
            .mount(&server)
            .await;

        let description = ModelFileDescription {
            models: vec![ReferencedModel {
                namespace: "ns".into(),
                bucket_name: "models".into(),
                prefix: "llama/".into(),
                objects: vec![
                    ReferencedObject { name: "llama/config.json".into(), version: "v1".into(), size_in_bytes: 2 },
                    ReferencedObject { name: "llama/weights.bin".into(), version: "v2".into(), size_in_bytes: 16 },
                ],
            }],
            ..ModelFileDescription::default()
        };

        let target = tempfile::tempdir().unwrap();
        let written = the_downloader(&server)
            .download_by_reference(&description, target.path(), 2)
            .await
            .unwrap();
        assert_eq!(written, 18);
        assert_eq!(std::fs::read(target.path().join("llama/weights.bin")).unwrap(), vec![1u8; 16]);
    }

    #[test]
    fn the_one_where_dot_dot_does_not_escape() {
        let base = Path::new("/tmp/target");
        assert_eq!(destination_for(base, "a/../b.txt"), PathBuf::from("/tmp/target/a/b.txt"));
        assert_eq!(destination_for(base, "/x//y"), PathBuf::from("/tmp/target/x/y"));
    }
}
