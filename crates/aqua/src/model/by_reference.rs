//! 🔗 Models by reference: the catalog keeps a receipt, the bytes stay in the bucket.
//!
//! 🎬 COLD OPEN: INT. OBJECT STORAGE: 40 GB OF WEIGHTS, NOBODY WANTS TO COPY THEM
//!
//! Instead of shipping the artifact into the catalog, a by-reference model
//! uploads a small JSON manifest (`model_description.json`) listing every
//! object it needs, *pinned to a version id*. That pin is why the bucket has to
//! be versioned: without it "the object" is whatever somebody overwrote last
//! Tuesday.
//!
//! This module owns the manifest shape plus the object-storage walks that
//! build it. The bytes themselves move in [`crate::artifact::downloader`].

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{AquaError, AquaResult};
use crate::object_storage_uri::ObjectStorageUri;
use crate::oci::ObjectStorageClient;

/// 📄 File name of the manifest inside the model artifact.
pub const MODEL_BY_REFERENCE_JSON_FILE_NAME: &str = "model_description.json";
/// 🏷️ Custom metadata key flagging a model as created by reference.
pub const MODEL_BY_REFERENCE_DESC: &str = "modelDescription";
pub const MODEL_BY_REFERENCE_VERSION: &str = "1.0";
pub const MODEL_FILE_DESCRIPTION_TYPE: &str = "modelOSSReferenceDescription";

/// 📜 The by-reference manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFileDescription {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub models: Vec<ReferencedModel>,
}

/// 🪣 One bucket/prefix worth of referenced objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedModel {
    pub namespace: String,
    pub bucket_name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub objects: Vec<ReferencedObject>,
}

impl ReferencedModel {
    pub fn uri(&self) -> ObjectStorageUri {
        ObjectStorageUri::new(&self.bucket_name, &self.namespace, &self.prefix)
    }

    fn matches(&self, namespace: &str, bucket: &str, prefix: &str) -> bool {
        self.namespace == namespace && self.bucket_name == bucket && self.prefix == prefix
    }
}

/// 📌 One object, pinned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedObject {
    pub name: String,
    pub version: String,
    pub size_in_bytes: u64,
}

impl Default for ModelFileDescription {
    fn default() -> Self {
        Self {
            version: MODEL_BY_REFERENCE_VERSION.to_string(),
            kind: MODEL_FILE_DESCRIPTION_TYPE.to_string(),
            models: Vec::new(),
        }
    }
}

impl ModelFileDescription {
    pub fn from_json(bytes: &[u8]) -> AquaResult<Self> {
        let description: ModelFileDescription = serde_json::from_slice(bytes).map_err(|e| {
            AquaError::ModelFileDescription(format!(
                "The model file description is not valid JSON: {e}"
            ))
        })?;
        description.validate()?;
        Ok(description)
    }

    pub fn to_json_pretty(&self) -> AquaResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// 📐 Every object must carry a version id. No exceptions, no "latest".
    pub fn validate(&self) -> AquaResult<()> {
        if self.kind != MODEL_FILE_DESCRIPTION_TYPE {
            return Err(AquaError::ModelFileDescription(format!(
                "Unsupported model file description type `{}`. Expected `{MODEL_FILE_DESCRIPTION_TYPE}`.",
                self.kind
            )));
        }
        for model in &self.models {
            if let Some(orphan) = model.objects.iter().find(|o| o.version.trim().is_empty()) {
                return Err(AquaError::ModelFileDescription(format!(
                    "The object `{}` in {} has no version id.",
                    orphan.name,
                    model.uri()
                )));
            }
        }
        Ok(())
    }

    /// 📍 `oci://bucket@namespace/prefix` for every referenced location, in manifest order.
    pub fn bucket_uris(&self) -> Vec<String> {
        self.models.iter().map(|m| m.uri().to_string()).collect()
    }

    pub fn total_size(&self) -> u64 {
        self.models
            .iter()
            .flat_map(|m| m.objects.iter())
            .map(|o| o.size_in_bytes)
            .sum()
    }

    /// 🧾 What a download would fetch: locations and an estimated byte count.
    pub fn download_summary(&self) -> (Vec<String>, u64) {
        (self.bucket_uris(), self.total_size())
    }

    /// ➖ Drop the entry for `namespace`/`bucket`/`prefix`. Missing entries are a no-op.
    pub fn remove_location(&mut self, namespace: &str, bucket: &str, prefix: &str) -> bool {
        let before = self.models.len();
        self.models.retain(|m| !m.matches(namespace, bucket, prefix));
        before != self.models.len()
    }
}

/// 🎯 Where to add/remove objects: either a URI, or a namespace + bucket pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactReference {
    pub uri: Option<String>,
    pub namespace: Option<String>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    /// 📄 Exact object names. Mutually exclusive with `prefix`.
    pub files: Option<Vec<String>>,
}

/// 📍 A reference after the uri/namespace/bucket dance has settled.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedReference {
    pub namespace: String,
    pub bucket: String,
    pub prefix: Option<String>,
}

impl ArtifactReference {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn from_bucket(namespace: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            bucket: Some(bucket.into()),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = Some(files);
        self
    }

    pub(crate) fn resolve(&self) -> AquaResult<ResolvedReference> {
        let the_has_bucket_parts = self.namespace.is_some() || self.bucket.is_some();
        if self.uri.is_some() && the_has_bucket_parts {
            return Err(AquaError::InvalidArgument(
                "Either 'uri' must be provided or both 'namespace' and 'bucket' must be provided."
                    .to_string(),
            ));
        }
        let (namespace, bucket, prefix) = match &self.uri {
            Some(uri) => {
                let parsed = ObjectStorageUri::parse(uri)?;
                let prefix = (!parsed.prefix.is_empty()).then(|| parsed.prefix.clone());
                (Some(parsed.namespace), Some(parsed.bucket), prefix)
            }
            None => (self.namespace.clone(), self.bucket.clone(), self.prefix.clone()),
        };
        let (Some(namespace), Some(bucket)) = (
            namespace.filter(|n| !n.is_empty()),
            bucket.filter(|b| !b.is_empty()),
        ) else {
            return Err(AquaError::InvalidArgument(
                "Both 'namespace' and 'bucket' must be provided.".to_string(),
            ));
        };
        Ok(ResolvedReference {
            namespace,
            bucket,
            prefix,
        })
    }
}

/// 🧷 Refuse local paths and zip archives before touching the network.
pub fn ensure_referenceable(uris: &[String]) -> AquaResult<()> {
    for uri in uris {
        if !ObjectStorageUri::is_oci_path(uri) || uri.trim().to_ascii_lowercase().ends_with(".zip") {
            let msg = "Artifact path cannot be a zip file or local directory for model creation by reference.";
            error!("💀 {msg}");
            return Err(AquaError::InvalidArtifactType(msg.to_string()));
        }
    }
    Ok(())
}

/// 🗂️ Every bucket must be versioned, except the service bucket users may not even be able to read.
pub async fn ensure_buckets_versioned(
    object_storage: &ObjectStorageClient,
    uris: &[String],
    service_models_bucket: &str,
) -> AquaResult<()> {
    let mut the_checked = BTreeSet::new();
    for uri in uris {
        let parsed = ObjectStorageUri::parse(uri)?;
        if parsed.bucket == service_models_bucket {
            continue;
        }
        if !the_checked.insert((parsed.namespace.clone(), parsed.bucket.clone())) {
            continue;
        }
        let bucket = object_storage
            .get_bucket(&parsed.namespace, &parsed.bucket)
            .await?;
        if !bucket.is_versioned() {
            let message = format!(
                "Model artifact bucket {uri} is not versioned. Enable versioning on the bucket to proceed with model creation by reference."
            );
            error!("💀 {message}");
            return Err(AquaError::BucketNotVersioned(message));
        }
    }
    Ok(())
}

/// 🏗️ Build the manifest for `uris`: one entry per location, every object pinned by etag → version id.
pub async fn build_manifest(
    object_storage: &ObjectStorageClient,
    uris: &[String],
) -> AquaResult<ModelFileDescription> {
    ensure_referenceable(uris)?;

    let mut description = ModelFileDescription::default();
    for uri in uris {
        let parsed = ObjectStorageUri::parse(uri)?;
        let the_prefix = Some(parsed.prefix.as_str());

        let the_versions_by_etag: HashMap<String, String> = object_storage
            .list_object_versions(&parsed.namespace, &parsed.bucket, the_prefix, "name,etag")
            .await?
            .into_iter()
            .filter_map(|v| Some((v.etag?, v.version_id?)))
            .collect();

        let objects = object_storage
            .list_objects(&parsed.namespace, &parsed.bucket, the_prefix, "name,etag,size")
            .await?;
        if objects.is_empty() {
            return Err(AquaError::ModelFileDescription(format!(
                "The path {} does not exist or no objects were found in the path. ",
                parsed.prefix
            )));
        }

        let mut the_pinned = Vec::with_capacity(objects.len());
        for object in objects {
            let version = object
                .etag
                .as_ref()
                .and_then(|etag| the_versions_by_etag.get(etag))
                .cloned()
                .ok_or_else(|| {
                    AquaError::ModelFileDescription(format!(
                        "Unable to resolve the version id of object `{}` in {uri}.",
                        object.name
                    ))
                })?;
            the_pinned.push(ReferencedObject {
                name: object.name,
                version,
                size_in_bytes: object.size.unwrap_or(0),
            });
        }

        description.models.push(ReferencedModel {
            namespace: parsed.namespace,
            bucket_name: parsed.bucket,
            prefix: parsed.prefix,
            objects: the_pinned,
        });
    }
    Ok(description)
}

/// ➕ Replace (or add) the manifest entry for `reference`.
///
/// With `files` unset, every object under the prefix is added, newest version
/// per name. With `files`, each name is checked with a HEAD first and missing
/// ones are logged and skipped. Empty objects never make the list.
pub async fn add_artifact(
    object_storage: &ObjectStorageClient,
    description: &mut ModelFileDescription,
    reference: &ArtifactReference,
) -> AquaResult<()> {
    let resolved = reference.resolve()?;
    if resolved.prefix.is_some() && reference.files.is_some() {
        return Err(AquaError::InvalidArgument(
            "Both 'prefix' and 'files' cannot be provided. Please provide only one.".to_string(),
        ));
    }
    let the_prefix = resolved.prefix.clone().unwrap_or_default();
    description.remove_location(&resolved.namespace, &resolved.bucket, &the_prefix);

    let mut the_candidates = Vec::new();
    match &reference.files {
        None => {
            let versions = object_storage
                .list_object_versions(
                    &resolved.namespace,
                    &resolved.bucket,
                    resolved.prefix.as_deref(),
                    "name,size",
                )
                .await?;
            // 📌 the service lists newest first; first sighting of a name wins
            let mut the_seen = BTreeSet::new();
            for version in versions {
                if version.is_delete_marker || !the_seen.insert(version.name.clone()) {
                    continue;
                }
                the_candidates.push(version);
            }
        }
        Some(files) => {
            for file_name in files {
                match object_storage
                    .head_object(&resolved.namespace, &resolved.bucket, file_name)
                    .await
                {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {
                        error!("💀 File not found in bucket: {file_name}");
                        continue;
                    }
                    Err(e) => {
                        error!("💀 An error occurred checking `{file_name}`: {e}");
                        continue;
                    }
                }
                let versions = object_storage
                    .list_object_versions(
                        &resolved.namespace,
                        &resolved.bucket,
                        Some(file_name),
                        "name,size",
                    )
                    .await?;
                match versions.into_iter().find(|v| !v.is_delete_marker) {
                    Some(latest) => the_candidates.push(latest),
                    None => warn!("⚠️ no live version found for `{file_name}`"),
                }
            }
        }
    }

    let mut objects = Vec::with_capacity(the_candidates.len());
    for candidate in the_candidates {
        let size = candidate.size.unwrap_or(0);
        if size == 0 {
            continue;
        }
        let version = candidate.version_id.ok_or_else(|| {
            AquaError::ModelFileDescription(format!(
                "Unable to resolve the version id of object `{}`.",
                candidate.name
            ))
        })?;
        objects.push(ReferencedObject {
            name: candidate.name,
            version,
            size_in_bytes: size,
        });
    }

    if objects.is_empty() {
        let message = format!(
            "No files to add in the bucket: {} with namespace: {} and prefix: {}. File names: {:?}",
            resolved.bucket, resolved.namespace, the_prefix, reference.files
        );
        error!("💀 {message}");
        return Err(AquaError::ModelFileDescription(message));
    }

    description.models.push(ReferencedModel {
        namespace: resolved.namespace,
        bucket_name: resolved.bucket,
        prefix: the_prefix,
        objects,
    });
    Ok(())
}

/// ➖ Remove the manifest entry matching `reference`. `files` is ignored.
pub fn remove_artifact(
    description: &mut ModelFileDescription,
    reference: &ArtifactReference,
) -> AquaResult<bool> {
    let resolved = reference.resolve()?;
    Ok(description.remove_location(
        &resolved.namespace,
        &resolved.bucket,
        resolved.prefix.as_deref().unwrap_or(""),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::OciConfig;
    use crate::oci::OciTransport;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn the_client(server: &MockServer) -> ObjectStorageClient {
        ObjectStorageClient::new(OciTransport::new(&OciConfig::default()).unwrap(), server.uri())
    }

    #[tokio::test]
    async fn the_one_where_n_versioned_objects_make_n_pinned_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/weights/objectversions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "llama/a.bin", "etag": "e1", "versionId": "v1"},
                    {"name": "llama/b.bin", "etag": "e2", "versionId": "v2"},
                    {"name": "llama/c.json", "etag": "e3", "versionId": "v3"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/weights/o"))
            .and(query_param("prefix", "llama/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objects": [
                    {"name": "llama/a.bin", "etag": "e1", "size": 10},
                    {"name": "llama/b.bin", "etag": "e2", "size": 20},
                    {"name": "llama/c.json", "etag": "e3", "size": 0}
                ]
            })))
            .mount(&server)
            .await;

        let manifest = build_manifest(&the_client(&server), &["oci://weights@ns/llama/".to_string()])
            .await
            .unwrap();

        assert_eq!(manifest.models.len(), 1);
        let the_objects = &manifest.models[0].objects;
        assert_eq!(the_objects.len(), 3);
        assert!(the_objects.iter().all(|o| !o.version.is_empty()));
        assert_eq!(the_objects[1].version, "v2");
        assert_eq!(manifest.total_size(), 30);
        assert_eq!(manifest.bucket_uris(), vec!["oci://weights@ns/llama/"]);
    }

    #[tokio::test]
    async fn the_one_where_local_paths_and_zips_are_not_references() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        for bad in ["/home/me/model", "oci://b@ns/model.zip"] {
            let err = build_manifest(&the_client(&server), &[bad.to_string()])
                .await
                .unwrap_err();
            assert!(matches!(err, AquaError::InvalidArtifactType(_)), "{bad}: {err:?}");
        }
    }

    #[tokio::test]
    async fn the_one_where_an_empty_prefix_is_a_manifest_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/weights/objectversions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/weights/o"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objects": []})))
            .mount(&server)
            .await;

        let err = build_manifest(&the_client(&server), &["oci://weights@ns/nothing/".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::ModelFileDescription(ref m) if m.contains("nothing/")));
    }

    #[tokio::test]
    async fn the_one_where_the_unversioned_bucket_is_caught_but_the_service_bucket_is_waved_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "plain", "versioning": "Disabled"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = the_client(&server);
        ensure_buckets_versioned(&client, &["oci://service-bucket@ns/m/".to_string()], "service-bucket")
            .await
            .unwrap();
        let err = ensure_buckets_versioned(&client, &["oci://plain@ns/m/".to_string()], "service-bucket")
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::BucketNotVersioned(ref m) if m.contains("oci://plain@ns/m/")));
    }

    #[tokio::test]
    async fn the_one_where_add_artifact_keeps_the_newest_live_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/bkt/objectversions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "m/a.bin", "versionId": "a2", "size": 7},
                    {"name": "m/a.bin", "versionId": "a1", "size": 5},
                    {"name": "m/gone.bin", "versionId": "g1", "isDeleteMarker": true},
                    {"name": "m/empty", "versionId": "z1", "size": 0}
                ]
            })))
            .mount(&server)
            .await;

        let mut description = ModelFileDescription::default();
        description.models.push(ReferencedModel {
            namespace: "ns".into(),
            bucket_name: "bkt".into(),
            prefix: "m/".into(),
            objects: vec![],
        });

        add_artifact(
            &the_client(&server),
            &mut description,
            &ArtifactReference::from_uri("oci://bkt@ns/m/"),
        )
        .await
        .unwrap();

        assert_eq!(description.models.len(), 1);
        assert_eq!(
            description.models[0].objects,
            vec![ReferencedObject {
                name: "m/a.bin".into(),
                version: "a2".into(),
                size_in_bytes: 7
            }]
        );
    }

    #[tokio::test]
    async fn the_one_where_nothing_to_add_says_exactly_where_it_looked() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/n/ns/b/bkt/o/missing.bin"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut description = ModelFileDescription::default();
        let err = add_artifact(
            &the_client(&server),
            &mut description,
            &ArtifactReference::from_bucket("ns", "bkt").with_files(vec!["missing.bin".into()]),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No files to add in the bucket: bkt with namespace: ns and prefix: . File names: Some([\"missing.bin\"])"
        );
    }

    #[test]
    fn the_one_where_the_reference_arguments_argue() {
        let both = ArtifactReference {
            uri: Some("oci://b@n/p".into()),
            namespace: Some("n".into()),
            ..Default::default()
        };
        assert!(both.resolve().unwrap_err().to_string().starts_with("Either 'uri'"));

        let half = ArtifactReference {
            bucket: Some("b".into()),
            ..Default::default()
        };
        assert_eq!(
            half.resolve().unwrap_err().to_string(),
            "Both 'namespace' and 'bucket' must be provided."
        );
    }

    #[test]
    fn the_one_where_remove_matches_on_the_full_location() {
        let mut description = ModelFileDescription::default();
        for prefix in ["a/", ""] {
            description.models.push(ReferencedModel {
                namespace: "ns".into(),
                bucket_name: "bkt".into(),
                prefix: prefix.into(),
                objects: vec![],
            });
        }
        assert!(remove_artifact(&mut description, &ArtifactReference::from_bucket("ns", "bkt")).unwrap());
        assert_eq!(description.models.len(), 1);
        assert_eq!(description.models[0].prefix, "a/");
        assert!(!remove_artifact(&mut description, &ArtifactReference::from_uri("oci://bkt@ns/zzz")).unwrap());
    }

    #[test]
    fn the_one_where_the_manifest_refuses_unpinned_objects() {
        let raw = json!({
            "version": "1.0",
            "type": "modelOSSReferenceDescription",
            "models": [{"namespace": "ns", "bucketName": "b", "prefix": "p",
                        "objects": [{"name": "x", "version": "", "sizeInBytes": 1}]}]
        });
        let err = ModelFileDescription::from_json(raw.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, AquaError::ModelFileDescription(_)));
    }
}
