//! 📚 The model catalog: where [`DataScienceModel`]s go to become real.
//!
//! 🎬 COLD OPEN: INT. MODEL CATALOG: THE MODEL EXISTS ONLY IN RAM
//!
//! A [`DataScienceModel`] is a local opinion. [`ModelCatalog`] is the thing that
//! argues with the service until the opinion and the remote record agree:
//! create, update, delete, list, sync, and the artifact round trips.
//!
//! Every operation checks its local preconditions first. If the model has no
//! compartment, no id, or a 5 GiB folder and no bucket, you hear about it
//! before a single request leaves the building.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::by_reference::{
    ArtifactReference, ModelFileDescription, add_artifact, build_manifest, ensure_buckets_versioned,
    ensure_referenceable,
};
use super::datascience_model::{ArtifactLocation, DataScienceModel};
use super::metadata::ModelProvenanceMetadata;
use super::oci_model::{apply_resource, from_resource, to_create_payload, to_update_payload};
use crate::app_config::{AppConfig, ConversionPolicy, DefaultsConfig, TransferConfig};
use crate::artifact::archive;
use crate::artifact::{
    ArtifactDownloader, ArtifactUploader, DownloadStrategy, UploadOptions, UploadStrategy,
    select_download, select_upload,
};
use crate::error::{AquaError, AquaResult};
use crate::oci::OciClients;
use crate::oci::data_science::OciModelProvenance;
use crate::work_request::WorkRequestPoller;

/// 🏷️ The catalog's own category for models people register themselves.
pub const USER_CATEGORY: &str = "USER";
const ACTIVE: &str = "ACTIVE";

/// 🎛️ How `create`/`upload_artifact` should ship the artifact.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub bucket_uri: Option<String>,
    pub overwrite_existing_artifact: bool,
    pub remove_existing_artifact: bool,
    pub model_by_reference: bool,
    /// 🧵 Falls back to `transfer.parallel_process_count`.
    pub parallel_process_count: Option<usize>,
    /// 🌍 Falls back to the configured region.
    pub region: Option<String>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            bucket_uri: None,
            overwrite_existing_artifact: true,
            remove_existing_artifact: true,
            model_by_reference: false,
            parallel_process_count: None,
            region: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// 💣 Wipe a non-empty `target_dir` instead of refusing.
    pub force_overwrite: bool,
    pub bucket_uri: Option<String>,
    pub region: Option<String>,
    pub remove_existing_artifact: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            force_overwrite: false,
            bucket_uri: None,
            region: None,
            remove_existing_artifact: true,
        }
    }
}

/// 📚 Talks to the catalog on a model's behalf.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    clients: OciClients,
    defaults: DefaultsConfig,
    transfer: TransferConfig,
    policy: ConversionPolicy,
    poller: WorkRequestPoller,
}

impl ModelCatalog {
    pub fn new(clients: OciClients, config: &AppConfig) -> Self {
        let poller = WorkRequestPoller::new(
            clients.data_science.clone(),
            Duration::from_secs(config.transfer.poll_interval_secs),
        );
        Self {
            clients,
            defaults: config.defaults.clone(),
            transfer: config.transfer.clone(),
            policy: config.conversion_policy,
            poller,
        }
    }

    pub fn from_config(config: &AppConfig) -> AquaResult<Self> {
        Ok(Self::new(OciClients::from_config(&config.oci)?, config))
    }

    pub fn clients(&self) -> &OciClients {
        &self.clients
    }

    fn uploader(&self) -> ArtifactUploader {
        ArtifactUploader::new(
            self.clients.data_science.clone(),
            self.clients.object_storage.clone(),
            self.poller.clone(),
        )
    }

    fn downloader(&self) -> ArtifactDownloader {
        ArtifactDownloader::new(
            self.clients.data_science.clone(),
            self.clients.object_storage.clone(),
            self.poller.clone(),
        )
    }

    // ===== 🐣 create / update / delete =====

    /// 🐣 Create the model, its provenance and its artifact, then sync.
    ///
    /// The artifact strategy is settled before the model record exists, so a
    /// size error or a bad by-reference path never leaves an empty model behind.
    pub async fn create(&self, model: &mut DataScienceModel, options: &CreateOptions) -> AquaResult<()> {
        model.validate()?;
        self.fill_defaults(model);
        if model.compartment_id().is_none_or(str::is_empty) {
            return Err(AquaError::MissingField("Compartment id must be provided.".to_string()));
        }
        if model.project_id().is_none_or(str::is_empty) {
            return Err(AquaError::MissingField("Project id must be provided.".to_string()));
        }
        if model.display_name().is_none() {
            model.set_display_name(Some(DataScienceModel::random_display_name()));
        }

        let the_plan = self.plan_upload(model, options).await?;

        let created = self
            .clients
            .data_science
            .create_model(&to_create_payload(model)?)
            .await?;
        apply_resource(model, &created, self.policy)?;
        let model_id = model.require_id("uploading its artifact")?.to_string();
        info!("🐣 created model {}", model_id);

        if let Some(provenance) = model.provenance_metadata().filter(|p| !p.is_empty()) {
            self.clients
                .data_science
                .create_model_provenance(&model_id, &OciModelProvenance::from(provenance))
                .await?;
        }

        if let Some(plan) = the_plan {
            self.execute_upload(model, &model_id, plan, options).await?;
        }
        self.sync(model).await
    }

    /// ✏️ Push mutable fields, upsert provenance, sync.
    pub async fn update(&self, model: &mut DataScienceModel) -> AquaResult<()> {
        let model_id = model.require_id("it can be updated")?.to_string();
        model.validate()?;
        let updated = self
            .clients
            .data_science
            .update_model(&model_id, &to_update_payload(model)?)
            .await?;
        apply_resource(model, &updated, self.policy)?;

        if let Some(provenance) = model.provenance_metadata().filter(|p| !p.is_empty()).cloned() {
            self.upsert_provenance(&model_id, &provenance).await?;
        }
        self.sync(model).await
    }

    /// 🗑️ Delete the model. Active deployments block it unless
    /// `delete_associated_model_deployment` says to take them down first.
    pub async fn delete(
        &self,
        model: &mut DataScienceModel,
        delete_associated_model_deployment: bool,
    ) -> AquaResult<()> {
        let model_id = model.require_id("it can be deleted")?.to_string();
        let the_query =
            format!("query datasciencemodeldeployment resources where ModelId='{model_id}'");
        let the_active: Vec<_> = self
            .clients
            .search
            .search_structured(&the_query)
            .await?
            .into_iter()
            .filter(|d| d.lifecycle_state.as_deref() == Some(ACTIVE))
            .collect();

        if !the_active.is_empty() {
            if !delete_associated_model_deployment {
                warn!(
                    "⚔️ model {} has {} active deployment(s), refusing to delete",
                    model_id,
                    the_active.len()
                );
                return Err(AquaError::ModelWithActiveDeployment);
            }
            for deployment in &the_active {
                info!("🗑️ deleting model deployment {}", deployment.identifier);
                if let Some(work_request_id) = self
                    .clients
                    .data_science
                    .delete_model_deployment(&deployment.identifier)
                    .await?
                {
                    self.poller
                        .wait(
                            &work_request_id,
                            &format!("Deleting model deployment {}", deployment.identifier),
                        )
                        .await?;
                }
            }
        }

        self.clients.data_science.delete_model(&model_id).await?;
        info!("🗑️ deleted model {}", model_id);
        match self.sync(model).await {
            Err(e) if e.is_not_found() => {
                if let Some(state) = model.string_slot_mut("lifecycle_state") {
                    *state = Some("DELETED".to_string());
                }
                Ok(())
            }
            other => other,
        }
    }

    // ===== 🔎 read =====

    /// 📋 Models in a compartment. Per-model provenance and artifact lookups are skipped.
    pub async fn list(
        &self,
        compartment_id: Option<&str>,
        project_id: Option<&str>,
        category: Option<&str>,
    ) -> AquaResult<Vec<DataScienceModel>> {
        let the_compartment = compartment_id
            .map(str::to_string)
            .or_else(|| self.defaults.compartment_id.clone())
            .ok_or_else(|| AquaError::MissingField("Compartment id must be provided.".to_string()))?;
        let the_project = project_id.or(self.defaults.project_id.as_deref());
        let resources = self
            .clients
            .data_science
            .list_models(&the_compartment, the_project, Some(category.unwrap_or(USER_CATEGORY)))
            .await?;
        debug!("📋 {} models in {}", resources.len(), the_compartment);
        resources
            .iter()
            .map(|resource| from_resource(resource, self.policy))
            .collect()
    }

    pub async fn from_id(&self, model_id: &str) -> AquaResult<DataScienceModel> {
        if model_id.trim().is_empty() {
            return Err(AquaError::MissingField("Model OCID not provided.".to_string()));
        }
        let mut model = DataScienceModel::new().with_id(model_id);
        self.sync(&mut model).await?;
        Ok(model)
    }

    /// 🔄 Re-read the model, its provenance and its artifact from the service.
    pub async fn sync(&self, model: &mut DataScienceModel) -> AquaResult<()> {
        let model_id = model.require_id("it can be synced")?.to_string();
        let resource = self.clients.data_science.get_model(&model_id).await?;
        apply_resource(model, &resource, self.policy)?;

        match self.clients.data_science.get_model_provenance(&model_id).await {
            Ok(provenance) => model.set_provenance_metadata(Some(provenance.into())),
            Err(e) if e.is_not_found() => debug!("🧬 model {} has no provenance", model_id),
            Err(e) => return Err(e),
        }

        if model.is_model_created_by_reference() {
            match self.fetch_manifest(&model_id).await {
                Ok(description) => {
                    model.set_artifact(Some(ArtifactLocation::from(description.bucket_uris())));
                    model.set_model_file_description(Some(description));
                }
                Err(AquaError::ModelArtifactNotFound) => {
                    debug!("🔗 by-reference model {} has no manifest yet", model_id)
                }
                Err(e) => return Err(e),
            }
        } else {
            match self.clients.data_science.head_model_artifact(&model_id).await {
                Ok(head) => {
                    let the_name = head
                        .header("content-disposition")
                        .and_then(disposition_filename);
                    model.set_artifact(the_name.map(ArtifactLocation::Single));
                }
                Err(e) if e.is_not_found() => debug!("🗜️ model {} has no artifact yet", model_id),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ===== 🗜️ artifact =====

    /// 🏷️ Headers of the artifact, verbatim.
    pub async fn head_artifact(&self, model: &DataScienceModel) -> AquaResult<BTreeMap<String, String>> {
        let model_id = model.require_id("its artifact can be inspected")?;
        self.clients
            .data_science
            .head_model_artifact(model_id)
            .await
            .map(|head| head.headers)
            .map_err(not_found_as(AquaError::ModelArtifactNotFound))
    }

    /// 📤 Upload `model.artifact` to an already saved model.
    pub async fn upload_artifact(&self, model: &mut DataScienceModel, options: &CreateOptions) -> AquaResult<()> {
        let model_id = model.require_id("uploading its artifact")?.to_string();
        match self.plan_upload(model, options).await? {
            Some(plan) => self.execute_upload(model, &model_id, plan, options).await,
            None => {
                warn!("⚠️ model {} has no artifact to upload", model_id);
                Ok(())
            }
        }
    }

    /// 📥 Download the artifact into `target_dir`.
    pub async fn download_artifact(
        &self,
        model: &DataScienceModel,
        target_dir: &Path,
        options: &DownloadOptions,
    ) -> AquaResult<()> {
        let model_id = model.require_id("downloading its artifact")?;
        if model.artifact().is_none() && model.model_file_description().is_none() {
            warn!(
                "⚠️ Model doesn't contain an artifact. The artifact needs to be uploaded to the model catalog at first."
            );
            return Ok(());
        }
        prepare_target_dir(target_dir, options.force_overwrite).await?;

        let by_reference = model.is_model_created_by_reference();
        let the_length = if by_reference {
            None
        } else {
            self.head_artifact(model)
                .await?
                .get("content-length")
                .cloned()
        };
        let strategy = select_download(
            by_reference,
            the_length.as_deref(),
            options.bucket_uri.as_deref(),
            self.transfer.max_artifact_size_bytes,
        )?;

        let downloader = self.downloader();
        match strategy {
            DownloadStrategy::Small { .. } => downloader.download_small(model_id, target_dir).await,
            DownloadStrategy::Large { bucket_uri, .. } => {
                let the_region = options.region.as_deref().unwrap_or(&self.clients.region);
                downloader
                    .download_large(
                        model_id,
                        &bucket_uri,
                        target_dir,
                        the_region,
                        options.remove_existing_artifact,
                    )
                    .await
            }
            DownloadStrategy::ByReference => {
                let description = match model.model_file_description() {
                    Some(description) => description.clone(),
                    None => self.fetch_manifest(model_id).await?,
                };
                downloader
                    .download_by_reference(&description, target_dir, self.transfer.parallel_process_count)
                    .await
                    .map(|_| ())
            }
        }
    }

    /// 🧊 Restore an archived artifact and wait for it to thaw.
    pub async fn restore_model(
        &self,
        model: &DataScienceModel,
        restore_model_for_hours_specified: Option<i64>,
    ) -> AquaResult<()> {
        let hours = match restore_model_for_hours_specified {
            None => None,
            Some(h) if h > 0 => Some(u32::try_from(h).map_err(|_| restore_hours_error())?),
            Some(_) => return Err(restore_hours_error()),
        };
        let model_id = model.require_id("it can be restored")?;
        let work_request_id = self
            .clients
            .data_science
            .restore_archived_model_artifact(model_id, hours)
            .await?;
        self.poller
            .wait(&work_request_id, &format!("Restoring model {model_id}"))
            .await?;
        Ok(())
    }

    // ===== 🧬 provenance =====

    pub async fn get_provenance(&self, model: &DataScienceModel) -> AquaResult<ModelProvenanceMetadata> {
        let model_id = model.require_id("its provenance can be read")?;
        self.clients
            .data_science
            .get_model_provenance(model_id)
            .await
            .map(ModelProvenanceMetadata::from)
            .map_err(not_found_as(AquaError::ModelProvenanceNotFound))
    }

    pub async fn create_provenance(
        &self,
        model: &mut DataScienceModel,
        provenance: ModelProvenanceMetadata,
    ) -> AquaResult<()> {
        let model_id = model.require_id("its provenance can be created")?;
        let created = self
            .clients
            .data_science
            .create_model_provenance(model_id, &OciModelProvenance::from(&provenance))
            .await?;
        model.set_provenance_metadata(Some(created.into()));
        Ok(())
    }

    pub async fn update_provenance(
        &self,
        model: &mut DataScienceModel,
        provenance: ModelProvenanceMetadata,
    ) -> AquaResult<()> {
        let model_id = model.require_id("its provenance can be updated")?.to_string();
        let stored = self.upsert_provenance(&model_id, &provenance).await?;
        model.set_provenance_metadata(Some(stored));
        Ok(())
    }

    async fn upsert_provenance(
        &self,
        model_id: &str,
        provenance: &ModelProvenanceMetadata,
    ) -> AquaResult<ModelProvenanceMetadata> {
        let the_payload = OciModelProvenance::from(provenance);
        let data_science = &self.clients.data_science;
        let stored = match data_science.get_model_provenance(model_id).await {
            Ok(_) => data_science.update_model_provenance(model_id, &the_payload).await?,
            Err(e) if e.is_not_found() => data_science.create_model_provenance(model_id, &the_payload).await?,
            Err(e) => return Err(e),
        };
        Ok(stored.into())
    }

    // ===== 🔗 by reference =====

    /// ➕ Reference more objects from a model's manifest. Nothing is uploaded until create.
    pub async fn add_artifact(
        &self,
        model: &mut DataScienceModel,
        reference: &ArtifactReference,
    ) -> AquaResult<()> {
        let resolved = reference.resolve()?;
        let the_uri = crate::object_storage_uri::ObjectStorageUri::new(
            &resolved.bucket,
            &resolved.namespace,
            resolved.prefix.clone().unwrap_or_default(),
        )
        .to_string();
        ensure_buckets_versioned(
            &self.clients.object_storage,
            std::slice::from_ref(&the_uri),
            &self.defaults.service_models_bucket,
        )
        .await?;
        add_artifact(&self.clients.object_storage, model.model_file_description_mut(), reference).await
    }

    async fn fetch_manifest(&self, model_id: &str) -> AquaResult<ModelFileDescription> {
        let bytes = self
            .clients
            .data_science
            .get_model_artifact_content(model_id)
            .await
            .map_err(not_found_as(AquaError::ModelArtifactNotFound))?;
        ModelFileDescription::from_json(&bytes)
    }

    // ===== 🧰 plumbing =====

    fn fill_defaults(&self, model: &mut DataScienceModel) {
        for (local, fallback) in [
            ("compartment_id", &self.defaults.compartment_id),
            ("project_id", &self.defaults.project_id),
        ] {
            if let Some(slot) = model.string_slot_mut(local) {
                if slot.is_none() {
                    slot.clone_from(fallback);
                }
            }
        }
    }

    /// 🚦 Decide how the artifact travels. By-reference manifests are built here too.
    async fn plan_upload(
        &self,
        model: &mut DataScienceModel,
        options: &CreateOptions,
    ) -> AquaResult<Option<UploadStrategy>> {
        let by_reference = options.model_by_reference || model.is_model_created_by_reference();

        let Some(artifact) = model.artifact().cloned() else {
            // -- 🔗 a manifest assembled with add_artifact is an artifact too
            return Ok(match model.model_file_description() {
                Some(description) if !description.models.is_empty() => {
                    let uris = description.bucket_uris();
                    model.mark_created_by_reference();
                    Some(UploadStrategy::ByReference { uris })
                }
                _ => None,
            });
        };

        let strategy = select_upload(
            &artifact,
            options.bucket_uri.as_deref(),
            by_reference,
            self.transfer.max_artifact_size_bytes,
            archive::folder_size,
        )?;

        if let UploadStrategy::ByReference { uris } = &strategy {
            ensure_referenceable(uris)?;
            ensure_buckets_versioned(
                &self.clients.object_storage,
                uris,
                &self.defaults.service_models_bucket,
            )
            .await?;
            let description = build_manifest(&self.clients.object_storage, uris).await?;
            model.set_model_file_description(Some(description));
            model.mark_created_by_reference();
        }
        Ok(Some(strategy))
    }

    async fn execute_upload(
        &self,
        model: &DataScienceModel,
        model_id: &str,
        strategy: UploadStrategy,
        options: &CreateOptions,
    ) -> AquaResult<()> {
        let uploader = self.uploader();
        match strategy {
            UploadStrategy::ByReference { .. } => {
                let description = model.model_file_description().ok_or_else(|| {
                    AquaError::ModelFileDescription(
                        "The model by reference has no model file description.".to_string(),
                    )
                })?;
                uploader.upload_manifest(model_id, description).await
            }
            UploadStrategy::Small { path } => uploader.upload_small(model_id, &path).await,
            UploadStrategy::Large { bucket_uri, source } => {
                let the_options = UploadOptions {
                    overwrite_existing_artifact: options.overwrite_existing_artifact,
                    remove_existing_artifact: options.remove_existing_artifact,
                    parallel_process_count: options
                        .parallel_process_count
                        .unwrap_or(self.transfer.parallel_process_count),
                    part_size_bytes: self.transfer.part_size_bytes,
                    region: options.region.clone().unwrap_or_else(|| self.clients.region.clone()),
                };
                uploader
                    .upload_large(model_id, &bucket_uri, &source, &the_options)
                    .await
            }
        }
    }
}

fn restore_hours_error() -> AquaError {
    AquaError::InvalidArgument(
        "restore_model_for_hours_specified must be a positive integer.".to_string(),
    )
}

/// 🔁 Translate a remote 404 into the named error for whatever went missing.
pub(crate) fn not_found_as(named: AquaError) -> impl FnOnce(AquaError) -> AquaError {
    move |e| if e.is_not_found() { named } else { e }
}

/// 📎 `attachment; filename="m1.zip"` → `m1.zip`.
fn disposition_filename(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

/// 📁 A non-empty target needs `force_overwrite`; with it, the old contents go.
async fn prepare_target_dir(target_dir: &Path, force_overwrite: bool) -> AquaResult<()> {
    let is_occupied = match tokio::fs::read_dir(target_dir).await {
        Ok(mut entries) => entries.next_entry().await?.is_some(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };
    if is_occupied {
        if !force_overwrite {
            return Err(AquaError::InvalidArgument(format!(
                "The target_dir `{}` is not empty. Set `force_overwrite` to true to overwrite its content.",
                target_dir.display()
            )));
        }
        debug!("💣 clearing {}", target_dir.display());
        tokio::fs::remove_dir_all(target_dir).await?;
    }
    tokio::fs::create_dir_all(target_dir).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::metadata::MetadataItem;
    use crate::oci::mocked_config;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn the_catalog(server: &MockServer, tweak: impl FnOnce(&mut AppConfig)) -> ModelCatalog {
        let mut config = AppConfig::default();
        config.oci = mocked_config(&server.uri());
        config.transfer.poll_interval_secs = 0;
        tweak(&mut config);
        ModelCatalog::from_config(&config).unwrap()
    }

    fn not_found() -> ResponseTemplate {
        ResponseTemplate::new(404).set_body_json(json!({"code": "NotAuthorizedOrNotFound", "message": "nope"}))
    }

    async fn mount_model(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/models/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/m1/provenance"))
            .respond_with(not_found())
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn the_one_where_nobody_said_which_compartment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut model = DataScienceModel::new().with_project_id("proj");
        let err = the_catalog(&server, |_| {})
            .create(&mut model, &CreateOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Compartment id must be provided.");

        let mut model = DataScienceModel::new().with_compartment_id("comp");
        let err = the_catalog(&server, |_| {})
            .create(&mut model, &CreateOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Project id must be provided.");
    }

    #[tokio::test]
    async fn the_one_where_the_artifact_is_too_big_and_nothing_gets_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("weights.bin"), vec![0u8; 100]).unwrap();
        let mut model = DataScienceModel::new()
            .with_compartment_id("comp")
            .with_project_id("proj")
            .with_artifact(dir.path().display().to_string());

        let err = the_catalog(&server, |c| c.transfer.max_artifact_size_bytes = 10)
            .create(&mut model, &CreateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::ModelArtifactSizeError { .. }));
        assert!(model.id().is_none());
    }

    #[tokio::test]
    async fn the_one_where_a_small_model_is_born_and_synced() {
        let server = MockServer::start().await;
        let the_record = json!({
            "id": "m1", "compartmentId": "comp", "projectId": "proj",
            "displayName": "tiny", "lifecycleState": "ACTIVE"
        });
        Mock::given(method("POST"))
            .and(path("/models"))
            .and(body_partial_json(json!({"compartmentId": "comp", "displayName": "tiny"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(the_record.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/models/m1/content"))
            .and(header("content-disposition", "attachment; filename=\"m1.zip\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/models/m1/content"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-disposition", "attachment; filename=\"m1.zip\""),
            )
            .mount(&server)
            .await;
        mount_model(&server, the_record).await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("score.py"), b"def predict(): pass").unwrap();
        let mut model = DataScienceModel::new()
            .with_compartment_id("comp")
            .with_project_id("proj")
            .with_display_name("tiny")
            .with_artifact(dir.path().display().to_string());

        the_catalog(&server, |_| {})
            .create(&mut model, &CreateOptions::default())
            .await
            .unwrap();
        assert_eq!(model.id(), Some("m1"));
        assert_eq!(model.lifecycle_state(), Some("ACTIVE"));
        assert_eq!(model.artifact(), Some(&ArtifactLocation::from("m1.zip")));
    }

    #[tokio::test]
    async fn the_one_where_a_nameless_model_gets_a_random_name() {
        let server = MockServer::start().await;
        let the_record = json!({"id": "m1", "compartmentId": "comp", "projectId": "proj"});
        Mock::given(method("POST"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(the_record.clone()))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/models/m1/content"))
            .respond_with(not_found())
            .mount(&server)
            .await;
        mount_model(&server, the_record).await;

        let mut model = DataScienceModel::new()
            .with_compartment_id("comp")
            .with_project_id("proj");
        the_catalog(&server, |_| {})
            .create(&mut model, &CreateOptions::default())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let the_create = requests
            .iter()
            .find(|r| r.method.as_str() == "POST")
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&the_create.body).unwrap();
        assert!(body["displayName"].as_str().unwrap().starts_with("datascience_model-"));
        assert!(model.artifact().is_none());
    }

    #[tokio::test]
    async fn the_one_where_an_active_deployment_blocks_the_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources"))
            .and(body_partial_json(json!({
                "query": "query datasciencemodeldeployment resources where ModelId='m1'"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [
                {"identifier": "md1", "lifecycleState": "ACTIVE"},
                {"identifier": "md2", "lifecycleState": "DELETED"}
            ]})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/models/m1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let mut model = DataScienceModel::new().with_id("m1");
        let err = the_catalog(&server, |_| {}).delete(&mut model, false).await.unwrap_err();
        assert!(matches!(err, AquaError::ModelWithActiveDeployment));
    }

    #[tokio::test]
    async fn the_one_where_the_deployment_goes_down_with_the_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [
                {"identifier": "md1", "lifecycleState": "ACTIVE"}
            ]})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/modelDeployments/md1"))
            .respond_with(ResponseTemplate::new(202).insert_header("opc-work-request-id", "wr-md"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/workRequests/wr-md"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "wr-md", "status": "SUCCEEDED"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/models/m1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/m1"))
            .respond_with(not_found())
            .mount(&server)
            .await;

        let mut model = DataScienceModel::new().with_id("m1");
        the_catalog(&server, |_| {}).delete(&mut model, true).await.unwrap();
        assert_eq!(model.lifecycle_state(), Some("DELETED"));
    }

    #[tokio::test]
    async fn the_one_where_preconditions_win_the_race() {
        let server = MockServer::start().await;
        let catalog = the_catalog(&server, |_| {});

        let err = catalog.from_id("").await.unwrap_err();
        assert_eq!(err.to_string(), "Model OCID not provided.");

        let saved = DataScienceModel::new().with_id("m1");
        let err = catalog.restore_model(&saved, Some(0)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "restore_model_for_hours_specified must be a positive integer."
        );

        let mut unsaved = DataScienceModel::new();
        let err = catalog.update(&mut unsaved).await.unwrap_err();
        assert!(matches!(err, AquaError::ModelNotSaved(_)));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn the_one_where_sync_reads_the_manifest_for_a_referenced_model() {
        let server = MockServer::start().await;
        mount_model(
            &server,
            json!({
                "id": "m1",
                "customMetadataList": [{"key": "modelDescription", "value": "true"}]
            }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/models/m1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": "1.0",
                "type": "modelOSSReferenceDescription",
                "models": [{
                    "namespace": "ns", "bucketName": "models", "prefix": "llama/",
                    "objects": [{"name": "llama/w.bin", "version": "v1", "sizeInBytes": 5}]
                }]
            })))
            .mount(&server)
            .await;

        let model = the_catalog(&server, |_| {}).from_id("m1").await.unwrap();
        assert!(model.is_model_created_by_reference());
        assert_eq!(
            model.artifact(),
            Some(&ArtifactLocation::from("oci://models@ns/llama/"))
        );
        assert_eq!(model.model_file_description().unwrap().total_size(), 5);
    }

    #[tokio::test]
    async fn the_one_where_a_hand_built_manifest_is_the_whole_artifact() {
        let server = MockServer::start().await;
        let the_record = json!({
            "id": "m1", "compartmentId": "comp", "projectId": "proj", "displayName": "llama",
            "customMetadataList": [{"key": "modelDescription", "value": "true"}]
        });
        Mock::given(method("POST"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(the_record.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/models/m1/content"))
            .and(header("content-disposition", "attachment; filename=\"model_description.json\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/m1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": "1.0",
                "type": "modelOSSReferenceDescription",
                "models": [{
                    "namespace": "ns", "bucketName": "models", "prefix": "llama/",
                    "objects": [{"name": "llama/w.bin", "version": "v1", "sizeInBytes": 5}]
                }]
            })))
            .mount(&server)
            .await;
        mount_model(&server, the_record).await;

        let the_manifest = ModelFileDescription::from_json(
            br#"{
                "version": "1.0",
                "type": "modelOSSReferenceDescription",
                "models": [{
                    "namespace": "ns", "bucketName": "models", "prefix": "llama/",
                    "objects": [{"name": "llama/w.bin", "version": "v1", "sizeInBytes": 5}]
                }]
            }"#,
        )
        .unwrap();
        let mut model = DataScienceModel::new()
            .with_compartment_id("comp")
            .with_project_id("proj")
            .with_display_name("llama")
            .with_model_file_description(the_manifest);

        the_catalog(&server, |_| {})
            .create(&mut model, &CreateOptions::default())
            .await
            .unwrap();
        assert!(model.is_model_created_by_reference());
        assert_eq!(
            model.artifact(),
            Some(&ArtifactLocation::from("oci://models@ns/llama/"))
        );
    }

    #[tokio::test]
    async fn the_one_where_update_upserts_a_missing_provenance() {
        let server = MockServer::start().await;
        let the_record = json!({"id": "m1", "displayName": "renamed"});
        Mock::given(method("PUT"))
            .and(path("/models/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(the_record.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/m1/provenance"))
            .and(body_partial_json(json!({"gitBranch": "main"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"gitBranch": "main"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/models/m1/content"))
            .respond_with(not_found())
            .mount(&server)
            .await;
        mount_model(&server, the_record).await;

        let mut model = DataScienceModel::new()
            .with_id("m1")
            .with_display_name("renamed")
            .with_provenance_metadata(ModelProvenanceMetadata {
                git_branch: Some("main".into()),
                ..Default::default()
            });
        the_catalog(&server, |_| {}).update(&mut model).await.unwrap();
        assert_eq!(model.display_name(), Some("renamed"));
    }

    #[tokio::test]
    async fn the_one_where_the_provenance_is_nowhere_to_be_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/m1/provenance"))
            .respond_with(not_found())
            .expect(1)
            .mount(&server)
            .await;

        let model = DataScienceModel::new().with_id("m1");
        let err = the_catalog(&server, |_| {})
            .get_provenance(&model)
            .await
            .unwrap_err();
        assert!(matches!(err, AquaError::ModelProvenanceNotFound));
    }

    #[tokio::test]
    async fn the_one_where_the_provenance_comes_home_in_local_spelling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/m1/provenance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "gitBranch": "main",
                "trainingScript": "train.py"
            })))
            .mount(&server)
            .await;

        let model = DataScienceModel::new().with_id("m1");
        let provenance = the_catalog(&server, |_| {}).get_provenance(&model).await.unwrap();
        assert_eq!(provenance.git_branch.as_deref(), Some("main"));
        assert_eq!(provenance.training_script_path.as_deref(), Some("train.py"));
    }

    #[tokio::test]
    async fn the_one_where_provenance_is_created_then_rewritten() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/m1/provenance"))
            .and(body_partial_json(json!({"gitCommit": "abc123", "trainingScript": "train.py"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "gitCommit": "abc123",
                "trainingScript": "train.py"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/m1/provenance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"gitCommit": "abc123"})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/models/m1/provenance"))
            .and(body_partial_json(json!({"gitCommit": "def456", "repositoryUrl": "https://git.example/repo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "gitCommit": "def456",
                "repositoryUrl": "https://git.example/repo"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let catalog = the_catalog(&server, |_| {});
        let mut model = DataScienceModel::new().with_id("m1");
        catalog
            .create_provenance(
                &mut model,
                ModelProvenanceMetadata {
                    git_commit: Some("abc123".into()),
                    training_script_path: Some("train.py".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            model.provenance_metadata().and_then(|p| p.training_script_path.as_deref()),
            Some("train.py")
        );

        catalog
            .update_provenance(
                &mut model,
                ModelProvenanceMetadata {
                    git_commit: Some("def456".into()),
                    repository_url: Some("https://git.example/repo".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let stored = model.provenance_metadata().unwrap();
        assert_eq!(stored.git_commit.as_deref(), Some("def456"));
        assert_eq!(stored.repository_url.as_deref(), Some("https://git.example/repo"));
    }

    #[tokio::test]
    async fn the_one_where_the_target_dir_is_not_empty() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let target = tempfile::tempdir().unwrap();
        std::fs::write(target.path().join("old.txt"), b"old").unwrap();
        let model = DataScienceModel::new().with_id("m1").with_artifact("m1.zip");

        let err = the_catalog(&server, |_| {})
            .download_artifact(&model, target.path(), &DownloadOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is not empty. Set `force_overwrite` to true"));
        assert!(target.path().join("old.txt").exists());
    }

    #[tokio::test]
    async fn the_one_where_list_defaults_to_user_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(wiremock::matchers::query_param("category", "USER"))
            .and(wiremock::matchers::query_param("compartmentId", "comp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "m1", "displayName": "one"},
                {"id": "m2", "displayName": "two"}
            ])))
            .mount(&server)
            .await;

        let models = the_catalog(&server, |c| c.defaults.compartment_id = Some("comp".into()))
            .list(None, None, None)
            .await
            .unwrap();
        let the_names: Vec<_> = models.iter().filter_map(|m| m.display_name()).collect();
        assert_eq!(the_names, vec!["one", "two"]);
    }

    #[test]
    fn the_one_where_the_filename_is_dug_out_of_the_header() {
        assert_eq!(
            disposition_filename("attachment; filename=\"m1.zip\"").as_deref(),
            Some("m1.zip")
        );
        assert_eq!(disposition_filename("attachment").as_deref(), None);
        let flagged = DataScienceModel::new().with_custom_metadata_list(
            [MetadataItem::new("modelDescription", "TRUE")].into_iter().collect(),
        );
        assert!(flagged.is_model_created_by_reference());
    }
}
