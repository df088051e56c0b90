//! 📤 Getting model bytes *into* the catalog.
//!
//! 🎬 COLD OPEN: INT. OBJECT STORAGE: 3 PARTS INTO A 400 PART UPLOAD
//!
//! Small artifacts take the elevator: zip, PUT, done. Large ones take the
//! freight route: zip to a temp file, multipart into a staging bucket with a
//! little worker pool, then ask the catalog to export from there and wait on
//! the work request like everyone else.
//!
//! 🦆 The duck asked why not just PUT the big ones. The service said 2 GiB. The duck went quiet.

use std::path::{Path, PathBuf};

use async_channel::{Receiver, Sender};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::artifact::archive;
use crate::artifact::selector::LargeSource;
use crate::error::{AquaError, AquaResult};
use crate::model::by_reference::{MODEL_BY_REFERENCE_JSON_FILE_NAME, ModelFileDescription};
use crate::oci::data_science::ArtifactBucketDetails;
use crate::oci::object_storage::CommitPart;
use crate::oci::{DataScienceClient, ObjectStorageClient};
use crate::object_storage_uri::ObjectStorageUri;
use crate::progress::TransferProgress;
use crate::work_request::WorkRequestPoller;

/// 🎛️ Knobs for a large transfer.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// 🔁 When false, an existing staged object is a [`AquaError::FileExists`].
    pub overwrite_existing_artifact: bool,
    /// 🧹 Delete the staged copy once the catalog has pulled it in.
    pub remove_existing_artifact: bool,
    pub parallel_process_count: usize,
    pub part_size_bytes: usize,
    pub region: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            overwrite_existing_artifact: true,
            remove_existing_artifact: true,
            parallel_process_count: 4,
            part_size_bytes: 128 * 1024 * 1024,
            region: String::new(),
        }
    }
}

/// 📎 Where a model's zip is staged inside `bucket_uri`.
///
/// A prefix that looks like a folder gets `{model_id}.zip` appended; anything
/// else is taken as the object name itself.
pub(crate) fn staged_object(bucket_uri: &ObjectStorageUri, model_id: &str) -> ObjectStorageUri {
    if bucket_uri.prefix.is_empty() || bucket_uri.prefix.ends_with('/') {
        bucket_uri.join(&format!("{model_id}.zip"))
    } else {
        bucket_uri.clone()
    }
}

pub(crate) fn attachment_disposition(file_name: &str) -> String {
    format!("attachment; filename=\"{file_name}\"")
}

#[derive(Debug, Clone)]
pub struct ArtifactUploader {
    data_science: DataScienceClient,
    object_storage: ObjectStorageClient,
    poller: WorkRequestPoller,
}

impl ArtifactUploader {
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

    /// 📬 Zip `path` and PUT it straight into the catalog.
    pub async fn upload_small(&self, model_id: &str, path: &Path) -> AquaResult<()> {
        let the_source = path.to_path_buf();
        let bytes = tokio::task::spawn_blocking(move || archive::zip_to_bytes(&the_source))
            .await
            .map_err(|e| AquaError::Io(std::io::Error::other(e)))??;
        info!("📬 uploading {} bytes to model {}", bytes.len(), model_id);
        self.data_science
            .create_model_artifact(
                model_id,
                bytes,
                &attachment_disposition(&format!("{model_id}.zip")),
            )
            .await?;
        Ok(())
    }

    /// 📜 A by-reference model's artifact is just its manifest.
    pub async fn upload_manifest(
        &self,
        model_id: &str,
        description: &ModelFileDescription,
    ) -> AquaResult<()> {
        let bytes = description.to_json_pretty()?;
        debug!("📜 uploading manifest for {} ({} bytes)", model_id, bytes.len());
        self.data_science
            .create_model_artifact(
                model_id,
                bytes,
                &attachment_disposition(MODEL_BY_REFERENCE_JSON_FILE_NAME),
            )
            .await?;
        Ok(())
    }

    /// 🚛 Stage (if needed), export into the catalog, wait, tidy up.
    pub async fn upload_large(
        &self,
        model_id: &str,
        bucket_uri: &ObjectStorageUri,
        source: &LargeSource,
        options: &UploadOptions,
    ) -> AquaResult<()> {
        let (the_object, staged_by_us) = match source {
            LargeSource::InBucket => (bucket_uri.clone(), false),
            LargeSource::Local(path) => {
                let the_object = staged_object(bucket_uri, model_id);
                self.stage_local(path, &the_object, options).await?;
                (the_object, true)
            }
        };

        let details = ArtifactBucketDetails {
            namespace: the_object.namespace.clone(),
            bucket: the_object.bucket.clone(),
            object_name: the_object.prefix.clone(),
            region: options.region.clone(),
        };
        let work_request_id = self
            .data_science
            .export_model_artifact(model_id, &details)
            .await?;
        info!("📤 export of {} started as work request {}", the_object, work_request_id);
        self.poller
            .wait(&work_request_id, &format!("Exporting model artifact from {the_object}"))
            .await?;

        // -- 🧹 only ever the copy we made; a caller's own object stays put
        if staged_by_us && options.remove_existing_artifact {
            debug!("🧹 removing staged artifact {}", the_object);
            self.object_storage
                .delete_object(&the_object.namespace, &the_object.bucket, &the_object.prefix)
                .await?;
        }
        Ok(())
    }

    async fn stage_local(
        &self,
        path: &Path,
        the_object: &ObjectStorageUri,
        options: &UploadOptions,
    ) -> AquaResult<()> {
        if !options.overwrite_existing_artifact {
            match self
                .object_storage
                .head_object(&the_object.namespace, &the_object.bucket, &the_object.prefix)
                .await
            {
                Ok(_) => return Err(AquaError::FileExists(the_object.to_string())),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let the_staging_dir = tempfile::tempdir()?;
        let the_zip = the_staging_dir.path().join("artifact.zip");
        let (the_source, the_target) = (path.to_path_buf(), the_zip.clone());
        let size = tokio::task::spawn_blocking(move || archive::zip_to_file(&the_source, &the_target))
            .await
            .map_err(|e| AquaError::Io(std::io::Error::other(e)))??;

        MultipartUpload {
            object_storage: self.object_storage.clone(),
            target: the_object.clone(),
            file: the_zip,
            size,
            part_size: options.part_size_bytes.max(1) as u64,
            workers: options.parallel_process_count.max(1),
        }
        .run()
        .await
    }
}

/// 🧩 One multipart upload of one local file.
struct MultipartUpload {
    object_storage: ObjectStorageClient,
    target: ObjectStorageUri,
    file: PathBuf,
    size: u64,
    part_size: u64,
    workers: usize,
}

impl MultipartUpload {
    async fn run(self) -> AquaResult<()> {
        let the_target = &self.target;
        let upload_id = self
            .object_storage
            .create_multipart_upload(&the_target.namespace, &the_target.bucket, &the_target.prefix)
            .await?;
        let progress = TransferProgress::new(&format!("Uploading to {the_target}"), self.size);

        match self.upload_parts(&upload_id, &progress).await {
            Ok(mut parts) => {
                parts.sort_by_key(|p| p.part_num);
                self.object_storage
                    .commit_multipart_upload(
                        &the_target.namespace,
                        &the_target.bucket,
                        &the_target.prefix,
                        &upload_id,
                        &parts,
                    )
                    .await?;
                progress.finish(format!("✅ Uploaded {} parts to {the_target}", parts.len()));
                Ok(())
            }
            Err(e) => {
                progress.abandon(format!("💀 Upload to {the_target} failed"));
                if let Err(abort_err) = self
                    .object_storage
                    .abort_multipart_upload(
                        &the_target.namespace,
                        &the_target.bucket,
                        &the_target.prefix,
                        &upload_id,
                    )
                    .await
                {
                    warn!("⚠️ could not abort multipart upload {}: {}", upload_id, abort_err);
                }
                Err(e)
            }
        }
    }

    fn part_count(&self) -> u32 {
        // -- 🧮 an empty file still needs one (empty) part
        self.size.div_ceil(self.part_size).max(1) as u32
    }

    async fn upload_parts(&self, upload_id: &str, progress: &TransferProgress) -> AquaResult<Vec<CommitPart>> {
        let (tx, rx): (Sender<u32>, Receiver<u32>) = async_channel::bounded(self.workers * 2);

        let mut the_handles: Vec<JoinHandle<AquaResult<Vec<CommitPart>>>> = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let worker = PartWorker {
                rx: rx.clone(),
                object_storage: self.object_storage.clone(),
                target: self.target.clone(),
                upload_id: upload_id.to_string(),
                file: self.file.clone(),
                size: self.size,
                part_size: self.part_size,
                progress: progress.clone(),
            };
            the_handles.push(tokio::spawn(worker.drain()));
        }
        drop(rx);

        for part_num in 1..=self.part_count() {
            // -- 🚪 every worker quit early on an error; stop feeding
            if tx.send(part_num).await.is_err() {
                break;
            }
        }
        tx.close();

        let mut parts = Vec::new();
        let mut first_error = None;
        for handle in the_handles {
            match handle.await {
                Ok(Ok(done)) => parts.extend(done),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(join_err) => {
                    first_error.get_or_insert(AquaError::Io(std::io::Error::other(join_err)));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(parts),
        }
    }
}

/// 👷 Pulls part numbers off the channel, reads that slice of the file, ships it.
struct PartWorker {
    rx: Receiver<u32>,
    object_storage: ObjectStorageClient,
    target: ObjectStorageUri,
    upload_id: String,
    file: PathBuf,
    size: u64,
    part_size: u64,
    progress: TransferProgress,
}

impl PartWorker {
    async fn drain(self) -> AquaResult<Vec<CommitPart>> {
        let mut the_file = tokio::fs::File::open(&self.file).await?;
        let mut done = Vec::new();
        while let Ok(part_num) = self.rx.recv().await {
            let offset = u64::from(part_num - 1) * self.part_size;
            let length = self.part_size.min(self.size.saturating_sub(offset));
            let mut buffer = vec![0u8; length as usize];
            the_file.seek(std::io::SeekFrom::Start(offset)).await?;
            the_file.read_exact(&mut buffer).await?;

            let result = self
                .object_storage
                .upload_part(
                    &self.target.namespace,
                    &self.target.bucket,
                    &self.target.prefix,
                    &self.upload_id,
                    part_num,
                    buffer,
                )
                .await;
            match result {
                Ok(etag) => {
                    self.progress.advance(length);
                    done.push(CommitPart { part_num, etag });
                }
                Err(e) => {
                    // -- 🛑 closing the channel tells the feeder and the other workers to stand down
                    self.rx.close();
                    return Err(e);
                }
            }
        }
        Ok(done)
    }
}
