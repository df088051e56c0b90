//! 🧪 Data Science service client: models, their artifacts, and the paperwork around them.
//!
//! Thin on purpose. Every method is one REST call; translating 404s into named
//! errors is the caller's business because only the caller knows *what* was
//! not found.

use std::collections::BTreeMap;

use reqwest::Method;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::transport::{OPC_WORK_REQUEST_ID, OciTransport, RawResponse, endpoint_url};
use crate::error::{AquaError, AquaResult};

/// 📦 The remote model resource, exactly as the service spells it.
///
/// Nested fields stay as raw JSON here; [`crate::model::oci_model`] owns the
/// conversions so the failure policy lives in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciModelResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compartment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defined_tags: Option<BTreeMap<String, BTreeMap<String, Value>>>,
    /// 📐 JSON-encoded schema string on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata_list: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defined_metadata_list: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version_set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_setting: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_setting: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_operation_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_operation_details: Option<Value>,
}

/// 🧬 Provenance: where the model came from, per its birth certificate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciModelProvenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_id: Option<String>,
}

/// ⏳ A work request, as far as polling cares.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequest {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub operation_type: Option<String>,
    #[serde(default)]
    pub percent_complete: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkRequestError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// 🏷️ The two families of metadata that can carry artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataArtifactKind {
    Custom,
    Defined,
}

impl MetadataArtifactKind {
    fn path_segment(&self) -> &'static str {
        match self {
            MetadataArtifactKind::Custom => "customMetadata",
            MetadataArtifactKind::Defined => "definedMetadata",
        }
    }
}

/// 🪣 Where import/export should stage the artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBucketDetails {
    pub namespace: String,
    pub bucket: String,
    pub object_name: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct DataScienceClient {
    transport: OciTransport,
    base: String,
}

impl DataScienceClient {
    pub const ENDPOINT_TEMPLATE: &'static str =
        "https://datascience.{region}.oci.oraclecloud.com/20190101";

    pub fn new(transport: OciTransport, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    fn url(&self, segments: &[&str]) -> AquaResult<url::Url> {
        endpoint_url(&self.base, segments)
    }

    // ===== 📦 models =====

    pub async fn create_model(&self, details: &OciModelResource) -> AquaResult<OciModelResource> {
        let url = self.url(&["models"])?;
        self.transport
            .json(self.transport.request(Method::POST, url).json(details))
            .await
    }

    pub async fn get_model(&self, model_id: &str) -> AquaResult<OciModelResource> {
        let url = self.url(&["models", model_id])?;
        self.transport.json(self.transport.request(Method::GET, url)).await
    }

    pub async fn update_model(
        &self,
        model_id: &str,
        details: &OciModelResource,
    ) -> AquaResult<OciModelResource> {
        let url = self.url(&["models", model_id])?;
        self.transport
            .json(self.transport.request(Method::PUT, url).json(details))
            .await
    }

    pub async fn delete_model(&self, model_id: &str) -> AquaResult<()> {
        let url = self.url(&["models", model_id])?;
        self.transport
            .execute(self.transport.request(Method::DELETE, url))
            .await?;
        Ok(())
    }

    pub async fn list_models(
        &self,
        compartment_id: &str,
        project_id: Option<&str>,
        category: Option<&str>,
    ) -> AquaResult<Vec<OciModelResource>> {
        let url = self.url(&["models"])?;
        self.transport
            .list_all(|page| {
                let mut the_query: Vec<(&str, &str)> = vec![("compartmentId", compartment_id)];
                if let Some(project) = project_id {
                    the_query.push(("projectId", project));
                }
                if let Some(category) = category {
                    the_query.push(("category", category));
                }
                if let Some(page) = page {
                    the_query.push(("page", page));
                }
                self.transport
                    .request(Method::GET, url.clone())
                    .query(&the_query)
            })
            .await
    }

    // ===== 🧬 provenance =====

    pub async fn create_model_provenance(
        &self,
        model_id: &str,
        details: &OciModelProvenance,
    ) -> AquaResult<OciModelProvenance> {
        let url = self.url(&["models", model_id, "provenance"])?;
        self.transport
            .json(self.transport.request(Method::POST, url).json(details))
            .await
    }

    pub async fn update_model_provenance(
        &self,
        model_id: &str,
        details: &OciModelProvenance,
    ) -> AquaResult<OciModelProvenance> {
        let url = self.url(&["models", model_id, "provenance"])?;
        self.transport
            .json(self.transport.request(Method::PUT, url).json(details))
            .await
    }

    pub async fn get_model_provenance(&self, model_id: &str) -> AquaResult<OciModelProvenance> {
        let url = self.url(&["models", model_id, "provenance"])?;
        self.transport.json(self.transport.request(Method::GET, url)).await
    }

    // ===== 🗜️ artifact =====

    pub async fn head_model_artifact(&self, model_id: &str) -> AquaResult<RawResponse> {
        let url = self.url(&["models", model_id, "content"])?;
        self.transport.raw(self.transport.request(Method::HEAD, url)).await
    }

    pub async fn get_model_artifact_content(&self, model_id: &str) -> AquaResult<Vec<u8>> {
        let url = self.url(&["models", model_id, "content"])?;
        Ok(self
            .transport
            .raw(self.transport.request(Method::GET, url))
            .await?
            .body)
    }

    pub async fn create_model_artifact(
        &self,
        model_id: &str,
        content: Vec<u8>,
        content_disposition: &str,
    ) -> AquaResult<RawResponse> {
        let url = self.url(&["models", model_id, "content"])?;
        self.transport
            .raw(
                self.transport
                    .request(Method::PUT, url)
                    .header(CONTENT_DISPOSITION, content_disposition)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(content),
            )
            .await
    }

    /// 📥 Ask the catalog to copy the artifact *into* a bucket. Returns the work request id.
    pub async fn import_model_artifact(
        &self,
        model_id: &str,
        details: &ArtifactBucketDetails,
    ) -> AquaResult<String> {
        let url = self.url(&["models", model_id, "actions", "importArtifact"])?;
        let body = serde_json::json!({
            "artifactImportDetails": {
                "artifactSourceType": "ORACLE_OBJECT_STORAGE",
                "namespace": details.namespace,
                "destinationBucket": details.bucket,
                "destinationObjectName": details.object_name,
                "destinationRegion": details.region,
            }
        });
        let response = self
            .transport
            .raw(self.transport.request(Method::POST, url).json(&body))
            .await?;
        work_request_id(&response)
    }

    /// 📤 Ask the catalog to pull the artifact *from* a bucket. Returns the work request id.
    pub async fn export_model_artifact(
        &self,
        model_id: &str,
        details: &ArtifactBucketDetails,
    ) -> AquaResult<String> {
        let url = self.url(&["models", model_id, "actions", "exportArtifact"])?;
        let body = serde_json::json!({
            "artifactExportDetails": {
                "artifactSourceType": "ORACLE_OBJECT_STORAGE",
                "namespace": details.namespace,
                "sourceBucket": details.bucket,
                "sourceObjectName": details.object_name,
                "sourceRegion": details.region,
            }
        });
        let response = self
            .transport
            .raw(self.transport.request(Method::POST, url).json(&body))
            .await?;
        work_request_id(&response)
    }

    pub async fn restore_archived_model_artifact(
        &self,
        model_id: &str,
        restore_for_hours: Option<u32>,
    ) -> AquaResult<String> {
        let url = self.url(&["models", model_id, "actions", "restore"])?;
        let mut builder = self.transport.request(Method::POST, url);
        if let Some(hours) = restore_for_hours {
            builder = builder.query(&[("restoreModelForHoursSpecified", hours)]);
        }
        let response = self.transport.raw(builder).await?;
        work_request_id(&response)
    }

    // ===== 🏷️ metadata artifacts =====

    fn metadata_url(
        &self,
        kind: MetadataArtifactKind,
        model_id: &str,
        key: &str,
        tail: &[&str],
    ) -> AquaResult<url::Url> {
        let mut segments = vec!["models", model_id, kind.path_segment(), key, "artifact"];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    pub async fn create_metadata_artifact(
        &self,
        kind: MetadataArtifactKind,
        model_id: &str,
        key: &str,
        content: Vec<u8>,
        content_disposition: &str,
    ) -> AquaResult<RawResponse> {
        let url = self.metadata_url(kind, model_id, key, &[])?;
        self.transport
            .raw(
                self.transport
                    .request(Method::POST, url)
                    .header(CONTENT_DISPOSITION, content_disposition)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(content),
            )
            .await
    }

    pub async fn update_metadata_artifact(
        &self,
        kind: MetadataArtifactKind,
        model_id: &str,
        key: &str,
        content: Vec<u8>,
        content_disposition: &str,
    ) -> AquaResult<RawResponse> {
        let url = self.metadata_url(kind, model_id, key, &[])?;
        self.transport
            .raw(
                self.transport
                    .request(Method::PUT, url)
                    .header(CONTENT_DISPOSITION, content_disposition)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(content),
            )
            .await
    }

    pub async fn get_metadata_artifact_content(
        &self,
        kind: MetadataArtifactKind,
        model_id: &str,
        key: &str,
    ) -> AquaResult<Vec<u8>> {
        let url = self.metadata_url(kind, model_id, key, &["content"])?;
        Ok(self
            .transport
            .raw(self.transport.request(Method::GET, url))
            .await?
            .body)
    }

    pub async fn head_metadata_artifact(
        &self,
        kind: MetadataArtifactKind,
        model_id: &str,
        key: &str,
    ) -> AquaResult<RawResponse> {
        let url = self.metadata_url(kind, model_id, key, &["head"])?;
        self.transport.raw(self.transport.request(Method::HEAD, url)).await
    }

    pub async fn delete_metadata_artifact(
        &self,
        kind: MetadataArtifactKind,
        model_id: &str,
        key: &str,
    ) -> AquaResult<RawResponse> {
        let url = self.metadata_url(kind, model_id, key, &[])?;
        self.transport.raw(self.transport.request(Method::DELETE, url)).await
    }

    // ===== ⏳ work requests =====

    pub async fn get_work_request(&self, work_request_id: &str) -> AquaResult<WorkRequest> {
        let url = self.url(&["workRequests", work_request_id])?;
        self.transport.json(self.transport.request(Method::GET, url)).await
    }

    pub async fn list_work_request_errors(
        &self,
        work_request_id: &str,
    ) -> AquaResult<Vec<WorkRequestError>> {
        let url = self.url(&["workRequests", work_request_id, "errors"])?;
        self.transport
            .list_all(|page| {
                let builder = self.transport.request(Method::GET, url.clone());
                match page {
                    Some(p) => builder.query(&[("page", p)]),
                    None => builder,
                }
            })
            .await
    }

    // ===== 🚀 deployments =====

    /// 🗑️ Returns the work request id when the service hands one back.
    pub async fn delete_model_deployment(&self, deployment_id: &str) -> AquaResult<Option<String>> {
        let url = self.url(&["modelDeployments", deployment_id])?;
        let response = self
            .transport
            .raw(self.transport.request(Method::DELETE, url))
            .await?;
        Ok(response.header(OPC_WORK_REQUEST_ID).map(str::to_string))
    }

    // ===== 📋 listings for the UI =====

    async fn list_in_compartment(
        &self,
        resource: &str,
        compartment_id: &str,
        extra: &[(&str, &str)],
    ) -> AquaResult<Vec<Value>> {
        let url = self.url(&[resource])?;
        self.transport
            .list_all(|page| {
                let mut the_query: Vec<(&str, &str)> = vec![("compartmentId", compartment_id)];
                the_query.extend_from_slice(extra);
                if let Some(page) = page {
                    the_query.push(("page", page));
                }
                self.transport
                    .request(Method::GET, url.clone())
                    .query(&the_query)
            })
            .await
    }

    pub async fn list_model_version_sets(&self, compartment_id: &str) -> AquaResult<Vec<Value>> {
        self.list_in_compartment("modelVersionSets", compartment_id, &[("lifecycleState", "ACTIVE")])
            .await
    }

    pub async fn list_job_shapes(&self, compartment_id: &str) -> AquaResult<Vec<Value>> {
        self.list_in_compartment("jobShapes", compartment_id, &[]).await
    }

    pub async fn list_model_deployment_shapes(&self, compartment_id: &str) -> AquaResult<Vec<Value>> {
        self.list_in_compartment("modelDeploymentShapes", compartment_id, &[])
            .await
    }

    pub async fn list_private_endpoints(
        &self,
        compartment_id: &str,
        resource_type: &str,
    ) -> AquaResult<Vec<Value>> {
        self.list_in_compartment(
            "dataSciencePrivateEndpoints",
            compartment_id,
            &[("dataScienceResourceType", resource_type)],
        )
        .await
    }

    pub async fn list_containers(&self) -> AquaResult<Vec<Value>> {
        let url = self.url(&["containers"])?;
        self.transport
            .list_all(|page| {
                let builder = self.transport.request(Method::GET, url.clone());
                match page {
                    Some(p) => builder.query(&[("page", p)]),
                    None => builder,
                }
            })
            .await
    }
}

fn work_request_id(response: &RawResponse) -> AquaResult<String> {
    response
        .header(OPC_WORK_REQUEST_ID)
        .map(str::to_string)
        .ok_or_else(|| {
            AquaError::MissingField(format!(
                "💀 the service did not return an `{OPC_WORK_REQUEST_ID}` header"
            ))
        })
}
