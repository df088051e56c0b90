//! 🪣 Object Storage client: buckets, objects, versions, and the multipart dance.

use std::path::Path;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use super::transport::{OciTransport, RawResponse, endpoint_url};
use crate::error::{AquaError, AquaResult};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub name: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectVersionSummary {
    pub name: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub is_delete_marker: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// 🗂️ "Enabled", "Disabled" or "Suspended".
    #[serde(default)]
    pub versioning: Option<String>,
}

impl Bucket {
    pub fn is_versioned(&self) -> bool {
        self.versioning.as_deref() == Some("Enabled")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsPage {
    #[serde(default)]
    objects: Vec<ObjectSummary>,
    #[serde(default)]
    next_start_with: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultipartUpload {
    upload_id: String,
}

/// 🧩 One committed part of a multipart upload.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitPart {
    pub part_num: u32,
    pub etag: String,
}

#[derive(Debug, Clone)]
pub struct ObjectStorageClient {
    transport: OciTransport,
    base: String,
}

impl ObjectStorageClient {
    pub const ENDPOINT_TEMPLATE: &'static str = "https://objectstorage.{region}.oraclecloud.com";

    pub fn new(transport: OciTransport, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    fn url(&self, segments: &[&str]) -> AquaResult<url::Url> {
        endpoint_url(&self.base, segments)
    }

    pub async fn get_namespace(&self) -> AquaResult<String> {
        let url = self.url(&["n", ""])?;
        self.transport.json(self.transport.request(Method::GET, url)).await
    }

    pub async fn get_bucket(&self, namespace: &str, bucket: &str) -> AquaResult<Bucket> {
        let url = self.url(&["n", namespace, "b", bucket])?;
        self.transport.json(self.transport.request(Method::GET, url)).await
    }

    pub async fn list_buckets(&self, namespace: &str, compartment_id: &str) -> AquaResult<Vec<Value>> {
        let url = self.url(&["n", namespace, "b", ""])?;
        self.transport
            .list_all(|page| {
                let mut the_query = vec![("compartmentId", compartment_id)];
                if let Some(p) = page {
                    the_query.push(("page", p));
                }
                self.transport.request(Method::GET, url.clone()).query(&the_query)
            })
            .await
    }

    /// 📄 Every current object under `prefix`. Walks `nextStartWith` until the end.
    pub async fn list_objects(
        &self,
        namespace: &str,
        bucket: &str,
        prefix: Option<&str>,
        fields: &str,
    ) -> AquaResult<Vec<ObjectSummary>> {
        let url = self.url(&["n", namespace, "b", bucket, "o"])?;
        let mut everything = Vec::new();
        let mut the_start: Option<String> = None;
        loop {
            let mut the_query: Vec<(&str, &str)> = vec![("fields", fields)];
            if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
                the_query.push(("prefix", prefix));
            }
            if let Some(start) = the_start.as_deref() {
                the_query.push(("start", start));
            }
            let page: ListObjectsPage = self
                .transport
                .json(self.transport.request(Method::GET, url.clone()).query(&the_query))
                .await?;
            everything.extend(page.objects);
            match page.next_start_with {
                Some(next) if !next.is_empty() => the_start = Some(next),
                _ => break,
            }
        }
        Ok(everything)
    }

    /// 🗂️ Every object version under `prefix`, across all `opc-next-page` pages.
    pub async fn list_object_versions(
        &self,
        namespace: &str,
        bucket: &str,
        prefix: Option<&str>,
        fields: &str,
    ) -> AquaResult<Vec<ObjectVersionSummary>> {
        let url = self.url(&["n", namespace, "b", bucket, "objectversions"])?;
        self.transport
            .list_all(|page| {
                let mut the_query: Vec<(&str, &str)> = vec![("fields", fields)];
                if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
                    the_query.push(("prefix", prefix));
                }
                if let Some(p) = page {
                    the_query.push(("page", p));
                }
                self.transport.request(Method::GET, url.clone()).query(&the_query)
            })
            .await
    }

    pub async fn head_object(&self, namespace: &str, bucket: &str, name: &str) -> AquaResult<RawResponse> {
        let url = self.url(&["n", namespace, "b", bucket, "o", name])?;
        self.transport.raw(self.transport.request(Method::HEAD, url)).await
    }

    pub async fn get_object(
        &self,
        namespace: &str,
        bucket: &str,
        name: &str,
        version_id: Option<&str>,
    ) -> AquaResult<Vec<u8>> {
        let url = self.url(&["n", namespace, "b", bucket, "o", name])?;
        let mut builder = self.transport.request(Method::GET, url);
        if let Some(version) = version_id {
            builder = builder.query(&[("versionId", version)]);
        }
        Ok(self.transport.raw(builder).await?.body)
    }

    /// 💾 Stream an object straight to `destination`, chunk by chunk. Returns bytes written.
    pub async fn get_object_to_file(
        &self,
        namespace: &str,
        bucket: &str,
        name: &str,
        version_id: Option<&str>,
        destination: &Path,
    ) -> AquaResult<u64> {
        let url = self.url(&["n", namespace, "b", bucket, "o", name])?;
        let mut builder = self.transport.request(Method::GET, url);
        if let Some(version) = version_id {
            builder = builder.query(&[("versionId", version)]);
        }
        let mut response = self.transport.execute(builder).await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut the_file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            the_file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        the_file.flush().await?;
        Ok(written)
    }

    pub async fn put_object(
        &self,
        namespace: &str,
        bucket: &str,
        name: &str,
        content: Vec<u8>,
    ) -> AquaResult<RawResponse> {
        let url = self.url(&["n", namespace, "b", bucket, "o", name])?;
        self.transport
            .raw(self.transport.request(Method::PUT, url).body(content))
            .await
    }

    pub async fn delete_object(&self, namespace: &str, bucket: &str, name: &str) -> AquaResult<()> {
        let url = self.url(&["n", namespace, "b", bucket, "o", name])?;
        self.transport
            .execute(self.transport.request(Method::DELETE, url))
            .await?;
        Ok(())
    }

    // ===== 🧩 multipart =====

    pub async fn create_multipart_upload(
        &self,
        namespace: &str,
        bucket: &str,
        name: &str,
    ) -> AquaResult<String> {
        let url = self.url(&["n", namespace, "b", bucket, "u"])?;
        let upload: MultipartUpload = self
            .transport
            .json(
                self.transport
                    .request(Method::POST, url)
                    .json(&serde_json::json!({ "object": name })),
            )
            .await?;
        Ok(upload.upload_id)
    }

    /// 🧩 Upload one part; returns the part's etag for the commit list.
    pub async fn upload_part(
        &self,
        namespace: &str,
        bucket: &str,
        name: &str,
        upload_id: &str,
        part_num: u32,
        content: Vec<u8>,
    ) -> AquaResult<String> {
        let url = self.url(&["n", namespace, "b", bucket, "u", name])?;
        let the_part_num = part_num.to_string();
        let response = self
            .transport
            .raw(
                self.transport
                    .request(Method::PUT, url)
                    .query(&[("uploadId", upload_id), ("uploadPartNum", the_part_num.as_str())])
                    .body(content),
            )
            .await?;
        response.header("etag").map(str::to_string).ok_or_else(|| {
            AquaError::MissingField(format!("💀 part {part_num} of `{name}` came back without an etag"))
        })
    }

    pub async fn commit_multipart_upload(
        &self,
        namespace: &str,
        bucket: &str,
        name: &str,
        upload_id: &str,
        parts: &[CommitPart],
    ) -> AquaResult<()> {
        let url = self.url(&["n", namespace, "b", bucket, "u", name])?;
        self.transport
            .execute(
                self.transport
                    .request(Method::POST, url)
                    .query(&[("uploadId", upload_id)])
                    .json(&serde_json::json!({ "partsToCommit": parts })),
            )
            .await?;
        Ok(())
    }

    pub async fn abort_multipart_upload(
        &self,
        namespace: &str,
        bucket: &str,
        name: &str,
        upload_id: &str,
    ) -> AquaResult<()> {
        let url = self.url(&["n", namespace, "b", bucket, "u", name])?;
        self.transport
            .execute(
                self.transport
                    .request(Method::DELETE, url)
                    .query(&[("uploadId", upload_id)]),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::OciConfig;
    use crate::oci::transport::OPC_NEXT_PAGE;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn the_client(server: &MockServer) -> ObjectStorageClient {
        ObjectStorageClient::new(OciTransport::new(&OciConfig::default()).unwrap(), server.uri())
    }

    #[tokio::test]
    async fn the_one_where_list_objects_follows_next_start_with() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/bkt/o"))
            .and(query_param("start", "b.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "objects": [{"name": "b.bin", "etag": "e2", "size": 2}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/bkt/o"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "objects": [{"name": "a.bin", "etag": "e1", "size": 1}],
                "nextStartWith": "b.bin"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let objects = the_client(&server)
            .list_objects("ns", "bkt", Some("model/"), "name,etag,size")
            .await
            .unwrap();
        let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a.bin", "b.bin"]);
    }

    #[tokio::test]
    async fn the_one_where_object_versions_are_paginated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/bkt/objectversions"))
            .and(query_param("page", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "b", "versionId": "v2", "size": 5}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/bkt/objectversions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(OPC_NEXT_PAGE, "next")
                    .set_body_json(serde_json::json!({
                        "items": [{"name": "a", "versionId": "v1", "size": 3}]
                    })),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let versions = the_client(&server)
            .list_object_versions("ns", "bkt", None, "name,size")
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].version_id.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn the_one_where_a_bucket_admits_it_is_versioned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/n/ns/b/bkt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "bkt", "namespace": "ns", "versioning": "Enabled"
            })))
            .mount(&server)
            .await;
        let bucket = the_client(&server).get_bucket("ns", "bkt").await.unwrap();
        assert!(bucket.is_versioned());
    }
}
