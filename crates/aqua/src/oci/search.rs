//! 🔎 Resource Search client: structured queries across compartments.

use reqwest::Method;
use serde::Deserialize;

use super::transport::{OciTransport, endpoint_url};
use crate::error::AquaResult;

/// 🔎 One hit from a structured search. Only the fields anyone reads.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub identifier: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub lifecycle_state: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchClient {
    transport: OciTransport,
    base: String,
}

impl SearchClient {
    pub const ENDPOINT_TEMPLATE: &'static str = "https://query.{region}.oci.oraclecloud.com/20180409";

    pub fn new(transport: OciTransport, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    pub async fn search_structured(&self, query: &str) -> AquaResult<Vec<ResourceSummary>> {
        let url = endpoint_url(&self.base, &["resources"])?;
        let body = serde_json::json!({ "type": "Structured", "query": query });
        self.transport
            .list_all(|page| {
                let mut the_query = vec![("limit", "500")];
                if let Some(p) = page {
                    the_query.push(("page", p));
                }
                self.transport
                    .request(Method::POST, url.clone())
                    .query(&the_query)
                    .json(&body)
            })
            .await
    }
}
