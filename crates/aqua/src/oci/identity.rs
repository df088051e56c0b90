//! 🏛️ Identity client: compartments, and the tenancy that holds them all.

use reqwest::Method;
use serde_json::Value;

use super::transport::{OciTransport, endpoint_url};
use crate::error::AquaResult;

#[derive(Debug, Clone)]
pub struct IdentityClient {
    transport: OciTransport,
    base: String,
}

impl IdentityClient {
    pub const ENDPOINT_TEMPLATE: &'static str = "https://identity.{region}.oci.oraclecloud.com/20160918";

    pub fn new(transport: OciTransport, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    pub async fn get_compartment(&self, compartment_id: &str) -> AquaResult<Value> {
        let url = endpoint_url(&self.base, &["compartments", compartment_id])?;
        self.transport.json(self.transport.request(Method::GET, url)).await
    }

    /// 🌳 The whole subtree under `compartment_id`, whatever our access level.
    pub async fn list_compartments_in_subtree(&self, compartment_id: &str) -> AquaResult<Vec<Value>> {
        let url = endpoint_url(&self.base, &["compartments"])?;
        self.transport
            .list_all(|page| {
                let mut the_query = vec![
                    ("compartmentId", compartment_id),
                    ("compartmentIdInSubtree", "true"),
                    ("accessLevel", "ANY"),
                ];
                if let Some(p) = page {
                    the_query.push(("page", p));
                }
                self.transport.request(Method::GET, url.clone()).query(&the_query)
            })
            .await
    }
}
