//! 🕸️ Virtual network client: VCNs and subnets, read-only.

use reqwest::Method;
use serde_json::Value;

use super::transport::{OciTransport, endpoint_url};
use crate::error::AquaResult;

#[derive(Debug, Clone)]
pub struct VirtualNetworkClient {
    transport: OciTransport,
    base: String,
}

impl VirtualNetworkClient {
    pub const ENDPOINT_TEMPLATE: &'static str = "https://iaas.{region}.oraclecloud.com/20160918";

    pub fn new(transport: OciTransport, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    async fn list(&self, resource: &str, query: &[(&str, &str)]) -> AquaResult<Vec<Value>> {
        let url = endpoint_url(&self.base, &[resource])?;
        self.transport
            .list_all(|page| {
                let mut the_query = query.to_vec();
                if let Some(p) = page {
                    the_query.push(("page", p));
                }
                self.transport.request(Method::GET, url.clone()).query(&the_query)
            })
            .await
    }

    pub async fn list_vcns(&self, compartment_id: &str) -> AquaResult<Vec<Value>> {
        self.list("vcns", &[("compartmentId", compartment_id)]).await
    }

    pub async fn list_subnets(&self, compartment_id: &str, vcn_id: Option<&str>) -> AquaResult<Vec<Value>> {
        match vcn_id {
            Some(vcn) => {
                self.list("subnets", &[("compartmentId", compartment_id), ("vcnId", vcn)])
                    .await
            }
            None => self.list("subnets", &[("compartmentId", compartment_id)]).await,
        }
    }
}
