//! 🖥️ Compute client: only the capacity-reservation corner of it.

use reqwest::Method;
use serde_json::Value;

use super::transport::{OciTransport, endpoint_url};
use crate::error::AquaResult;

#[derive(Debug, Clone)]
pub struct ComputeClient {
    transport: OciTransport,
    base: String,
}

impl ComputeClient {
    pub const ENDPOINT_TEMPLATE: &'static str = "https://iaas.{region}.oraclecloud.com/20160918";

    pub fn new(transport: OciTransport, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    pub async fn list_compute_capacity_reservations(&self, compartment_id: &str) -> AquaResult<Vec<Value>> {
        let url = endpoint_url(&self.base, &["computeCapacityReservations"])?;
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
}
