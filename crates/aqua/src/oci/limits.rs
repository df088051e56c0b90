//! 🚦 Limits client: "how many of these am I still allowed to have?"

use reqwest::Method;
use serde::Deserialize;

use super::transport::{OciTransport, endpoint_url};
use crate::error::AquaResult;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAvailability {
    #[serde(default)]
    pub used: Option<i64>,
    #[serde(default)]
    pub available: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct LimitsClient {
    transport: OciTransport,
    base: String,
}

impl LimitsClient {
    pub const ENDPOINT_TEMPLATE: &'static str = "https://limits.{region}.oci.oraclecloud.com/20190729";

    pub fn new(transport: OciTransport, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    pub async fn get_resource_availability(
        &self,
        service_name: &str,
        limit_name: &str,
        compartment_id: &str,
    ) -> AquaResult<ResourceAvailability> {
        let url = endpoint_url(
            &self.base,
            &["services", service_name, "limits", limit_name, "resourceAvailability"],
        )?;
        self.transport
            .json(
                self.transport
                    .request(Method::GET, url)
                    .query(&[("compartmentId", compartment_id)]),
            )
            .await
    }
}
