//! 🪵 Logging client: log groups and the logs inside them.

use reqwest::Method;
use serde_json::Value;

use super::transport::{OciTransport, endpoint_url};
use crate::error::AquaResult;

#[derive(Debug, Clone)]
pub struct LoggingClient {
    transport: OciTransport,
    base: String,
}

impl LoggingClient {
    pub const ENDPOINT_TEMPLATE: &'static str = "https://logging.{region}.oci.oraclecloud.com/20200531";

    pub fn new(transport: OciTransport, base: impl Into<String>) -> Self {
        Self {
            transport,
            base: base.into(),
        }
    }

    pub async fn list_log_groups(&self, compartment_id: &str) -> AquaResult<Vec<Value>> {
        let url = endpoint_url(&self.base, &["logGroups"])?;
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

    pub async fn list_logs(&self, log_group_id: &str) -> AquaResult<Vec<Value>> {
        let url = endpoint_url(&self.base, &["logGroups", log_group_id, "logs"])?;
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
