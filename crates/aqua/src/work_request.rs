//! ⏳ Work requests: the service's way of saying "I'll get back to you".
//!
//! Restore, import and export all hand back an `opc-work-request-id`. We poll
//! it on a fixed interval until it lands on a terminal status, with a spinner
//! so the human knows we haven't wandered off.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::{AquaError, AquaResult};
use crate::oci::DataScienceClient;
use crate::oci::data_science::WorkRequest;
use crate::progress::spinner;

pub const STATUS_SUCCEEDED: &str = "SUCCEEDED";
pub const STATUS_FAILED: &str = "FAILED";
pub const STATUS_CANCELED: &str = "CANCELED";

pub fn is_terminal(status: &str) -> bool {
    matches!(status, STATUS_SUCCEEDED | STATUS_FAILED | STATUS_CANCELED)
}

/// ⏱️ Polls one work request at a time until it is done being asynchronous.
#[derive(Debug, Clone)]
pub struct WorkRequestPoller {
    client: DataScienceClient,
    interval: Duration,
}

impl WorkRequestPoller {
    pub fn new(client: DataScienceClient, interval: Duration) -> Self {
        Self { client, interval }
    }

    /// 🔄 Wait for `work_request_id`. FAILED or CANCELED becomes [`AquaError::WorkRequestFailed`].
    pub async fn wait(&self, work_request_id: &str, label: &str) -> AquaResult<WorkRequest> {
        let the_spinner = spinner(label);
        let result = self.poll_until_terminal(work_request_id, &the_spinner).await;
        match &result {
            Ok(_) => the_spinner.finish_with_message(format!("✅ {label}")),
            Err(_) => the_spinner.abandon_with_message(format!("💀 {label}")),
        }
        result
    }

    async fn poll_until_terminal(
        &self,
        work_request_id: &str,
        the_spinner: &indicatif::ProgressBar,
    ) -> AquaResult<WorkRequest> {
        loop {
            let work_request = self.client.get_work_request(work_request_id).await?;
            debug!(
                "⏳ work request {} is {} ({}%)",
                work_request_id,
                work_request.status,
                work_request.percent_complete.unwrap_or_default()
            );
            if let Some(percent) = work_request.percent_complete {
                the_spinner.set_prefix(format!("{percent:.0}%"));
            }

            match work_request.status.as_str() {
                STATUS_SUCCEEDED => {
                    info!("✅ work request {} succeeded", work_request_id);
                    return Ok(work_request);
                }
                STATUS_FAILED | STATUS_CANCELED => {
                    let message = self.failure_message(work_request_id).await;
                    return Err(AquaError::WorkRequestFailed {
                        id: work_request_id.to_string(),
                        status: work_request.status,
                        message,
                    });
                }
                _ => tokio::time::sleep(self.interval).await,
            }
        }
    }

    async fn failure_message(&self, work_request_id: &str) -> String {
        match self.client.list_work_request_errors(work_request_id).await {
            Ok(errors) if !errors.is_empty() => errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; "),
            Ok(_) => "no error details were reported".to_string(),
            Err(e) => format!("error details unavailable: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::OciConfig;
    use crate::oci::OciTransport;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn the_poller(server: &MockServer) -> WorkRequestPoller {
        let client = DataScienceClient::new(OciTransport::new(&OciConfig::default()).unwrap(), server.uri());
        WorkRequestPoller::new(client, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn the_one_where_patience_is_rewarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/workRequests/wr1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "wr1", "status": "IN_PROGRESS", "percentComplete": 40.0
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/workRequests/wr1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "wr1", "status": "SUCCEEDED", "percentComplete": 100.0
            })))
            .mount(&server)
            .await;

        let done = the_poller(&server).wait("wr1", "restoring").await.unwrap();
        assert_eq!(done.status, STATUS_SUCCEEDED);
    }

    #[tokio::test]
    async fn the_one_where_failure_brings_receipts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/workRequests/wr2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "wr2", "status": "FAILED"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/workRequests/wr2/errors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"code": "InternalError", "message": "bucket went on vacation"}
            ])))
            .mount(&server)
            .await;

        let err = the_poller(&server).wait("wr2", "exporting").await.unwrap_err();
        match err {
            AquaError::WorkRequestFailed { id, status, message } => {
                assert_eq!(id, "wr2");
                assert_eq!(status, "FAILED");
                assert_eq!(message, "bucket went on vacation");
            }
            other => panic!("💀 expected WorkRequestFailed, got {other:?}"),
        }
    }

    #[test]
    fn the_one_where_only_three_statuses_end_the_wait() {
        assert!(is_terminal("SUCCEEDED"));
        assert!(is_terminal("CANCELED"));
        assert!(!is_terminal("CANCELING"));
        assert!(!is_terminal("ACCEPTED"));
    }
}
