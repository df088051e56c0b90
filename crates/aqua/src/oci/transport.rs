//! 📡 The transport: one reqwest client, one signer, and a lot of status codes.
//!
//! 🎬 COLD OPEN: INT. LOAD BALANCER: 2:13 AM
//!
//! Eight services, eight base URLs, one shared habit: they all answer non-2xx
//! with `{"code": "...", "message": "..."}` and they all paginate with an
//! `opc-next-page` header. So every service client in this module funnels
//! through here, and this file does three jobs:
//! - sign the request (see [`RequestSigner`])
//! - turn non-2xx into [`AquaError::Service`] with the body attached
//! - walk `opc-next-page` until the service runs out of pages
//!
//! 🦆 The duck is load balanced across all pages.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::app_config::{AuthConfig, OciConfig};
use crate::error::{AquaError, AquaResult};

/// 📑 The pagination header every OCI list call speaks.
pub const OPC_NEXT_PAGE: &str = "opc-next-page";
/// 🎫 Async operations hand this back so callers can poll.
pub const OPC_WORK_REQUEST_ID: &str = "opc-work-request-id";

/// 🔏 Puts credentials on an outgoing request.
///
/// Full OCI RSA-SHA256 request signing lives behind this seam; the crate ships the
/// token-based variants and anything fancier plugs in here.
#[async_trait]
pub trait RequestSigner: Send + Sync + fmt::Debug {
    async fn sign(&self, request: &mut reqwest::Request) -> AquaResult<()>;
}

/// 🙈 Signs nothing. Perfect for mocks, useless against the real cloud.
#[derive(Debug, Default)]
pub struct AnonymousSigner;

#[async_trait]
impl RequestSigner for AnonymousSigner {
    async fn sign(&self, _request: &mut reqwest::Request) -> AquaResult<()> {
        Ok(())
    }
}

/// 🎟️ Sends a pre-minted security token as a bearer header.
pub struct SecurityTokenSigner {
    token: String,
}

impl SecurityTokenSigner {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

// 🔒 hand-rolled so the token never lands in a log line
impl fmt::Debug for SecurityTokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityTokenSigner")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl RequestSigner for SecurityTokenSigner {
    async fn sign(&self, request: &mut reqwest::Request) -> AquaResult<()> {
        let the_header = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| AquaError::InvalidArgument(format!("💀 security token is not header-safe: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, the_header);
        Ok(())
    }
}

/// 📬 A response with the body fully read. Headers keep their lowercase names.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> AquaResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[derive(Debug, Deserialize, Default)]
struct OciErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// 🚚 Shared HTTP plumbing for every service client.
#[derive(Debug, Clone)]
pub struct OciTransport {
    client: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
}

impl OciTransport {
    pub fn new(config: &OciConfig) -> AquaResult<Self> {
        let signer: Arc<dyn RequestSigner> = match &config.auth {
            AuthConfig::Anonymous => Arc::new(AnonymousSigner),
            AuthConfig::SecurityToken { token } => Arc::new(SecurityTokenSigner::new(token)),
        };
        Self::with_signer(config, signer)
    }

    pub fn with_signer(config: &OciConfig, signer: Arc<dyn RequestSigner>) -> AquaResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, signer })
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// 🚀 Build, sign, send. Non-2xx becomes [`AquaError::Service`].
    pub async fn execute(&self, builder: RequestBuilder) -> AquaResult<reqwest::Response> {
        let mut request = builder.build()?;
        self.signer.sign(&mut request).await?;
        let the_method = request.method().clone();
        let the_url = request.url().to_string();
        debug!("📡 {} {}", the_method, the_url);

        let response = self.client.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            trace!("✅ {} {} -> {}", the_method, the_url, status);
            return Ok(response);
        }

        // 💀 read the body for the error message; HEAD responses have none, that's fine
        let the_body = response.text().await.unwrap_or_default();
        let parsed: OciErrorBody = serde_json::from_str(&the_body).unwrap_or_default();
        let message = if parsed.message.is_empty() {
            the_body
        } else {
            parsed.message
        };
        debug!("💀 {} {} -> {} {}", the_method, the_url, status, message);
        Err(AquaError::Service {
            status: status.as_u16(),
            code: parsed.code,
            message,
            url: the_url,
        })
    }

    pub async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> AquaResult<T> {
        let response = self.execute(builder).await?;
        Ok(response.json::<T>().await?)
    }

    /// 📬 Send and slurp headers + body.
    pub async fn raw(&self, builder: RequestBuilder) -> AquaResult<RawResponse> {
        let response = self.execute(builder).await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await?.to_vec();
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    /// 📑 Follow `opc-next-page` until the service stops handing out pages.
    ///
    /// Accepts both list shapes OCI uses: a bare JSON array, or `{"items": [...]}`.
    pub async fn list_all<T, F>(&self, make_request: F) -> AquaResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(Option<&str>) -> RequestBuilder,
    {
        let mut everything = Vec::new();
        let mut the_page: Option<String> = None;
        loop {
            let response = self.execute(make_request(the_page.as_deref())).await?;
            let next_page = response
                .headers()
                .get(OPC_NEXT_PAGE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body: serde_json::Value = response.json().await?;
            let the_items = match body {
                serde_json::Value::Array(items) => items,
                serde_json::Value::Object(mut map) => match map.remove("items") {
                    Some(serde_json::Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
            for item in the_items {
                everything.push(serde_json::from_value(item)?);
            }
            match next_page {
                Some(page) if !page.is_empty() => the_page = Some(page),
                _ => break,
            }
        }
        trace!("📑 collected {} items across pages", everything.len());
        Ok(everything)
    }
}

pub(crate) fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// 🔗 `base` + percent-encoded path segments. Object names with `/` stay one segment.
pub fn endpoint_url(base: &str, segments: &[&str]) -> AquaResult<Url> {
    let mut url = Url::parse(base.trim_end_matches('/'))
        .map_err(|e| AquaError::InvalidArgument(format!("💀 invalid endpoint `{base}`: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AquaError::InvalidArgument(format!("💀 endpoint `{base}` cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// 📍 A service's base URL: the override if there is one, the regional default otherwise.
pub fn resolve_endpoint(override_url: Option<&String>, template: &str, region: &str) -> String {
    match override_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => template.replace("{region}", region),
    }
}
