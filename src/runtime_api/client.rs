//! HTTP client for the control-plane runtime protocol.

use crate::invocation::{ErrorReport, Invocation, InvocationMetadata};
use crate::runtime::BootstrapConfig;
use crate::runtime_api::ApiError;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

/// Header naming the error type on error reports.
pub const FUNCTION_ERROR_TYPE_HEADER: &str = "lambda-runtime-function-error-type";
/// Header value sent when an error type is not a valid header value.
/// The body still carries the original type.
pub const UNKNOWN_ERROR_TYPE: &str = "Runtime.Unknown";

/// The control-plane protocol as seen by the bootstrap loop.
///
/// Implementations translate calls to the wire and back. They never retry;
/// deciding what a failure means is left to the caller.
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// Block until the next invocation is available.
    async fn next_invocation(&self) -> Result<Invocation, ApiError>;

    /// Report a successful result for `request_id`.
    async fn send_response(&self, request_id: &str, body: Bytes) -> Result<(), ApiError>;

    /// Report a failed invocation.
    async fn report_invocation_error(
        &self,
        request_id: &str,
        report: &ErrorReport,
    ) -> Result<(), ApiError>;

    /// Report that the one-time initializer failed.
    async fn report_initialization_error(&self, report: &ErrorReport) -> Result<(), ApiError>;

    /// Block until the process has been restored from a snapshot.
    async fn restore_next(&self) -> Result<(), ApiError>;

    /// Report that the after-restore checkpoint failed.
    async fn report_restore_error(&self, report: &ErrorReport) -> Result<(), ApiError>;
}

/// `hyper` based implementation of [`RuntimeApi`].
#[derive(Clone)]
pub struct RuntimeApiClient {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
    user_agent: String,
}

/// A fully read control-plane response.
struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl RuntimeApiClient {
    /// Create a client for the endpoint described by `config`.
    pub fn new(config: &BootstrapConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            base_url: config.base_url(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Base URL every call is made against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        error_type: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(&url)
            .header(USER_AGENT, &self.user_agent);

        if let Some(error_type) = error_type {
            let value = HeaderValue::from_str(error_type).unwrap_or_else(|_| {
                warn!("Error type {:?} is not a valid header value", error_type);
                HeaderValue::from_static(UNKNOWN_ERROR_TYPE)
            });
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .header(FUNCTION_ERROR_TYPE_HEADER, value);
        }

        let request = builder.body(Full::new(body))?;
        debug!("{} {}", method, url);

        let response = self.client.request(request).await?;
        let (parts, incoming) = response.into_parts();
        let body = incoming.collect().await?.to_bytes();

        Ok(ApiResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    async fn post_error(&self, path: &str, report: &ErrorReport) -> Result<(), ApiError> {
        let body = serde_json::to_vec(report)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let response = self
            .call(Method::POST, path, Bytes::from(body), Some(&report.error_type))
            .await?;
        expect_success(response)
    }
}

fn expect_success(response: ApiResponse) -> Result<(), ApiError> {
    if response.status.is_success() {
        return Ok(());
    }
    Err(ApiError::Status {
        status: response.status.as_u16(),
        message: String::from_utf8_lossy(&response.body).to_string(),
    })
}

#[async_trait]
impl RuntimeApi for RuntimeApiClient {
    async fn next_invocation(&self) -> Result<Invocation, ApiError> {
        let response = self
            .call(Method::GET, "/runtime/invocation/next", Bytes::new(), None)
            .await?;

        if !response.status.is_success() {
            return Err(ApiError::Status {
                status: response.status.as_u16(),
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let metadata = InvocationMetadata::from_headers(&response.headers)?;
        Ok(Invocation::new(metadata, response.body))
    }

    async fn send_response(&self, request_id: &str, body: Bytes) -> Result<(), ApiError> {
        let size = body.len();
        let path = format!("/runtime/invocation/{}/response", request_id);
        let response = self.call(Method::POST, &path, body, None).await?;

        if response.status == StatusCode::PAYLOAD_TOO_LARGE {
            warn!(
                "Response for {} rejected as too large ({} bytes)",
                request_id, size
            );
            return Err(ApiError::PayloadTooLarge {
                size,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        expect_success(response)
    }

    async fn report_invocation_error(
        &self,
        request_id: &str,
        report: &ErrorReport,
    ) -> Result<(), ApiError> {
        let path = format!("/runtime/invocation/{}/error", request_id);
        self.post_error(&path, report).await
    }

    async fn report_initialization_error(&self, report: &ErrorReport) -> Result<(), ApiError> {
        self.post_error("/runtime/init/error", report).await
    }

    async fn restore_next(&self) -> Result<(), ApiError> {
        let response = self
            .call(Method::GET, "/runtime/restore/next", Bytes::new(), None)
            .await?;
        expect_success(response)
    }

    async fn report_restore_error(&self, report: &ErrorReport) -> Result<(), ApiError> {
        self.post_error("/runtime/restore/error", report).await
    }
}
