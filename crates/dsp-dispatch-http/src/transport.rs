// crates/dsp-dispatch-http/src/transport.rs
// ============================================================================
// Module: HTTP Transport
// Description: Executes wire requests with a shared reqwest client.
// Purpose: Carry dispatches to remote connectors over HTTP.
// Dependencies: dsp-dispatch-core, reqwest, bytes
// ============================================================================

//! ## Overview
//! [`HttpTransport`] sends a prepared [`WireRequest`] and reads the response
//! body incrementally so oversized responses are rejected before they are
//! buffered in full.
//! Invariants:
//! - Redirects are rejected as non-success statuses.
//! - Response bodies never exceed `max_response_bytes`.
//! - Error details carry at most [`MAX_ERROR_DETAIL_BYTES`] of the body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use dsp_dispatch_core::Transport;
use dsp_dispatch_core::TransportError;
use dsp_dispatch_core::WireRequest;
use dsp_dispatch_core::WireResponse;
use reqwest::Client;
use reqwest::redirect::Policy;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default response body limit (4 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Maximum number of body bytes copied into status error details.
pub const MAX_ERROR_DETAIL_BYTES: usize = 512;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Client settings for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout including body transfer.
    pub request_timeout: Duration,
    /// Maximum accepted response body size.
    pub max_response_bytes: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: concat!("dsp-dispatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Transport construction failures.
#[derive(Debug, Error)]
pub enum HttpTransportError {
    /// Response limit must allow at least one byte.
    #[error("max_response_bytes must be greater than zero")]
    ZeroResponseLimit,
    /// reqwest client could not be built.
    #[error("http client build failed: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Shared HTTP client.
    client: Client,
    /// Response body limit.
    max_response_bytes: usize,
}

impl HttpTransport {
    /// Builds a transport with its own client.
    ///
    /// # Errors
    ///
    /// Returns [`HttpTransportError`] when the configuration is invalid or the
    /// client cannot be constructed.
    pub fn new(config: &HttpTransportConfig) -> Result<Self, HttpTransportError> {
        if config.max_response_bytes == 0 {
            return Err(HttpTransportError::ZeroResponseLimit);
        }
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| HttpTransportError::Client(err.to_string()))?;
        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Returns the response body limit.
    #[must_use]
    pub const fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let (method, url, headers, body) = request.into_parts();
        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let mut response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();

        let limit = u64::try_from(self.max_response_bytes).unwrap_or(u64::MAX);
        if let Some(length) = response.content_length()
            && length > limit
        {
            return Err(self.too_large());
        }
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            if body.len().saturating_add(chunk.len()) > self.max_response_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            return Err(TransportError::Status {
                status,
                detail: error_detail(&body),
            });
        }
        Ok(WireResponse::new(status, headers, body.freeze()))
    }
}

impl HttpTransport {
    /// Returns the size-limit error.
    const fn too_large(&self) -> TransportError {
        TransportError::TooLarge {
            max_bytes: self.max_response_bytes,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Classifies a reqwest failure.
fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

/// Returns a bounded, lossy UTF-8 excerpt of an error body.
fn error_detail(body: &[u8]) -> String {
    let end = body.len().min(MAX_ERROR_DETAIL_BYTES);
    String::from_utf8_lossy(&body[.. end]).trim().to_string()
}
