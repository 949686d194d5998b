// crates/dsp-dispatch-core/src/transport.rs
// ============================================================================
// Module: Transport Interface
// Description: Asynchronous execution of prepared wire requests.
// Purpose: Decouple dispatch orchestration from the network client.
// Dependencies: crate::wire, async-trait, thiserror
// ============================================================================

//! ## Overview
//! A [`Transport`] executes a fully prepared [`WireRequest`] and returns the
//! raw [`WireResponse`]. [`TransportExt::execute_with`] applies a delegate's
//! [`ResponseParser`] once the response is available and surfaces parse
//! failures as transport failures.
//! Invariants:
//! - The transport is called at most once per dispatch.
//! - Timeouts and retries are transport concerns; the dispatcher adds none.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::delegate::DelegateError;
use crate::wire::ResponseParser;
use crate::wire::WireRequest;
use crate::wire::WireResponse;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures raised while executing a request or parsing its response.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),
    /// Request did not complete in time.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Remote endpoint answered with a non-success status.
    #[error("remote endpoint returned status {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Truncated response detail.
        detail: String,
    },
    /// Response body exceeded the configured size limit.
    #[error("response body exceeds {max_bytes} bytes")]
    TooLarge {
        /// Configured size limit.
        max_bytes: usize,
    },
    /// Response could not be parsed by the delegate parser.
    #[error("failed to parse response: {0}")]
    Parse(#[from] DelegateError),
}

impl TransportError {
    /// Returns the remote status code, when one was received.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status {
                status, ..
            } => Some(*status),
            _ => None,
        }
    }

    /// Returns true when repeating the request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Status {
                status, ..
            } => status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS,
            Self::TooLarge {
                ..
            }
            | Self::Parse(_) => false,
        }
    }
}

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Executes prepared wire requests against remote endpoints.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes `request` and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request fails or the remote endpoint
    /// rejects it.
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}

/// Parser-aware execution for every [`Transport`].
pub trait TransportExt: Transport {
    /// Executes `request` and applies `parser` to the response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Parse`] when the parser rejects the response,
    /// or any error reported by [`Transport::execute`].
    fn execute_with<'a, R: Send + 'static>(
        &'a self,
        request: WireRequest,
        parser: &'a ResponseParser<R>,
    ) -> impl Future<Output = Result<R, TransportError>> + Send + 'a;
}

impl<T: Transport + ?Sized> TransportExt for T {
    fn execute_with<'a, R: Send + 'static>(
        &'a self,
        request: WireRequest,
        parser: &'a ResponseParser<R>,
    ) -> impl Future<Output = Result<R, TransportError>> + Send + 'a {
        async move {
            let response = self.execute(request).await?;
            Ok(parser.parse(response)?)
        }
    }
}
