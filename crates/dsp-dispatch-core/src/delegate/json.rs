// crates/dsp-dispatch-core/src/delegate/json.rs
// ============================================================================
// Module: JSON Delegates
// Description: Generic delegates posting JSON-serialized messages.
// Purpose: Cover request/response messages without hand-written delegates.
// Dependencies: serde, serde_json, url
// ============================================================================

//! ## Overview
//! [`JsonDelegate`] serializes the message as the request body, sends it to a
//! path below the counterparty address, and deserializes the JSON response.
//! [`NoContentDelegate`] does the same for messages whose response carries no
//! payload.
//! Invariants:
//! - Empty or whitespace-only response bodies parse to `None`.
//! - Paths are joined below the counterparty address, never replacing it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::delegate::DelegateError;
use crate::delegate::DispatcherDelegate;
use crate::message::RemoteMessage;
use crate::wire::ResponseParser;
use crate::wire::WireRequest;
use crate::wire::WireResponse;

// ============================================================================
// SECTION: Path Resolution
// ============================================================================

/// Derives the request path for a message.
type PathFn<M> = dyn Fn(&M) -> String + Send + Sync;

/// Joins a relative `path` below the counterparty `address`.
///
/// # Errors
///
/// Returns [`DelegateError::InvalidUrl`] when the joined URL does not parse.
pub fn join_address(address: &str, path: &str) -> Result<Url, DelegateError> {
    let path = path.trim_start_matches('/');
    let joined = if path.is_empty() {
        address.to_string()
    } else {
        format!("{}/{path}", address.trim_end_matches('/'))
    };
    Url::parse(&joined).map_err(|err| DelegateError::InvalidUrl(format!("{joined}: {err}")))
}

/// Parses a JSON response body, treating blank bodies as `None`.
///
/// # Errors
///
/// Returns [`DelegateError::ResponseParse`] when the body is not valid JSON for `R`.
pub fn parse_json_body<R: DeserializeOwned>(
    response: &WireResponse,
) -> Result<Option<R>, DelegateError> {
    if response.is_blank() {
        return Ok(None);
    }
    serde_json::from_slice(response.body())
        .map(Some)
        .map_err(|err| DelegateError::ResponseParse(err.to_string()))
}

// ============================================================================
// SECTION: JSON Delegate
// ============================================================================

/// Delegate posting the JSON message and parsing a JSON response.
pub struct JsonDelegate<M, R> {
    /// HTTP method used for the request.
    method: Method,
    /// Path resolver relative to the counterparty address.
    path: Arc<PathFn<M>>,
    /// Response type marker.
    response: PhantomData<fn() -> R>,
}

impl<M, R> JsonDelegate<M, R>
where
    M: RemoteMessage + Serialize,
    R: DeserializeOwned + Send + 'static,
{
    /// Creates a `POST` delegate for the resolved path.
    pub fn post<F>(path: F) -> Self
    where
        F: Fn(&M) -> String + Send + Sync + 'static,
    {
        Self {
            method: Method::POST,
            path: Arc::new(path),
            response: PhantomData,
        }
    }

    /// Returns a copy using the provided HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

impl<M, R> DispatcherDelegate for JsonDelegate<M, R>
where
    M: RemoteMessage + Serialize,
    R: DeserializeOwned + Send + 'static,
{
    type Message = M;
    type Response = Option<R>;

    fn build_request(&self, message: &M) -> Result<WireRequest, DelegateError> {
        let url = join_address(message.counter_party_address(), &(self.path)(message))?;
        WireRequest::new(self.method.clone(), url).with_json(message)
    }

    fn parse_response(&self) -> ResponseParser<Option<R>> {
        ResponseParser::new(|response| parse_json_body(&response))
    }
}

impl<M, R> fmt::Debug for JsonDelegate<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDelegate").field("method", &self.method).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: No-Content Delegate
// ============================================================================

/// Delegate posting the JSON message and discarding the response body.
pub struct NoContentDelegate<M> {
    /// HTTP method used for the request.
    method: Method,
    /// Path resolver relative to the counterparty address.
    path: Arc<PathFn<M>>,
}

impl<M> NoContentDelegate<M>
where
    M: RemoteMessage + Serialize,
{
    /// Creates a `POST` delegate for the resolved path.
    pub fn post<F>(path: F) -> Self
    where
        F: Fn(&M) -> String + Send + Sync + 'static,
    {
        Self {
            method: Method::POST,
            path: Arc::new(path),
        }
    }

    /// Returns a copy using the provided HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

impl<M> DispatcherDelegate for NoContentDelegate<M>
where
    M: RemoteMessage + Serialize,
{
    type Message = M;
    type Response = ();

    fn build_request(&self, message: &M) -> Result<WireRequest, DelegateError> {
        let url = join_address(message.counter_party_address(), &(self.path)(message))?;
        WireRequest::new(self.method.clone(), url).with_json(message)
    }

    fn parse_response(&self) -> ResponseParser<()> {
        ResponseParser::new(|_| Ok(()))
    }
}

impl<M> fmt::Debug for NoContentDelegate<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoContentDelegate").field("method", &self.method).finish_non_exhaustive()
    }
}
