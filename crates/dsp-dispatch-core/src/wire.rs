// crates/dsp-dispatch-core/src/wire.rs
// ============================================================================
// Module: Wire Representations
// Description: Protocol-neutral wire requests, responses, and parsers.
// Purpose: Carry delegate-built requests to the transport and back.
// Dependencies: bytes, reqwest (types only), serde, serde_json, url
// ============================================================================

//! ## Overview
//! [`WireRequest`] is built by a delegate without performing I/O and handed to
//! the transport once a credential has been attached. [`WireResponse`] is the
//! raw transport result that a [`ResponseParser`] turns into a typed value.
//! Invariants:
//! - Requests carry an absolute URL.
//! - Parsers run in-process once the response is available and never perform I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde::Serialize;
use url::Url;

use crate::delegate::DelegateError;

// ============================================================================
// SECTION: Wire Request
// ============================================================================

/// Protocol-specific request prepared by a delegate.
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// HTTP method.
    method: Method,
    /// Absolute request URL.
    url: Url,
    /// Request headers.
    headers: HeaderMap,
    /// Optional request body.
    body: Option<Bytes>,
}

impl WireRequest {
    /// Creates a request without headers or body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a `GET` request.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a `POST` request.
    #[must_use]
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Parses `raw_url` and creates a request for it.
    ///
    /// # Errors
    ///
    /// Returns [`DelegateError::InvalidUrl`] when the URL does not parse.
    pub fn parse(method: Method, raw_url: &str) -> Result<Self, DelegateError> {
        let url = Url::parse(raw_url).map_err(|err| DelegateError::InvalidUrl(err.to_string()))?;
        Ok(Self::new(method, url))
    }

    /// Returns a copy with the header set, replacing previous values.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns a copy with the raw body set.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns a copy with a JSON body and `application/json` content type.
    ///
    /// # Errors
    ///
    /// Returns [`DelegateError::Serialization`] when `value` cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, DelegateError> {
        let body =
            serde_json::to_vec(value).map_err(|err| DelegateError::Serialization(err.to_string()))?;
        Ok(self
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns mutable request headers.
    pub const fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the request body, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the `Authorization` header value when present and valid UTF-8.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
    }

    /// Splits the request into method, URL, headers, and body.
    #[must_use]
    pub fn into_parts(self) -> (Method, Url, HeaderMap, Option<Bytes>) {
        (self.method, self.url, self.headers, self.body)
    }
}

// ============================================================================
// SECTION: Wire Response
// ============================================================================

/// Raw response returned by a transport.
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// Response status.
    status: StatusCode,
    /// Response headers.
    headers: HeaderMap,
    /// Response body (possibly empty).
    body: Bytes,
}

impl WireResponse {
    /// Creates a response from its parts.
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a response with the status and body and no headers.
    #[must_use]
    pub fn with_body(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, HeaderMap::new(), body.into())
    }

    /// Creates an empty response with the status.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), Bytes::new())
    }

    /// Returns the response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns true when the body is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Consumes the response and returns its body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

// ============================================================================
// SECTION: Response Parser
// ============================================================================

/// Shared parse function signature.
type ParseFn<R> = dyn Fn(WireResponse) -> Result<R, DelegateError> + Send + Sync;

/// Function turning a [`WireResponse`] into a typed value.
///
/// # Invariants
/// - Clones share the same underlying function; see [`ResponseParser::ptr_eq`].
pub struct ResponseParser<R> {
    /// Shared parse function.
    inner: Arc<ParseFn<R>>,
}

impl<R> ResponseParser<R> {
    /// Wraps a parse function.
    pub fn new<F>(parse: F) -> Self
    where
        F: Fn(WireResponse) -> Result<R, DelegateError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(parse),
        }
    }

    /// Parses a response.
    ///
    /// # Errors
    ///
    /// Returns [`DelegateError`] when the response cannot be parsed.
    pub fn parse(&self, response: WireResponse) -> Result<R, DelegateError> {
        (self.inner)(response)
    }

    /// Returns true when both parsers share the same function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl<R: 'static> ResponseParser<R> {
    /// Returns a parser that ignores the response and yields `value`.
    pub fn constant(value: R) -> Self
    where
        R: Clone + Send + Sync,
    {
        Self::new(move |_| Ok(value.clone()))
    }
}

impl<R> Clone for ResponseParser<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for ResponseParser<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseParser").finish_non_exhaustive()
    }
}
