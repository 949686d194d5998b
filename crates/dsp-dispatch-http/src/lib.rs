// crates/dsp-dispatch-http/src/lib.rs
// ============================================================================
// Module: DSP Dispatch HTTP Library
// Description: reqwest-backed transport for the dispatch core.
// Purpose: Execute wire requests over HTTP with bounded responses.
// Dependencies: dsp-dispatch-core, reqwest, bytes
// ============================================================================

//! ## Overview
//! Provides [`HttpTransport`], the production [`dsp_dispatch_core::Transport`]
//! implementation.
//! Invariants:
//! - Non-success statuses fail closed as [`dsp_dispatch_core::TransportError::Status`].
//! - Response bodies are capped at the configured size.
//! - Redirects are not followed.
//!
//! Security posture: remote endpoints and their responses are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use transport::DEFAULT_MAX_RESPONSE_BYTES;
pub use transport::HttpTransport;
pub use transport::HttpTransportConfig;
pub use transport::HttpTransportError;
