// crates/dsp-dispatch-core/src/delegate/mod.rs
// ============================================================================
// Module: Dispatcher Delegates
// Description: Per-message-type request builders and response parsers.
// Purpose: Translate typed messages to wire requests and back.
// Dependencies: crate::{message, wire}, thiserror
// ============================================================================

//! ## Overview
//! A [`DispatcherDelegate`] is bound to exactly one message type and one
//! response type. It builds the protocol-specific [`WireRequest`] for a
//! message and supplies the [`ResponseParser`] the transport applies once the
//! wire response arrives.
//! Invariants:
//! - `build_request` performs no I/O.
//! - Parsers tolerate empty bodies where the response type allows it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::message::MessageType;
use crate::message::RemoteMessage;
use crate::wire::ResponseParser;
use crate::wire::WireRequest;

// ============================================================================
// SECTION: Delegate Errors
// ============================================================================

/// Errors raised while building requests or parsing responses.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DelegateError {
    /// Message is structurally invalid for the protocol.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    /// Request URL could not be derived from the message.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Request body could not be serialized.
    #[error("serialization failure: {0}")]
    Serialization(String),
    /// Response body could not be parsed.
    #[error("response parse failure: {0}")]
    ResponseParse(String),
}

// ============================================================================
// SECTION: Delegate Trait
// ============================================================================

/// Strategy translating one message type to wire requests and typed results.
pub trait DispatcherDelegate: Send + Sync {
    /// Message type handled by this delegate.
    type Message: RemoteMessage;
    /// Typed value produced from the wire response.
    type Response: Send + 'static;

    /// Returns the message type this delegate is registered under.
    fn message_type(&self) -> MessageType {
        MessageType::of::<Self::Message>()
    }

    /// Builds the wire request for the message.
    ///
    /// # Errors
    ///
    /// Returns [`DelegateError`] when the message cannot be expressed on the wire.
    fn build_request(&self, message: &Self::Message) -> Result<WireRequest, DelegateError>;

    /// Returns the parser applied to the wire response.
    fn parse_response(&self) -> ResponseParser<Self::Response>;
}

// ============================================================================
// SECTION: Adapters
// ============================================================================

pub mod json;

pub use json::JsonDelegate;
pub use json::NoContentDelegate;
pub use json::join_address;
pub use json::parse_json_body;
