// crates/dsp-dispatch-core/src/message.rs
// ============================================================================
// Module: Remote Messages
// Description: Outbound message contract and stable message type tags.
// Purpose: Identify messages by exact runtime type without reflection.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Outbound protocol messages implement [`RemoteMessage`]. Each message names
//! the counterparty it is addressed to and the protocol it belongs to.
//! [`MessageType`] is the registry key used to route a message to its
//! delegate and policy scope.
//! Invariants:
//! - Message types compare by exact [`TypeId`]; there is no supertype matching.
//! - A message value is consumed by exactly one dispatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::TypeId;
use std::any::type_name;
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol identifier for the HTTP binding of the dataspace protocol.
pub const DATASPACE_PROTOCOL_HTTP: &str = "dataspace-protocol-http";

// ============================================================================
// SECTION: Remote Message
// ============================================================================

/// Outbound message addressed to a remote counterparty.
pub trait RemoteMessage: Send + Sync + 'static {
    /// Returns the protocol identifier the message is sent over.
    fn protocol(&self) -> &str;

    /// Returns the counterparty address (endpoint and token audience).
    fn counter_party_address(&self) -> &str;
}

// ============================================================================
// SECTION: Message Type
// ============================================================================

/// Stable type tag for a [`RemoteMessage`] implementation.
///
/// # Invariants
/// - Equality, ordering, and hashing use the [`TypeId`] only.
/// - `name` is informational and used for diagnostics.
#[derive(Clone, Copy)]
pub struct MessageType {
    /// Runtime type identifier.
    id: TypeId,
    /// Fully qualified type name.
    name: &'static str,
}

impl MessageType {
    /// Returns the tag for the message type `M`.
    #[must_use]
    pub fn of<M: RemoteMessage>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: type_name::<M>(),
        }
    }

    /// Returns the fully qualified type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl PartialOrd for MessageType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MessageType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageType").field(&self.name).finish()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// SECTION: Protocol Identifier
// ============================================================================

/// Protocol identifier of a dispatcher, as carried in evaluation contexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolId(String);

impl ProtocolId {
    /// Creates a protocol identifier.
    #[must_use]
    pub fn new(protocol: impl Into<String>) -> Self {
        Self(protocol.into())
    }

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
