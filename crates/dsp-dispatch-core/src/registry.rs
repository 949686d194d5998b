// crates/dsp-dispatch-core/src/registry.rs
// ============================================================================
// Module: Delegate Registry
// Description: Message-type keyed registry of dispatcher delegates.
// Purpose: Resolve the delegate for a message by its exact runtime type.
// Dependencies: crate::{delegate, message}, thiserror
// ============================================================================

//! ## Overview
//! [`DelegateRegistry`] maps a [`MessageType`] to exactly one delegate. It is
//! populated at startup and read on every dispatch, so lookups take a shared
//! read lock and registration takes a short write lock.
//! Invariants:
//! - Keys are unique; a later registration replaces the earlier delegate.
//! - Lookups match the exact message type and the requested response type.
//! - No per-dispatch state is stored in the registry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::any::type_name;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use thiserror::Error;

use crate::delegate::DispatcherDelegate;
use crate::message::MessageType;
use crate::message::RemoteMessage;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Shared, type-erased handle for a delegate with fixed message and response types.
pub type SharedDelegate<M, R> = Arc<dyn DispatcherDelegate<Message = M, Response = R>>;

/// Delegate lookup failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No delegate is registered for the message type.
    #[error("no delegate found for message type {message_type}")]
    NotFound {
        /// Message type name.
        message_type: &'static str,
    },
    /// The registered delegate produces a different response type.
    #[error(
        "delegate for message type {message_type} produces {registered}, but {requested} was requested"
    )]
    ResponseTypeMismatch {
        /// Message type name.
        message_type: &'static str,
        /// Response type produced by the registered delegate.
        registered: &'static str,
        /// Response type requested by the caller.
        requested: &'static str,
    },
}

/// Registered delegate with its response type tag.
struct DelegateEntry {
    /// Response type name for diagnostics.
    response_type: &'static str,
    /// Boxed [`SharedDelegate`] for the entry's message and response types.
    delegate: Arc<dyn Any + Send + Sync>,
}

// ============================================================================
// SECTION: Delegate Registry
// ============================================================================

/// Read-mostly registry of delegates keyed by message type.
#[derive(Default)]
pub struct DelegateRegistry {
    /// Registered delegates keyed by message type.
    entries: RwLock<BTreeMap<MessageType, DelegateEntry>>,
}

impl DelegateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `delegate` under its message type.
    ///
    /// Returns `true` when a previously registered delegate was replaced.
    pub fn register<D>(&self, delegate: D) -> bool
    where
        D: DispatcherDelegate + 'static,
    {
        let message_type = MessageType::of::<D::Message>();
        let shared: SharedDelegate<D::Message, D::Response> = Arc::new(delegate);
        let entry = DelegateEntry {
            response_type: type_name::<D::Response>(),
            delegate: Arc::new(shared),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(message_type, entry)
            .is_some()
    }

    /// Resolves the delegate for message type `M` producing `R`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] when no delegate is registered for `M`,
    /// or [`LookupError::ResponseTypeMismatch`] when it does not produce `R`.
    pub fn resolve<M, R>(&self) -> Result<SharedDelegate<M, R>, LookupError>
    where
        M: RemoteMessage,
        R: Send + 'static,
    {
        let message_type = MessageType::of::<M>();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(&message_type).ok_or(LookupError::NotFound {
            message_type: message_type.name(),
        })?;
        entry.delegate.downcast_ref::<SharedDelegate<M, R>>().map(Arc::clone).ok_or(
            LookupError::ResponseTypeMismatch {
                message_type: message_type.name(),
                registered: entry.response_type,
                requested: type_name::<R>(),
            },
        )
    }

    /// Removes the delegate for `message_type`, returning true when one existed.
    pub fn unregister(&self, message_type: MessageType) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&message_type)
            .is_some()
    }

    /// Returns true when a delegate is registered for `message_type`.
    #[must_use]
    pub fn contains(&self, message_type: MessageType) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(&message_type)
    }

    /// Returns the registered message types.
    #[must_use]
    pub fn message_types(&self) -> Vec<MessageType> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).keys().copied().collect()
    }

    /// Returns the number of registered delegates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no delegates are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DelegateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateRegistry").field("message_types", &self.message_types()).finish()
    }
}
