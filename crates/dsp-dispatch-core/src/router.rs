// crates/dsp-dispatch-core/src/router.rs
// ============================================================================
// Module: Dispatcher Router
// Description: Routes outbound messages to the dispatcher for their protocol.
// Purpose: Host several protocol dispatchers behind one entry point.
// Dependencies: crate::{dispatcher, message}, thiserror
// ============================================================================

//! ## Overview
//! [`DispatcherRouter`] keeps one [`RemoteMessageDispatcher`] per protocol
//! identifier and forwards each message to the dispatcher matching
//! [`RemoteMessage::protocol`].
//! Invariants:
//! - Protocol identifiers are unique; a later registration replaces the earlier one.
//! - Unknown protocols fail without touching any dispatcher.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use thiserror::Error;

use crate::dispatcher::DispatchError;
use crate::dispatcher::RemoteMessageDispatcher;
use crate::message::RemoteMessage;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Routing failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// No dispatcher is registered for the message protocol.
    #[error("no dispatcher registered for protocol {0}")]
    UnknownProtocol(String),
    /// The selected dispatcher failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Registry of dispatchers keyed by protocol identifier.
#[derive(Debug, Default)]
pub struct DispatcherRouter {
    /// Dispatchers keyed by protocol.
    dispatchers: RwLock<BTreeMap<String, Arc<RemoteMessageDispatcher>>>,
}

impl DispatcherRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `dispatcher` under its protocol.
    ///
    /// Returns `true` when a dispatcher for the same protocol was replaced.
    pub fn register(&self, dispatcher: Arc<RemoteMessageDispatcher>) -> bool {
        let protocol = dispatcher.protocol().to_string();
        self.dispatchers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(protocol, dispatcher)
            .is_some()
    }

    /// Returns the dispatcher for `protocol`, if registered.
    #[must_use]
    pub fn dispatcher(&self, protocol: &str) -> Option<Arc<RemoteMessageDispatcher>> {
        self.dispatchers.read().unwrap_or_else(PoisonError::into_inner).get(protocol).cloned()
    }

    /// Returns the registered protocol identifiers.
    #[must_use]
    pub fn protocols(&self) -> Vec<String> {
        self.dispatchers.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    /// Sends `message` through the dispatcher for its protocol.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownProtocol`] when no dispatcher matches, or
    /// the dispatcher's [`DispatchError`].
    pub async fn send<R, M>(&self, message: M) -> Result<R, RouterError>
    where
        M: RemoteMessage,
        R: Send + 'static,
    {
        let dispatcher = self
            .dispatcher(message.protocol())
            .ok_or_else(|| RouterError::UnknownProtocol(message.protocol().to_string()))?;
        Ok(dispatcher.send(message).await?)
    }
}
