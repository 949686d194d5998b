// crates/dsp-dispatch-core/src/scope.rs
// ============================================================================
// Module: Policy Scope Registry
// Description: Binds message types to named policy scopes.
// Purpose: Decide per dispatch whether and how a policy is evaluated.
// Dependencies: crate::{message, policy}
// ============================================================================

//! ## Overview
//! A [`PolicyScope`] names the scope a message type is evaluated in and knows
//! how to resolve the [`Policy`] and optional [`PolicySubject`] from the
//! message. [`PolicyScopeRegistry`] keeps at most one scope per message type.
//! Invariants:
//! - Absence of a binding means no evaluation for that message type.
//! - A later registration for the same message type replaces the earlier one.
//! - Several message types may share a scope name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use crate::message::MessageType;
use crate::message::RemoteMessage;
use crate::policy::Policy;
use crate::policy::PolicySubject;

// ============================================================================
// SECTION: Policy Scope
// ============================================================================

/// Resolves the policy for a message.
type PolicyFn<M> = dyn Fn(&M) -> Policy + Send + Sync;
/// Extracts the policy subject from a message.
type SubjectFn<M> = dyn Fn(&M) -> Option<PolicySubject> + Send + Sync;

/// Scope binding for message type `M`.
pub struct PolicyScope<M> {
    /// Scope name passed to the evaluator.
    name: String,
    /// Policy resolver.
    policy: Arc<PolicyFn<M>>,
    /// Optional subject extractor.
    subject: Option<Arc<SubjectFn<M>>>,
}

impl<M: RemoteMessage> PolicyScope<M> {
    /// Creates a scope resolving the policy with `policy`.
    pub fn new<F>(name: impl Into<String>, policy: F) -> Self
    where
        F: Fn(&M) -> Policy + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            policy: Arc::new(policy),
            subject: None,
        }
    }

    /// Returns a copy extracting the policy subject with `subject`.
    #[must_use]
    pub fn with_subject<F>(mut self, subject: F) -> Self
    where
        F: Fn(&M) -> Option<PolicySubject> + Send + Sync + 'static,
    {
        self.subject = Some(Arc::new(subject));
        self
    }

    /// Returns the scope name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the policy for `message`.
    #[must_use]
    pub fn resolve_policy(&self, message: &M) -> Policy {
        (self.policy)(message)
    }

    /// Extracts the subject for `message`; `None` without an extractor.
    #[must_use]
    pub fn extract_subject(&self, message: &M) -> Option<PolicySubject> {
        self.subject.as_ref().and_then(|subject| subject(message))
    }
}

impl<M> fmt::Debug for PolicyScope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyScope")
            .field("name", &self.name)
            .field("has_subject", &self.subject.is_some())
            .finish()
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registered scope with its name.
struct ScopeEntry {
    /// Scope name for diagnostics.
    name: String,
    /// Boxed `Arc<PolicyScope<M>>` for the entry's message type.
    scope: Arc<dyn Any + Send + Sync>,
}

/// Read-mostly registry of policy scopes keyed by message type.
#[derive(Default)]
pub struct PolicyScopeRegistry {
    /// Registered scopes keyed by message type.
    entries: RwLock<BTreeMap<MessageType, ScopeEntry>>,
}

impl PolicyScopeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds message type `M` to `scope`.
    ///
    /// Returns `true` when a previous binding was replaced.
    pub fn register<M: RemoteMessage>(&self, scope: PolicyScope<M>) -> bool {
        let entry = ScopeEntry {
            name: scope.name.clone(),
            scope: Arc::new(Arc::new(scope)),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(MessageType::of::<M>(), entry)
            .is_some()
    }

    /// Returns the scope bound to message type `M`, if any.
    #[must_use]
    pub fn scope_for<M: RemoteMessage>(&self) -> Option<Arc<PolicyScope<M>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&MessageType::of::<M>())
            .and_then(|entry| entry.scope.downcast_ref::<Arc<PolicyScope<M>>>())
            .map(Arc::clone)
    }

    /// Returns the scope name bound to `message_type`, if any.
    #[must_use]
    pub fn scope_name(&self, message_type: MessageType) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message_type)
            .map(|entry| entry.name.clone())
    }

    /// Removes the binding for `message_type`, returning true when one existed.
    pub fn unregister(&self, message_type: MessageType) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&message_type)
            .is_some()
    }

    /// Returns true when `message_type` has a binding.
    #[must_use]
    pub fn contains(&self, message_type: MessageType) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(&message_type)
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no bindings exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PolicyScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let scopes: Vec<(&'static str, &str)> =
            entries.iter().map(|(key, entry)| (key.name(), entry.name.as_str())).collect();
        f.debug_struct("PolicyScopeRegistry").field("scopes", &scopes).finish()
    }
}
