// crates/dsp-dispatch-core/src/policy.rs
// ============================================================================
// Module: Policy Evaluation Interface
// Description: Policy model, evaluation context, and evaluator contract.
// Purpose: Gate outbound dispatches on an external access-control decision.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The dispatcher does not evaluate policies itself. When a message type is
//! bound to a policy scope, the dispatcher resolves the [`Policy`] and
//! optional [`PolicySubject`] from the message and hands them, together with a
//! [`PolicyContext`], to the injected [`PolicyEvaluator`].
//! Invariants:
//! - A failed evaluation stops the dispatch before any credential request.
//! - The context is keyed by value type and is inspectable by key.
//!
//! Security posture: policy evaluation is a trust boundary; evaluators must
//! fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::any::TypeId;
use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Policy Model
// ============================================================================

/// Usage-control policy evaluated before dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy identifier.
    #[serde(default)]
    pub uid: Option<String>,
    /// Party issuing the policy.
    #[serde(default)]
    pub assigner: Option<String>,
    /// Party the policy is granted to.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Asset the policy applies to.
    #[serde(default)]
    pub target: Option<String>,
    /// Permitted actions.
    #[serde(default)]
    pub permissions: Vec<PolicyRule>,
    /// Prohibited actions.
    #[serde(default)]
    pub prohibitions: Vec<PolicyRule>,
    /// Duties that must be fulfilled.
    #[serde(default)]
    pub obligations: Vec<PolicyRule>,
    /// Additional properties carried through unchanged.
    #[serde(default)]
    pub extensible_properties: BTreeMap<String, Value>,
}

impl Policy {
    /// Returns an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with the policy identifier set.
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Returns a copy with the target set.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Returns a copy with a permission appended.
    #[must_use]
    pub fn with_permission(mut self, rule: PolicyRule) -> Self {
        self.permissions.push(rule);
        self
    }

    /// Returns a copy with a prohibition appended.
    #[must_use]
    pub fn with_prohibition(mut self, rule: PolicyRule) -> Self {
        self.prohibitions.push(rule);
        self
    }

    /// Returns true when the policy has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.prohibitions.is_empty() && self.obligations.is_empty()
    }
}

/// Single permission, prohibition, or duty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Action the rule governs.
    pub action: String,
    /// Constraints restricting the action.
    #[serde(default)]
    pub constraints: Vec<PolicyConstraint>,
}

impl PolicyRule {
    /// Creates an unconstrained rule for the action.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            constraints: Vec::new(),
        }
    }

    /// Returns a copy with a constraint appended.
    #[must_use]
    pub fn with_constraint(mut self, constraint: PolicyConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Atomic constraint `left_operand operator right_operand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConstraint {
    /// Left operand key.
    pub left_operand: String,
    /// Comparison operator label.
    pub operator: String,
    /// Right operand value.
    pub right_operand: Value,
}

/// Party the policy is evaluated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySubject {
    /// Subject identifier.
    pub id: String,
    /// Verified subject claims.
    #[serde(default)]
    pub claims: BTreeMap<String, Value>,
}

impl PolicySubject {
    /// Creates a subject without claims.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            claims: BTreeMap::new(),
        }
    }

    /// Returns a copy with a claim set.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// SECTION: Policy Context
// ============================================================================

/// Context entry with its type name.
struct ContextEntry {
    /// Type name of the stored value.
    type_name: &'static str,
    /// Stored value.
    value: Box<dyn Any + Send + Sync>,
}

/// Evaluation context keyed by value type.
///
/// # Invariants
/// - At most one value per type; inserting again replaces the value.
#[derive(Default)]
pub struct PolicyContext {
    /// Entries keyed by value type.
    entries: BTreeMap<TypeId, ContextEntry>,
}

impl PolicyContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries.insert(
            TypeId::of::<T>(),
            ContextEntry {
                type_name: type_name::<T>(),
                value: Box::new(value),
            },
        );
    }

    /// Returns a copy with `value` stored.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Returns the value of type `T`, if present.
    #[must_use]
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.entries.get(&TypeId::of::<T>()).and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Returns true when a value of type `T` is present.
    #[must_use]
    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Returns the type names of the stored values.
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.values().map(|entry| entry.type_name).collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PolicyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyContext").field("keys", &self.keys()).finish()
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Policy evaluation failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Policy evaluated to a denial.
    #[error("policy denied: {0}")]
    Denied(String),
    /// Evaluator failed to reach a decision.
    #[error("policy evaluation failed: {0}")]
    EvaluationFailed(String),
}

/// External policy evaluation engine.
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluates `policy` in `scope` for the optional subject.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when the policy does not permit the dispatch.
    fn evaluate(
        &self,
        scope: &str,
        policy: &Policy,
        subject: Option<&PolicySubject>,
        context: &PolicyContext,
    ) -> Result<(), PolicyError>;
}
