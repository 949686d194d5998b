// crates/dsp-dispatch-config/src/policy.rs
// ============================================================================
// Module: Policy Engine Adapters
// Description: Deterministic policy evaluators for dispatch authorization.
// Purpose: Provide swappable, fail-closed policy evaluation for dispatch.
// Dependencies: dsp-dispatch-core, serde
// ============================================================================

//! ## Overview
//! Configured [`PolicyEvaluator`] implementations. The static engine matches
//! ordered rules on the policy scope name, the token audience, and the
//! message type carried in the [`PolicyContext`].
//!
//! Security posture: policy evaluation is a trust boundary; rules that need
//! context the dispatcher did not supply never match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use dsp_dispatch_core::MessageType;
use dsp_dispatch_core::Policy;
use dsp_dispatch_core::PolicyContext;
use dsp_dispatch_core::PolicyError;
use dsp_dispatch_core::PolicyEvaluator;
use dsp_dispatch_core::PolicySubject;
use dsp_dispatch_core::TokenParameters;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Policy Model
// ============================================================================

/// Policy engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEngine {
    /// Permit all dispatches.
    #[default]
    PermitAll,
    /// Deny all dispatches.
    DenyAll,
    /// Evaluate deterministic static rules.
    Static,
}

/// Static policy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticPolicyConfig {
    /// Default decision when no rules match.
    #[serde(default = "default_static_effect")]
    pub default: PolicyEffect,
    /// Ordered list of policy rules.
    #[serde(default)]
    pub rules: Vec<StaticPolicyRule>,
}

impl Default for StaticPolicyConfig {
    fn default() -> Self {
        Self {
            default: default_static_effect(),
            rules: Vec::new(),
        }
    }
}

impl StaticPolicyConfig {
    /// Validates static policy configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when defaults or rules are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.default == PolicyEffect::Error {
            return Err("static policy default must be permit or deny".to_string());
        }
        for (idx, rule) in self.rules.iter().enumerate() {
            rule.validate().map_err(|err| format!("policy.static.rules[{idx}]: {err}"))?;
        }
        Ok(())
    }

    /// Evaluates the rules for one dispatch; the first matching rule wins.
    fn evaluate(&self, scope: &str, context: &PolicyContext) -> Result<(), PolicyError> {
        for rule in &self.rules {
            if rule.matches(scope, context) {
                return rule.effect.to_decision(scope, rule.error_message.as_deref());
            }
        }
        self.default.to_decision(scope, None)
    }
}

/// Policy rule effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEffect {
    /// Permit the dispatch.
    Permit,
    /// Deny the dispatch.
    Deny,
    /// Raise a policy evaluation error.
    Error,
}

impl PolicyEffect {
    /// Converts the effect into an evaluator result.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] for `deny` and `error`.
    fn to_decision(self, scope: &str, error_message: Option<&str>) -> Result<(), PolicyError> {
        match self {
            Self::Permit => Ok(()),
            Self::Deny => Err(PolicyError::Denied(format!("scope {scope} denied by static policy"))),
            Self::Error => Err(PolicyError::EvaluationFailed(
                error_message.unwrap_or("policy rule error").to_string(),
            )),
        }
    }
}

/// Policy rule for static evaluation.
///
/// Empty selector lists match anything; a rule needs at least one selector.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticPolicyRule {
    /// Effect to apply when the rule matches.
    pub effect: PolicyEffect,
    /// Optional error message when effect is `error`.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Policy scope names the rule applies to.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Token audiences (counterparty addresses) the rule applies to.
    #[serde(default)]
    pub audiences: Vec<String>,
    /// Message types the rule applies to, by short or full type name.
    #[serde(default)]
    pub message_types: Vec<String>,
}

impl StaticPolicyRule {
    /// Validates rule configuration for internal consistency.
    fn validate(&self) -> Result<(), String> {
        if self.scopes.is_empty() && self.audiences.is_empty() && self.message_types.is_empty() {
            return Err("rule must include at least one match criterion".to_string());
        }
        if self.effect == PolicyEffect::Error
            && self.error_message.as_deref().unwrap_or("").is_empty()
        {
            return Err("error effect requires error_message".to_string());
        }
        let selectors = self.scopes.iter().chain(&self.audiences).chain(&self.message_types);
        for value in selectors {
            if value.trim().is_empty() {
                return Err("selectors must be non-empty".to_string());
            }
        }
        Ok(())
    }

    /// Returns true when the rule matches the scope and dispatch context.
    fn matches(&self, scope: &str, context: &PolicyContext) -> bool {
        if !self.scopes.is_empty() && !self.scopes.iter().any(|item| item == scope) {
            return false;
        }
        if !self.audiences.is_empty() {
            let Some(parameters) = context.get::<TokenParameters>() else {
                return false;
            };
            if !self.audiences.iter().any(|item| item == parameters.audience()) {
                return false;
            }
        }
        if !self.message_types.is_empty() {
            let Some(message_type) = context.get::<MessageType>() else {
                return false;
            };
            let matched = self
                .message_types
                .iter()
                .any(|item| item == message_type.short_name() || item == message_type.name());
            if !matched {
                return false;
            }
        }
        true
    }
}

/// Returns the default static policy effect.
const fn default_static_effect() -> PolicyEffect {
    PolicyEffect::Deny
}

// ============================================================================
// SECTION: Dispatch Adapter
// ============================================================================

/// Runtime policy evaluator for dispatch authorization.
#[derive(Debug, Clone)]
pub enum DispatchPolicy {
    /// Permit all dispatches.
    PermitAll,
    /// Deny all dispatches.
    DenyAll,
    /// Static rule evaluation.
    Static(StaticPolicyConfig),
}

impl PolicyEvaluator for DispatchPolicy {
    fn evaluate(
        &self,
        scope: &str,
        _policy: &Policy,
        _subject: Option<&PolicySubject>,
        context: &PolicyContext,
    ) -> Result<(), PolicyError> {
        match self {
            Self::PermitAll => Ok(()),
            Self::DenyAll => Err(PolicyError::Denied(format!("scope {scope} denied by policy"))),
            Self::Static(policy) => policy.evaluate(scope, context),
        }
    }
}
