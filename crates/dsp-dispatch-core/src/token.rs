// crates/dsp-dispatch-core/src/token.rs
// ============================================================================
// Module: Token Parameters
// Description: Per-dispatch token parameters and their decorator pipeline.
// Purpose: Scope credential requests to the message counterparty.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every dispatch assembles its own [`TokenParametersBuilder`] with the
//! counterparty address as audience, passes it through the registered
//! [`TokenDecorator`]s in registration order, and seals it into immutable
//! [`TokenParameters`] before asking for a credential.
//! Invariants:
//! - Sealed parameters always carry a non-empty audience.
//! - Decorators only mutate the builder they receive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when sealing token parameters.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenParametersError {
    /// Audience was not set or is blank.
    #[error("token audience is missing")]
    MissingAudience,
    /// Scope was set to a blank value.
    #[error("token scope must not be blank")]
    BlankScope,
}

// ============================================================================
// SECTION: Token Parameters
// ============================================================================

/// Sealed token parameters for one credential request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenParameters {
    /// Token audience (counterparty address).
    audience: String,
    /// Optional token scope.
    scope: Option<String>,
    /// Additional claims requested for the token.
    claims: BTreeMap<String, Value>,
}

impl TokenParameters {
    /// Returns an empty builder.
    #[must_use]
    pub fn builder() -> TokenParametersBuilder {
        TokenParametersBuilder::default()
    }

    /// Returns the token audience.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Returns the token scope, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Returns the additional claims.
    #[must_use]
    pub const fn claims(&self) -> &BTreeMap<String, Value> {
        &self.claims
    }

    /// Returns a single claim by name.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

/// Mutable builder for [`TokenParameters`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenParametersBuilder {
    /// Token audience.
    audience: Option<String>,
    /// Token scope.
    scope: Option<String>,
    /// Additional claims.
    claims: BTreeMap<String, Value>,
}

impl TokenParametersBuilder {
    /// Sets the audience, replacing any previous value.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Sets the scope, replacing any previous value.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Clears the scope.
    #[must_use]
    pub fn clear_scope(mut self) -> Self {
        self.scope = None;
        self
    }

    /// Sets an additional claim, replacing any previous value.
    #[must_use]
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Returns the audience set so far.
    #[must_use]
    pub fn current_audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    /// Returns the scope set so far.
    #[must_use]
    pub fn current_scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Seals the builder.
    ///
    /// # Errors
    ///
    /// Returns [`TokenParametersError`] when the audience is missing or the
    /// scope is blank.
    pub fn build(self) -> Result<TokenParameters, TokenParametersError> {
        let audience = self
            .audience
            .filter(|audience| !audience.trim().is_empty())
            .ok_or(TokenParametersError::MissingAudience)?;
        if self.scope.as_deref().is_some_and(|scope| scope.trim().is_empty()) {
            return Err(TokenParametersError::BlankScope);
        }
        Ok(TokenParameters {
            audience,
            scope: self.scope,
            claims: self.claims,
        })
    }
}

// ============================================================================
// SECTION: Decorators
// ============================================================================

/// Adds or overwrites token parameters before they are sealed.
pub trait TokenDecorator: Send + Sync {
    /// Decorates the builder and returns it.
    fn decorate(&self, builder: TokenParametersBuilder) -> TokenParametersBuilder;
}

impl<F> TokenDecorator for F
where
    F: Fn(TokenParametersBuilder) -> TokenParametersBuilder + Send + Sync,
{
    fn decorate(&self, builder: TokenParametersBuilder) -> TokenParametersBuilder {
        self(builder)
    }
}

/// Ordered decorator pipeline.
#[derive(Clone, Default)]
pub struct TokenDecoratorChain {
    /// Decorators in registration order.
    decorators: Vec<Arc<dyn TokenDecorator>>,
}

impl TokenDecoratorChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a decorator.
    pub fn push(&mut self, decorator: Arc<dyn TokenDecorator>) {
        self.decorators.push(decorator);
    }

    /// Applies every decorator in registration order.
    #[must_use]
    pub fn apply(&self, builder: TokenParametersBuilder) -> TokenParametersBuilder {
        self.decorators.iter().fold(builder, |builder, decorator| decorator.decorate(builder))
    }

    /// Returns the number of decorators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    /// Returns true when the chain has no decorators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }
}

impl fmt::Debug for TokenDecoratorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenDecoratorChain").field("len", &self.decorators.len()).finish()
    }
}
