// crates/dsp-dispatch-config/src/decorator.rs
// ============================================================================
// Module: Static Token Decorator
// Description: Applies a configured scope and claims to token parameters.
// Purpose: Express the `[token]` section as a token decorator.
// Dependencies: dsp-dispatch-core, serde_json
// ============================================================================

//! Token decorator for the `[token]` configuration section.

use std::collections::BTreeMap;

use dsp_dispatch_core::TokenDecorator;
use dsp_dispatch_core::TokenParametersBuilder;
use serde_json::Value;

/// Decorator setting a fixed scope and claims on every dispatch.
///
/// Claims overwrite values set by earlier decorators with the same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticScopeDecorator {
    /// Scope to request, if any.
    scope: Option<String>,
    /// Claims to request.
    claims: BTreeMap<String, Value>,
}

impl StaticScopeDecorator {
    /// Creates a decorator for `scope` and `claims`.
    #[must_use]
    pub const fn new(scope: Option<String>, claims: BTreeMap<String, Value>) -> Self {
        Self {
            scope,
            claims,
        }
    }

    /// Returns the configured scope.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl TokenDecorator for StaticScopeDecorator {
    fn decorate(&self, builder: TokenParametersBuilder) -> TokenParametersBuilder {
        let builder = match &self.scope {
            Some(scope) => builder.scope(scope.clone()),
            None => builder,
        };
        self.claims
            .iter()
            .fold(builder, |builder, (name, value)| builder.claim(name.clone(), value.clone()))
    }
}
