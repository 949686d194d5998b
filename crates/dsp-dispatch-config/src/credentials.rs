// crates/dsp-dispatch-config/src/credentials.rs
// ============================================================================
// Module: Static Credentials
// Description: Credential provider backed by configured tokens.
// Purpose: Issue pre-shared tokens per counterparty audience.
// Dependencies: dsp-dispatch-core, async-trait
// ============================================================================

//! ## Overview
//! [`StaticCredentialProvider`] resolves a token for the sealed audience in
//! this order: an exact audience entry, the default token, then the
//! configured environment variable read at dispatch time. Anything else is
//! denied.
//! Security posture: tokens are secrets and never appear in `Debug` output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fmt;

use async_trait::async_trait;
use dsp_dispatch_core::Credential;
use dsp_dispatch_core::CredentialError;
use dsp_dispatch_core::CredentialProvider;
use dsp_dispatch_core::TokenParameters;

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Credential provider that hands out configured tokens.
#[derive(Clone, Default)]
pub struct StaticCredentialProvider {
    /// Tokens keyed by audience.
    tokens: BTreeMap<String, String>,
    /// Fallback token.
    default_token: Option<String>,
    /// Environment variable holding a fallback token.
    token_env: Option<String>,
}

impl StaticCredentialProvider {
    /// Creates a provider with no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the token issued for `audience`.
    #[must_use]
    pub fn with_token(mut self, audience: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(audience.into(), token.into());
        self
    }

    /// Sets the fallback token.
    #[must_use]
    pub fn with_default_token(mut self, token: impl Into<String>) -> Self {
        self.default_token = Some(token.into());
        self
    }

    /// Sets the environment variable consulted last.
    #[must_use]
    pub fn with_token_env(mut self, name: impl Into<String>) -> Self {
        self.token_env = Some(name.into());
        self
    }

    /// Resolves the token for `audience`.
    fn resolve(&self, audience: &str) -> Result<String, CredentialError> {
        if let Some(token) = self.tokens.get(audience) {
            return Ok(token.clone());
        }
        if let Some(token) = &self.default_token {
            return Ok(token.clone());
        }
        if let Some(name) = &self.token_env {
            return match env::var(name) {
                Ok(token) if !token.trim().is_empty() => Ok(token),
                _ => Err(CredentialError::Unavailable(format!(
                    "environment variable {name} is not set"
                ))),
            };
        }
        Err(CredentialError::Denied(format!("no credential configured for audience {audience}")))
    }
}

impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("audiences", &self.tokens.keys().collect::<Vec<_>>())
            .field("default_token", &self.default_token.is_some())
            .field("token_env", &self.token_env)
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn obtain_credential(
        &self,
        parameters: &TokenParameters,
    ) -> Result<Credential, CredentialError> {
        let token = self.resolve(parameters.audience())?;
        let mut credential = Credential::new(token);
        if let Some(scope) = parameters.scope() {
            credential = credential.with_metadata("scope", scope);
        }
        Ok(credential)
    }
}
