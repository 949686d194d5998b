// crates/dsp-dispatch-core/src/credential.rs
// ============================================================================
// Module: Credentials
// Description: Bearer credentials and the credential provider interface.
// Purpose: Obtain counterparty-scoped credentials for outbound requests.
// Dependencies: crate::token, async-trait, thiserror
// ============================================================================

//! ## Overview
//! A [`CredentialProvider`] turns sealed [`TokenParameters`] into a
//! [`Credential`]. Token issuance itself is external; the dispatcher only
//! requests and attaches credentials.
//! Invariants:
//! - Credentials are owned by a single dispatch and never persisted.
//! - Token values never appear in `Debug` output.
//!
//! Security posture: tokens are secrets and must not be logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::token::TokenParameters;

// ============================================================================
// SECTION: Credential
// ============================================================================

/// Opaque bearer credential plus metadata.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Token value.
    token: String,
    /// Optional lifetime reported by the issuer.
    expires_in: Option<Duration>,
    /// Additional issuer metadata.
    metadata: BTreeMap<String, String>,
}

impl Credential {
    /// Creates a credential for the token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_in: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Returns a copy with the lifetime set.
    #[must_use]
    pub const fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Returns a copy with a metadata entry set.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the token value.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the lifetime, if known.
    #[must_use]
    pub const fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    /// Returns the issuer metadata.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("metadata", &self.metadata)
            .finish()
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Credential acquisition failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Provider refused to issue a credential.
    #[error("credential request denied: {0}")]
    Denied(String),
    /// Provider could not be reached or failed internally.
    #[error("credential provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of counterparty-scoped credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Obtains a credential for the sealed token parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when no credential can be issued.
    async fn obtain_credential(
        &self,
        parameters: &TokenParameters,
    ) -> Result<Credential, CredentialError>;
}
