// crates/dsp-dispatch-config/src/config.rs
// ============================================================================
// Module: Dispatch Configuration
// Description: Configuration loading and validation for outbound dispatch.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: dsp-dispatch-core, dsp-dispatch-http, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys, blank values, and inconsistent sections are rejected so a
//! typo never silently widens what the dispatcher is allowed to do.
//! Security posture: config inputs are untrusted and may carry secrets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use dsp_dispatch_core::AuthorizationStyle;
use dsp_dispatch_core::DATASPACE_PROTOCOL_HTTP;
use dsp_dispatch_http::DEFAULT_MAX_RESPONSE_BYTES;
use dsp_dispatch_http::HttpTransportConfig;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::credentials::StaticCredentialProvider;
use crate::decorator::StaticScopeDecorator;
use crate::policy::DispatchPolicy;
use crate::policy::PolicyEngine;
use crate::policy::StaticPolicyConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "dsp-dispatch.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "DSP_DISPATCH_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum protocol identifier length.
pub(crate) const MAX_PROTOCOL_LENGTH: usize = 128;
/// Maximum number of configured static tokens.
pub(crate) const MAX_STATIC_TOKENS: usize = 256;
/// Maximum length of a static token.
pub(crate) const MAX_TOKEN_LENGTH: usize = 8 * 1024;
/// Maximum number of static token claims.
pub(crate) const MAX_TOKEN_CLAIMS: usize = 64;
/// Maximum length of an environment variable name.
pub(crate) const MAX_ENV_NAME_LENGTH: usize = 128;
/// Upper bound for transport timeouts in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 600_000;
/// Upper bound for the response body limit (64 MiB).
pub(crate) const MAX_RESPONSE_LIMIT_BYTES: usize = 64 * 1024 * 1024;
/// Maximum length of the user agent string.
pub(crate) const MAX_USER_AGENT_LENGTH: usize = 256;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Dispatch configuration loaded from `dsp-dispatch.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Dispatcher identity and header settings.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// HTTP transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Static token decorations.
    #[serde(default)]
    pub token: TokenConfig,
    /// Static credential configuration.
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Dispatch policy configuration.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl DispatchConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from `path`, then [`CONFIG_ENV_VAR`], then
    /// [`DEFAULT_CONFIG_NAME`] in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatcher.validate()?;
        self.transport.validate()?;
        self.token.validate()?;
        self.credentials.validate()?;
        self.policy.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Dispatcher identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Protocol identifier reported by the dispatcher.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Format of the `Authorization` header.
    #[serde(default)]
    pub authorization: AuthorizationStyle,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            authorization: AuthorizationStyle::default(),
        }
    }
}

impl DispatcherConfig {
    /// Validates dispatcher identity settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let protocol = self.protocol.trim();
        if protocol.is_empty() {
            return Err(ConfigError::Invalid("dispatcher.protocol must be non-empty".to_string()));
        }
        if protocol.len() > MAX_PROTOCOL_LENGTH {
            return Err(ConfigError::Invalid("dispatcher.protocol exceeds max length".to_string()));
        }
        if protocol != self.protocol {
            return Err(ConfigError::Invalid(
                "dispatcher.protocol must not have surrounding whitespace".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// HTTP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// TCP connect timeout in milliseconds.
    ///
    /// When omitted, the default is capped at `request_timeout_ms`.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Maximum accepted response body size.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Optional `User-Agent` override.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            user_agent: None,
        }
    }
}

impl TransportConfig {
    /// Validates transport limits.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("transport.request_timeout_ms", self.request_timeout_ms)?;
        if let Some(connect_timeout_ms) = self.connect_timeout_ms {
            validate_timeout("transport.connect_timeout_ms", connect_timeout_ms)?;
            if connect_timeout_ms > self.request_timeout_ms {
                return Err(ConfigError::Invalid(
                    "transport.connect_timeout_ms must not exceed request_timeout_ms".to_string(),
                ));
            }
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_LIMIT_BYTES {
            return Err(ConfigError::Invalid(format!(
                "transport.max_response_bytes must be between 1 and {MAX_RESPONSE_LIMIT_BYTES}"
            )));
        }
        if let Some(user_agent) = &self.user_agent {
            let trimmed = user_agent.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::Invalid(
                    "transport.user_agent must be non-empty".to_string(),
                ));
            }
            if trimmed.len() > MAX_USER_AGENT_LENGTH {
                return Err(ConfigError::Invalid(
                    "transport.user_agent exceeds max length".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Returns the effective connect timeout in milliseconds.
    #[must_use]
    pub fn effective_connect_timeout_ms(&self) -> u64 {
        self.connect_timeout_ms
            .unwrap_or_else(|| default_connect_timeout_ms().min(self.request_timeout_ms))
    }

    /// Builds the HTTP client settings.
    #[must_use]
    pub fn http_config(&self) -> HttpTransportConfig {
        let defaults = HttpTransportConfig::default();
        HttpTransportConfig {
            connect_timeout: Duration::from_millis(self.effective_connect_timeout_ms()),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_response_bytes: self.max_response_bytes,
            user_agent: self
                .user_agent
                .as_deref()
                .map_or(defaults.user_agent, |value| value.trim().to_string()),
        }
    }
}

// ============================================================================
// SECTION: Token
// ============================================================================

/// Static token decoration applied to every dispatch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Scope requested for every token.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional claims requested for every token.
    #[serde(default)]
    pub claims: BTreeMap<String, Value>,
}

impl TokenConfig {
    /// Validates token decoration settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(scope) = &self.scope
            && scope.trim().is_empty()
        {
            return Err(ConfigError::Invalid("token.scope must be non-empty".to_string()));
        }
        if self.claims.len() > MAX_TOKEN_CLAIMS {
            return Err(ConfigError::Invalid("token.claims exceeds max entries".to_string()));
        }
        if self.claims.keys().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("token.claims names must be non-empty".to_string()));
        }
        Ok(())
    }

    /// Returns true when no decoration is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scope.is_none() && self.claims.is_empty()
    }

    /// Builds the decorator, or `None` when nothing is configured.
    #[must_use]
    pub fn decorator(&self) -> Option<StaticScopeDecorator> {
        if self.is_empty() {
            return None;
        }
        Some(StaticScopeDecorator::new(self.scope.clone(), self.claims.clone()))
    }
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Static credential configuration.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Tokens keyed by audience (counterparty address).
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
    /// Token used when no audience entry matches.
    #[serde(default)]
    pub default_token: Option<String>,
    /// Environment variable read at dispatch time when nothing else matches.
    #[serde(default)]
    pub token_env: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("audiences", &self.tokens.keys().collect::<Vec<_>>())
            .field("default_token", &self.default_token.as_ref().map(|_| "<redacted>"))
            .field("token_env", &self.token_env)
            .finish()
    }
}

impl CredentialsConfig {
    /// Validates static credential settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.len() > MAX_STATIC_TOKENS {
            return Err(ConfigError::Invalid("credentials.tokens exceeds max entries".to_string()));
        }
        for (audience, token) in &self.tokens {
            if audience.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "credentials.tokens audiences must be non-empty".to_string(),
                ));
            }
            validate_token(&format!("credentials.tokens[{audience}]"), token)?;
        }
        if let Some(token) = &self.default_token {
            validate_token("credentials.default_token", token)?;
        }
        if let Some(name) = &self.token_env {
            let valid = !name.is_empty()
                && name.len() <= MAX_ENV_NAME_LENGTH
                && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
            if !valid {
                return Err(ConfigError::Invalid(
                    "credentials.token_env must be a valid environment variable name".to_string(),
                ));
            }
        }
        if self.is_empty() {
            return Err(ConfigError::Invalid(
                "credentials requires tokens, default_token, or token_env".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true when no credential source is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.default_token.is_none() && self.token_env.is_none()
    }

    /// Builds the static credential provider.
    #[must_use]
    pub fn provider(&self) -> StaticCredentialProvider {
        let mut provider = StaticCredentialProvider::new();
        for (audience, token) in &self.tokens {
            provider = provider.with_token(audience.clone(), token.clone());
        }
        if let Some(token) = &self.default_token {
            provider = provider.with_default_token(token.clone());
        }
        if let Some(name) = &self.token_env {
            provider = provider.with_token_env(name.clone());
        }
        provider
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Policy engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Policy engine selection.
    #[serde(default)]
    pub engine: PolicyEngine,
    /// Static policy configuration.
    #[serde(default, rename = "static")]
    pub static_policy: Option<StaticPolicyConfig>,
}

impl PolicyConfig {
    /// Validates policy configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when policy settings are invalid.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.engine {
            PolicyEngine::Static => {
                let Some(static_policy) = &self.static_policy else {
                    return Err(ConfigError::Invalid(
                        "policy.engine=static requires policy.static".to_string(),
                    ));
                };
                static_policy.validate().map_err(ConfigError::Invalid)?;
            }
            PolicyEngine::PermitAll | PolicyEngine::DenyAll => {
                if self.static_policy.is_some() {
                    return Err(ConfigError::Invalid(
                        "policy.static only allowed when engine=static".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Builds the runtime dispatch policy adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is missing static policy data.
    pub fn dispatch_policy(&self) -> Result<DispatchPolicy, ConfigError> {
        match self.engine {
            PolicyEngine::PermitAll => Ok(DispatchPolicy::PermitAll),
            PolicyEngine::DenyAll => Ok(DispatchPolicy::DenyAll),
            PolicyEngine::Static => {
                let static_policy = self.static_policy.clone().ok_or_else(|| {
                    ConfigError::Invalid("policy.static is required for static engine".to_string())
                })?;
                Ok(DispatchPolicy::Static(static_policy))
            }
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard audit events.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink receiving dispatch events.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path (JSON lines), required for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.sink=file requires audit.path".to_string()))
            }
            (AuditSinkKind::Stderr | AuditSinkKind::None, Some(_)) => {
                Err(ConfigError::Invalid("audit.path only allowed when sink=file".to_string()))
            }
            (AuditSinkKind::Stderr | AuditSinkKind::None, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a static token value without echoing it.
fn validate_token(field: &str, token: &str) -> Result<(), ConfigError> {
    if token.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if token.len() > MAX_TOKEN_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if token.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} contains control characters")));
    }
    Ok(())
}

/// Validates a timeout value in milliseconds.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between 1 and {MAX_TIMEOUT_MS}"
        )));
    }
    Ok(())
}

/// Returns the default protocol identifier.
fn default_protocol() -> String {
    DATASPACE_PROTOCOL_HTTP.to_string()
}

/// Returns the default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Returns the default request timeout.
const fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Returns the default response body limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

#[cfg(test)]
mod tests;
