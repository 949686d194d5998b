// crates/dsp-dispatch-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config and wiring tests.
// Purpose: Reduce duplication across integration tests for dsp-dispatch-config.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]
#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use dsp_dispatch_config::DispatchConfig;
use dsp_dispatch_core::DATASPACE_PROTOCOL_HTTP;
use dsp_dispatch_core::MessageType;
use dsp_dispatch_core::PolicyContext;
use dsp_dispatch_core::RemoteMessage;
use dsp_dispatch_core::TokenParameters;
use serde::Serialize;

/// Smallest valid config body: a default token is the only required setting.
pub const MINIMAL_CONFIG: &str = "[credentials]\ndefault_token = \"token\"\n";

/// Writes `contents` to `dsp-dispatch.toml` under `dir`.
pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("dsp-dispatch.toml");
    fs::write(&path, contents).unwrap_or_else(|err| panic!("write config: {err}"));
    path
}

/// Parses TOML into a validated config.
pub fn config_from_toml(contents: &str) -> Result<DispatchConfig, String> {
    DispatchConfig::from_toml_str(contents).map_err(|err| err.to_string())
}

/// Asserts that parsing fails with an error containing `needle`.
pub fn assert_invalid(contents: &str, needle: &str) {
    match config_from_toml(contents) {
        Err(error) => assert!(error.contains(needle), "error '{error}' did not contain '{needle}'"),
        Ok(_) => panic!("expected invalid config for:\n{contents}"),
    }
}

/// Catalog request used by policy and wiring tests.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogRequest {
    /// Counterparty address.
    #[serde(skip)]
    pub address: String,
    /// Filter forwarded in the body.
    pub filter: String,
}

impl CatalogRequest {
    /// Creates a request to `address`.
    pub fn to(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            filter: "all".to_string(),
        }
    }
}

impl RemoteMessage for CatalogRequest {
    fn protocol(&self) -> &str {
        DATASPACE_PROTOCOL_HTTP
    }

    fn counter_party_address(&self) -> &str {
        &self.address
    }
}

/// Transfer start message used to contrast message type rules.
#[derive(Debug, Clone, Serialize)]
pub struct TransferStart {
    /// Counterparty address.
    #[serde(skip)]
    pub address: String,
}

impl RemoteMessage for TransferStart {
    fn protocol(&self) -> &str {
        DATASPACE_PROTOCOL_HTTP
    }

    fn counter_party_address(&self) -> &str {
        &self.address
    }
}

/// Builds the context the dispatcher supplies for `M` sent to `audience`.
pub fn context_for<M: RemoteMessage>(audience: &str) -> PolicyContext {
    let parameters = TokenParameters::builder()
        .audience(audience)
        .build()
        .unwrap_or_else(|err| panic!("token parameters: {err}"));
    PolicyContext::new().with(parameters).with(MessageType::of::<M>())
}
