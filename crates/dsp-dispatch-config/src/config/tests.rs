// crates/dsp-dispatch-config/src/config/tests.rs
// ============================================================================
// Module: Config Helper Unit Tests
// Description: Path resolution and value limits for config loading.
// Purpose: Ensure private validation helpers fail closed.
// Dependencies: dsp-dispatch-config
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions."
)]

use std::path::Path;
use std::path::PathBuf;

use super::ConfigError;
use super::MAX_PATH_COMPONENT_LENGTH;
use super::MAX_TIMEOUT_MS;
use super::MAX_TOKEN_LENGTH;
use super::MAX_TOTAL_PATH_LENGTH;
use super::resolve_path;
use super::validate_path;
use super::validate_path_string;
use super::validate_timeout;
use super::validate_token;

#[test]
fn explicit_path_wins_over_environment() {
    let resolved = resolve_path(Some(Path::new("custom.toml"))).unwrap();
    assert_eq!(resolved, PathBuf::from("custom.toml"));
}

#[test]
fn validate_path_rejects_long_component() {
    let path = PathBuf::from("a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
    let error = validate_path(&path).unwrap_err();
    assert!(error.to_string().contains("component too long"));
}

#[test]
fn validate_path_rejects_long_total() {
    let component = "a".repeat(MAX_PATH_COMPONENT_LENGTH);
    let count = MAX_TOTAL_PATH_LENGTH / MAX_PATH_COMPONENT_LENGTH + 1;
    let parts: Vec<String> = (0 .. count).map(|_| component.clone()).collect();
    let error = validate_path(Path::new(&parts.join("/"))).unwrap_err();
    assert!(error.to_string().contains("max length"));
}

#[test]
fn validate_path_string_rejects_blank() {
    let error = validate_path_string("audit.path", "   ").unwrap_err();
    assert_eq!(error, ConfigError::Invalid("audit.path must be non-empty".to_string()));
}

#[test]
fn validate_token_never_echoes_value() {
    let error = validate_token("credentials.default_token", "secret\nvalue").unwrap_err();
    assert!(error.to_string().contains("control characters"));
    assert!(!error.to_string().contains("secret"));
}

#[test]
fn validate_token_rejects_oversized() {
    let error = validate_token("credentials.default_token", &"t".repeat(MAX_TOKEN_LENGTH + 1))
        .unwrap_err();
    assert!(error.to_string().contains("max length"));
}

#[test]
fn validate_timeout_bounds() {
    assert!(validate_timeout("transport.request_timeout_ms", 0).is_err());
    assert!(validate_timeout("transport.request_timeout_ms", 1).is_ok());
    assert!(validate_timeout("transport.request_timeout_ms", MAX_TIMEOUT_MS).is_ok());
    assert!(validate_timeout("transport.request_timeout_ms", MAX_TIMEOUT_MS + 1).is_err());
}
