//! Dispatcher wiring tests for dsp-dispatch-config.
// crates/dsp-dispatch-config/tests/wiring.rs
// =============================================================================
// Module: Dispatcher Wiring Tests
// Description: Dispatchers built from config against an in-process server.
// Purpose: Ensure every config section reaches the running dispatcher.
// =============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::fs;
use std::sync::Arc;
use std::sync::Mutex;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::routing::post;
use common::CatalogRequest;
use common::TransferStart;
use common::config_from_toml;
use dsp_dispatch_config::WiringError;
use dsp_dispatch_config::build_dispatcher;
use dsp_dispatch_core::DispatchError;
use dsp_dispatch_core::NoContentDelegate;
use dsp_dispatch_core::Policy;
use dsp_dispatch_core::PolicyError;
use dsp_dispatch_core::PolicyScope;
use serde_json::Value;
use tempfile::tempdir;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Server Fixture
// ============================================================================

type Seen = Arc<Mutex<Vec<String>>>;

async fn record_handler(State(seen): State<Seen>, headers: HeaderMap) -> StatusCode {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.lock().unwrap().push(authorization);
    StatusCode::OK
}

async fn spawn_server(seen: Seen) -> (String, oneshot::Sender<()>) {
    let app = Router::new()
        .route("/catalog/request", post(record_handler))
        .route("/transfers/start", post(record_handler))
        .with_state(seen);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    (format!("http://{addr}"), shutdown_tx)
}

fn config_toml(address: &str, audit_path: &str) -> String {
    format!(
        r#"
        [dispatcher]
        authorization = "bearer"

        [transport]
        request_timeout_ms = 2000

        [token]
        scope = "catalog:read"

        [credentials]
        tokens = {{ "{address}" = "provider-token" }}

        [policy]
        engine = "static"

        [policy.static]
        default = "deny"

        [[policy.static.rules]]
        effect = "permit"
        message_types = ["CatalogRequest"]
        audiences = ["{address}"]

        [audit]
        sink = "file"
        path = "{audit_path}"
        "#
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn configured_dispatcher_sends_and_enforces_policy() {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let (address, shutdown) = spawn_server(Arc::clone(&seen)).await;
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let config = config_from_toml(&config_toml(&address, &audit_path.to_string_lossy())).unwrap();

    let dispatcher = build_dispatcher(&config).unwrap();
    dispatcher.register_delegate(NoContentDelegate::<CatalogRequest>::post(|_| {
        "catalog/request".to_string()
    }));
    dispatcher.register_delegate(NoContentDelegate::<TransferStart>::post(|_| {
        "transfers/start".to_string()
    }));
    dispatcher.register_policy_scope(PolicyScope::<CatalogRequest>::new("catalog", |_| {
        Policy::new()
    }));
    dispatcher.register_policy_scope(PolicyScope::<TransferStart>::new("transfer", |_| {
        Policy::new()
    }));

    let sent: Result<(), DispatchError> = dispatcher.send(CatalogRequest::to(&address)).await;
    let denied: Result<(), DispatchError> = dispatcher
        .send(TransferStart {
            address: address.clone(),
        })
        .await;
    let _ = shutdown.send(());

    sent.unwrap();
    assert!(matches!(
        denied,
        Err(DispatchError::PolicyDenied {
            ref scope,
            source: PolicyError::Denied(_),
        }) if scope == "transfer"
    ));
    assert_eq!(*seen.lock().unwrap(), vec!["Bearer provider-token".to_string()]);

    let log = fs::read_to_string(&audit_path).unwrap();
    let events: Vec<Value> =
        log.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["outcome"], "ok");
    assert_eq!(events[0]["scope"], "catalog:read");
    assert_eq!(events[0]["policy_scope"], "catalog");
    assert_eq!(events[1]["outcome"], "rejected");
    assert_eq!(events[1]["error_kind"], "policy_denied");
    assert!(!log.contains("provider-token"));
}

#[tokio::test]
async fn unknown_audience_fails_before_the_network() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let config = config_from_toml(&config_toml(
        "http://127.0.0.1:9",
        &audit_path.to_string_lossy(),
    ))
    .unwrap();
    let dispatcher = build_dispatcher(&config).unwrap();
    dispatcher.register_delegate(NoContentDelegate::<CatalogRequest>::post(|_| {
        "catalog/request".to_string()
    }));

    let result: Result<(), DispatchError> =
        dispatcher.send(CatalogRequest::to("http://127.0.0.1:10")).await;

    assert!(matches!(result, Err(DispatchError::CredentialAcquisition(_))));
}

#[test]
fn unopenable_audit_log_is_reported() {
    let dir = tempdir().unwrap();
    let audit_path = dir.path().join("missing-dir").join("audit.jsonl");
    let config =
        config_from_toml(&config_toml("http://provider", &audit_path.to_string_lossy())).unwrap();

    let error = build_dispatcher(&config).unwrap_err();

    assert!(matches!(error, WiringError::Audit(_)));
}

#[test]
fn configured_protocol_is_reported() {
    let config = config_from_toml(
        r#"
        [dispatcher]
        protocol = "dataspace-protocol-http:2025-1"

        [credentials]
        default_token = "token"

        [audit]
        sink = "none"
        "#,
    )
    .unwrap();

    let dispatcher = build_dispatcher(&config).unwrap();

    assert_eq!(dispatcher.protocol(), "dataspace-protocol-http:2025-1");
}
