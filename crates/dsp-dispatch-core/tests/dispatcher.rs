// crates/dsp-dispatch-core/tests/dispatcher.rs
// ============================================================================
// Module: Dispatcher Tests
// Description: Ordered dispatch pipeline behavior with recording collaborators.
// Purpose: Verify step ordering, short-circuiting, and credential attachment.
// Dependencies: dsp-dispatch-core, tokio
// ============================================================================
//! ## Overview
//! Drives [`RemoteMessageDispatcher::send`] against in-memory collaborators and
//! checks which of them were reached for each outcome.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::COUNTER_PARTY;
use common::Fixture;
use common::PendingTransport;
use common::RecordingCredentialProvider;
use common::RecordingPolicyEvaluator;
use common::RecordingTransport;
use common::StringDelegate;
use common::TestMessage;
use common::UnregisteredMessage;
use dsp_dispatch_core::AuthorizationStyle;
use dsp_dispatch_core::DATASPACE_PROTOCOL_HTTP;
use dsp_dispatch_core::DelegateError;
use dsp_dispatch_core::DispatchError;
use dsp_dispatch_core::DispatchErrorKind;
use dsp_dispatch_core::DispatchOutcome;
use dsp_dispatch_core::DispatcherBuildError;
use dsp_dispatch_core::DispatcherDelegate;
use dsp_dispatch_core::JsonDelegate;
use dsp_dispatch_core::MessageType;
use dsp_dispatch_core::Policy;
use dsp_dispatch_core::PolicyError;
use dsp_dispatch_core::PolicyScope;
use dsp_dispatch_core::PolicySubject;
use dsp_dispatch_core::RemoteMessage;
use dsp_dispatch_core::RemoteMessageDispatcher;
use dsp_dispatch_core::ResponseParser;
use dsp_dispatch_core::TokenParametersBuilder;
use dsp_dispatch_core::TransportError;
use dsp_dispatch_core::WireRequest;
use reqwest::StatusCode;

// ============================================================================
// SECTION: Helpers
// ============================================================================

async fn bounded<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future).await.expect("dispatch timed out")
}

struct FailingBuildDelegate;

impl DispatcherDelegate for FailingBuildDelegate {
    type Message = TestMessage;
    type Response = String;

    fn build_request(&self, _message: &TestMessage) -> Result<WireRequest, DelegateError> {
        Err(DelegateError::InvalidMessage("missing process id".to_string()))
    }

    fn parse_response(&self) -> ResponseParser<String> {
        ResponseParser::constant(String::new())
    }
}

// ============================================================================
// SECTION: Success Path
// ============================================================================

#[tokio::test]
async fn send_returns_parsed_response() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    let delegate = StringDelegate::new();
    let parsed = Arc::clone(&delegate.parsed);
    dispatcher.register_delegate(delegate);

    let result: String = bounded(dispatcher.send(TestMessage::new())).await.unwrap();

    assert_eq!(result, "response");
    assert_eq!(parsed.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.transport.calls(), 1);
    assert_eq!(fixture.credentials.last().audience(), COUNTER_PARTY);
    let request = &fixture.transport.requests()[0];
    assert_eq!(request.authorization(), Some("token"));
    assert_eq!(request.url().as_str(), "http://connector/");
}

#[tokio::test]
async fn registered_parser_is_shared_with_the_delegate() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    let delegate = StringDelegate::new();
    let parser = delegate.parser();
    dispatcher.register_delegate(delegate);

    let resolved = dispatcher.delegates().resolve::<TestMessage, String>().unwrap();
    assert!(resolved.parse_response().ptr_eq(&parser));
}

#[tokio::test]
async fn bearer_style_prefixes_the_token() {
    let fixture = Fixture::new();
    let dispatcher = fixture.builder().authorization(AuthorizationStyle::Bearer).build().unwrap();
    dispatcher.register_delegate(StringDelegate::new());

    let _: String = bounded(dispatcher.send(TestMessage::new())).await.unwrap();

    assert_eq!(fixture.transport.requests()[0].authorization(), Some("Bearer token"));
}

#[tokio::test]
async fn decorators_shape_token_parameters_in_order() {
    let fixture = Fixture::new();
    let dispatcher = fixture
        .builder()
        .token_decorator(|builder: TokenParametersBuilder| builder.scope("first"))
        .token_decorator(|builder: TokenParametersBuilder| {
            let previous = builder.current_scope().unwrap_or_default().to_string();
            builder.scope("test-scope").claim("previous", previous)
        })
        .build()
        .unwrap();
    dispatcher.register_delegate(StringDelegate::new());

    let _: String = bounded(dispatcher.send(TestMessage::new())).await.unwrap();

    let parameters = fixture.credentials.last();
    assert_eq!(parameters.audience(), COUNTER_PARTY);
    assert_eq!(parameters.scope(), Some("test-scope"));
    assert_eq!(parameters.claim("previous"), Some(&serde_json::json!("first")));
}

// ============================================================================
// SECTION: Short-Circuiting
// ============================================================================

#[tokio::test]
async fn missing_delegate_fails_before_any_call() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());

    let err = bounded(dispatcher.send::<String, _>(UnregisteredMessage)).await.unwrap_err();

    assert!(matches!(err, DispatchError::DelegateNotFound { .. }));
    assert!(err.to_string().contains("found"));
    assert!(err.to_string().contains("UnregisteredMessage"));
    assert!(!err.is_transport());
    assert_eq!(fixture.transport.calls(), 0);
    assert_eq!(fixture.credentials.calls(), 0);
}

#[tokio::test]
async fn response_type_mismatch_fails_before_any_call() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());

    let err = bounded(dispatcher.send::<u64, _>(TestMessage::new())).await.unwrap_err();

    assert_eq!(err.kind(), DispatchErrorKind::ResponseTypeMismatch);
    assert_eq!(fixture.transport.calls(), 0);
    assert_eq!(fixture.credentials.calls(), 0);
}

#[tokio::test]
async fn request_build_failure_fails_before_credentials() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(FailingBuildDelegate);

    let err = bounded(dispatcher.send::<String, _>(TestMessage::new())).await.unwrap_err();

    let DispatchError::RequestBuild {
        source, ..
    } = err
    else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(source, DelegateError::InvalidMessage("missing process id".to_string()));
    assert_eq!(fixture.credentials.calls(), 0);
    assert_eq!(fixture.transport.calls(), 0);
}

#[tokio::test]
async fn blank_audience_fails_token_assembly() {
    let fixture = Fixture::new();
    let dispatcher = fixture
        .builder()
        .token_decorator(|builder: TokenParametersBuilder| builder.audience(" "))
        .build()
        .unwrap();
    dispatcher.register_delegate(StringDelegate::new());

    let err = bounded(dispatcher.send::<String, _>(TestMessage::new())).await.unwrap_err();

    assert_eq!(err.kind(), DispatchErrorKind::TokenParameters);
    assert_eq!(fixture.credentials.calls(), 0);
    assert_eq!(fixture.transport.calls(), 0);
}

#[tokio::test]
async fn credential_failure_skips_transport() {
    let mut fixture = Fixture::new();
    fixture.credentials = RecordingCredentialProvider::failing("error");
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());

    let err = bounded(dispatcher.send::<String, _>(TestMessage::new())).await.unwrap_err();

    assert!(matches!(err, DispatchError::CredentialAcquisition(_)));
    assert!(err.to_string().contains("credentials"));
    assert!(err.to_string().contains("error"));
    assert_eq!(fixture.credentials.calls(), 1);
    assert_eq!(fixture.transport.calls(), 0);
}

#[tokio::test]
async fn empty_credential_is_rejected_before_transport() {
    let mut fixture = Fixture::new();
    fixture.credentials = RecordingCredentialProvider::issuing("");
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());

    let err = bounded(dispatcher.send::<String, _>(TestMessage::new())).await.unwrap_err();

    assert_eq!(err.kind(), DispatchErrorKind::InvalidCredential);
    assert_eq!(fixture.transport.calls(), 0);
}

// ============================================================================
// SECTION: Policy Evaluation
// ============================================================================

#[tokio::test]
async fn unbound_message_type_is_never_evaluated() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());

    let _: String = bounded(dispatcher.send(TestMessage::new())).await.unwrap();

    assert_eq!(fixture.evaluator.calls(), 0);
}

#[tokio::test]
async fn bound_scope_is_evaluated_with_sealed_parameters() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());
    let policy = Policy::new().with_uid("policy-1");
    let resolved = policy.clone();
    dispatcher.register_policy_scope(PolicyScope::new("request.test", move |_: &TestMessage| {
        resolved.clone()
    }));

    let _: String = bounded(dispatcher.send(TestMessage::new())).await.unwrap();

    let evaluations = fixture.evaluator.evaluations();
    assert_eq!(evaluations.len(), 1);
    let evaluation = &evaluations[0];
    assert_eq!(evaluation.scope, "request.test");
    assert_eq!(evaluation.policy, policy);
    assert!(evaluation.subject.is_none());
    assert_eq!(evaluation.token_parameters.as_ref().unwrap().audience(), COUNTER_PARTY);
    assert_eq!(evaluation.message_type, Some(MessageType::of::<TestMessage>()));
    assert_eq!(evaluation.protocol.as_ref().unwrap().as_str(), DATASPACE_PROTOCOL_HTTP);
    assert_eq!(fixture.transport.calls(), 1);
}

#[tokio::test]
async fn subject_extractor_reaches_evaluator() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());
    dispatcher.register_policy_scope(
        PolicyScope::new("request.test", |_: &TestMessage| Policy::new())
            .with_subject(|message: &TestMessage| Some(PolicySubject::new(&message.address))),
    );

    let _: String = bounded(dispatcher.send(TestMessage::new())).await.unwrap();

    let evaluation = &fixture.evaluator.evaluations()[0];
    assert_eq!(evaluation.subject.as_ref().unwrap().id, COUNTER_PARTY);
}

#[tokio::test]
async fn policy_denial_skips_credentials_and_transport() {
    let mut fixture = Fixture::new();
    fixture.evaluator = RecordingPolicyEvaluator::denying("purpose mismatch");
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());
    dispatcher.register_policy_scope(PolicyScope::new("request.test", |_: &TestMessage| {
        Policy::new()
    }));

    let err = bounded(dispatcher.send::<String, _>(TestMessage::new())).await.unwrap_err();

    let DispatchError::PolicyDenied {
        scope,
        source,
    } = err
    else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(scope, "request.test");
    assert_eq!(source, PolicyError::Denied("purpose mismatch".to_string()));
    assert_eq!(fixture.credentials.calls(), 0);
    assert_eq!(fixture.transport.calls(), 0);
}

// ============================================================================
// SECTION: Transport Failures
// ============================================================================

#[tokio::test]
async fn transport_failure_is_distinguishable() {
    let mut fixture = Fixture::new();
    fixture.transport = RecordingTransport::failing(TransportError::Status {
        status: StatusCode::BAD_GATEWAY,
        detail: "upstream".to_string(),
    });
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(StringDelegate::new());

    let err = bounded(dispatcher.send::<String, _>(TestMessage::new())).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.transport_status(), Some(502));
    assert_eq!(fixture.transport.calls(), 1);

    let event = fixture.audit.events().pop().unwrap();
    assert_eq!(event.outcome, DispatchOutcome::Failed);
    assert_eq!(event.error_kind, Some("transport"));
    assert_eq!(event.transport_status, Some(502));
}

#[tokio::test]
async fn parse_failure_surfaces_as_transport_failure() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    dispatcher.register_delegate(JsonDelegate::<JsonMessage, u64>::post(|_| String::new()));

    let err = bounded(dispatcher.send::<Option<u64>, _>(JsonMessage)).await.unwrap_err();

    let DispatchError::Transport(TransportError::Parse(DelegateError::ResponseParse(_))) = err
    else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(fixture.transport.calls(), 1);
}

/// Serializable message answered with a non-JSON body.
#[derive(serde::Serialize)]
struct JsonMessage;

impl RemoteMessage for JsonMessage {
    fn protocol(&self) -> &str {
        DATASPACE_PROTOCOL_HTTP
    }

    fn counter_party_address(&self) -> &str {
        COUNTER_PARTY
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

#[tokio::test]
async fn audit_records_one_event_per_dispatch_without_token() {
    let fixture = Fixture::new();
    let dispatcher = fixture
        .builder()
        .token_decorator(|builder: TokenParametersBuilder| builder.scope("catalog"))
        .build()
        .unwrap();
    dispatcher.register_delegate(StringDelegate::new());

    let _: String = bounded(dispatcher.send(TestMessage::new())).await.unwrap();
    let _ = bounded(dispatcher.send::<String, _>(UnregisteredMessage)).await;

    let events = fixture.audit.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, "dispatch");
    assert_eq!(events[0].outcome, DispatchOutcome::Ok);
    assert_eq!(events[0].audience.as_deref(), Some(COUNTER_PARTY));
    assert_eq!(events[0].scope.as_deref(), Some("catalog"));
    assert_eq!(events[0].protocol, DATASPACE_PROTOCOL_HTTP);
    assert_eq!(events[1].outcome, DispatchOutcome::Rejected);
    assert_eq!(events[1].error_kind, Some("delegate_not_found"));
    assert!(events[1].audience.is_none());

    let serialized = serde_json::to_string(&events[0]).unwrap();
    assert!(!serialized.contains("token"));
}

// ============================================================================
// SECTION: Construction
// ============================================================================

#[test]
fn builder_requires_collaborators() {
    let fixture = Fixture::new();
    let err = RemoteMessageDispatcher::builder()
        .credential_provider(fixture.credentials.clone())
        .policy_evaluator(fixture.evaluator.clone())
        .build()
        .unwrap_err();
    assert_eq!(err, DispatcherBuildError::MissingTransport);

    let err = fixture.builder().protocol(" ").build().unwrap_err();
    assert_eq!(err, DispatcherBuildError::EmptyProtocol);

    let dispatcher = fixture.dispatcher();
    assert_eq!(dispatcher.protocol(), DATASPACE_PROTOCOL_HTTP);
}

#[test]
fn duplicate_delegate_registration_is_reported() {
    let fixture = Fixture::new();
    let dispatcher = fixture.dispatcher();
    assert!(!dispatcher.register_delegate(StringDelegate::new()));
    assert!(dispatcher.register_delegate(StringDelegate::new()));
    assert_eq!(dispatcher.delegates().len(), 1);
}

// ============================================================================
// SECTION: Spawned Dispatch
// ============================================================================

#[tokio::test]
async fn spawn_send_resolves_on_runtime() {
    let fixture = Fixture::new();
    let dispatcher = Arc::new(fixture.dispatcher());
    dispatcher.register_delegate(StringDelegate::new());

    let handle = dispatcher.spawn_send::<String, _>(TestMessage::new());
    let result = bounded(handle).await.unwrap();

    assert_eq!(result, "response");
}

#[test]
fn spawn_send_without_runtime_is_rejected() {
    let fixture = Fixture::new();
    let dispatcher = Arc::new(fixture.dispatcher());
    dispatcher.register_delegate(StringDelegate::new());

    let handle = dispatcher.spawn_send::<String, _>(TestMessage::new());
    assert!(handle.is_finished());
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let err = runtime.block_on(handle).unwrap_err();

    assert_eq!(err.kind(), DispatchErrorKind::Aborted);
    assert_eq!(fixture.transport.calls(), 0);
}

#[tokio::test]
async fn dropping_spawned_handle_cancels_transport_call() {
    let fixture = Fixture::new();
    let transport = PendingTransport::new();
    let dispatcher = Arc::new(
        RemoteMessageDispatcher::builder()
            .transport(transport.clone())
            .credential_provider(fixture.credentials.clone())
            .policy_evaluator(fixture.evaluator.clone())
            .build()
            .unwrap(),
    );
    dispatcher.register_delegate(StringDelegate::new());

    let handle = dispatcher.spawn_send::<String, _>(TestMessage::new());
    bounded(transport.started.notified()).await;
    drop(handle);

    bounded(async {
        while !transport.dropped.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    })
    .await;
}

#[tokio::test]
async fn aborted_handle_resolves_to_aborted() {
    let fixture = Fixture::new();
    let transport = PendingTransport::new();
    let dispatcher = Arc::new(
        RemoteMessageDispatcher::builder()
            .transport(transport.clone())
            .credential_provider(fixture.credentials.clone())
            .policy_evaluator(fixture.evaluator.clone())
            .build()
            .unwrap(),
    );
    dispatcher.register_delegate(StringDelegate::new());

    let handle = dispatcher.spawn_send::<String, _>(TestMessage::new());
    bounded(transport.started.notified()).await;
    handle.abort();
    let err = bounded(handle).await.unwrap_err();

    assert_eq!(err.kind(), DispatchErrorKind::Aborted);
}

#[tokio::test]
async fn aborted_dispatch_records_one_audit_event() {
    let fixture = Fixture::new();
    let transport = PendingTransport::new();
    let dispatcher = Arc::new(
        RemoteMessageDispatcher::builder()
            .transport(transport.clone())
            .credential_provider(fixture.credentials.clone())
            .policy_evaluator(fixture.evaluator.clone())
            .audit_sink(fixture.audit.clone())
            .build()
            .unwrap(),
    );
    dispatcher.register_delegate(StringDelegate::new());

    let handle = dispatcher.spawn_send::<String, _>(TestMessage::new());
    bounded(transport.started.notified()).await;
    handle.abort();
    let _ = bounded(handle).await;

    let events = fixture.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, DispatchOutcome::Failed);
    assert_eq!(events[0].error_kind, Some("aborted"));
    assert!(events[0].audience.is_some());
}

#[tokio::test]
async fn dropped_send_future_records_one_audit_event() {
    let fixture = Fixture::new();
    let transport = PendingTransport::new();
    let dispatcher = fixture.builder().transport(transport.clone()).build().unwrap();
    dispatcher.register_delegate(StringDelegate::new());

    let send = dispatcher.send::<String, _>(TestMessage::new());
    let outcome = tokio::time::timeout(Duration::from_millis(50), send).await;

    assert!(outcome.is_err());
    let events = fixture.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_kind, Some("aborted"));
}
