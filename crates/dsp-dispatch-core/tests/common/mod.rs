// crates/dsp-dispatch-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Recording collaborators and sample messages for dispatch tests.
// Purpose: Observe every external call the dispatcher makes.
// Dependencies: dsp-dispatch-core, async-trait, tokio
// ============================================================================

//! ## Overview
//! Provides recording transports, credential providers, policy evaluators and
//! audit sinks plus a string-returning delegate.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]
#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use dsp_dispatch_core::Credential;
use dsp_dispatch_core::CredentialError;
use dsp_dispatch_core::CredentialProvider;
use dsp_dispatch_core::DATASPACE_PROTOCOL_HTTP;
use dsp_dispatch_core::DelegateError;
use dsp_dispatch_core::DispatchAuditEvent;
use dsp_dispatch_core::DispatchAuditSink;
use dsp_dispatch_core::DispatcherDelegate;
use dsp_dispatch_core::MessageType;
use dsp_dispatch_core::Policy;
use dsp_dispatch_core::PolicyContext;
use dsp_dispatch_core::PolicyError;
use dsp_dispatch_core::PolicyEvaluator;
use dsp_dispatch_core::PolicySubject;
use dsp_dispatch_core::ProtocolId;
use dsp_dispatch_core::RemoteMessage;
use dsp_dispatch_core::RemoteMessageDispatcher;
use dsp_dispatch_core::RemoteMessageDispatcherBuilder;
use dsp_dispatch_core::ResponseParser;
use dsp_dispatch_core::TokenParameters;
use dsp_dispatch_core::Transport;
use dsp_dispatch_core::TransportError;
use dsp_dispatch_core::WireRequest;
use dsp_dispatch_core::WireResponse;
use reqwest::StatusCode;

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Counterparty address used by the sample messages.
pub const COUNTER_PARTY: &str = "http://connector";

/// Sample message with a configurable address.
#[derive(Debug, Clone)]
pub struct TestMessage {
    pub address: String,
    pub protocol: String,
}

impl TestMessage {
    pub fn new() -> Self {
        Self::to(COUNTER_PARTY)
    }

    pub fn to(address: &str) -> Self {
        Self {
            address: address.to_string(),
            protocol: DATASPACE_PROTOCOL_HTTP.to_string(),
        }
    }

    pub fn over(protocol: &str) -> Self {
        Self {
            address: COUNTER_PARTY.to_string(),
            protocol: protocol.to_string(),
        }
    }
}

impl RemoteMessage for TestMessage {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn counter_party_address(&self) -> &str {
        &self.address
    }
}

/// Message type no delegate is registered for.
#[derive(Debug, Clone)]
pub struct UnregisteredMessage;

impl RemoteMessage for UnregisteredMessage {
    fn protocol(&self) -> &str {
        DATASPACE_PROTOCOL_HTTP
    }

    fn counter_party_address(&self) -> &str {
        COUNTER_PARTY
    }
}

// ============================================================================
// SECTION: Delegate
// ============================================================================

/// Delegate returning the response body as a string.
pub struct StringDelegate {
    parser: ResponseParser<String>,
    pub parsed: Arc<AtomicUsize>,
}

impl StringDelegate {
    pub fn new() -> Self {
        let parsed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&parsed);
        let parser = ResponseParser::new(move |response: WireResponse| {
            counter.fetch_add(1, Ordering::SeqCst);
            String::from_utf8(response.into_body().to_vec())
                .map_err(|err| DelegateError::ResponseParse(err.to_string()))
        });
        Self {
            parser,
            parsed,
        }
    }

    pub fn parser(&self) -> ResponseParser<String> {
        self.parser.clone()
    }
}

impl DispatcherDelegate for StringDelegate {
    type Message = TestMessage;
    type Response = String;

    fn build_request(&self, message: &TestMessage) -> Result<WireRequest, DelegateError> {
        WireRequest::parse(reqwest::Method::POST, message.counter_party_address())
    }

    fn parse_response(&self) -> ResponseParser<String> {
        self.parser.clone()
    }
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Transport recording requests and replying with a fixed outcome.
pub struct RecordingTransport {
    requests: Mutex<Vec<WireRequest>>,
    reply: Result<WireResponse, TransportError>,
}

impl RecordingTransport {
    pub fn replying(body: &str) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            reply: Ok(WireResponse::with_body(StatusCode::OK, body.to_string())),
        })
    }

    pub fn failing(error: TransportError) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            reply: Err(error),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.reply.clone()
    }
}

/// Sets a flag when dropped.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Transport that never completes and reports when its call is dropped.
pub struct PendingTransport {
    pub started: Arc<tokio::sync::Notify>,
    pub dropped: Arc<AtomicBool>,
}

impl PendingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Arc::new(tokio::sync::Notify::new()),
            dropped: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl Transport for PendingTransport {
    async fn execute(&self, _request: WireRequest) -> Result<WireResponse, TransportError> {
        let _flag = DropFlag(Arc::clone(&self.dropped));
        self.started.notify_one();
        std::future::pending::<()>().await;
        Err(TransportError::Request("unreachable".to_string()))
    }
}

// ============================================================================
// SECTION: Credential Provider
// ============================================================================

/// Credential provider recording the token parameters it receives.
pub struct RecordingCredentialProvider {
    parameters: Mutex<Vec<TokenParameters>>,
    outcome: Result<Credential, CredentialError>,
}

impl RecordingCredentialProvider {
    pub fn issuing(token: &str) -> Arc<Self> {
        Arc::new(Self {
            parameters: Mutex::new(Vec::new()),
            outcome: Ok(Credential::new(token)),
        })
    }

    pub fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            parameters: Mutex::new(Vec::new()),
            outcome: Err(CredentialError::Denied(detail.to_string())),
        })
    }

    pub fn calls(&self) -> usize {
        self.parameters.lock().unwrap().len()
    }

    pub fn last(&self) -> TokenParameters {
        self.parameters.lock().unwrap().last().cloned().expect("credential provider called")
    }
}

#[async_trait]
impl CredentialProvider for RecordingCredentialProvider {
    async fn obtain_credential(
        &self,
        parameters: &TokenParameters,
    ) -> Result<Credential, CredentialError> {
        self.parameters.lock().unwrap().push(parameters.clone());
        self.outcome.clone()
    }
}

// ============================================================================
// SECTION: Policy Evaluator
// ============================================================================

/// Single evaluator invocation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub scope: String,
    pub policy: Policy,
    pub subject: Option<PolicySubject>,
    pub token_parameters: Option<TokenParameters>,
    pub message_type: Option<MessageType>,
    pub protocol: Option<ProtocolId>,
}

/// Policy evaluator recording its invocations.
pub struct RecordingPolicyEvaluator {
    evaluations: Mutex<Vec<Evaluation>>,
    outcome: Result<(), PolicyError>,
}

impl RecordingPolicyEvaluator {
    pub fn permitting() -> Arc<Self> {
        Arc::new(Self {
            evaluations: Mutex::new(Vec::new()),
            outcome: Ok(()),
        })
    }

    pub fn denying(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            evaluations: Mutex::new(Vec::new()),
            outcome: Err(PolicyError::Denied(reason.to_string())),
        })
    }

    pub fn calls(&self) -> usize {
        self.evaluations.lock().unwrap().len()
    }

    pub fn evaluations(&self) -> Vec<Evaluation> {
        self.evaluations.lock().unwrap().clone()
    }
}

impl PolicyEvaluator for RecordingPolicyEvaluator {
    fn evaluate(
        &self,
        scope: &str,
        policy: &Policy,
        subject: Option<&PolicySubject>,
        context: &PolicyContext,
    ) -> Result<(), PolicyError> {
        self.evaluations.lock().unwrap().push(Evaluation {
            scope: scope.to_string(),
            policy: policy.clone(),
            subject: subject.cloned(),
            token_parameters: context.get::<TokenParameters>().cloned(),
            message_type: context.get::<MessageType>().copied(),
            protocol: context.get::<ProtocolId>().cloned(),
        });
        self.outcome.clone()
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink keeping events in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<DispatchAuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<DispatchAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl DispatchAuditSink for RecordingAuditSink {
    fn record(&self, event: &DispatchAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// Dispatcher plus handles to every recording collaborator.
pub struct Fixture {
    pub transport: Arc<RecordingTransport>,
    pub credentials: Arc<RecordingCredentialProvider>,
    pub evaluator: Arc<RecordingPolicyEvaluator>,
    pub audit: Arc<RecordingAuditSink>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            transport: RecordingTransport::replying("response"),
            credentials: RecordingCredentialProvider::issuing("token"),
            evaluator: RecordingPolicyEvaluator::permitting(),
            audit: Arc::new(RecordingAuditSink::default()),
        }
    }

    pub fn builder(&self) -> RemoteMessageDispatcherBuilder {
        RemoteMessageDispatcher::builder()
            .transport(self.transport.clone())
            .credential_provider(self.credentials.clone())
            .policy_evaluator(self.evaluator.clone())
            .audit_sink(self.audit.clone())
    }

    pub fn dispatcher(&self) -> RemoteMessageDispatcher {
        self.builder().build().unwrap()
    }
}
