// crates/dsp-dispatch-core/src/dispatcher.rs
// ============================================================================
// Module: Remote Message Dispatcher
// Description: Orchestrates delegates, policies, credentials, and transport.
// Purpose: Send typed outbound messages and resolve typed results.
// Dependencies: crate::{audit, credential, delegate, policy, registry, scope,
//               telemetry, token, transport, wire}, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`RemoteMessageDispatcher::send`] runs a strictly ordered pipeline:
//! delegate resolution, request construction, token-parameter assembly,
//! optional policy evaluation, credential acquisition, and transport
//! execution with the delegate's parser. Each step short-circuits on failure.
//! Invariants:
//! - A dispatch failing before the transport step never reaches the transport.
//! - The transport is invoked at most once per dispatch; there are no retries.
//! - Every failure resolves the returned future; nothing panics.
//! - One audit event is recorded per dispatch, including dispatches dropped
//!   before completion; credentials are never recorded.
//!
//! Security posture: credentials cross this boundary; they are attached as a
//! sensitive header and never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;
use std::time::Instant;

use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::audit::DispatchAuditEvent;
use crate::audit::DispatchAuditEventParams;
use crate::audit::DispatchAuditSink;
use crate::audit::NoopAuditSink;
use crate::credential::CredentialError;
use crate::credential::CredentialProvider;
use crate::delegate::DelegateError;
use crate::delegate::DispatcherDelegate;
use crate::message::DATASPACE_PROTOCOL_HTTP;
use crate::message::MessageType;
use crate::message::ProtocolId;
use crate::message::RemoteMessage;
use crate::policy::PolicyContext;
use crate::policy::PolicyError;
use crate::policy::PolicyEvaluator;
use crate::registry::DelegateRegistry;
use crate::registry::LookupError;
use crate::scope::PolicyScope;
use crate::scope::PolicyScopeRegistry;
use crate::telemetry::DispatchMetricEvent;
use crate::telemetry::DispatchMetrics;
use crate::telemetry::DispatchOutcome;
use crate::telemetry::NoopMetrics;
use crate::token::TokenDecorator;
use crate::token::TokenDecoratorChain;
use crate::token::TokenParameters;
use crate::token::TokenParametersError;
use crate::transport::Transport;
use crate::transport::TransportError;
use crate::transport::TransportExt;

// ============================================================================
// SECTION: Authorization Style
// ============================================================================

/// Format of the `Authorization` header carrying the credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStyle {
    /// Header value is the raw token.
    #[default]
    Token,
    /// Header value is `Bearer <token>`.
    Bearer,
}

impl AuthorizationStyle {
    /// Formats the header value for `token`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidCredential`] when the token is empty or
    /// not a valid header value.
    pub fn header_value(self, token: &str) -> Result<HeaderValue, DispatchError> {
        if token.trim().is_empty() {
            return Err(DispatchError::InvalidCredential("credential token is empty".to_string()));
        }
        let raw = match self {
            Self::Token => token.to_string(),
            Self::Bearer => format!("Bearer {token}"),
        };
        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            DispatchError::InvalidCredential(
                "credential token is not a valid header value".to_string(),
            )
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dispatch failures, one variant per pipeline step.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Only [`DispatchError::Transport`] originates from the network call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No delegate is registered for the message type.
    #[error("no delegate found for message type {message_type}")]
    DelegateNotFound {
        /// Message type name.
        message_type: &'static str,
    },
    /// Registered delegate produces a different response type.
    #[error(
        "delegate for message type {message_type} produces {registered}, but {requested} was requested"
    )]
    ResponseTypeMismatch {
        /// Message type name.
        message_type: &'static str,
        /// Response type of the registered delegate.
        registered: &'static str,
        /// Response type requested by the caller.
        requested: &'static str,
    },
    /// Delegate failed to build the wire request.
    #[error("failed to build request for message type {message_type}: {source}")]
    RequestBuild {
        /// Message type name.
        message_type: &'static str,
        /// Delegate failure.
        source: DelegateError,
    },
    /// Token parameters could not be sealed.
    #[error("invalid token parameters: {0}")]
    TokenParameters(#[from] TokenParametersError),
    /// Policy evaluation rejected the dispatch.
    #[error("policy scope {scope} rejected dispatch: {source}")]
    PolicyDenied {
        /// Policy scope name.
        scope: String,
        /// Evaluator failure.
        source: PolicyError,
    },
    /// Credential provider failed.
    #[error("failed to obtain client credentials: {0}")]
    CredentialAcquisition(CredentialError),
    /// Credential cannot be attached to the request.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    /// Transport or response parsing failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// Spawned dispatch was cancelled or could not run.
    #[error("dispatch aborted: {0}")]
    Aborted(String),
}

impl From<LookupError> for DispatchError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound {
                message_type,
            } => Self::DelegateNotFound {
                message_type,
            },
            LookupError::ResponseTypeMismatch {
                message_type,
                registered,
                requested,
            } => Self::ResponseTypeMismatch {
                message_type,
                registered,
                requested,
            },
        }
    }
}

/// Stable error classification for audit and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchErrorKind {
    /// See [`DispatchError::DelegateNotFound`].
    DelegateNotFound,
    /// See [`DispatchError::ResponseTypeMismatch`].
    ResponseTypeMismatch,
    /// See [`DispatchError::RequestBuild`].
    RequestBuild,
    /// See [`DispatchError::TokenParameters`].
    TokenParameters,
    /// See [`DispatchError::PolicyDenied`].
    PolicyDenied,
    /// See [`DispatchError::CredentialAcquisition`].
    CredentialAcquisition,
    /// See [`DispatchError::InvalidCredential`].
    InvalidCredential,
    /// See [`DispatchError::Transport`].
    Transport,
    /// See [`DispatchError::Aborted`].
    Aborted,
}

impl DispatchErrorKind {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DelegateNotFound => "delegate_not_found",
            Self::ResponseTypeMismatch => "response_type_mismatch",
            Self::RequestBuild => "request_build",
            Self::TokenParameters => "token_parameters",
            Self::PolicyDenied => "policy_denied",
            Self::CredentialAcquisition => "credential_acquisition",
            Self::InvalidCredential => "invalid_credential",
            Self::Transport => "transport",
            Self::Aborted => "aborted",
        }
    }
}

impl DispatchError {
    /// Returns the stable error classification.
    #[must_use]
    pub const fn kind(&self) -> DispatchErrorKind {
        match self {
            Self::DelegateNotFound {
                ..
            } => DispatchErrorKind::DelegateNotFound,
            Self::ResponseTypeMismatch {
                ..
            } => DispatchErrorKind::ResponseTypeMismatch,
            Self::RequestBuild {
                ..
            } => DispatchErrorKind::RequestBuild,
            Self::TokenParameters(_) => DispatchErrorKind::TokenParameters,
            Self::PolicyDenied {
                ..
            } => DispatchErrorKind::PolicyDenied,
            Self::CredentialAcquisition(_) => DispatchErrorKind::CredentialAcquisition,
            Self::InvalidCredential(_) => DispatchErrorKind::InvalidCredential,
            Self::Transport(_) => DispatchErrorKind::Transport,
            Self::Aborted(_) => DispatchErrorKind::Aborted,
        }
    }

    /// Returns true when the failure came from the transport step.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns the remote status code, when the transport received one.
    #[must_use]
    pub fn transport_status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

/// Dispatcher construction failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatcherBuildError {
    /// No transport was configured.
    #[error("dispatcher requires a transport")]
    MissingTransport,
    /// No credential provider was configured.
    #[error("dispatcher requires a credential provider")]
    MissingCredentialProvider,
    /// No policy evaluator was configured.
    #[error("dispatcher requires a policy evaluator")]
    MissingPolicyEvaluator,
    /// Protocol identifier is blank.
    #[error("dispatcher protocol must not be empty")]
    EmptyProtocol,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`RemoteMessageDispatcher`].
#[derive(Default)]
pub struct RemoteMessageDispatcherBuilder {
    /// Protocol identifier; defaults to the dataspace HTTP protocol.
    protocol: Option<String>,
    /// Transport executing wire requests.
    transport: Option<Arc<dyn Transport>>,
    /// Credential provider.
    credential_provider: Option<Arc<dyn CredentialProvider>>,
    /// Policy evaluator.
    policy_evaluator: Option<Arc<dyn PolicyEvaluator>>,
    /// Token decorators in registration order.
    decorators: TokenDecoratorChain,
    /// Authorization header style.
    authorization: AuthorizationStyle,
    /// Audit sink; defaults to no-op.
    audit: Option<Arc<dyn DispatchAuditSink>>,
    /// Metrics sink; defaults to no-op.
    metrics: Option<Arc<dyn DispatchMetrics>>,
}

impl RemoteMessageDispatcherBuilder {
    /// Sets the protocol identifier.
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Sets the transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the credential provider.
    #[must_use]
    pub fn credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_provider = Some(provider);
        self
    }

    /// Sets the policy evaluator.
    #[must_use]
    pub fn policy_evaluator(mut self, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        self.policy_evaluator = Some(evaluator);
        self
    }

    /// Appends a token decorator; decorators run in registration order.
    #[must_use]
    pub fn token_decorator<D: TokenDecorator + 'static>(mut self, decorator: D) -> Self {
        self.decorators.push(Arc::new(decorator));
        self
    }

    /// Sets the authorization header style.
    #[must_use]
    pub const fn authorization(mut self, style: AuthorizationStyle) -> Self {
        self.authorization = style;
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn audit_sink(mut self, sink: Arc<dyn DispatchAuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Sets the metrics sink.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the dispatcher with empty registries.
    ///
    /// # Errors
    ///
    /// Returns [`DispatcherBuildError`] when a required collaborator is missing
    /// or the protocol is blank.
    pub fn build(self) -> Result<RemoteMessageDispatcher, DispatcherBuildError> {
        let protocol = self.protocol.unwrap_or_else(|| DATASPACE_PROTOCOL_HTTP.to_string());
        if protocol.trim().is_empty() {
            return Err(DispatcherBuildError::EmptyProtocol);
        }
        Ok(RemoteMessageDispatcher {
            protocol,
            delegates: DelegateRegistry::new(),
            scopes: PolicyScopeRegistry::new(),
            decorators: self.decorators,
            transport: self.transport.ok_or(DispatcherBuildError::MissingTransport)?,
            credential_provider: self
                .credential_provider
                .ok_or(DispatcherBuildError::MissingCredentialProvider)?,
            policy_evaluator: self
                .policy_evaluator
                .ok_or(DispatcherBuildError::MissingPolicyEvaluator)?,
            authorization: self.authorization,
            audit: self.audit.unwrap_or_else(|| Arc::new(NoopAuditSink)),
            metrics: self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
        })
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Per-dispatch facts gathered for audit records.
struct DispatchTrace {
    /// Message type being dispatched.
    message_type: MessageType,
    /// Sealed token audience.
    audience: Option<String>,
    /// Sealed token scope.
    scope: Option<String>,
    /// Policy scope name when bound.
    policy_scope: Option<String>,
}

/// Records exactly one audit event per dispatch.
///
/// A dispatch dropped before completion is recorded as aborted.
struct DispatchRecorder<'a> {
    /// Dispatcher owning the audit and metric sinks.
    dispatcher: &'a RemoteMessageDispatcher,
    /// Facts gathered so far.
    trace: DispatchTrace,
    /// Dispatch start time.
    started: Instant,
    /// Set once the event has been recorded.
    recorded: bool,
}

impl DispatchRecorder<'_> {
    /// Records the finished dispatch.
    fn finish(&mut self, error: Option<&DispatchError>) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        self.dispatcher.record(&self.trace, error, self.started.elapsed());
    }
}

impl Drop for DispatchRecorder<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            let error = DispatchError::Aborted("dispatch cancelled before completion".to_string());
            self.finish(Some(&error));
        }
    }
}

/// Outbound message dispatcher for one protocol.
pub struct RemoteMessageDispatcher {
    /// Protocol identifier.
    protocol: String,
    /// Delegates keyed by message type.
    delegates: DelegateRegistry,
    /// Policy scopes keyed by message type.
    scopes: PolicyScopeRegistry,
    /// Token decorators in registration order.
    decorators: TokenDecoratorChain,
    /// Transport executing wire requests.
    transport: Arc<dyn Transport>,
    /// Credential provider.
    credential_provider: Arc<dyn CredentialProvider>,
    /// Policy evaluator.
    policy_evaluator: Arc<dyn PolicyEvaluator>,
    /// Authorization header style.
    authorization: AuthorizationStyle,
    /// Audit sink.
    audit: Arc<dyn DispatchAuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn DispatchMetrics>,
}

impl RemoteMessageDispatcher {
    /// Returns a dispatcher builder.
    #[must_use]
    pub fn builder() -> RemoteMessageDispatcherBuilder {
        RemoteMessageDispatcherBuilder::default()
    }

    /// Returns the protocol identifier.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Registers a delegate under its message type.
    ///
    /// Returns `true` when a previously registered delegate was replaced.
    pub fn register_delegate<D>(&self, delegate: D) -> bool
    where
        D: DispatcherDelegate + 'static,
    {
        self.delegates.register(delegate)
    }

    /// Binds message type `M` to a policy scope.
    ///
    /// Returns `true` when a previous binding was replaced.
    pub fn register_policy_scope<M: RemoteMessage>(&self, scope: PolicyScope<M>) -> bool {
        self.scopes.register(scope)
    }

    /// Returns the delegate registry.
    #[must_use]
    pub const fn delegates(&self) -> &DelegateRegistry {
        &self.delegates
    }

    /// Returns the policy scope registry.
    #[must_use]
    pub const fn scopes(&self) -> &PolicyScopeRegistry {
        &self.scopes
    }

    /// Sends `message` and resolves the delegate-parsed response.
    ///
    /// Dropping the returned future cancels the in-flight dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] describing the first failing step.
    pub async fn send<R, M>(&self, message: M) -> Result<R, DispatchError>
    where
        M: RemoteMessage,
        R: Send + 'static,
    {
        let mut recorder = DispatchRecorder {
            dispatcher: self,
            trace: DispatchTrace {
                message_type: MessageType::of::<M>(),
                audience: None,
                scope: None,
                policy_scope: None,
            },
            started: Instant::now(),
            recorded: false,
        };
        let result = self.dispatch::<R, M>(&message, &mut recorder.trace).await;
        recorder.finish(result.as_ref().err());
        result
    }

    /// Runs `send` on the current tokio runtime.
    ///
    /// The returned handle aborts the dispatch when dropped. Without a
    /// runtime the handle resolves to [`DispatchError::Aborted`].
    pub fn spawn_send<R, M>(self: &Arc<Self>, message: M) -> DispatchHandle<R>
    where
        M: RemoteMessage,
        R: Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            return DispatchHandle::rejected(DispatchError::Aborted(
                "no async runtime available".to_string(),
            ));
        };
        let dispatcher = Arc::clone(self);
        let task = runtime.spawn(async move { dispatcher.send::<R, M>(message).await });
        DispatchHandle::spawned(task)
    }

    /// Executes the ordered dispatch pipeline.
    async fn dispatch<R, M>(
        &self,
        message: &M,
        trace: &mut DispatchTrace,
    ) -> Result<R, DispatchError>
    where
        M: RemoteMessage,
        R: Send + 'static,
    {
        let delegate = self.delegates.resolve::<M, R>()?;
        let mut request =
            delegate.build_request(message).map_err(|source| DispatchError::RequestBuild {
                message_type: trace.message_type.name(),
                source,
            })?;

        let builder = TokenParameters::builder().audience(message.counter_party_address());
        let parameters = self.decorators.apply(builder).build()?;
        trace.audience = Some(parameters.audience().to_string());
        trace.scope = parameters.scope().map(str::to_string);

        if let Some(scope) = self.scopes.scope_for::<M>() {
            trace.policy_scope = Some(scope.name().to_string());
            let policy = scope.resolve_policy(message);
            let subject = scope.extract_subject(message);
            let context = PolicyContext::new()
                .with(parameters.clone())
                .with(trace.message_type)
                .with(ProtocolId::new(self.protocol.clone()));
            self.policy_evaluator
                .evaluate(scope.name(), &policy, subject.as_ref(), &context)
                .map_err(|source| DispatchError::PolicyDenied {
                    scope: scope.name().to_string(),
                    source,
                })?;
        }

        let credential = self
            .credential_provider
            .obtain_credential(&parameters)
            .await
            .map_err(DispatchError::CredentialAcquisition)?;
        let header = self.authorization.header_value(credential.token())?;
        request.headers_mut().insert(AUTHORIZATION, header);

        let parser = delegate.parse_response();
        Ok(self.transport.execute_with(request, &parser).await?)
    }

    /// Records audit and metric events for a finished dispatch.
    fn record(&self, trace: &DispatchTrace, error: Option<&DispatchError>, latency: Duration) {
        let outcome = match error {
            None => DispatchOutcome::Ok,
            Some(DispatchError::Transport(_) | DispatchError::Aborted(_)) => {
                DispatchOutcome::Failed
            }
            Some(_) => DispatchOutcome::Rejected,
        };
        let error_kind = error.map(|err| err.kind().as_str());
        let transport_status = error.and_then(DispatchError::transport_status);
        let event = DispatchAuditEvent::new(DispatchAuditEventParams {
            protocol: self.protocol.clone(),
            message_type: trace.message_type.name(),
            audience: trace.audience.clone(),
            scope: trace.scope.clone(),
            policy_scope: trace.policy_scope.clone(),
            outcome,
            error_kind,
            transport_status,
            latency_ms: latency.as_millis(),
        });
        self.audit.record(&event);
        let metric = DispatchMetricEvent {
            protocol: self.protocol.clone(),
            message_type: trace.message_type.short_name(),
            outcome,
            error_kind,
            status: transport_status,
        };
        self.metrics.record_dispatch(metric.clone());
        self.metrics.record_latency(metric, latency);
    }
}

impl fmt::Debug for RemoteMessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMessageDispatcher")
            .field("protocol", &self.protocol)
            .field("delegates", &self.delegates)
            .field("scopes", &self.scopes)
            .field("decorators", &self.decorators)
            .field("authorization", &self.authorization)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Dispatch Handle
// ============================================================================

/// Handle state.
enum HandleState<R> {
    /// Dispatch running on the runtime.
    Spawned(JoinHandle<Result<R, DispatchError>>),
    /// Dispatch never started; the error is yielded once.
    Rejected(Option<DispatchError>),
}

/// Future resolving a spawned dispatch.
///
/// # Invariants
/// - Dropping the handle aborts the dispatch task.
/// - The handle resolves exactly once.
pub struct DispatchHandle<R> {
    /// Handle state.
    state: HandleState<R>,
}

impl<R> DispatchHandle<R> {
    /// Wraps a spawned dispatch task.
    const fn spawned(task: JoinHandle<Result<R, DispatchError>>) -> Self {
        Self {
            state: HandleState::Spawned(task),
        }
    }

    /// Creates a handle that resolves to `error`.
    const fn rejected(error: DispatchError) -> Self {
        Self {
            state: HandleState::Rejected(Some(error)),
        }
    }

    /// Aborts the dispatch; the handle then resolves to [`DispatchError::Aborted`].
    pub fn abort(&self) {
        if let HandleState::Spawned(task) = &self.state {
            task.abort();
        }
    }

    /// Returns true when the dispatch has finished running.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Spawned(task) => task.is_finished(),
            HandleState::Rejected(_) => true,
        }
    }
}

impl<R> Future for DispatchHandle<R> {
    type Output = Result<R, DispatchError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            HandleState::Spawned(task) => Pin::new(task).poll(cx).map(|joined| match joined {
                Ok(result) => result,
                Err(err) if err.is_cancelled() => {
                    Err(DispatchError::Aborted("dispatch task was cancelled".to_string()))
                }
                Err(_) => Err(DispatchError::Aborted("dispatch task panicked".to_string())),
            }),
            HandleState::Rejected(error) => Poll::Ready(Err(error.take().unwrap_or_else(|| {
                DispatchError::Aborted("dispatch handle already resolved".to_string())
            }))),
        }
    }
}

impl<R> Drop for DispatchHandle<R> {
    fn drop(&mut self) {
        self.abort();
    }
}

impl<R> fmt::Debug for DispatchHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandle").field("finished", &self.is_finished()).finish()
    }
}
