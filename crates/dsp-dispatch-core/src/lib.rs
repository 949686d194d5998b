// crates/dsp-dispatch-core/src/lib.rs
// ============================================================================
// Module: DSP Dispatch Core Library
// Description: Outbound remote message dispatch for dataspace connectors.
// Purpose: Send typed protocol messages with counterparty-scoped credentials.
// Dependencies: async-trait, bytes, reqwest (types only), serde, thiserror, tokio, url
// ============================================================================

//! ## Overview
//! DSP Dispatch Core turns a typed [`RemoteMessage`] into a remote call. The
//! [`RemoteMessageDispatcher`] resolves the [`DispatcherDelegate`] registered
//! for the message type, assembles [`TokenParameters`] for the counterparty,
//! optionally evaluates a [`Policy`] bound through a [`PolicyScope`], obtains
//! a [`Credential`], and executes the request through an injected
//! [`Transport`].
//! Invariants:
//! - Orchestration steps run in a fixed order and short-circuit on failure.
//! - Failures before the transport step never reach the network.
//! - Credentials are never logged or persisted.
//!
//! Security posture: counterparty addresses and responses are untrusted;
//! credentials are secrets.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod credential;
pub mod delegate;
pub mod dispatcher;
pub mod message;
pub mod policy;
pub mod registry;
pub mod router;
pub mod scope;
pub mod telemetry;
pub mod token;
pub mod transport;
pub mod wire;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::DispatchAuditEvent;
pub use audit::DispatchAuditEventParams;
pub use audit::DispatchAuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use credential::Credential;
pub use credential::CredentialError;
pub use credential::CredentialProvider;
pub use delegate::DelegateError;
pub use delegate::DispatcherDelegate;
pub use delegate::JsonDelegate;
pub use delegate::NoContentDelegate;
pub use dispatcher::AuthorizationStyle;
pub use dispatcher::DispatchError;
pub use dispatcher::DispatchErrorKind;
pub use dispatcher::DispatchHandle;
pub use dispatcher::DispatcherBuildError;
pub use dispatcher::RemoteMessageDispatcher;
pub use dispatcher::RemoteMessageDispatcherBuilder;
pub use message::DATASPACE_PROTOCOL_HTTP;
pub use message::MessageType;
pub use message::ProtocolId;
pub use message::RemoteMessage;
pub use policy::Policy;
pub use policy::PolicyConstraint;
pub use policy::PolicyContext;
pub use policy::PolicyError;
pub use policy::PolicyEvaluator;
pub use policy::PolicyRule;
pub use policy::PolicySubject;
pub use registry::DelegateRegistry;
pub use registry::LookupError;
pub use registry::SharedDelegate;
pub use router::DispatcherRouter;
pub use router::RouterError;
pub use scope::PolicyScope;
pub use scope::PolicyScopeRegistry;
pub use telemetry::DISPATCH_LATENCY_BUCKETS_MS;
pub use telemetry::DispatchMetricEvent;
pub use telemetry::DispatchMetrics;
pub use telemetry::DispatchOutcome;
pub use telemetry::NoopMetrics;
pub use token::TokenDecorator;
pub use token::TokenDecoratorChain;
pub use token::TokenParameters;
pub use token::TokenParametersBuilder;
pub use token::TokenParametersError;
pub use transport::Transport;
pub use transport::TransportError;
pub use transport::TransportExt;
pub use wire::ResponseParser;
pub use wire::WireRequest;
pub use wire::WireResponse;
