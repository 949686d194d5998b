// crates/dsp-dispatch-config/src/wiring.rs
// ============================================================================
// Module: Dispatcher Wiring
// Description: Builds a dispatcher from validated configuration.
// Purpose: Connect config sections to the core dispatcher builder.
// Dependencies: dsp-dispatch-core, dsp-dispatch-http, thiserror
// ============================================================================

//! ## Overview
//! [`dispatcher_builder`] turns a [`DispatchConfig`] into a
//! [`RemoteMessageDispatcherBuilder`] with credentials, policy, token
//! decoration, header style, and audit sink set. [`build_dispatcher`] adds the
//! configured [`HttpTransport`] and builds the dispatcher.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use dsp_dispatch_core::DispatchAuditSink;
use dsp_dispatch_core::DispatcherBuildError;
use dsp_dispatch_core::FileAuditSink;
use dsp_dispatch_core::NoopAuditSink;
use dsp_dispatch_core::RemoteMessageDispatcher;
use dsp_dispatch_core::RemoteMessageDispatcherBuilder;
use dsp_dispatch_core::StderrAuditSink;
use dsp_dispatch_http::HttpTransport;
use dsp_dispatch_http::HttpTransportError;
use thiserror::Error;

use crate::config::AuditConfig;
use crate::config::AuditSinkKind;
use crate::config::ConfigError;
use crate::config::DispatchConfig;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while assembling a dispatcher from configuration.
#[derive(Debug, Error)]
pub enum WiringError {
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// HTTP transport could not be created.
    #[error(transparent)]
    Transport(#[from] HttpTransportError),
    /// Audit log could not be opened.
    #[error("audit log open failed: {0}")]
    Audit(String),
    /// Dispatcher builder rejected the collaborators.
    #[error(transparent)]
    Build(#[from] DispatcherBuildError),
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Returns a dispatcher builder configured from `config`, without a transport.
///
/// # Errors
///
/// Returns [`WiringError`] when the configuration is invalid or the audit log
/// cannot be opened.
pub fn dispatcher_builder(
    config: &DispatchConfig,
) -> Result<RemoteMessageDispatcherBuilder, WiringError> {
    config.validate()?;
    let mut builder = RemoteMessageDispatcher::builder()
        .protocol(config.dispatcher.protocol.clone())
        .authorization(config.dispatcher.authorization)
        .credential_provider(Arc::new(config.credentials.provider()))
        .policy_evaluator(Arc::new(config.policy.dispatch_policy()?))
        .audit_sink(audit_sink(&config.audit)?);
    if let Some(decorator) = config.token.decorator() {
        builder = builder.token_decorator(decorator);
    }
    Ok(builder)
}

/// Builds a dispatcher using the configured HTTP transport.
///
/// # Errors
///
/// Returns [`WiringError`] when any collaborator cannot be built.
pub fn build_dispatcher(config: &DispatchConfig) -> Result<RemoteMessageDispatcher, WiringError> {
    let transport = HttpTransport::new(&config.transport.http_config())?;
    Ok(dispatcher_builder(config)?.transport(Arc::new(transport)).build()?)
}

/// Opens the configured audit sink.
///
/// # Errors
///
/// Returns [`WiringError::Audit`] when the file sink cannot be opened.
pub fn audit_sink(config: &AuditConfig) -> Result<Arc<dyn DispatchAuditSink>, WiringError> {
    match (config.sink, config.path.as_deref()) {
        (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
        (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
        (AuditSinkKind::File, Some(path)) => {
            let sink = FileAuditSink::new(Path::new(path.trim()))
                .map_err(|err| WiringError::Audit(err.to_string()))?;
            Ok(Arc::new(sink))
        }
        (AuditSinkKind::File, None) => {
            Err(ConfigError::Invalid("audit.sink=file requires audit.path".to_string()).into())
        }
    }
}
