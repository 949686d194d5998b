// crates/dsp-dispatch-core/src/audit.rs
// ============================================================================
// Module: Dispatch Audit Logging
// Description: Structured audit events for outbound dispatches.
// Purpose: Emit redacted JSON-line audit records without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every dispatch produces one [`DispatchAuditEvent`] recorded through a
//! [`DispatchAuditSink`]. Sinks write JSON lines to stderr or an append-only
//! file, or discard events.
//! Invariants:
//! - Events never contain credentials, request bodies, or response bodies.
//! - Sink failures never fail the dispatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::telemetry::DispatchOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Dispatch audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Protocol of the dispatcher.
    pub protocol: String,
    /// Fully qualified message type name.
    pub message_type: &'static str,
    /// Token audience when assembled.
    pub audience: Option<String>,
    /// Token scope when set by a decorator.
    pub scope: Option<String>,
    /// Policy scope name when the message type is bound to one.
    pub policy_scope: Option<String>,
    /// Dispatch outcome.
    pub outcome: DispatchOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Remote status code when available.
    pub transport_status: Option<u16>,
    /// Dispatch latency in milliseconds.
    pub latency_ms: u128,
}

/// Inputs required to construct an audit event.
pub struct DispatchAuditEventParams {
    /// Protocol of the dispatcher.
    pub protocol: String,
    /// Fully qualified message type name.
    pub message_type: &'static str,
    /// Token audience when assembled.
    pub audience: Option<String>,
    /// Token scope when set.
    pub scope: Option<String>,
    /// Policy scope name when bound.
    pub policy_scope: Option<String>,
    /// Dispatch outcome.
    pub outcome: DispatchOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Remote status code when available.
    pub transport_status: Option<u16>,
    /// Dispatch latency in milliseconds.
    pub latency_ms: u128,
}

impl DispatchAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: DispatchAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "dispatch",
            timestamp_ms,
            protocol: params.protocol,
            message_type: params.message_type,
            audience: params.audience,
            scope: params.scope,
            policy_scope: params.policy_scope,
            outcome: params.outcome,
            error_kind: params.error_kind,
            transport_status: params.transport_status,
            latency_ms: params.latency_ms,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for dispatch events.
pub trait DispatchAuditSink: Send + Sync {
    /// Records a dispatch event.
    fn record(&self, event: &DispatchAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl DispatchAuditSink for StderrAuditSink {
    fn record(&self, event: &DispatchAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl DispatchAuditSink for FileAuditSink {
    fn record(&self, event: &DispatchAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl DispatchAuditSink for NoopAuditSink {
    fn record(&self, _event: &DispatchAuditEvent) {}
}
