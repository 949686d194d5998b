// crates/dsp-dispatch-core/src/telemetry.rs
// ============================================================================
// Module: Dispatch Telemetry
// Description: Observability hooks for outbound dispatches.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A thin metrics interface for dispatch counters and latency histograms.
//! Deployments plug in their own exporter by implementing [`DispatchMetrics`].
//! Security posture: metric labels never carry credentials or message bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for dispatch histograms.
pub const DISPATCH_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Dispatch outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Remote call completed and the response parsed.
    Ok,
    /// Dispatch stopped before the remote call.
    Rejected,
    /// Remote call or response parsing failed.
    Failed,
}

impl DispatchOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// Dispatch metric event payload.
///
/// # Invariants
/// - Optional fields are `None` when the metadata is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMetricEvent {
    /// Protocol of the dispatcher.
    pub protocol: String,
    /// Short message type name.
    pub message_type: &'static str,
    /// Dispatch outcome.
    pub outcome: DispatchOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Remote status code when available.
    pub status: Option<u16>,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for dispatches and latencies.
pub trait DispatchMetrics: Send + Sync {
    /// Records a dispatch counter event.
    fn record_dispatch(&self, event: DispatchMetricEvent);
    /// Records a latency observation for the dispatch.
    fn record_latency(&self, event: DispatchMetricEvent, latency: Duration);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl DispatchMetrics for NoopMetrics {
    fn record_dispatch(&self, _event: DispatchMetricEvent) {}

    fn record_latency(&self, _event: DispatchMetricEvent, _latency: Duration) {}
}
