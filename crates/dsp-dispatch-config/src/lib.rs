// crates/dsp-dispatch-config/src/lib.rs
// ============================================================================
// Module: DSP Dispatch Config Library
// Description: Config model, validation, and dispatcher wiring.
// Purpose: Single source of truth for dsp-dispatch.toml semantics.
// Dependencies: dsp-dispatch-core, dsp-dispatch-http, serde, toml
// ============================================================================

//! ## Overview
//! `dsp-dispatch-config` defines the `dsp-dispatch.toml` model with strict,
//! fail-closed validation, plus the static collaborators it configures: a
//! [`StaticCredentialProvider`], a [`DispatchPolicy`] evaluator, and a
//! [`StaticScopeDecorator`]. [`build_dispatcher`] assembles a ready
//! dispatcher from a loaded [`DispatchConfig`].
//!
//! Security posture: config inputs are untrusted and may carry tokens.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod credentials;
pub mod decorator;
pub mod policy;
pub mod wiring;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use credentials::StaticCredentialProvider;
pub use decorator::StaticScopeDecorator;
pub use policy::*;
pub use wiring::WiringError;
pub use wiring::audit_sink;
pub use wiring::build_dispatcher;
pub use wiring::dispatcher_builder;
