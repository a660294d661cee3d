//! # Safety Subsystem
//!
//! Detectors, the `GuardrailsService` that composes them with an external
//! content policy sink, and the `ActiveGuardrailsManager` that wraps a
//! provider invocation in pre/post checks.

pub mod active_guardrails;
pub mod detectors;
pub mod guardrails;

pub use active_guardrails::{ActiveGuardrailsManager, GuardedOutcome, Stage};
pub use guardrails::{GuardrailsService, Source};
