//! # Routing Subsystem
//!
//! The [`IntelligentRouter`] and its per-path [`circuit_breaker::CircuitBreakerRegistry`].

pub mod circuit_breaker;
pub mod router;

pub use circuit_breaker::CircuitBreakerRegistry;
pub use router::IntelligentRouter;
