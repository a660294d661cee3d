//! # Optimization Subsystem
//!
//! The [`routing_optimizer::RoutingEfficiencyOptimizer`] analyze/apply/
//! rollback cycle and the [`orchestrator::SystemOptimizationOrchestrator`]
//! that decides when to run it.

pub mod orchestrator;
pub mod routing_optimizer;

pub use orchestrator::SystemOptimizationOrchestrator;
pub use routing_optimizer::RoutingEfficiencyOptimizer;
