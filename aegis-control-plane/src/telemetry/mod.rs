//! # Telemetry Subsystem
//!
//! Latency/percentile tracking, per-path routing performance, drift
//! detection, and activation-operation auditing.

pub mod activation_monitor;
pub mod drift_monitor;
pub mod latency_monitor;
pub mod routing_performance_monitor;

pub use activation_monitor::ActivationMonitor;
pub use drift_monitor::DriftMonitor;
pub use latency_monitor::LatencyMonitor;
pub use routing_performance_monitor::RoutingPerformanceMonitor;
