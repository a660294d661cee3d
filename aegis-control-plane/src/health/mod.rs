//! # Health Subsystem
//!
//! The [`monitor::IntelligentHealthMonitor`] scoring/anomaly pipeline and the
//! [`emergency_shutdown::EmergencyShutdownManager`] it feeds.

pub mod emergency_shutdown;
pub mod monitor;

pub use emergency_shutdown::EmergencyShutdownManager;
pub use monitor::IntelligentHealthMonitor;
