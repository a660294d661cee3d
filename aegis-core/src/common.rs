//! # Common Utilities Module
//!
//! Small cross-cutting helpers shared by the configuration types throughout
//! the SDK and the control plane that sits on top of it.

/// Serde helpers for `std::time::Duration` fields expressed as `"<n>s"` strings
/// in TOML/JSON configuration.
pub mod duration_serde {
    use std::time::Duration;

    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_json::Value;

        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => crate::providers::duration_serde::parse_duration_str(&s)
                .map_err(D::Error::custom),
            Value::Number(n) => {
                let ms = n.as_u64().ok_or_else(|| D::Error::custom("invalid duration number"))?;
                Ok(Duration::from_millis(ms))
            }
            other => Err(D::Error::custom(format!(
                "expected duration string or number, got {other:?}"
            ))),
        }
    }

    /// Parse a bare duration string (`"30s"`, `"500ms"`, `"2m"`, `"1h"`) outside
    /// of a serde context, e.g. for CLI/env-var overrides.
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        crate::providers::duration_serde::parse_duration_str(s)
            .map_err(|e| anyhow::anyhow!(e))
    }
}
