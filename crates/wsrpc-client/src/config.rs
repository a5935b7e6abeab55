//! Configuration types for the session engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main session configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Timeout configurations
    pub timeouts: TimeoutConfig,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout for the transport handshake
    #[serde(with = "duration_serde")]
    pub connect: Duration,

    /// Timeout armed for every outstanding request
    #[serde(with = "duration_serde")]
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    /// Convenience constructor overriding only the per-request timeout
    pub fn with_request_timeout(request: Duration) -> Self {
        Self {
            timeouts: TimeoutConfig {
                request,
                ..TimeoutConfig::default()
            },
        }
    }
}

// Helper module for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
        assert_eq!(config.timeouts.request, Duration::from_secs(30));
    }

    #[test]
    fn test_request_timeout_override() {
        let config = SessionConfig::with_request_timeout(Duration::from_millis(500));
        assert_eq!(config.timeouts.request, Duration::from_millis(500));
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
    }

    #[test]
    fn test_config_serialization() {
        let config = SessionConfig::with_request_timeout(Duration::from_millis(500));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"request\":500"));

        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.timeouts.request, Duration::from_millis(500));
    }
}
