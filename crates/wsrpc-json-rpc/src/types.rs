use serde::{Deserialize, Serialize};

/// Protocol version marker for the `jsonrpc` envelope field.
///
/// Serializes as the literal `"2.0"`; deserialization of any other string
/// fails, so a typed envelope can only exist for the supported version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Version {
    #[default]
    #[serde(rename = "2.0")]
    V2_0,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        crate::JSONRPC_VERSION
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_round_trip() {
        let json = serde_json::to_string(&Version::V2_0).unwrap();
        assert_eq!(json, "\"2.0\"");

        let parsed: Version = serde_json::from_str("\"2.0\"").unwrap();
        assert_eq!(parsed, Version::V2_0);
    }

    #[test]
    fn test_version_rejects_unknown() {
        assert!(serde_json::from_str::<Version>("\"1.0\"").is_err());
        assert!(serde_json::from_str::<Version>("\"2.1\"").is_err());
    }
}
