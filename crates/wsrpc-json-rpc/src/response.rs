use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorObject;
use crate::types::Version;

/// A JSON-RPC response envelope
///
/// `result` and `error` are mutually exclusive on the wire; a response
/// carrying both is a protocol violation the session engine rejects with
/// `INVALID_RESPONSE`. Both absent is a legal success with no return
/// value, so the violation is detected by the engine rather than encoded
/// away in the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: Version,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Create a success response carrying a result value
    pub fn success(id: i64, result: Value) -> Self {
        Self {
            jsonrpc: Version::V2_0,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create a success response with no return value
    pub fn void(id: i64) -> Self {
        Self {
            jsonrpc: Version::V2_0,
            id,
            result: None,
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: i64, error: ErrorObject) -> Self {
        Self {
            jsonrpc: Version::V2_0,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// True when the envelope violates the result/error exclusion rule
    pub fn is_malformed(&self) -> bool {
        self.result.is_some() && self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorObject;
    use serde_json::json;

    #[test]
    fn test_success_serialization() {
        let response = Response::success(1, json!(19));
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","id":1,"result":19}"#);
    }

    #[test]
    fn test_error_serialization() {
        let response = Response::error(1, ErrorObject::method_not_found("sum"));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error\""));
        assert!(!json.contains("\"result\""));
        assert!(response.is_error());
    }

    #[test]
    fn test_void_omits_both_fields() {
        let response = Response::void(4);
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","id":4}"#);
        assert!(!response.is_error());
        assert!(!response.is_malformed());
    }

    #[test]
    fn test_malformed_dual_response() {
        let response: Response = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":2,"result":5,"error":{"code":-32603,"message":"boom"}}"#,
        )
        .unwrap();
        assert!(response.is_malformed());
    }
}
