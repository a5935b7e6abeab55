//! Inbound frame classification
//!
//! Turns raw transport text into a typed [`Frame`], enforcing the
//! classification order of the protocol: parse, then version check, then
//! shape dispatch. Failures carry whatever id could be recovered from the
//! offending frame so the session can still echo an error response.

use serde_json::Value;
use thiserror::Error;

use crate::JSONRPC_VERSION;
use crate::request::Request;
use crate::response::Response;

/// A classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A request or notification from the peer
    Request(Request),
    /// A response to one of our outstanding requests
    Response(Response),
}

/// Why an inbound frame could not be classified
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame was not valid JSON; no id is recoverable
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The `jsonrpc` field was absent or not the supported version
    #[error("invalid protocol version {found:?}, expected \"{JSONRPC_VERSION}\"")]
    Version {
        id: Option<i64>,
        found: Option<String>,
    },

    /// Valid JSON that matches neither the request nor the response shape
    #[error("unrecognized message shape: {payload}")]
    Shape { id: Option<i64>, payload: Value },
}

impl FrameError {
    /// The id recovered from the malformed frame, when one was present
    pub fn id(&self) -> Option<i64> {
        match self {
            FrameError::Parse(_) => None,
            FrameError::Version { id, .. } | FrameError::Shape { id, .. } => *id,
        }
    }
}

/// Classify a raw inbound frame.
///
/// The version check runs before shape dispatch: a frame with the wrong
/// `jsonrpc` value is rejected even if it would otherwise look like a
/// request or response.
pub fn classify(text: &str) -> Result<Frame, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    let id = value.get("id").and_then(Value::as_i64);

    let version = value.get("jsonrpc").and_then(Value::as_str);
    if version != Some(JSONRPC_VERSION) {
        return Err(FrameError::Version {
            id,
            found: version.map(str::to_string),
        });
    }

    let Some(object) = value.as_object() else {
        return Err(FrameError::Shape { id, payload: value });
    };

    // A response carries an id and at least one of result/error; a request
    // carries a method. Ids are integers on this wire, so a frame whose id
    // is any other JSON type cannot correlate and falls through to Shape.
    if id.is_some() && (object.contains_key("result") || object.contains_key("error")) {
        return serde_json::from_value::<Response>(value.clone())
            .map(Frame::Response)
            .map_err(|_| FrameError::Shape { id, payload: value });
    }

    if object.get("method").is_some_and(Value::is_string) {
        return serde_json::from_value::<Request>(value.clone())
            .map(Frame::Request)
            .map_err(|_| FrameError::Shape { id, payload: value });
    }

    Err(FrameError::Shape { id, payload: value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_request() {
        let frame = classify(r#"{"jsonrpc":"2.0","id":1,"method":"sum","params":[2,3]}"#).unwrap();
        match frame {
            Frame::Request(request) => {
                assert_eq!(request.id, Some(1));
                assert_eq!(request.method, "sum");
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_notification() {
        let frame = classify(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        match frame {
            Frame::Request(request) => assert!(request.is_notification()),
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_responses() {
        let success = classify(r#"{"jsonrpc":"2.0","id":3,"result":5}"#).unwrap();
        assert!(matches!(success, Frame::Response(_)));

        let error = classify(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        match error {
            Frame::Response(response) => assert!(response.is_error()),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_dual_result_error_still_classifies_as_response() {
        // The mutual-exclusion violation is the session's call to make,
        // not the codec's.
        let frame = classify(
            r#"{"jsonrpc":"2.0","id":9,"result":1,"error":{"code":-32603,"message":"x"}}"#,
        )
        .unwrap();
        match frame {
            Frame::Response(response) => assert!(response.is_malformed()),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(classify("not json"), Err(FrameError::Parse(_))));
    }

    #[test]
    fn test_version_mismatch_recovers_id() {
        let err = classify(r#"{"jsonrpc":"1.0","id":4,"method":"sum"}"#).unwrap_err();
        match err {
            FrameError::Version { id, found } => {
                assert_eq!(id, Some(4));
                assert_eq!(found.as_deref(), Some("1.0"));
            }
            other => panic!("expected version error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_version_field() {
        let err = classify(r#"{"id":4,"method":"sum"}"#).unwrap_err();
        assert!(matches!(err, FrameError::Version { found: None, .. }));
    }

    #[test]
    fn test_version_check_precedes_shape() {
        // Not request- or response-shaped either way, but version loses.
        let err = classify(r#"{"jsonrpc":"3.0","id":1}"#).unwrap_err();
        assert!(matches!(err, FrameError::Version { .. }));
    }

    #[test]
    fn test_unrecognized_shape_echoes_payload() {
        let err = classify(r#"{"jsonrpc":"2.0","id":8,"banana":true}"#).unwrap_err();
        match err {
            FrameError::Shape { id, payload } => {
                assert_eq!(id, Some(8));
                assert_eq!(payload["banana"], true);
            }
            other => panic!("expected shape error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_integer_id_is_not_a_response() {
        let err = classify(r#"{"jsonrpc":"2.0","id":"abc","result":5}"#).unwrap_err();
        match err {
            FrameError::Shape { id, .. } => assert_eq!(id, None),
            other => panic!("expected shape error, got {:?}", other),
        }
    }
}
