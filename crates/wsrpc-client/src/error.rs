//! Error types for session operations
//!
//! The taxonomy keeps caller-attributable failures and connection-level
//! failures apart: everything that belongs to one caller is delivered to
//! that caller's future as a [`CallError`], everything that cannot be
//! attributed goes only to the session's error channel as a
//! [`SessionError`].

use serde_json::Value;
use thiserror::Error;

use wsrpc_json_rpc::{ErrorCode, ErrorObject, error_codes};

/// Result type for session lifecycle operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors from session lifecycle and registry operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session engine has terminated and can no longer be driven
    #[error("session terminated")]
    SessionClosed,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    Send(String),

    #[error("transport closed unexpectedly")]
    Closed,

    #[error("unsupported transport: {0}")]
    Unsupported(String),
}

/// Failure delivered to a single `call` or `notify` caller
///
/// Every variant maps onto a JSON-RPC error code via [`CallError::code`];
/// local guard failures carry `INTERNAL_ERROR` just like a synthetic error
/// envelope would.
#[derive(Debug, Error)]
pub enum CallError {
    /// The session was not open; nothing reached the transport
    #[error("session is not open")]
    NotConnected,

    /// The transport rejected the send; no pending entry was created
    #[error("send failed: {0}")]
    Send(String),

    /// No response arrived within the configured timeout
    #[error("request {id} exceeded the maximum time of {timeout_ms}ms")]
    Timeout { id: i64, timeout_ms: u64 },

    /// The peer sent a response carrying both result and error
    #[error("invalid response for request {id}: result and error are mutually exclusive")]
    InvalidResponse { id: i64, payload: Value },

    /// The peer answered with an error response
    #[error("{error}")]
    Rpc { id: i64, error: ErrorObject },
}

impl CallError {
    /// The JSON-RPC error code for this failure
    pub fn code(&self) -> i64 {
        match self {
            CallError::NotConnected | CallError::Send(_) => error_codes::INTERNAL_ERROR,
            CallError::Timeout { .. } => error_codes::REQUEST_TIMEOUT,
            CallError::InvalidResponse { .. } => error_codes::INVALID_RESPONSE,
            CallError::Rpc { error, .. } => error.code,
        }
    }

    /// The request id this failure settles, when one was allocated
    pub fn id(&self) -> Option<i64> {
        match self {
            CallError::NotConnected | CallError::Send(_) => None,
            CallError::Timeout { id, .. }
            | CallError::InvalidResponse { id, .. }
            | CallError::Rpc { id, .. } => Some(*id),
        }
    }
}

/// Connection- and protocol-level failures published on the session's
/// error channel
///
/// These are the failures that cannot be attributed to a specific caller:
/// garbage frames from the peer, responses with unknown ids, and abnormal
/// transport closure. None of them terminate the session.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// An inbound frame failed classification (parse, version, or shape)
    #[error("protocol error {}: {message}", .code.code())]
    Protocol { code: ErrorCode, message: String },

    /// A response arrived for an id with no pending request
    #[error("response with unknown id {id}")]
    UnmatchedResponse { id: i64 },

    /// The transport closed with a non-normal close code
    #[error("connection closed abnormally ({code}): {reason}")]
    Connection { code: u16, reason: String },

    /// A transport-level failure while the session was open
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl SessionError {
    /// The JSON-RPC error code, for the protocol-shaped variants
    pub fn code(&self) -> Option<i64> {
        match self {
            SessionError::Protocol { code, .. } => Some(code.code()),
            SessionError::UnmatchedResponse { .. } => Some(error_codes::INTERNAL_ERROR),
            SessionError::Connection { .. } | SessionError::Transport { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_error_codes() {
        assert_eq!(CallError::NotConnected.code(), -32603);
        assert_eq!(CallError::Send("boom".into()).code(), -32603);
        assert_eq!(
            CallError::Timeout {
                id: 1,
                timeout_ms: 500
            }
            .code(),
            -32002
        );
        assert_eq!(
            CallError::InvalidResponse {
                id: 1,
                payload: json!({})
            }
            .code(),
            -32001
        );
        assert_eq!(
            CallError::Rpc {
                id: 1,
                error: ErrorObject::method_not_found("x")
            }
            .code(),
            -32601
        );
    }

    #[test]
    fn test_timeout_message_names_duration() {
        let error = CallError::Timeout {
            id: 4,
            timeout_ms: 500,
        };
        assert!(error.to_string().contains("exceeded the maximum time of 500ms"));
        assert_eq!(error.id(), Some(4));
    }

    #[test]
    fn test_session_error_codes() {
        let protocol = SessionError::Protocol {
            code: ErrorCode::ParseError,
            message: "bad json".into(),
        };
        assert_eq!(protocol.code(), Some(-32700));

        assert_eq!(
            SessionError::UnmatchedResponse { id: 9 }.code(),
            Some(-32603)
        );
        assert_eq!(
            SessionError::Connection {
                code: 1011,
                reason: "server restart".into()
            }
            .code(),
            None
        );
    }
}
