//! # Session Engine Prelude
//!
//! This module provides convenient re-exports of the most commonly used types
//! and traits from the session engine.
//!
//! ```rust
//! use wsrpc_client::prelude::*;
//! ```

// Core session types
pub use crate::config::{SessionConfig, TimeoutConfig};
pub use crate::error::{CallError, ClientError, ClientResult, SessionError, TransportError};
pub use crate::session::{CloseEvent, Session, SessionBuilder, SessionState};

// Transport types
pub use crate::transport::{
    BoxedTransport, EventReceiver, Transport, TransportEvent, TransportFactory,
};

#[cfg(feature = "websocket")]
pub use crate::transport::{WebSocketFactory, WebSocketTransport};

// Protocol types commonly used alongside the session
pub use wsrpc_json_rpc::prelude::*;

// Standard library types commonly used with sessions
pub use std::time::Duration;
