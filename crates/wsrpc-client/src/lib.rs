//! # JSON-RPC 2.0 Session Engine
//!
//! A client-side JSON-RPC 2.0 engine over a persistent, message-oriented
//! duplex channel. The session correlates outbound requests with inbound
//! responses, times out requests that never settle, dispatches peer
//! requests to registered handlers, and reports connection- and
//! protocol-level failures on a subscribable error channel.
//!
//! ## Features
//!
//! - **Request correlation**: monotonically increasing ids, at-most-one
//!   settlement per call (response, error, or timeout)
//! - **Duplex dispatch**: the peer can call methods registered with
//!   [`Session::register`]; names are case-insensitive
//! - **Parameter adaptation**: positional and named arguments reconciled
//!   against declared parameter names before invocation
//! - **Structural concurrency**: one engine task owns all mutable state;
//!   no locks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use wsrpc_client::{Session, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionBuilder::new()
//!         .with_url("ws://localhost:8080/rpc")
//!         .build()?;
//!
//!     session.register_fn("sum", &["a", "b"], |args| {
//!         let a = args[0].as_i64().unwrap_or_default();
//!         let b = args[1].as_i64().unwrap_or_default();
//!         Ok(json!(a + b))
//!     })?;
//!
//!     session.open().await?;
//!
//!     let response = session
//!         .call("ping", Some(vec![json!("hello")].into()))
//!         .await?;
//!     println!("result: {:?}", response.result);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod transport;

pub(crate) mod pending;

pub mod prelude;

// Re-export main types
pub use config::{SessionConfig, TimeoutConfig};
pub use error::{CallError, ClientError, ClientResult, SessionError, TransportError};
pub use session::{CloseEvent, Session, SessionBuilder, SessionState};

// Re-export transport types
pub use transport::{Transport, TransportEvent, TransportFactory};

// Re-export the protocol layer for convenience
pub use wsrpc_json_rpc as protocol;
