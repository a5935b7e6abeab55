//! Transport layer for the session engine
//!
//! A transport is a message-oriented duplex channel. The engine drives it
//! through exactly three operations (open, send, close) and observes it
//! through exactly four events (opened, message, closed, error). A fresh
//! transport instance is created for every `open()`; instances are never
//! reused.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketFactory, WebSocketTransport};

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Close code for normal closure
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when a connection ends without a close handshake
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Events a transport delivers to the session engine
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is established and ready for frames
    Opened,
    /// An inbound text frame
    Message(String),
    /// The connection ended; code 1000 is normal closure, anything else is
    /// surfaced as a connection error
    Closed { code: u16, reason: String },
    /// A connection-level failure
    Error(String),
}

/// Receiver side of a transport's event stream
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Trait defining the interface for all transport implementations
#[async_trait]
pub trait Transport: Send {
    /// Begin connecting and hand back the event stream.
    ///
    /// Handshake completion is reported asynchronously as
    /// [`TransportEvent::Opened`], or [`TransportEvent::Error`] if the
    /// connection cannot be established.
    fn open(&mut self) -> TransportResult<EventReceiver>;

    /// Send a text frame; may fail synchronously
    async fn send(&mut self, text: String) -> TransportResult<()>;

    /// Request closure with the given close code
    async fn close(&mut self, code: u16) -> TransportResult<()>;
}

/// Type alias for a boxed transport
pub type BoxedTransport = Box<dyn Transport>;

/// Produces a fresh transport per connection attempt
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> BoxedTransport;

    /// Endpoint description for diagnostics
    fn endpoint(&self) -> String;
}
