//! # Protocol Layer Prelude
//!
//! This module provides convenient re-exports of the most commonly used types
//! from the protocol layer.
//!
//! ```rust
//! use wsrpc_json_rpc::prelude::*;
//! ```

// Core protocol types
pub use crate::codec::{Frame, FrameError, classify};
pub use crate::error::{ErrorCode, ErrorObject};
pub use crate::registry::{FunctionHandler, HandlerResult, MethodHandler, MethodRegistry};
pub use crate::request::{Params, Request};
pub use crate::response::Response;
pub use crate::types::Version;

// Standard error codes
pub use crate::error_codes::*;
