//! PostgreSQL wire protocol implementation.
//!
//! This module implements the startup and simple-query subset of the
//! PostgreSQL v3.0 wire protocol. Extended query messages are recognized at
//! the framing level but carry no behavior.
//!
//! ## Architecture
//!
//! ```text
//! +----------+                           +----------+
//! |  Client  |  --- FrontendMessage -->  |  Server  |
//! |  (psql)  |  <-- BackendMessage  ---  | (bridge) |
//! +----------+                           +----------+
//!               ^                   ^
//!               |  codec (framing)  |
//!               +-------------------+
//! ```
//!
//! ## Terminology
//!
//! - **FrontendMessage**: Messages from client to server (Startup, Query, Terminate, ...)
//! - **BackendMessage**: Messages from server to client (RowDescription, DataRow, ...)
//! - **Codec**: Header parsing, length validation and C-string helpers
//!
//! Decoding and encoding are pure: nothing in this module touches a socket.

pub mod backend;
pub mod codec;
pub mod error;
pub mod frontend;
pub mod types;

pub use backend::{BackendMessage, ErrorField, FieldDescription};
pub use codec::{DEFAULT_MAX_MESSAGE_SIZE, STARTUP_HEADER_LEN, TAGGED_HEADER_LEN};
pub use error::ProtocolError;
pub use frontend::{FrontendMessage, StartupParameters};
pub use types::{ErrorFieldCode, Oid, TransactionStatus};
