//! TCP server for PostgreSQL-compatible connections.
//!
//! This module provides the network layer that accepts client connections
//! and drives each one through the PostgreSQL wire protocol.
//!
//! ## Architecture
//!
//! ```text
//! +--------+
//! | Server |  <- Accepts TCP connections, one task per client
//! +--------+
//!      |
//!      v
//! +---------+     +-----------+
//! | Session | --> | Transport |  <- Exact-length reads, whole-buffer writes
//! +---------+     +-----------+
//!      |
//!      v
//! +--------------+
//! | QueryHandler |  <- Turns query text into a PreparedStatement
//! +--------------+
//! ```
//!
//! ## Terminology
//!
//! - **Server**: TCP listener that spawns sessions
//! - **Session**: Per-client state machine (startup, queries, teardown)
//! - **Transport**: Owns the socket of one session
//! - **Registry**: Tracks live sessions so they can be listed and shut down

pub mod background;
pub mod config;
pub mod listener;
pub mod registry;
pub mod session;
pub mod transport;

pub use background::{BackgroundServer, start_background};
pub use config::ServerConfig;
pub use listener::Server;
pub use registry::Registry;
pub use session::{Session, SessionError, SessionId, SessionState};
