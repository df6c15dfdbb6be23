use std::io;
use std::time::Duration;

use crate::error::SqlException;
use crate::protocol::ProtocolError;

/// Session error types.
///
/// The session recovers only from a non-fatal [`SqlException`]; any other
/// error that reaches the caller has ended the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("SQL error: {0}")]
    Sql(#[from] SqlException),

    #[error("idle for more than {0:?}")]
    IdleTimeout(Duration),
}

impl SessionError {
    /// Whether the error only means the client went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            SessionError::Io(e) if matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            )
        )
    }
}
