//! SQL-level errors raised by the query bridge and reported to clients.

/// Severity of a [`SqlException`].
///
/// `Error` is reported to the client and the session keeps going; `Fatal`
/// ends the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Fatal,
}

impl Severity {
    /// Wire representation used in the `S`/`V` fields of ErrorResponse.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// SQLSTATE error classes used by this server.
/// See: https://www.postgresql.org/docs/current/errcodes-appendix.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlState {
    /// 08000
    ConnectionException,
    /// 22000
    DataException,
    /// 42601
    SyntaxError,
    /// 54011
    TooManyColumns,
}

impl SqlState {
    pub fn code(self) -> &'static str {
        match self {
            SqlState::ConnectionException => "08000",
            SqlState::DataException => "22000",
            SqlState::SyntaxError => "42601",
            SqlState::TooManyColumns => "54011",
        }
    }
}

/// An error produced while preparing or executing a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} {}: {message}", .severity.as_str(), .sql_state.code())]
pub struct SqlException {
    message: String,
    sql_state: SqlState,
    severity: Severity,
}

impl SqlException {
    pub fn new(message: impl Into<String>, sql_state: SqlState, severity: Severity) -> Self {
        Self {
            message: message.into(),
            sql_state,
            severity,
        }
    }

    /// An `Error`-severity exception; the session survives it.
    pub fn error(message: impl Into<String>, sql_state: SqlState) -> Self {
        Self::new(message, sql_state, Severity::Error)
    }

    /// A `Fatal`-severity exception; the session is torn down.
    pub fn fatal(message: impl Into<String>, sql_state: SqlState) -> Self {
        Self::new(message, sql_state, Severity::Fatal)
    }

    /// The generic mapping for engine failures: `22000`, severity `Error`.
    pub fn data_exception(message: impl Into<String>) -> Self {
        Self::error(message, SqlState::DataException)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn sql_state(&self) -> SqlState {
        self.sql_state
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_exception_defaults() {
        let e = SqlException::data_exception("no such table: t");
        assert_eq!(e.sql_state().code(), "22000");
        assert_eq!(e.severity(), Severity::Error);
        assert!(!e.is_fatal());
        assert_eq!(e.to_string(), "ERROR 22000: no such table: t");
    }

    #[test]
    fn test_fatal() {
        let e = SqlException::fatal("engine closed", SqlState::ConnectionException);
        assert!(e.is_fatal());
        assert_eq!(e.to_string(), "FATAL 08000: engine closed");
    }
}
