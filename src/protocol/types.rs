/// Protocol type identifier (PostgreSQL type OID) of a result column.
///
/// Values match `pg_type.oid` in a stock PostgreSQL catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Oid {
    Bool = 16,
    Int8 = 20,
    Int2 = 21,
    Int4 = 23,
    Text = 25,
    Float4 = 700,
    Float8 = 701,
    Unknown = 705,
    Varchar = 1043,
    Date = 1082,
    Time = 1083,
    Timestamp = 1114,
    TimestampTz = 1184,
}

impl Oid {
    /// Converts the Oid to its wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Size of the type as reported in RowDescription (`pg_type.typlen`).
    /// Variable-length types report -1, `unknown` reports -2.
    pub fn type_size(self) -> i16 {
        match self {
            Oid::Bool => 1,
            Oid::Int2 => 2,
            Oid::Int4 | Oid::Float4 | Oid::Date => 4,
            Oid::Int8 | Oid::Float8 | Oid::Time | Oid::Timestamp | Oid::TimestampTz => 8,
            Oid::Text | Oid::Varchar => -1,
            Oid::Unknown => -2,
        }
    }
}

/// Transaction status indicator for ReadyForQuery message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    /// 'I' - Idle (not in a transaction block). Queries run outside any
    /// transaction block, so this is the only status reported.
    #[default]
    Idle,
}

impl TransactionStatus {
    pub fn as_byte(self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
        }
    }
}

/// Error and notice message field type codes.
/// See: https://www.postgresql.org/docs/current/protocol-error-fields.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorFieldCode {
    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG
    Severity = b'S',
    /// Severity (non-localized): Same as Severity but never localized
    SeverityNonLocalized = b'V',
    /// SQLSTATE code
    SqlState = b'C',
    /// Primary human-readable error message
    Message = b'M',
}

impl ErrorFieldCode {
    /// Converts the ErrorFieldCode to a u8 value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_sizes() {
        assert_eq!(Oid::Int4.type_size(), 4);
        assert_eq!(Oid::Int8.type_size(), 8);
        assert_eq!(Oid::Varchar.type_size(), -1);
        assert_eq!(Oid::Varchar.as_i32(), 1043);
    }

    #[test]
    fn test_status_and_field_codes() {
        assert_eq!(TransactionStatus::default().as_byte(), b'I');
        assert_eq!(ErrorFieldCode::SqlState.as_u8(), b'C');
    }
}
