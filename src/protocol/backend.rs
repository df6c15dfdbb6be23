use bytes::{BufMut, BytesMut};

use crate::error::SqlException;
use crate::protocol::codec::{put_cstring, put_message};
use crate::protocol::types::{ErrorFieldCode, Oid, TransactionStatus};

/// Messages sent by the backend (server) to the client.
///
/// Result rows are not a variant here: they are streamed straight into a
/// [`ResultWriter`](crate::writer::ResultWriter) buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    /// 'R' - Authentication response (AuthenticationOk)
    AuthenticationOk,
    /// 'S' - Parameter status notification
    ParameterStatus { name: String, value: String },
    /// 'Z' - Ready for query
    ReadyForQuery { status: TransactionStatus },
    /// 'T' - Row description
    RowDescription { fields: Vec<FieldDescription> },
    /// 'C' - Command complete
    CommandComplete { tag: String },
    /// 'I' - Empty query response
    EmptyQueryResponse,
    /// 'E' - Error response
    ErrorResponse { fields: Vec<ErrorField> },
    /// Untagged single byte 'N' declining SSL/GSS encryption
    SslResponse,
}

impl BackendMessage {
    /// Encodes this message onto the end of `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            BackendMessage::AuthenticationOk => {
                put_message(dst, b'R', |dst| dst.put_i32(0)); // auth type 0 = Ok
            }
            BackendMessage::ParameterStatus { name, value } => {
                put_message(dst, b'S', |dst| {
                    put_cstring(dst, name);
                    put_cstring(dst, value);
                });
            }
            BackendMessage::ReadyForQuery { status } => {
                put_message(dst, b'Z', |dst| dst.put_u8(status.as_byte()));
            }
            BackendMessage::RowDescription { fields } => {
                put_message(dst, b'T', |dst| {
                    // Wider results are rejected by `writer::check_column_count`.
                    dst.put_i16(fields.len() as i16);
                    for field in fields {
                        put_cstring(dst, &field.name);
                        dst.put_i32(0); // table oid
                        dst.put_i16(0); // column attribute number
                        dst.put_i32(field.type_oid.as_i32());
                        dst.put_i16(field.type_oid.type_size());
                        dst.put_i32(-1); // type modifier
                        dst.put_i16(0); // text format
                    }
                });
            }
            BackendMessage::CommandComplete { tag } => {
                put_message(dst, b'C', |dst| put_cstring(dst, tag));
            }
            BackendMessage::EmptyQueryResponse => {
                put_message(dst, b'I', |_| {});
            }
            BackendMessage::ErrorResponse { fields } => {
                put_message(dst, b'E', |dst| {
                    for field in fields {
                        dst.put_u8(field.code.as_u8());
                        put_cstring(dst, &field.value);
                    }
                    dst.put_u8(0); // terminator
                });
            }
            BackendMessage::SslResponse => dst.put_u8(b'N'),
        }
    }

    /// Builds the ErrorResponse reported to the client for `e`.
    pub fn error_response(e: &SqlException) -> Self {
        let severity = e.severity().as_str();
        BackendMessage::ErrorResponse {
            fields: vec![
                ErrorField::new(ErrorFieldCode::Severity, severity),
                ErrorField::new(ErrorFieldCode::SeverityNonLocalized, severity),
                ErrorField::new(ErrorFieldCode::SqlState, e.sql_state().code()),
                ErrorField::new(ErrorFieldCode::Message, e.message()),
            ],
        }
    }
}

/// One column of a RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub name: String,
    pub type_oid: Oid,
}

impl FieldDescription {
    pub fn new(name: impl Into<String>, type_oid: Oid) -> Self {
        Self {
            name: name.into(),
            type_oid,
        }
    }
}

/// Error/Notice field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorField {
    pub code: ErrorFieldCode,
    pub value: String,
}

impl ErrorField {
    pub fn new(code: ErrorFieldCode, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }
}
