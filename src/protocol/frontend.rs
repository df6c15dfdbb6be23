use bytes::{Buf, Bytes, BytesMut};
use std::collections::HashMap;

use crate::protocol::codec::{get_cstring, get_cstring_bounded};
use crate::protocol::error::ProtocolError;

/// Ensures that the buffer has at least `n` bytes remaining.
/// Returns `ProtocolError::InvalidMessage` if not enough bytes are available.
macro_rules! ensure_remaining {
    ($buf:expr, $n:expr) => {
        if $buf.len() < $n {
            return Err(ProtocolError::InvalidMessage);
        }
    };
}

/// SSLRequest magic number
pub const SSL_REQUEST_CODE: i32 = (1234 << 16) | 5679; // 80877103

/// GSSENCRequest magic number
pub const GSSENC_REQUEST_CODE: i32 = (1234 << 16) | 5680; // 80877104

/// CancelRequest magic number
pub const CANCEL_REQUEST_CODE: i32 = (1234 << 16) | 5678; // 80877102

/// Messages sent by the frontend (client).
///
/// The first four variants only appear as the untagged first message of a
/// connection. Variants that carry raw `Bytes` are recognized at the framing
/// level but their payload is never interpreted.
#[derive(Debug, PartialEq)]
pub enum FrontendMessage {
    /// StartupMessage - normal connection startup
    Startup {
        protocol_version: i32,
        parameters: StartupParameters,
    },
    /// SSLRequest - client wants to negotiate SSL
    SslRequest,
    /// GSSENCRequest - client wants GSSAPI encryption
    GssEncRequest,
    /// CancelRequest - client wants to cancel a query
    CancelRequest { process_id: i32, secret_key: i32 },

    /// 'Q' - Simple query
    Query(String),
    /// 'X' - Termination
    Terminate,

    /// 'B'
    Bind(Bytes),
    /// 'C'
    Close(Bytes),
    /// 'd'
    CopyData(Bytes),
    /// 'c'
    CopyDone,
    /// 'f'
    CopyFail(Bytes),
    /// 'D'
    Describe(Bytes),
    /// 'E'
    Execute(Bytes),
    /// 'H'
    Flush,
    /// 'F'
    FunctionCall(Bytes),
    /// 'P'
    Parse(Bytes),
    /// 'S'
    Sync,
    /// 'p' - GSSResponse, SASLInitialResponse, SASLResponse or PasswordMessage
    AuthenticationResponse(Bytes),
}

impl FrontendMessage {
    /// Decodes the untagged first message of a connection.
    ///
    /// `src` is the body that follows the length prefix.
    pub fn decode_startup(mut src: BytesMut) -> Result<Self, ProtocolError> {
        ensure_remaining!(src, 4);
        let code = src.get_i32();

        match code {
            SSL_REQUEST_CODE => Ok(FrontendMessage::SslRequest),
            GSSENC_REQUEST_CODE => Ok(FrontendMessage::GssEncRequest),
            CANCEL_REQUEST_CODE => {
                ensure_remaining!(src, 8);
                let process_id = src.get_i32();
                let secret_key = src.get_i32();
                Ok(FrontendMessage::CancelRequest {
                    process_id,
                    secret_key,
                })
            }
            version if (version >> 16) == 3 => {
                let parameters = StartupParameters::decode(&mut src)?;
                Ok(FrontendMessage::Startup {
                    protocol_version: version,
                    parameters,
                })
            }
            _ => Err(ProtocolError::UnsupportedProtocolVersion(code)),
        }
    }

    /// Decodes a tagged message from its tag and body.
    ///
    /// Returns `Ok(None)` for tags this server does not know; the caller is
    /// expected to skip the message and read the next one.
    pub fn decode(tag: u8, mut src: BytesMut) -> Result<Option<Self>, ProtocolError> {
        let message = match tag {
            b'Q' => {
                // The body size was checked against the frame limit already.
                let limit = src.len();
                FrontendMessage::Query(get_cstring_bounded(&mut src, limit)?)
            }
            b'X' => FrontendMessage::Terminate,
            b'B' => FrontendMessage::Bind(src.freeze()),
            b'C' => FrontendMessage::Close(src.freeze()),
            b'd' => FrontendMessage::CopyData(src.freeze()),
            b'c' => FrontendMessage::CopyDone,
            b'f' => FrontendMessage::CopyFail(src.freeze()),
            b'D' => FrontendMessage::Describe(src.freeze()),
            b'E' => FrontendMessage::Execute(src.freeze()),
            b'H' => FrontendMessage::Flush,
            b'F' => FrontendMessage::FunctionCall(src.freeze()),
            b'P' => FrontendMessage::Parse(src.freeze()),
            b'S' => FrontendMessage::Sync,
            b'p' => FrontendMessage::AuthenticationResponse(src.freeze()),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            FrontendMessage::Startup { .. } => "Startup",
            FrontendMessage::SslRequest => "SSLRequest",
            FrontendMessage::GssEncRequest => "GSSENCRequest",
            FrontendMessage::CancelRequest { .. } => "CancelRequest",
            FrontendMessage::Query(_) => "Query",
            FrontendMessage::Terminate => "Terminate",
            FrontendMessage::Bind(_) => "Bind",
            FrontendMessage::Close(_) => "Close",
            FrontendMessage::CopyData(_) => "CopyData",
            FrontendMessage::CopyDone => "CopyDone",
            FrontendMessage::CopyFail(_) => "CopyFail",
            FrontendMessage::Describe(_) => "Describe",
            FrontendMessage::Execute(_) => "Execute",
            FrontendMessage::Flush => "Flush",
            FrontendMessage::FunctionCall(_) => "FunctionCall",
            FrontendMessage::Parse(_) => "Parse",
            FrontendMessage::Sync => "Sync",
            FrontendMessage::AuthenticationResponse(_) => "AuthenticationResponse",
        }
    }
}

/// Startup parameters from the client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartupParameters {
    /// Empty when the client did not send one; authentication is trivial.
    pub user: String,
    pub database: Option<String>,
    pub application_name: Option<String>,
    pub client_encoding: Option<String>,
    pub other: HashMap<String, String>,
}

impl StartupParameters {
    /// Decodes startup parameters from the message buffer.
    fn decode(src: &mut BytesMut) -> Result<Self, ProtocolError> {
        let mut params = StartupParameters::default();

        loop {
            if src.is_empty() {
                break;
            }

            let name = get_cstring(src)?;

            // Empty name signals end of parameters
            if name.is_empty() {
                break;
            }

            let value = get_cstring(src)?;

            match name.as_str() {
                "user" => params.user = value,
                "database" => params.database = Some(value),
                "application_name" => params.application_name = Some(value),
                "client_encoding" => params.client_encoding = Some(value),
                _ => {
                    params.other.insert(name, value);
                }
            }
        }

        Ok(params)
    }
}
