/// Protocol parsing errors.
///
/// Every variant is a framing-level failure; the session treats all of them
/// as fatal.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid message length: {0}")]
    InvalidLength(i32),

    #[error("message of {len} bytes exceeds the {max} byte limit")]
    MessageTooLarge { len: usize, max: usize },

    #[error("invalid message")]
    InvalidMessage,

    #[error("unsupported protocol version: {}.{}", .0 >> 16, .0 & 0xffff)]
    UnsupportedProtocolVersion(i32),

    #[error("invalid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
