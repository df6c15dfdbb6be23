use bytes::{Buf, BufMut, BytesMut};

use crate::protocol::ProtocolError;

/// Maximum message size in bytes (16 MB).
/// PostgreSQL uses up to 1 GB, but 16 MB is a reasonable default for most use cases.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix of the untagged startup message.
pub const STARTUP_HEADER_LEN: usize = 4;

/// Size of the tag byte plus length prefix of every other message.
pub const TAGGED_HEADER_LEN: usize = 5;

/// Smallest valid startup length: the length itself plus a 4-byte code.
const MIN_STARTUP_LEN: i32 = 8;

/// Smallest valid tagged length: the length itself.
const MIN_TAGGED_LEN: i32 = 4;

/// Header of a tagged frontend message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: u8,
    /// Body size, excluding the length field itself.
    pub body_len: usize,
}

/// Parses the 4-byte length prefix of a startup message and returns the body size.
///
/// The length must cover at least the protocol code and the body must not
/// exceed `max_message_size`. Nothing is allocated before this check passes.
pub fn parse_startup_header(
    header: &[u8; STARTUP_HEADER_LEN],
    max_message_size: usize,
) -> Result<usize, ProtocolError> {
    let len = i32::from_be_bytes(*header);
    body_len(len, MIN_STARTUP_LEN, max_message_size)
}

/// Parses the tag and length prefix of a regular message.
pub fn parse_tagged_header(
    header: &[u8; TAGGED_HEADER_LEN],
    max_message_size: usize,
) -> Result<FrameHeader, ProtocolError> {
    let len = i32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    Ok(FrameHeader {
        tag: header[0],
        body_len: body_len(len, MIN_TAGGED_LEN, max_message_size)?,
    })
}

fn body_len(len: i32, min: i32, max_message_size: usize) -> Result<usize, ProtocolError> {
    if len < min {
        return Err(ProtocolError::InvalidLength(len));
    }
    let body = (len - 4) as usize;
    if body > max_message_size {
        return Err(ProtocolError::MessageTooLarge {
            len: body,
            max: max_message_size,
        });
    }
    Ok(body)
}

/// Longest C string accepted where the frame itself does not bound it, such
/// as startup parameter names and values.
pub const MAX_CSTRING_LENGTH: usize = 64 * 1024;

/// Read a null-terminated string from a BytesMut buffer.
/// Returns an error if there's not enough data (no null terminator found).
/// Returns the string (without the null terminator) if successful.
///
/// The search for the terminator is bounded so that malicious input cannot
/// make the scan unbounded.
pub fn get_cstring(src: &mut BytesMut) -> Result<String, ProtocolError> {
    get_cstring_bounded(src, MAX_CSTRING_LENGTH)
}

/// Like [`get_cstring`], but scans at most `limit` bytes for the terminator.
///
/// Message bodies whose size was already checked against the configured
/// maximum pass their own length here.
pub fn get_cstring_bounded(src: &mut BytesMut, limit: usize) -> Result<String, ProtocolError> {
    let Some(null_pos) = src.iter().take(limit).position(|&b| b == 0) else {
        return Err(ProtocolError::InvalidMessage);
    };

    let bytes = src.split_to(null_pos);
    src.advance(1);
    String::from_utf8(bytes.to_vec()).map_err(ProtocolError::InvalidUtf8)
}

/// Write a null-terminated string to a BytesMut buffer.
pub fn put_cstring(dst: &mut BytesMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

/// Writes `tag`, then a placeholder length, runs `body`, and patches the
/// length so that it counts itself plus everything `body` wrote.
pub(crate) fn put_message(dst: &mut BytesMut, tag: u8, body: impl FnOnce(&mut BytesMut)) {
    dst.put_u8(tag);
    let len_pos = dst.len();
    dst.put_i32(0);
    body(dst);
    let len = (dst.len() - len_pos) as i32;
    dst[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cstring() {
        let mut buf = BytesMut::from(&b"hello\0world"[..]);
        assert_eq!(get_cstring(&mut buf).unwrap(), "hello".to_string());
        assert_eq!(buf, b"world"[..]);
    }

    #[test]
    fn test_get_cstring_length_cap() {
        let mut long = vec![b'x'; MAX_CSTRING_LENGTH + 1];
        long.push(0);

        let mut buf = BytesMut::from(&long[..]);
        assert!(matches!(
            get_cstring(&mut buf),
            Err(ProtocolError::InvalidMessage)
        ));

        let mut buf = BytesMut::from(&long[..]);
        let limit = buf.len();
        let s = get_cstring_bounded(&mut buf, limit).unwrap();
        assert_eq!(s.len(), MAX_CSTRING_LENGTH + 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_get_cstring_incomplete() {
        let mut buf = BytesMut::from(&b"hello"[..]);
        assert!(get_cstring(&mut buf).is_err());
    }

    #[test]
    fn test_get_cstring_invalid_utf8() {
        let mut buf = BytesMut::from(&[0xff, 0xfe, 0][..]);
        assert!(matches!(
            get_cstring(&mut buf),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_put_cstring() {
        let mut buf = BytesMut::new();
        put_cstring(&mut buf, "test");
        assert_eq!(buf, b"test\0"[..]);
    }

    #[test]
    fn test_startup_header() {
        assert_eq!(parse_startup_header(&[0, 0, 0, 8], 1024).unwrap(), 4);
        assert_eq!(parse_startup_header(&[0, 0, 0, 23], 1024).unwrap(), 19);
    }

    #[test]
    fn test_startup_header_too_short() {
        assert!(matches!(
            parse_startup_header(&[0, 0, 0, 7], 1024),
            Err(ProtocolError::InvalidLength(7))
        ));
    }

    #[test]
    fn test_startup_header_negative() {
        assert!(matches!(
            parse_startup_header(&[0xff, 0xff, 0xff, 0xff], 1024),
            Err(ProtocolError::InvalidLength(-1))
        ));
    }

    #[test]
    fn test_tagged_header() {
        let header = parse_tagged_header(&[b'Q', 0, 0, 0, 13], 1024).unwrap();
        assert_eq!(
            header,
            FrameHeader {
                tag: b'Q',
                body_len: 9
            }
        );

        let empty = parse_tagged_header(&[b'X', 0, 0, 0, 4], 1024).unwrap();
        assert_eq!(empty.body_len, 0);
    }

    #[test]
    fn test_tagged_header_bounds() {
        assert!(matches!(
            parse_tagged_header(&[b'Q', 0, 0, 0, 3], 1024),
            Err(ProtocolError::InvalidLength(3))
        ));
        assert!(matches!(
            parse_tagged_header(&[b'Q', 0x7f, 0xff, 0xff, 0xff], 1024),
            Err(ProtocolError::MessageTooLarge { max: 1024, .. })
        ));
    }

    #[test]
    fn test_put_message_length_counts_itself() {
        let mut buf = BytesMut::new();
        put_message(&mut buf, b'C', |dst| put_cstring(dst, "SELECT 1"));
        assert_eq!(buf[0], b'C');
        assert_eq!(&buf[1..5], &13i32.to_be_bytes());
        assert_eq!(&buf[5..], b"SELECT 1\0");
    }
}
