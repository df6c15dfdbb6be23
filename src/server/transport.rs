//! Exact-length reads and whole-buffer writes over a byte stream.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::promise::Promise;

/// Owns the client stream of one session.
///
/// Each operation borrows the transport mutably for as long as its promise is
/// pending, so at most one read or write is ever in flight.
#[derive(Debug)]
pub struct Transport<S> {
    stream: S,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Reads exactly `len` bytes. A peer that closes mid-read yields
    /// `UnexpectedEof`.
    pub fn read_exact(&mut self, len: usize) -> Promise<'_, BytesMut, io::Error> {
        Promise::new(async move {
            let mut buf = BytesMut::zeroed(len);
            self.stream.read_exact(&mut buf).await?;
            Ok(buf)
        })
    }

    /// Reads exactly `N` bytes into an array, for fixed-size headers.
    pub fn read_array<const N: usize>(&mut self) -> Promise<'_, [u8; N], io::Error> {
        Promise::new(async move {
            let mut buf = [0u8; N];
            self.stream.read_exact(&mut buf).await?;
            Ok(buf)
        })
    }

    /// Writes and flushes `buf`. The buffer is owned by the operation and
    /// handed back once it is fully on the wire.
    pub fn write(&mut self, buf: BytesMut) -> Promise<'_, BytesMut, io::Error> {
        Promise::new(async move {
            self.stream.write_all(&buf).await?;
            self.stream.flush().await?;
            Ok(buf)
        })
    }

    /// Shuts down the write half; the stream itself closes on drop.
    pub fn shutdown(&mut self) -> Promise<'_, (), io::Error> {
        Promise::new(async move { self.stream.shutdown().await })
    }
}
