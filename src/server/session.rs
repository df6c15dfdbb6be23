mod error;
mod state;

pub use error::SessionError;
pub use state::SessionState;

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::QueryHandler;
use crate::error::SqlException;
use crate::promise::Promise;
use crate::protocol::codec::{parse_startup_header, parse_tagged_header};
use crate::protocol::{
    BackendMessage, FrontendMessage, STARTUP_HEADER_LEN, TAGGED_HEADER_LEN, TransactionStatus,
};
use crate::server::config::ServerConfig;
use crate::server::transport::Transport;
use crate::writer::{ResultWriter, check_column_count};

/// Identifier assigned to a session when its connection is accepted.
pub type SessionId = u64;

/// What the read loop does after a message has been processed.
enum Flow {
    Continue,
    Terminate,
}

/// A single client session.
///
/// The session reads one frontend message at a time, writes the complete
/// response, and only then reads again, so at most one read and one write
/// are in flight.
pub struct Session<S, H> {
    id: SessionId,
    state: SessionState,
    startup_done: bool,
    transport: Transport<S>,
    handler: H,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
}

impl<S, H> Session<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: QueryHandler + 'static,
{
    pub fn new(id: SessionId, stream: S, handler: H, config: Arc<ServerConfig>) -> Self {
        Self {
            id,
            state: SessionState::default(),
            startup_done: false,
            transport: Transport::new(stream),
            handler,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Ends the session cleanly, at the next suspension point, once `token`
    /// is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the (non-SSL) startup handshake has completed.
    pub fn startup_done(&self) -> bool {
        self.startup_done
    }

    /// Runs the session to completion.
    ///
    /// Resolves on Terminate, on a cancel request, or on shutdown. Rejects on
    /// fatal errors: I/O failures (including the peer closing the socket),
    /// framing errors, fatal SQL errors and idle timeouts. The stream is
    /// closed when the promise settles.
    pub fn start(mut self) -> Promise<'static, (), SessionError> {
        Promise::new(async move {
            let id = self.id;
            let shutdown = self.shutdown.clone();
            let result = tokio::select! {
                res = self.run() => res,
                _ = shutdown.cancelled() => {
                    debug!(session = id, "shutdown requested");
                    Ok(())
                }
            };
            self.state = SessionState::Terminated;

            if result.is_ok() {
                // Best effort: the client may already be gone.
                let _ = self.transport.shutdown().await;
            }
            result
        })
    }

    async fn run(&mut self) -> Result<(), SessionError> {
        loop {
            let Some(message) = self.read().await? else {
                continue;
            };

            match self.process_message(message).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Terminate) => return Ok(()),
                Err(SessionError::Sql(e)) if !e.is_fatal() => self.report(&e).await?,
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads the next frontend message.
    ///
    /// Returns `Ok(None)` for a well-framed message with an unknown tag.
    async fn read(&mut self) -> Result<Option<FrontendMessage>, SessionError> {
        if self.state.expects_startup() {
            return self.read_startup().await.map(Some);
        }

        let header = self.read_header::<TAGGED_HEADER_LEN>().await?;
        let frame = parse_tagged_header(&header, self.config.max_message_size)?;
        let body = self.transport.read_exact(frame.body_len).await?;

        let message = FrontendMessage::decode(frame.tag, body)?;
        if message.is_none() {
            debug!(
                session = self.id,
                tag = %char::from(frame.tag),
                "skipping unknown message"
            );
        }
        Ok(message)
    }

    async fn read_startup(&mut self) -> Result<FrontendMessage, SessionError> {
        let header = self.read_header::<STARTUP_HEADER_LEN>().await?;
        let body_len = parse_startup_header(&header, self.config.max_message_size)?;
        let body = self.transport.read_exact(body_len).await?;
        Ok(FrontendMessage::decode_startup(body)?)
    }

    /// Reads a fixed-size header, honoring the idle timeout. The timeout only
    /// applies between messages, never inside one.
    async fn read_header<const N: usize>(&mut self) -> Result<[u8; N], SessionError> {
        let read = self.transport.read_array::<N>();
        match self.config.idle_timeout {
            Some(limit) => Ok(tokio::time::timeout(limit, read)
                .await
                .map_err(|_| SessionError::IdleTimeout(limit))??),
            None => Ok(read.await?),
        }
    }

    async fn process_message(&mut self, message: FrontendMessage) -> Result<Flow, SessionError> {
        match message {
            FrontendMessage::Startup {
                protocol_version,
                parameters,
            } => {
                info!(
                    session = self.id,
                    user = %parameters.user,
                    database = ?parameters.database,
                    application = ?parameters.application_name,
                    version = format_args!("{}.{}", protocol_version >> 16, protocol_version & 0xffff),
                    "startup"
                );
                self.send_startup_info().await?;
                self.state = SessionState::Ready;
                self.startup_done = true;
            }
            FrontendMessage::SslRequest | FrontendMessage::GssEncRequest => {
                // Encryption is declined; the client retries in plaintext.
                self.send(&[BackendMessage::SslResponse]).await?;
            }
            FrontendMessage::CancelRequest { process_id, .. } => {
                info!(session = self.id, target = process_id, "cancel request ignored");
                return Ok(Flow::Terminate);
            }
            FrontendMessage::Query(query) => {
                self.handle_query(&query).await?;
            }
            FrontendMessage::Terminate => {
                debug!(session = self.id, "terminate");
                return Ok(Flow::Terminate);
            }
            other => {
                debug!(session = self.id, message = other.name(), "ignoring unsupported message");
            }
        }
        Ok(Flow::Continue)
    }

    async fn send_startup_info(&mut self) -> Result<(), SessionError> {
        let config = self.config.clone();
        let mut messages = vec![BackendMessage::AuthenticationOk];
        messages.extend(config.status_parameters().into_iter().map(|(name, value)| {
            BackendMessage::ParameterStatus {
                name: name.to_string(),
                value: value.to_string(),
            }
        }));
        messages.push(ready_for_query());
        self.send(&messages).await
    }

    /// Handles a simple query.
    ///
    /// Any error short-circuits the remaining writes; the read loop decides
    /// whether to report it or end the session.
    async fn handle_query(&mut self, query: &str) -> Result<(), SessionError> {
        debug!(session = self.id, query, "query");

        if query.trim().is_empty() {
            return self
                .send(&[BackendMessage::EmptyQueryResponse, ready_for_query()])
                .await;
        }

        let mut statement = self.handler.prepare(query)?;
        check_column_count(statement.fields.len())?;
        let fields = std::mem::take(&mut statement.fields);
        let mut writer = ResultWriter::new(fields.len());
        self.send(&[BackendMessage::RowDescription { fields }]).await?;

        statement.execute(&mut writer, &[])?;

        let rows = writer.num_rows();
        let mut buf = writer.into_bytes();
        BackendMessage::CommandComplete {
            tag: format!("SELECT {rows}"),
        }
        .encode(&mut buf);
        ready_for_query().encode(&mut buf);
        self.transport.write(buf).await?;

        debug!(session = self.id, rows, "query complete");
        Ok(())
    }

    /// Reports a recoverable error and leaves the session ready for the next query.
    async fn report(&mut self, e: &SqlException) -> Result<(), SessionError> {
        warn!(session = self.id, error = %e, "query failed");
        self.send(&[BackendMessage::error_response(e), ready_for_query()])
            .await
    }

    async fn send(&mut self, messages: &[BackendMessage]) -> Result<(), SessionError> {
        let mut buf = BytesMut::new();
        for message in messages {
            message.encode(&mut buf);
        }
        self.transport.write(buf).await?;
        Ok(())
    }
}

fn ready_for_query() -> BackendMessage {
    BackendMessage::ReadyForQuery {
        status: TransactionStatus::Idle,
    }
}
