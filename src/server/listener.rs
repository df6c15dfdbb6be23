use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bridge::HandlerFactory;
use crate::promise::Promise;
use crate::server::config::ServerConfig;
use crate::server::registry::Registry;
use crate::server::session::{Session, SessionId};

/// Pause after a failed accept, so a persistent failure such as descriptor
/// exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// How long `serve` waits for sessions to finish after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// TCP server implementing the PostgreSQL wire protocol.
pub struct Server<F> {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    factory: Arc<F>,
    next_id: AtomicU64,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
}

impl<F: HandlerFactory> Server<F> {
    /// Binds `config.listen_addr` and creates a server on it.
    pub async fn bind(config: ServerConfig, factory: F) -> io::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        Ok(Self::new(listener, config, factory))
    }

    /// Creates a server on an already bound listener.
    pub fn new(listener: TcpListener, config: ServerConfig, factory: F) -> Self {
        Self {
            listener,
            config: Arc::new(config),
            factory: Arc::new(factory),
            next_id: AtomicU64::new(1),
            registry: Arc::new(Registry::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Token that stops the accept loop and every session when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts connections until the shutdown token fires.
    ///
    /// Each connection runs as its own task; the loop re-arms immediately
    /// after spawning it. Accept failures are logged and do not stop the
    /// server. On shutdown every session is asked to end, and `serve` waits
    /// up to a few seconds for them to unregister.
    pub async fn serve(self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "listening");

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                res = self.listener.accept() => res,
            };

            match accepted {
                Ok((socket, peer_addr)) => self.spawn_session(socket, peer_addr),
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        self.registry.shutdown_all();
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while !self.registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok();

        if drained {
            info!("server stopped");
        } else {
            warn!(
                remaining = self.registry.len(),
                "server stopped with sessions still running"
            );
        }
        Ok(())
    }

    fn spawn_session(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // fetch_add wraps on overflow.
        let id: SessionId = self.next_id.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = socket.set_nodelay(true) {
            warn!(session = id, error = %e, "failed to set TCP_NODELAY");
        }

        let handler = self.factory.create(id);
        let token = self
            .registry
            .register_with(id, peer_addr, self.shutdown.child_token());
        let guard = self.registry.guard(id);
        info!(session = id, peer = %peer_addr, "accepted connection");

        let session = Session::new(id, socket, handler, self.config.clone()).with_shutdown(token);
        let task = session
            .start()
            .fail(move |e| {
                if e.is_disconnect() {
                    info!(session = id, "client disconnected");
                } else {
                    warn!(session = id, error = %e, "session failed");
                }
                Promise::resolve(())
            })
            .finally(move || {
                let duration = guard.release().map(|entry| entry.connected_at.elapsed());
                info!(session = id, ?duration, "connection closed");
            });

        tokio::spawn(task);
    }
}
