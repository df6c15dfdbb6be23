//! Running the server next to a host application.
//!
//! A host that embeds the server calls [`start_background`] once; the server
//! then runs on its own OS thread with a single-threaded runtime while the
//! host keeps its thread.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::bridge::HandlerFactory;
use crate::server::config::ServerConfig;
use crate::server::listener::Server;
use crate::server::registry::Registry;

/// Set by the first successful call to [`start_background`]; never cleared.
static STARTED: AtomicBool = AtomicBool::new(false);

/// Handle to the server started by [`start_background`].
///
/// Dropping the handle detaches the server, which keeps running for the rest
/// of the process.
pub struct BackgroundServer {
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Stops accepting, ends every session and waits for the server thread.
    pub fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("server thread panicked");
        }
    }
}

/// Starts the server on a dedicated thread, at most once per process.
///
/// Returns `Ok(None)` if a server was already started. The listener is bound
/// before this returns, so `local_addr` is usable immediately; a bind failure
/// leaves the server unstarted.
pub fn start_background<F: HandlerFactory>(
    config: ServerConfig,
    factory: F,
) -> io::Result<Option<BackgroundServer>> {
    if STARTED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Ok(None);
    }

    match spawn(config, factory) {
        Ok(server) => Ok(Some(server)),
        Err(e) => {
            STARTED.store(false, Ordering::Release);
            Err(e)
        }
    }
}

fn spawn<F: HandlerFactory>(config: ServerConfig, factory: F) -> io::Result<BackgroundServer> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let std_listener = std::net::TcpListener::bind(config.listen_addr)?;
    std_listener.set_nonblocking(true)?;
    let listener = {
        let _guard = runtime.enter();
        TcpListener::from_std(std_listener)?
    };

    config.log_config();
    let server = Server::new(listener, config, factory);
    let local_addr = server.local_addr()?;
    let registry = server.registry();
    let shutdown = server.shutdown_token();

    let thread = std::thread::Builder::new()
        .name("pgbridge-server".to_string())
        .spawn(move || {
            if let Err(e) = runtime.block_on(server.serve()) {
                error!(error = %e, "background server failed");
            }
        })?;

    Ok(BackgroundServer {
        local_addr,
        registry,
        shutdown,
        thread: Some(thread),
    })
}
