//! Server lifecycle: bind, announce, serve, shut down.
//!
//! Binding happens synchronously inside [`Server::start`], so the caller
//! learns the bound address from the returned handle — embedding code
//! needs no separate readiness signal. When configured, the bound port is
//! also written to a discovery file for external tooling.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::info;

use tether_config::Config;

use crate::dispatch::Engine;
use crate::transport::{ListenerError, ListenerHandle, SessionHandler, SocketListener};

/// Tracing target for lifecycle operations.
pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Errors raised while starting or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The socket listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// Writing the port discovery file failed.
    #[error("failed to write port file '{path}': {source}")]
    PortFile {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The tether daemon server.
#[derive(Debug)]
pub struct Server;

impl Server {
    /// Binds the configured endpoint and starts serving connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding fails or the configured port
    /// file cannot be written; the listener is shut down again in the
    /// latter case.
    pub fn start(config: &Config, engine: Arc<Engine>) -> Result<ServerHandle, ServerError> {
        let listener = SocketListener::bind(&config.host, config.port)?;
        let addr = listener.local_addr();
        let handler = Arc::new(SessionHandler::new(engine, config.chunk_size));
        let handle = listener.start(handler)?;

        if let Some(path) = &config.port_file {
            if let Err(source) = fs::write(path, format!("{}\n", addr.port())) {
                handle.shutdown();
                let _ = handle.join();
                return Err(ServerError::PortFile {
                    path: path.clone(),
                    source,
                });
            }
            info!(target: SERVER_TARGET, path = %path, port = addr.port(), "wrote port file");
        }

        info!(target: SERVER_TARGET, addr = %addr, "server ready");
        Ok(ServerHandle { handle })
    }
}

/// Handle to a running server.
#[derive(Debug)]
pub struct ServerHandle {
    handle: ListenerHandle,
}

impl ServerHandle {
    /// Address the server is listening on, ephemeral port filled in.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    /// Bound port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr().port()
    }

    /// Stops accepting connections and releases the listening socket.
    /// Open connections are not waited for.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Waits for the accept loop to exit. Bounded: returns within one
    /// accept-poll interval of [`Self::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the accept loop thread panicked.
    pub fn join(self) -> Result<(), ServerError> {
        self.handle.join().map_err(ServerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_config() -> Config {
        Config {
            port: 0,
            ..Config::default()
        }
    }

    #[test]
    fn start_reports_the_bound_address() {
        let server = Server::start(&ephemeral_config(), Arc::new(Engine::bundled()))
            .expect("start server");
        assert_ne!(server.port(), 0);
        server.shutdown();
        server.join().expect("join server");
    }

    #[test]
    fn port_file_holds_the_bound_port() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("tether.port"))
            .expect("utf8 temp path");
        let config = Config {
            port_file: Some(path.clone()),
            ..ephemeral_config()
        };
        let server =
            Server::start(&config, Arc::new(Engine::bundled())).expect("start server");

        let written = fs::read_to_string(&path).expect("read port file");
        assert_eq!(written.trim(), server.port().to_string());

        server.shutdown();
        server.join().expect("join server");
    }

    #[test]
    fn unwritable_port_file_fails_startup() {
        let config = Config {
            port_file: Some(Utf8PathBuf::from("/nonexistent-dir/tether.port")),
            ..ephemeral_config()
        };
        let error = Server::start(&config, Arc::new(Engine::bundled()))
            .expect_err("startup should fail");
        assert!(matches!(error, ServerError::PortFile { .. }));
    }
}
