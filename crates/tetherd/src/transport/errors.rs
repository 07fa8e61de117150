//! Error types for the socket transport.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use tether_proto::DecodeError;

/// Errors raised while binding or running the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Bind address did not resolve.
    #[error("failed to resolve bind address '{addr}': {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Bind address resolved to nothing usable.
    #[error("bind address '{addr}' resolved to no usable address")]
    ResolveEmpty { addr: String },

    /// Binding the TCP listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Switching the listener to non-blocking accepts failed.
    #[error("failed to configure non-blocking accepts: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },

    /// The accept loop thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

/// Errors that end one connection.
///
/// A framing fault is fatal to the connection that produced it and to
/// nothing else.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    /// Socket read or write failed.
    #[error("connection IO error: {0}")]
    Io(#[from] io::Error),

    /// Peer sent bytes the frame codec rejects.
    #[error("framing error: {0}")]
    Frame(#[from] DecodeError),
}
