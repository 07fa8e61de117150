//! Accept-loop listener for the daemon socket.
//!
//! The listener runs non-blocking accepts on a background thread and polls
//! a shutdown flag between attempts, so shutdown never waits on a blocked
//! accept call. Accepted sockets are switched back to blocking mode and
//! served one thread per connection; shutdown does not wait for them.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use super::{ConnectionHandler, TRANSPORT_TARGET};
use super::errors::ListenerError;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a TCP endpoint.
#[derive(Debug)]
pub(crate) struct SocketListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl SocketListener {
    /// Binds the listener; port 0 requests an ephemeral port.
    pub(crate) fn bind(host: &str, port: u16) -> Result<Self, ListenerError> {
        let requested = format!("{host}:{port}");
        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| ListenerError::Resolve {
                addr: requested.clone(),
                source,
            })?;
        let addr = addrs
            .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
            .ok_or_else(|| ListenerError::ResolveEmpty { addr: requested })?;
        let listener =
            TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        let addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            addr,
            source,
        })?;
        Ok(Self { listener, addr })
    }

    /// Address actually bound, with any ephemeral port filled in.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts the accept loop on a background thread.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let addr = self.addr;
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, &handler));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
            addr,
        })
    }
}

/// Handle to the background listener thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    addr: SocketAddr,
}

impl ListenerHandle {
    /// Address the listener is serving.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Asks the accept loop to stop. Open connections are not waited for.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit and release the listening socket.
    ///
    /// Returns within one backoff interval of [`Self::shutdown`] being
    /// called, regardless of open connections.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                return Err(ListenerError::ThreadPanic);
            }
        }
        Ok(())
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
) {
    info!(
        target: TRANSPORT_TARGET,
        addr = %listener.addr,
        "listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(listener) {
            Ok(Some(stream)) => {
                last_error = None;
                let handler = Arc::clone(handler);
                thread::spawn(move || handler.handle(stream));
            }
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: TRANSPORT_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(
        target: TRANSPORT_TARGET,
        addr = %listener.addr,
        "listener stopped"
    );
}

fn accept_connection(listener: &SocketListener) -> Result<Option<std::net::TcpStream>, io::Error> {
    match listener.listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ConnectionHandler for CountingHandler {
        fn handle(&self, _stream: TcpStream) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if count.load(Ordering::SeqCst) >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn accepts_connections_until_shutdown() {
        let listener = SocketListener::bind("127.0.0.1", 0).expect("bind listener");
        let addr = listener.local_addr();
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler {
            count: Arc::clone(&count),
        });
        let handle = listener.start(handler).expect("start listener");

        TcpStream::connect(addr).expect("connect first client");
        TcpStream::connect(addr).expect("connect second client");

        assert!(wait_for_count(&count, 2), "expected two connections");
        handle.shutdown();
        handle.join().expect("join listener");
    }

    #[test]
    fn ephemeral_bind_reports_the_assigned_port() {
        let listener = SocketListener::bind("127.0.0.1", 0).expect("bind listener");
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[test]
    fn shutdown_is_bounded_while_a_client_stays_connected() {
        let listener = SocketListener::bind("127.0.0.1", 0).expect("bind listener");
        let addr = listener.local_addr();
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(CountingHandler {
            count: Arc::clone(&count),
        });
        let handle = listener.start(handler).expect("start listener");

        let _open_client = TcpStream::connect(addr).expect("connect client");
        assert!(wait_for_count(&count, 1), "expected the connection");

        let started = Instant::now();
        handle.shutdown();
        handle.join().expect("join listener");
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "shutdown must not wait on open connections"
        );
    }
}
