//! Per-connection serving loop.
//!
//! Each accepted socket gets a fresh session context and frame buffer.
//! Requests on one connection are handled strictly sequentially: the next
//! request is not dispatched until the current one has emitted all of its
//! responses, and each response is written to the socket as soon as it is
//! generated.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use tracing::{debug, warn};

use tether_proto::{FrameBuffer, encode};

use crate::dispatch::{Engine, dispatch};
use crate::session::SessionContext;

use super::errors::ConnectionError;
use super::{ConnectionHandler, TRANSPORT_TARGET};

/// Serves the session protocol on accepted connections.
pub(crate) struct SessionHandler {
    engine: Arc<Engine>,
    chunk_size: usize,
}

impl SessionHandler {
    /// Builds a handler over the shared engine.
    pub(crate) fn new(engine: Arc<Engine>, chunk_size: usize) -> Self {
        Self { engine, chunk_size }
    }

    fn serve(&self, stream: &mut TcpStream) -> Result<(), ConnectionError> {
        let mut session = SessionContext::new();
        let mut buffer = FrameBuffer::new();
        let mut chunk = vec![0_u8; self.chunk_size];
        loop {
            let read = match stream.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            };
            buffer.extend(&chunk[..read]);
            for frame in buffer.drain()? {
                for response in dispatch(&self.engine, &mut session, frame) {
                    stream.write_all(&encode(&response))?;
                    stream.flush()?;
                }
            }
        }
    }
}

impl ConnectionHandler for SessionHandler {
    fn handle(&self, mut stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
        debug!(target: TRANSPORT_TARGET, peer = %peer, "connection open");
        match self.serve(&mut stream) {
            Ok(()) => debug!(target: TRANSPORT_TARGET, peer = %peer, "connection closed"),
            Err(error) => warn!(
                target: TRANSPORT_TARGET,
                peer = %peer,
                error = %error,
                "connection dropped"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    use tether_proto::{Fields, Value, decode_all};

    fn spawn_handler(chunk_size: usize) -> (std::net::SocketAddr, thread::JoinHandle<()>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let addr = listener.local_addr().expect("listener address");
        let server = thread::spawn(move || {
            let handler = SessionHandler::new(Arc::new(Engine::bundled()), chunk_size);
            let (stream, _) = listener.accept().expect("accept connection");
            handler.handle(stream);
        });
        (addr, server)
    }

    fn request(id: i64, entries: &[(&str, &str)]) -> Value {
        let mut fields = Fields::new();
        fields.insert("id".to_owned(), Value::Int(id));
        for (key, value) in entries {
            fields.insert((*key).to_owned(), Value::text(*value));
        }
        Value::Map(fields)
    }

    fn read_messages(stream: &mut TcpStream, expected: usize) -> Vec<Value> {
        let mut collected = Vec::new();
        let mut pending = Vec::new();
        let mut chunk = [0_u8; 512];
        while collected.len() < expected {
            let read = stream.read(&mut chunk).expect("read response bytes");
            assert_ne!(read, 0, "connection closed before {expected} messages");
            pending.extend_from_slice(&chunk[..read]);
            let (values, remainder) = decode_all(&pending).expect("decode responses");
            collected.extend(values);
            pending = remainder;
        }
        collected
    }

    #[test]
    fn serves_a_full_eval_exchange() {
        let (addr, server) = spawn_handler(8192);
        let mut client = TcpStream::connect(addr).expect("connect client");
        client
            .write_all(&encode(&request(1, &[("op", "eval"), ("code", "(+ 1 3)")])))
            .expect("send request");

        let responses = read_messages(&mut client, 2);
        assert_eq!(responses[0].get_str("value"), Some("4"));
        assert_eq!(responses[0].get_str("ns"), Some("user"));

        drop(client);
        server.join().expect("join server");
    }

    #[test]
    fn reassembles_requests_split_across_tiny_reads() {
        let (addr, server) = spawn_handler(3);
        let mut client = TcpStream::connect(addr).expect("connect client");
        let bytes = encode(&request(7, &[("op", "describe")]));
        for byte in bytes {
            client.write_all(&[byte]).expect("send one byte");
        }

        let responses = read_messages(&mut client, 1);
        assert!(responses[0].get("ops").is_some());

        drop(client);
        server.join().expect("join server");
    }

    #[test]
    fn session_state_persists_between_requests_on_one_connection() {
        let (addr, server) = spawn_handler(8192);
        let mut client = TcpStream::connect(addr).expect("connect client");
        client
            .write_all(&encode(&request(1, &[("op", "eval"), ("code", "(in-ns 'scratch)")])))
            .expect("send switch");
        let _ = read_messages(&mut client, 2);

        client
            .write_all(&encode(&request(2, &[("op", "eval"), ("code", "42")])))
            .expect("send follow-up");
        let responses = read_messages(&mut client, 2);
        assert_eq!(responses[0].get_str("ns"), Some("scratch"));

        drop(client);
        server.join().expect("join server");
    }

    #[test]
    fn framing_errors_drop_only_that_connection() {
        let (addr, server) = spawn_handler(8192);
        let mut client = TcpStream::connect(addr).expect("connect client");
        client.write_all(b"x not a frame").expect("send junk");

        let mut tail = Vec::new();
        client.read_to_end(&mut tail).expect("server closes the socket");
        assert!(tail.is_empty());

        server.join().expect("join server");
    }

    #[test]
    fn pipelined_requests_are_answered_in_order() {
        let (addr, server) = spawn_handler(8192);
        let mut client = TcpStream::connect(addr).expect("connect client");
        let mut batch = Vec::new();
        batch.extend_from_slice(&encode(&request(1, &[("op", "eval"), ("code", "1")])));
        batch.extend_from_slice(&encode(&request(2, &[("op", "eval"), ("code", "2")])));
        client.write_all(&batch).expect("send batch");

        let responses = read_messages(&mut client, 4);
        assert_eq!(responses[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(responses[0].get_str("value"), Some("1"));
        assert_eq!(responses[2].get("id"), Some(&Value::Int(2)));
        assert_eq!(responses[2].get_str("value"), Some("2"));

        drop(client);
        server.join().expect("join server");
    }
}
