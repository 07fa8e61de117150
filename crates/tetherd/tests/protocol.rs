//! End-to-end protocol tests driving a running server over real TCP.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tether_config::Config;
use tether_proto::{Fields, Value, decode_all, encode};
use tetherd::{Engine, Server, ServerHandle};

fn start_server(chunk_size: usize) -> ServerHandle {
    let config = Config {
        port: 0,
        chunk_size,
        ..Config::default()
    };
    Server::start(&config, Arc::new(Engine::bundled())).expect("start server")
}

fn request(id: i64, entries: &[(&str, &str)]) -> Value {
    let mut fields = Fields::new();
    fields.insert("id".to_owned(), Value::Int(id));
    for (key, value) in entries {
        fields.insert((*key).to_owned(), Value::text(*value));
    }
    Value::Map(fields)
}

fn has_done_status(message: &Value) -> bool {
    message
        .get("status")
        .and_then(Value::as_list)
        .is_some_and(|tokens| tokens.iter().any(|token| token.as_str() == Some("done")))
}

/// Test client speaking the frame codec over a blocking socket.
struct Client {
    stream: TcpStream,
    pending: Vec<u8>,
    decoded: Vec<Value>,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect client");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        Self {
            stream,
            pending: Vec::new(),
            decoded: Vec::new(),
        }
    }

    fn send(&mut self, message: &Value) {
        self.stream
            .write_all(&encode(message))
            .expect("send request");
    }

    /// Reads messages until one carries a `done` status, returning the
    /// whole response sequence for the request.
    fn read_response(&mut self) -> Vec<Value> {
        let mut chunk = [0_u8; 1024];
        loop {
            if let Some(pos) = self.decoded.iter().position(has_done_status) {
                return self.decoded.drain(..=pos).collect();
            }
            let read = self.stream.read(&mut chunk).expect("read response bytes");
            assert_ne!(read, 0, "server closed mid-response");
            self.pending.extend_from_slice(&chunk[..read]);
            let (values, remainder) =
                decode_all(&self.pending).expect("decode response frames");
            self.decoded.extend(values);
            self.pending = remainder;
        }
    }

    fn roundtrip(&mut self, message: &Value) -> Vec<Value> {
        self.send(message);
        self.read_response()
    }
}

#[test]
fn describe_reports_the_verb_table() {
    let server = start_server(8192);
    let mut client = Client::connect(server.local_addr());

    let responses = client.roundtrip(&request(1, &[("op", "describe")]));
    assert_eq!(responses.len(), 1);
    let ops = responses[0].get("ops").and_then(Value::as_map).expect("ops");
    for op in ["clone", "close", "describe", "eval", "load-file", "complete", "info", "eldoc"] {
        assert!(ops.contains_key(op), "missing op '{op}'");
    }

    server.shutdown();
    server.join().expect("join server");
}

#[test]
fn eval_roundtrip_reports_value_then_done() {
    let server = start_server(8192);
    let mut client = Client::connect(server.local_addr());

    let responses = client.roundtrip(&request(1, &[("op", "eval"), ("code", "(+ 1 3)")]));
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].get_str("ns"), Some("user"));
    assert_eq!(responses[0].get_str("value"), Some("4"));
    assert!(has_done_status(&responses[1]));

    server.shutdown();
    server.join().expect("join server");
}

#[test]
fn fault_sequence_arrives_in_order_over_the_wire() {
    let server = start_server(8192);
    let mut client = Client::connect(server.local_addr());

    let responses = client.roundtrip(&request(2, &[("op", "eval"), ("code", "(/ 9 0)")]));
    assert_eq!(responses.len(), 3);
    assert!(
        responses[0]
            .get_str("err")
            .expect("err message")
            .contains("ArithmeticError")
    );
    let statuses = responses[1].get("status").and_then(Value::as_list).expect("status");
    assert_eq!(statuses.first().and_then(Value::as_str), Some("eval-error"));
    assert_eq!(responses[1].get_str("ns"), Some("user"));
    assert!(has_done_status(&responses[2]));

    server.shutdown();
    server.join().expect("join server");
}

#[test]
fn definitions_feed_completion_on_the_same_server() {
    let server = start_server(8192);
    let mut client = Client::connect(server.local_addr());

    client.roundtrip(&request(1, &[("op", "eval"), ("code", "(def abc 5)")]));
    let responses = client.roundtrip(&request(2, &[("op", "complete"), ("prefix", "ab")]));
    let completions = responses[0]
        .get("completions")
        .and_then(Value::as_list)
        .expect("completions");
    let hit = completions
        .iter()
        .find(|candidate| candidate.get_str("candidate") == Some("abc"))
        .expect("candidate for abc");
    assert_eq!(hit.get_str("ns"), Some("user"));
    assert_eq!(hit.get_str("type"), Some("var"));

    server.shutdown();
    server.join().expect("join server");
}

#[test]
fn hundred_roundtrips_match_between_tiny_and_large_chunk_sizes() {
    let tiny = start_server(7);
    let large = start_server(8192);
    let mut tiny_client = Client::connect(tiny.local_addr());
    let mut large_client = Client::connect(large.local_addr());

    for i in 0..100_i64 {
        let code = format!("(+ {i} 1)");
        let message = request(i, &[("op", "eval"), ("code", code.as_str())]);
        let from_tiny = tiny_client.roundtrip(&message);
        let from_large = large_client.roundtrip(&message);
        assert_eq!(from_tiny, from_large, "roundtrip {i} diverged");
        assert_eq!(
            from_tiny[0].get_str("value").expect("value"),
            (i + 1).to_string()
        );
    }

    tiny.shutdown();
    tiny.join().expect("join tiny server");
    large.shutdown();
    large.join().expect("join large server");
}

#[test]
fn shutdown_completes_quickly_while_a_client_stays_connected() {
    let server = start_server(8192);
    let mut client = Client::connect(server.local_addr());
    client.roundtrip(&request(1, &[("op", "eval"), ("code", "1")]));

    let started = Instant::now();
    server.shutdown();
    server.join().expect("join server");
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "shutdown must not wait for open connections"
    );
}

#[test]
fn unknown_op_keeps_the_connection_usable() {
    let server = start_server(8192);
    let mut client = Client::connect(server.local_addr());

    let responses = client.roundtrip(&request(1, &[("op", "bogus")]));
    let statuses: Vec<&str> = responses[0]
        .get("status")
        .and_then(Value::as_list)
        .expect("status")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(statuses, ["error", "unknown-op", "done"]);

    let responses = client.roundtrip(&request(2, &[("op", "eval"), ("code", "2")]));
    assert_eq!(responses[0].get_str("value"), Some("2"));

    server.shutdown();
    server.join().expect("join server");
}

#[test]
fn sessions_are_isolated_between_connections() {
    let server = start_server(8192);

    let mut first = Client::connect(server.local_addr());
    first.roundtrip(&request(1, &[("op", "eval"), ("code", "(in-ns 'scratch)")]));

    let mut second = Client::connect(server.local_addr());
    let responses = second.roundtrip(&request(1, &[("op", "eval"), ("code", "40")]));
    assert_eq!(
        responses[0].get_str("ns"),
        Some("user"),
        "a fresh connection starts in the default namespace"
    );

    server.shutdown();
    server.join().expect("join server");
}
