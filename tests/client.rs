//! End-to-end exchanges against a scripted, in-memory transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use fcgi_client::protocol as fcgi;
use fcgi_client::{Client, Config, Connector, Endpoint, Error, Request, Transport};


#[derive(Debug, Default)]
struct ScriptState {
    /// Byte chunks served by successive reads; an empty chunk means EOF.
    reads: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    connects: usize,
    closes: usize,
}

/// A deterministic stand-in for the OS socket layer.
///
/// The script doubles as the [`Connector`]: every connection it hands out
/// shares the same state, so tests can inspect writes and feed reads
/// regardless of reconnects.
#[derive(Debug, Default, Clone)]
struct Script(Rc<RefCell<ScriptState>>);

impl Script {
    fn push_chunk(&self, bytes: Vec<u8>) {
        self.0.borrow_mut().reads.push_back(bytes);
    }

    fn push_eof(&self) {
        self.push_chunk(Vec::new());
    }

    /// Scripts a complete server-side stream record (or records, if
    /// `content` needs splitting).
    fn push_stream(&self, rtype: fcgi::RecordType, id: u16, content: &[u8]) {
        let mut wire = Vec::new();
        fcgi::encode_stream(rtype, id, content, &mut wire);
        self.push_chunk(wire);
    }

    /// Scripts the EndRequest record closing request `id`.
    fn push_end(&self, id: u16, protocol_status: fcgi::ProtocolStatus) {
        let body = fcgi::body::EndRequest { app_status: 0, protocol_status };
        let mut head = fcgi::RecordHeader::new(fcgi::RecordType::EndRequest, id);
        #[allow(clippy::cast_possible_truncation)]
        head.set_lengths(fcgi::body::EndRequest::LEN as u16);
        let mut wire = head.to_bytes().to_vec();
        wire.extend_from_slice(&body.to_bytes());
        self.push_chunk(wire);
    }

    fn written(&self) -> Vec<u8> {
        self.0.borrow().written.clone()
    }

    fn connects(&self) -> usize {
        self.0.borrow().connects
    }

    fn closes(&self) -> usize {
        self.0.borrow().closes
    }
}

#[derive(Debug)]
struct ScriptedTransport(Rc<RefCell<ScriptState>>);

impl Transport for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.0.borrow_mut();
        let Some(chunk) = state.reads.front_mut() else {
            return Err(io::ErrorKind::WouldBlock.into());
        };
        if chunk.is_empty() {
            // EOF marker stays put so repeated reads keep signaling EOF
            return Ok(0);
        }
        let n = buf.len().min(chunk.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            state.reads.pop_front();
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.borrow_mut().written.extend_from_slice(buf);
        Ok(())
    }

    fn poll_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.0.borrow().reads.is_empty())
    }

    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.0.borrow_mut().closes += 1;
        Ok(())
    }
}

impl Connector for Script {
    type Transport = ScriptedTransport;

    fn connect(&mut self, _endpoint: &Endpoint) -> io::Result<ScriptedTransport> {
        self.0.borrow_mut().connects += 1;
        Ok(ScriptedTransport(Rc::clone(&self.0)))
    }
}


fn scripted_client(config: Config) -> (Client<Script>, Script) {
    let script = Script::default();
    (Client::with_connector(config, script.clone()), script)
}

fn base_config() -> Config {
    Config::tcp("localhost", 9000).timeout(Duration::from_millis(250))
}

fn php_request() -> Request {
    Request::new()
        .param("SCRIPT_FILENAME", "/srv/www/index.php")
        .param("REQUEST_METHOD", "GET")
}


#[test]
fn end_to_end() {
    let (mut client, script) = scripted_client(base_config());
    script.push_stream(fcgi::RecordType::Stdout, 1, b"Content-Type: text/html\r\n\r\nHello");
    script.push_end(1, fcgi::ProtocolStatus::RequestComplete);

    let pending = client.send(&php_request()).expect("send failed");
    assert_eq!(pending.request_id(), 1);
    let response = pending.wait(&mut client).expect("wait failed");

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("text/html"));
    assert_eq!(response.body, b"Hello");

    // The written stream must open with a Responder BeginRequest for ID 1
    let written = script.written();
    let head = fcgi::RecordHeader::from_bytes(
        written[..fcgi::RecordHeader::LEN].try_into().expect("short write"),
    ).expect("invalid header written");
    assert_eq!(head.rtype, fcgi::RecordType::BeginRequest);
    assert_eq!(head.request_id, 1);
}

#[test]
fn status_header_extracted() {
    let (mut client, script) = scripted_client(base_config());
    script.push_stream(
        fcgi::RecordType::Stdout, 1,
        b"Status: 404 Not Found\r\nContent-Type: text/plain\r\n\r\ngone",
    );
    script.push_end(1, fcgi::ProtocolStatus::RequestComplete);

    let pending = client.send(&php_request()).expect("send failed");
    let response = pending.wait(&mut client).expect("wait failed");
    assert_eq!(response.status, 404);
    assert!(response.header("Status").is_none());
}

#[test]
fn missing_script_filename() {
    let (mut client, script) = scripted_client(base_config());
    let request = Request::new().param("REQUEST_METHOD", "GET");

    match client.send(&request) {
        Err(Error::MissingParam(name)) => assert_eq!(name, "SCRIPT_FILENAME"),
        other => panic!("expected MissingParam, got {other:?}"),
    }
    // Rejected before any socket activity
    assert_eq!(script.connects(), 0);
    assert!(script.written().is_empty());
}

#[test]
fn stderr_fails_the_request() {
    let (mut client, script) = scripted_client(base_config());
    script.push_stream(fcgi::RecordType::Stdout, 1, b"Content-Type: text/html\r\n\r\nHello");
    script.push_stream(fcgi::RecordType::Stderr, 1, b"PHP Warning: boom");
    script.push_end(1, fcgi::ProtocolStatus::RequestComplete);

    let pending = client.send(&php_request()).expect("send failed");
    match pending.wait(&mut client) {
        Err(Error::Stderr(text)) => assert_eq!(text, "PHP Warning: boom"),
        other => panic!("expected Stderr, got {other:?}"),
    }
}

#[test]
fn protocol_status_fails_the_wait() {
    let (mut client, script) = scripted_client(base_config());
    script.push_stream(fcgi::RecordType::Stdout, 1, b"Content-Type: text/html\r\n\r\nHello");
    script.push_end(1, fcgi::ProtocolStatus::Overloaded);

    let pending = client.send(&php_request()).expect("send failed");
    match pending.wait(&mut client) {
        Err(Error::Communication(status)) => {
            assert_eq!(status, fcgi::ProtocolStatus::Overloaded);
        }
        other => panic!("expected Communication, got {other:?}"),
    }
}

#[test]
fn timeout_without_readiness() {
    let (mut client, _script) = scripted_client(base_config());

    let pending = client.send(&php_request()).expect("send failed");
    match pending.wait(&mut client) {
        Err(Error::Timeout(budget)) => assert_eq!(budget, Duration::from_millis(250)),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[test]
fn eof_mid_wait() {
    let (mut client, script) = scripted_client(base_config());
    script.push_stream(fcgi::RecordType::Stdout, 1, b"Content-Type: text/html\r\n\r\npart");
    script.push_eof();

    let pending = client.send(&php_request()).expect("send failed");
    match pending.wait(&mut client) {
        Err(Error::UnexpectedEof { request_id: 1 }) => {}
        other => panic!("expected UnexpectedEof, got {other:?}"),
    }
}

#[test]
fn multiplexed_waits_in_any_order() {
    let (mut client, script) = scripted_client(base_config());

    let first = client.send(&php_request()).expect("send failed");
    let second = client.send(&php_request()).expect("send failed");
    assert_eq!((first.request_id(), second.request_id()), (1, 2));

    // The server answers the second request before the first
    script.push_stream(fcgi::RecordType::Stdout, 2, b"\r\n\r\ntwo");
    script.push_end(2, fcgi::ProtocolStatus::RequestComplete);
    script.push_stream(fcgi::RecordType::Stdout, 1, b"\r\n\r\none");
    script.push_end(1, fcgi::ProtocolStatus::RequestComplete);

    // Waiting on the first drains and buffers the second's records
    let one = first.wait(&mut client).expect("wait failed");
    assert_eq!(one.body, b"one");

    // The script is exhausted, so this must resolve without reading
    let two = second.wait(&mut client).expect("wait failed");
    assert_eq!(two.body, b"two");
}

#[test]
fn records_for_foreign_ids_are_tolerated() {
    let (mut client, script) = scripted_client(base_config());
    script.push_stream(fcgi::RecordType::Stdout, 77, b"not ours");
    script.push_stream(fcgi::RecordType::Stdout, 1, b"\r\n\r\nours");
    script.push_end(1, fcgi::ProtocolStatus::RequestComplete);

    let pending = client.send(&php_request()).expect("send failed");
    let response = pending.wait(&mut client).expect("wait failed");
    assert_eq!(response.body, b"ours");
}

#[test]
fn fragmented_reads_reassemble() {
    let (mut client, script) = scripted_client(base_config());
    let mut wire = Vec::new();
    fcgi::encode_stream(
        fcgi::RecordType::Stdout, 1, b"Content-Type: text/html\r\n\r\nHello", &mut wire,
    );
    // Serve the record a few bytes per read
    for piece in wire.chunks(3) {
        script.push_chunk(piece.to_vec());
    }
    script.push_end(1, fcgi::ProtocolStatus::RequestComplete);

    let pending = client.send(&php_request()).expect("send failed");
    let response = pending.wait(&mut client).expect("wait failed");
    assert_eq!(response.body, b"Hello");
}

#[test]
fn connection_closed_without_keep_alive() {
    let (mut client, script) = scripted_client(base_config());
    script.push_stream(fcgi::RecordType::Stdout, 1, b"\r\n\r\nfirst");
    script.push_end(1, fcgi::ProtocolStatus::RequestComplete);

    let pending = client.send(&php_request()).expect("send failed");
    pending.wait(&mut client).expect("wait failed");
    assert_eq!(script.closes(), 1);

    // The next send reconnects from scratch
    script.push_stream(fcgi::RecordType::Stdout, 2, b"\r\n\r\nsecond");
    script.push_end(2, fcgi::ProtocolStatus::RequestComplete);
    let pending = client.send(&php_request()).expect("send failed");
    pending.wait(&mut client).expect("wait failed");
    assert_eq!(script.connects(), 2);
    assert_eq!(script.closes(), 2);
}

#[test]
fn keep_alive_reuses_the_connection() {
    let (mut client, script) = scripted_client(base_config().keep_alive(true));

    for id in 1..=2 {
        script.push_stream(fcgi::RecordType::Stdout, id, b"\r\n\r\nhi");
        script.push_end(id, fcgi::ProtocolStatus::RequestComplete);
        let pending = client.send(&php_request()).expect("send failed");
        pending.wait(&mut client).expect("wait failed");
    }

    assert_eq!(script.connects(), 1);
    assert_eq!(script.closes(), 0);
}
