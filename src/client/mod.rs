use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use crate::protocol as fcgi;
use crate::transport::{Connector, Endpoint};

mod connection;
mod future;
mod multiplex;
mod response;

use connection::Connection;
use multiplex::Multiplexer;
use response::Assembler;

pub use future::ResponseFuture;
pub use response::{HeaderValues, Response};


/// The one CGI parameter every request must carry: the script to execute.
///
/// Supplying the remaining CGI/1.1 environment (`REQUEST_METHOD`,
/// `QUERY_STRING`, `HTTP_*` headers, ...) is the job of whatever adapts HTTP
/// requests onto this client; the protocol engine only enforces this key.
pub const SCRIPT_FILENAME: &str = "SCRIPT_FILENAME";

/// The wall-clock wait budget used when [`Config::timeout`] is not set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);


/// Error types that may occur while sending a request or awaiting
/// its response.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Socket creation or connection setup failed.
    #[error("failed to connect to FastCGI server at {endpoint}: {source}")]
    Connect {
        /// The `host:port` or socket path that was dialed.
        endpoint: String,
        /// The error reported by the transport.
        source: io::Error,
    },
    /// The configured receive timeout could not be applied to the socket.
    #[error("failed to apply receive timeout to socket: {0}")]
    TimeoutConfig(#[source] io::Error),
    /// Writing the request records to the socket failed.
    #[error("failed to write to FastCGI server: {0}")]
    Write(#[source] io::Error),
    /// An operation was attempted on a torn-down connection.
    #[error("connection to FastCGI server is gone")]
    Aborted,
    /// Reading from the socket failed, for example due to an
    /// abrupt disconnect.
    #[error("failed to read from FastCGI server: {0}")]
    Read(#[source] io::Error),
    /// The server closed the connection before the awaited request finished.
    #[error("FastCGI server closed the connection before request {request_id} completed")]
    UnexpectedEof {
        /// The request whose response will never arrive.
        request_id: u16,
    },
    /// No readiness event within the read budget, or the cumulative wait
    /// exceeded the configured budget.
    #[error("timed out after {0:?} waiting for the FastCGI server")]
    Timeout(Duration),
    /// The application wrote to its Stderr stream, which this client always
    /// treats as a failed request. Carries the raw Stderr text.
    #[error("FastCGI application reported an error: {0}")]
    Stderr(String),
    /// The server ended a request with a non-zero protocol status.
    #[error("FastCGI request rejected: {}", .0.reason())]
    Communication(fcgi::ProtocolStatus),
    /// A required request parameter is missing. Raised before any
    /// socket activity.
    #[error("required parameter {0} is missing from the request")]
    MissingParam(&'static str),
    /// A response was requested for an ID that was never issued or whose
    /// response was already consumed.
    #[error("request ID {0} is unknown or already consumed")]
    UnknownRequestId(u16),
    /// Every one of the 65535 request IDs is outstanding.
    #[error("all FastCGI request IDs are in use")]
    TooManyRequests,
    /// The server sent data violating the FastCGI wire format.
    #[error(transparent)]
    Protocol(#[from] fcgi::Error),
}


/// Connection settings for a [`Client`].
#[derive(Debug, Clone)]
pub struct Config {
    endpoint: Endpoint,
    timeout: Option<Duration>,
    keep_alive: bool,
}

impl Config {
    /// Creates a configuration for a TCP responder, such as PHP-FPM
    /// listening on `127.0.0.1:9000`.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::for_endpoint(Endpoint::Tcp { host: host.into(), port })
    }

    /// Creates a configuration for a unix-domain socket responder, such as
    /// PHP-FPM listening on `/run/php-fpm/www.sock`.
    #[cfg(unix)]
    pub fn unix(path: impl Into<std::path::PathBuf>) -> Self {
        Self::for_endpoint(Endpoint::Unix(path.into()))
    }

    fn for_endpoint(endpoint: Endpoint) -> Self {
        Self { endpoint, timeout: None, keep_alive: false }
    }

    /// Sets the timeout, which serves two independent purposes: it is
    /// applied as the socket's receive timeout and as the wall-clock budget
    /// for a whole [`ResponseFuture::wait`] call.
    ///
    /// Without an explicit timeout, no receive timeout is applied and waits
    /// use [`DEFAULT_TIMEOUT`] as their budget.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Keeps the connection open after a request completes so subsequent
    /// requests reuse it. Defaults to `false`.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}


/// A FastCGI request envelope: CGI parameters plus an optional request body.
///
/// Parameter keys are unique and unordered. [`SCRIPT_FILENAME`] must be
/// present before the request can be sent.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// The CGI/1.1 parameters transmitted in the Params stream.
    pub params: HashMap<String, String>,
    /// The request body transmitted in the Stdin stream, if any.
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Creates an empty [`Request`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a CGI parameter, replacing any previous value for the same key.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}


/// A blocking FastCGI client multiplexing requests over one connection.
///
/// A client exclusively owns its socket and all request bookkeeping, so it
/// must not be shared between execution contexts without external
/// synchronization. Use one client per thread instead.
///
/// Several requests may be sent before any response is awaited; each send
/// allocates a distinct request ID. Only [`ResponseFuture::wait`] advances
/// the read side of the socket, and records observed for *other* pending
/// requests are buffered along the way. Every issued request should
/// therefore eventually be waited on, or records for it pile up unread and
/// stall the requests that share the connection.
pub struct Client<C: Connector> {
    connection: Connection<C>,
    mux: Multiplexer,
    assembler: Assembler,
    budget: Duration,
    keep_alive: bool,
}

#[cfg(unix)]
impl Client<crate::transport::SocketConnector> {
    /// Creates a client dialing real OS sockets per `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, crate::transport::SocketConnector)
    }
}

impl<C: Connector> Client<C> {
    /// Creates a client on a custom [`Connector`].
    ///
    /// This is the constructor to use with a scripted transport in tests,
    /// or with transports the crate does not ship (TLS tunnels and the like).
    pub fn with_connector(config: Config, connector: C) -> Self {
        let budget = config.timeout.unwrap_or(DEFAULT_TIMEOUT);
        Self {
            connection: Connection::new(
                connector, config.endpoint, config.timeout, config.keep_alive,
            ),
            mux: Multiplexer::new(),
            assembler: Assembler::new(),
            budget,
            keep_alive: config.keep_alive,
        }
    }

    /// Sends a request and returns a future resolving to its response.
    ///
    /// Connects lazily if no connection is open, then writes the complete
    /// BeginRequest/Params/Stdin record sequence before returning. The
    /// response is not read until the returned future is waited on.
    ///
    /// # Errors
    /// Returns [`Error::MissingParam`] before any socket activity if
    /// [`SCRIPT_FILENAME`] is absent, or a connect/write error if
    /// transmission fails.
    pub fn send(&mut self, request: &Request) -> Result<ResponseFuture, Error> {
        if !request.params.contains_key(SCRIPT_FILENAME) {
            return Err(Error::MissingParam(SCRIPT_FILENAME));
        }

        self.connection.connect()?;
        let id = self.mux.allocate()?;
        let records = self.encode_request(id, request)?;
        self.connection.write(&records)?;
        self.mux.track(id);
        tracing::debug!(request_id = id, bytes = records.len(), "request records written");
        Ok(ResponseFuture::new(id))
    }

    /// Encodes the full record sequence for one request.
    fn encode_request(&self, id: u16, request: &Request) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(256);

        let flags = if self.keep_alive {
            fcgi::RequestFlags::KeepConn
        } else {
            fcgi::RequestFlags::empty()
        };
        let begin = fcgi::body::BeginRequest { role: fcgi::Role::Responder, flags };
        let mut head = fcgi::RecordHeader::new(fcgi::RecordType::BeginRequest, id);
        #[allow(clippy::cast_possible_truncation)]
        head.set_lengths(fcgi::body::BeginRequest::LEN as u16);
        out.extend_from_slice(&head.to_bytes());
        out.extend_from_slice(&begin.to_bytes());

        let mut params = Vec::new();
        for (name, value) in &request.params {
            fcgi::nv::append((name.as_bytes(), value.as_bytes()), &mut params)?;
        }
        if !params.is_empty() {
            fcgi::encode_stream(fcgi::RecordType::Params, id, &params, &mut out);
        }
        fcgi::encode_stream(fcgi::RecordType::Params, id, &[], &mut out);

        if let Some(body) = request.body.as_deref().filter(|b| !b.is_empty()) {
            fcgi::encode_stream(fcgi::RecordType::Stdin, id, body, &mut out);
        }
        fcgi::encode_stream(fcgi::RecordType::Stdin, id, &[], &mut out);

        Ok(out)
    }

    /// Reads records until the response for `id` is complete.
    pub(crate) fn wait_for(&mut self, id: u16) -> Result<Response, Error> {
        // A previous wait may have drained this response off the wire already
        if let Some(outcome) = self.mux.take_completed(id) {
            self.connection.close_if_not_keep_alive();
            return outcome;
        }
        if !self.mux.is_outstanding(id) {
            return Err(Error::UnknownRequestId(id));
        }

        let started = Instant::now();
        loop {
            let Some(record) = self.connection.read_record(self.budget)? else {
                return Err(Error::UnexpectedEof { request_id: id });
            };
            self.route_record(record)?;

            if let Some(outcome) = self.mux.take_completed(id) {
                self.connection.close_if_not_keep_alive();
                return outcome;
            }
            // The per-read timeout above cannot catch a slow trickle of
            // records, so the cumulative budget is checked independently.
            if started.elapsed() >= self.budget {
                return Err(Error::Timeout(self.budget));
            }
        }
    }

    /// Feeds one record into the assembler and multiplexer.
    ///
    /// Records for IDs this client never issued are logged and skipped:
    /// on a shared connection they may belong to someone else's exchange
    /// and are no reason to abort ours. A non-zero protocol status is the
    /// exception, it poisons the connection no matter which request it names.
    fn route_record(&mut self, record: fcgi::Record) -> Result<(), Error> {
        use fcgi::RecordType::*;

        let id = record.request_id();
        match record.rtype() {
            Stdout | Stderr if !self.mux.is_outstanding(id) => {
                tracing::warn!(request_id = id, rtype = ?record.rtype(),
                    "record for unknown request ID ignored");
            }
            Stdout => self.assembler.push_stdout(id, &record.content),
            Stderr => self.assembler.push_stderr(id, &record.content),
            EndRequest => {
                let end = fcgi::body::EndRequest::from_record(&record.content)?;
                if end.protocol_status != fcgi::ProtocolStatus::RequestComplete {
                    return Err(Error::Communication(end.protocol_status));
                }
                if self.mux.is_outstanding(id) {
                    let outcome = self.assembler.finish(id);
                    self.mux.complete(id, outcome);
                    tracing::debug!(request_id = id, app_status = end.app_status,
                        "request completed");
                } else {
                    tracing::warn!(request_id = id, "EndRequest for unknown request ID ignored");
                }
            }
            other => {
                tracing::debug!(rtype = ?other, request_id = id, "unexpected record type ignored");
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    // Scripted transports live in tests/client.rs; the unit tests here only
    // cover the pure record-sequence encoder.

    struct NoConnector;
    struct NoTransport;

    impl crate::transport::Transport for NoTransport {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            unreachable!("encoder tests never read")
        }
        fn write_all(&mut self, _: &[u8]) -> io::Result<()> {
            unreachable!("encoder tests never write")
        }
        fn poll_readable(&mut self, _: Duration) -> io::Result<bool> {
            unreachable!("encoder tests never poll")
        }
        fn set_read_timeout(&mut self, _: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }

    impl Connector for NoConnector {
        type Transport = NoTransport;
        fn connect(&mut self, _: &Endpoint) -> io::Result<NoTransport> {
            unreachable!("encoder tests never connect")
        }
    }

    fn encoder_client(keep_alive: bool) -> Client<NoConnector> {
        let config = Config::tcp("localhost", 9000).keep_alive(keep_alive);
        Client::with_connector(config, NoConnector)
    }

    /// Splits an encoded byte sequence into records.
    fn records_of(mut wire: &[u8]) -> Vec<fcgi::Record> {
        let mut records = Vec::new();
        while !wire.is_empty() {
            let header =
                fcgi::RecordHeader::from_bytes(wire[..fcgi::RecordHeader::LEN].try_into().unwrap())
                    .expect("invalid record header");
            wire = &wire[fcgi::RecordHeader::LEN..];
            let (content, rest) = wire.split_at(header.content_length.into());
            let record = fcgi::Record { header, content: content.to_vec() };
            wire = &rest[usize::from(header.padding_length)..];
            records.push(record);
        }
        records
    }

    #[test]
    fn record_sequence() {
        let client = encoder_client(false);
        let request = Request::new()
            .param(SCRIPT_FILENAME, "/srv/www/index.php")
            .body(*b"q=1");
        let wire = client.encode_request(5, &request).expect("encoding failed");

        let records = records_of(&wire);
        let summary: Vec<_> = records.iter()
            .map(|r| (r.rtype(), r.request_id(), r.header.content_length))
            .collect();
        assert_eq!(summary, [
            (fcgi::RecordType::BeginRequest, 5, 8),
            (fcgi::RecordType::Params, 5, 35),
            (fcgi::RecordType::Params, 5, 0),
            (fcgi::RecordType::Stdin, 5, 3),
            (fcgi::RecordType::Stdin, 5, 0),
        ]);

        let begin = fcgi::body::BeginRequest::from_bytes(
            records[0].content[..].try_into().unwrap(),
        ).expect("invalid BeginRequest body");
        assert_eq!(begin.role, fcgi::Role::Responder);
        assert!(!begin.flags.contains(fcgi::RequestFlags::KeepConn));

        let params: Vec<_> = fcgi::nv::NVIter::new(&records[1].content).collect();
        assert_eq!(params, [(&b"SCRIPT_FILENAME"[..], &b"/srv/www/index.php"[..])]);
        assert_eq!(records[3].content, b"q=1");
    }

    #[test]
    fn keep_alive_flag_set() {
        let client = encoder_client(true);
        let request = Request::new().param(SCRIPT_FILENAME, "/srv/www/index.php");
        let wire = client.encode_request(1, &request).expect("encoding failed");

        let records = records_of(&wire);
        let begin = fcgi::body::BeginRequest::from_bytes(
            records[0].content[..].try_into().unwrap(),
        ).expect("invalid BeginRequest body");
        assert!(begin.flags.contains(fcgi::RequestFlags::KeepConn));
    }

    #[test]
    fn empty_body_sends_lone_terminator() {
        let client = encoder_client(false);
        let request = Request::new().param(SCRIPT_FILENAME, "/srv/www/index.php");
        let wire = client.encode_request(2, &request).expect("encoding failed");

        let stdin: Vec<_> = records_of(&wire).into_iter()
            .filter(|r| r.rtype() == fcgi::RecordType::Stdin)
            .collect();
        assert_eq!(stdin.len(), 1);
        assert_eq!(stdin[0].header.content_length, 0);
    }
}
