use std::collections::HashMap;

use compact_str::CompactString;
use smallvec::SmallVec;

use super::Error;


/// The values stored under one header name, in the order they appeared.
///
/// Almost all headers carry a single value, so one slot is kept inline.
pub type HeaderValues = SmallVec<[String; 1]>;

/// A fully reassembled FastCGI response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// The HTTP status code, taken from the `Status` CGI header (200 if absent).
    pub status: u16,
    /// The response headers. Repeated names accumulate values in order.
    pub headers: HashMap<CompactString, HeaderValues>,
    /// The response body, everything after the header block.
    pub body: Vec<u8>,
}

impl Response {
    /// Retrieves the first value of the named header, if present.
    ///
    /// The lookup matches the exact header name as sent by the application.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Retrieves all values of the named header, in order of appearance.
    #[must_use]
    pub fn header_all(&self, name: &str) -> &[String] {
        self.headers.get(name).map_or(&[], AsRef::as_ref)
    }
}


#[derive(Debug, Default)]
struct StreamBuffers {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Accumulates Stdout/Stderr stream data per request ID.
///
/// A responder may interleave records for several multiplexed requests, so
/// buffers are keyed by ID and only turned into a [`Response`] once that
/// request's EndRequest record arrives.
#[derive(Debug, Default)]
pub(crate) struct Assembler {
    streams: HashMap<u16, StreamBuffers>,
}

impl Assembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_stdout(&mut self, id: u16, data: &[u8]) {
        self.streams.entry(id).or_default().stdout.extend_from_slice(data);
    }

    pub(crate) fn push_stderr(&mut self, id: u16, data: &[u8]) {
        self.streams.entry(id).or_default().stderr.extend_from_slice(data);
    }

    /// Finalizes the buffers for `id` into a response outcome.
    ///
    /// Any Stderr output is an application-level failure signal and takes
    /// precedence over whatever was written to Stdout.
    pub(crate) fn finish(&mut self, id: u16) -> Result<Response, Error> {
        let buffers = self.streams.remove(&id).unwrap_or_default();
        if !buffers.stderr.is_empty() {
            let text = String::from_utf8_lossy(&buffers.stderr).into_owned();
            return Err(Error::Stderr(text));
        }
        Ok(parse_stdout(&buffers.stdout))
    }
}


/// Parses an assembled Stdout stream as `headers CRLF CRLF body`.
///
/// CGI/1.1 conflates the HTTP status into a header named `Status`, whose
/// leading token is extracted as the status code and which is removed from
/// the returned header collection. Everything after the first blank line is
/// the body, kept as raw bytes.
fn parse_stdout(raw: &[u8]) -> Response {
    const SEPARATOR: &[u8] = b"\r\n\r\n";

    let (head, body) = match raw.windows(SEPARATOR.len()).position(|w| w == SEPARATOR) {
        Some(at) => (&raw[..at], raw[at + SEPARATOR.len()..].to_vec()),
        None => (raw, Vec::new()),
    };

    let mut status = 200;
    let mut headers: HashMap<CompactString, HeaderValues> = HashMap::new();
    for line in String::from_utf8_lossy(head).split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            tracing::warn!(line, "malformed CGI header line skipped");
            continue;
        };
        let (name, value) = (name.trim(), value.trim());

        if name == "Status" {
            match value.split_whitespace().next().map(str::parse) {
                Some(Ok(code)) => status = code,
                _ => tracing::warn!(value, "unparsable Status header, assuming 200"),
            }
            continue;
        }
        headers.entry(name.into()).or_default().push(value.to_owned());
    }

    Response { status, headers, body }
}
