use std::io;
use std::time::Duration;

use super::Error;
use crate::protocol as fcgi;
use crate::transport::{Connector, Endpoint, Transport};


/// Owns the client's single connection to the responder.
///
/// The connection is opened lazily on the first write and torn down after a
/// completed request unless keep-alive is enabled, in which case it stays
/// open for the next request.
pub(crate) struct Connection<C: Connector> {
    connector: C,
    endpoint: Endpoint,
    recv_timeout: Option<Duration>,
    keep_alive: bool,
    socket: Option<C::Transport>,
}

impl<C: Connector> Connection<C> {
    pub(crate) fn new(
        connector: C,
        endpoint: Endpoint,
        recv_timeout: Option<Duration>,
        keep_alive: bool,
    ) -> Self {
        Self { connector, endpoint, recv_timeout, keep_alive, socket: None }
    }

    /// Connects to the responder unless already connected.
    ///
    /// A configured receive timeout is applied to the fresh socket right
    /// away, so later reads cannot block indefinitely.
    pub(crate) fn connect(&mut self) -> Result<(), Error> {
        if self.socket.is_some() {
            return Ok(());
        }

        let mut socket = self.connector.connect(&self.endpoint).map_err(|source| {
            Error::Connect { endpoint: self.endpoint.to_string(), source }
        })?;
        if let Some(timeout) = self.recv_timeout {
            socket.set_read_timeout(Some(timeout)).map_err(Error::TimeoutConfig)?;
        }
        tracing::debug!(endpoint = %self.endpoint, "connected to FastCGI server");
        self.socket = Some(socket);
        Ok(())
    }

    /// Writes raw record bytes to the responder.
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(Error::Aborted);
        };
        socket.write_all(data).map_err(Error::Write)
    }

    /// Reads one complete record, waiting up to `timeout` for readiness.
    ///
    /// Returns `Ok(None)` if the responder closed the connection cleanly at
    /// a record boundary. Padding bytes are consumed and discarded; skipping
    /// them is what keeps the stream aligned on record boundaries.
    pub(crate) fn read_record(&mut self, timeout: Duration) -> Result<Option<fcgi::Record>, Error> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(Error::Aborted);
        };

        if !socket.poll_readable(timeout).map_err(Error::Read)? {
            return Err(Error::Timeout(timeout));
        }

        let mut head = [0; fcgi::RecordHeader::LEN];
        let first = socket.read(&mut head).map_err(Error::Read)?;
        if first == 0 {
            tracing::debug!("FastCGI server closed the connection");
            return Ok(None);
        }
        read_full(socket, &mut head[first..])?;
        let header = fcgi::RecordHeader::from_bytes(head)?;
        crate::macros::trace!(header = ?header, "record received");

        let mut content = vec![0; header.content_length.into()];
        read_full(socket, &mut content)?;

        if header.padding_length > 0 {
            let mut padding = [0; u8::MAX as usize];
            read_full(socket, &mut padding[..header.padding_length.into()])?;
        }

        Ok(Some(fcgi::Record { header, content }))
    }

    /// Applies the keep-alive policy after a completed request.
    ///
    /// Without keep-alive the socket is released and the connection state
    /// reset, so the next request reconnects from scratch.
    pub(crate) fn close_if_not_keep_alive(&mut self) {
        if self.keep_alive {
            return;
        }
        if let Some(mut socket) = self.socket.take() {
            // Shutdown errors are moot, the socket is dropped either way
            if let Err(err) = socket.close() {
                tracing::debug!(%err, "socket shutdown failed");
            }
            tracing::debug!(endpoint = %self.endpoint, "connection closed");
        }
    }
}

/// Fills all of `buf`, accumulating across fragmented socket reads.
fn read_full(socket: &mut impl Transport, mut buf: &mut [u8]) -> Result<(), Error> {
    while !buf.is_empty() {
        match socket.read(buf).map_err(Error::Read)? {
            0 => return Err(Error::Read(io::ErrorKind::UnexpectedEof.into())),
            n => buf = &mut buf[n..],
        }
    }
    Ok(())
}
