use super::{Client, Error, Response};
use crate::transport::Connector;


/// A handle to a request whose response has not been consumed yet.
///
/// Returned by [`Client::send`] once the request's records have been fully
/// written. The response is resolved by [`ResponseFuture::wait`], which
/// consumes the handle: a request's outcome, success or failure, can be
/// observed exactly once.
///
/// Several futures may be pending on the same client at a time. Waiting on
/// any of them drains the shared socket, so records for the others are
/// buffered along the way and their own `wait` calls return without
/// re-reading the wire. Dropping a future without waiting leaves its records
/// undrained; see [`Client`] for the consequences.
#[derive(Debug)]
#[must_use = "the response is only assembled once the future is waited on"]
pub struct ResponseFuture {
    request_id: u16,
}

impl ResponseFuture {
    pub(crate) fn new(request_id: u16) -> Self {
        Self { request_id }
    }

    /// The request ID this future resolves, mainly useful for logging.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    /// Blocks until the request completes and returns its response.
    ///
    /// # Errors
    /// Rejects with the error produced by the wait: a transport failure,
    /// a [`Timeout`](Error::Timeout), responder Stderr output, or a fatal
    /// protocol status. The error kind is passed through unchanged.
    pub fn wait<C: Connector>(self, client: &mut Client<C>) -> Result<Response, Error> {
        client.wait_for(self.request_id)
    }
}
