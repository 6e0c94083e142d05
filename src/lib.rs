//! A blocking FastCGI client.
//!
//! This crate speaks the web-server side of the FastCGI v1 protocol: it
//! frames a request into BeginRequest/Params/Stdin records, ships them to a
//! responder such as PHP-FPM over TCP or a unix-domain socket, and
//! reassembles the Stdout/Stderr/EndRequest stream into a [`Response`].
//! Only the Responder role is supported.
//!
//! Requests are multiplexed over a single connection by 16-bit request ID.
//! The engine is synchronous: [`Client::send`] writes all records up front
//! and returns a [`ResponseFuture`], and [`ResponseFuture::wait`] runs the
//! blocking read loop that completes it (buffering records for any other
//! pending requests it encounters along the way).
//!
//! ```no_run
//! use fcgi_client::{Client, Config, Request};
//!
//! let mut client = Client::new(Config::tcp("127.0.0.1", 9000));
//! let request = Request::new()
//!     .param("SCRIPT_FILENAME", "/srv/www/index.php")
//!     .param("REQUEST_METHOD", "GET");
//!
//! let pending = client.send(&request)?;
//! let response = pending.wait(&mut client)?;
//! println!("status {}", response.status);
//! # Ok::<(), fcgi_client::Error>(())
//! ```

#![deny(unsafe_code, single_use_lifetimes, unused_lifetimes)]
#![warn(missing_docs, keyword_idents, let_underscore_drop, unreachable_pub, unused_import_braces)]

#![deny(clippy::suspicious, clippy::cargo)]
#![deny(clippy::exit, clippy::semicolon_inside_block, clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::multiple_crate_versions)]
#![allow(clippy::enum_glob_use, clippy::items_after_statements)]


/// Conditional tracing macros shared across the crate.
pub(crate) mod macros;

/// Wire-level encoding and decoding, based on the FastCGI specification
/// (especially Sections 3 and 8).
///
/// See: <https://fastcgi-archives.github.io/FastCGI_Specification.html>
pub mod protocol;

/// The injectable byte-stream layer between the engine and the OS.
pub mod transport;

/// The client engine: connection handling, multiplexing, and reassembly.
pub mod client;

pub use client::{
    Client, Config, Error, Request, Response, ResponseFuture, DEFAULT_TIMEOUT, SCRIPT_FILENAME,
};
pub use transport::{Connector, Endpoint, Transport};
