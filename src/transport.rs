use std::fmt;
use std::io;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;


/// The address of a FastCGI responder.
///
/// FastCGI pools conventionally listen on either a loopback TCP port or a
/// unix-domain socket, so both are supported. Which one is used follows from
/// the [`Config`](crate::Config) constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A TCP listener, such as PHP-FPM's default `127.0.0.1:9000`.
    Tcp {
        /// The hostname or IP address of the responder.
        host: String,
        /// The TCP port of the responder.
        port: u16,
    },
    /// A unix-domain stream socket, such as `/run/php-fpm/www.sock`.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}


/// A byte-stream connection between this client and a FastCGI responder.
///
/// This trait is the seam between the protocol engine and the operating
/// system: the engine only ever touches a [`Transport`], so its record loop
/// can be exercised against a deterministic, scripted implementation in
/// tests. The production implementation is [`Socket`].
pub trait Transport {
    /// Reads up to `buf.len()` bytes from the connection.
    ///
    /// Returning `Ok(0)` with a non-empty `buf` signals an orderly shutdown
    /// by the peer.
    ///
    /// # Errors
    /// Returns an error if the underlying read fails, including when a
    /// configured receive timeout expires mid-read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes all of `buf` to the connection.
    ///
    /// # Errors
    /// Returns an error if the underlying write fails.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Waits up to `timeout` for the read side to become ready.
    ///
    /// `Ok(false)` means no readiness event occurred within the budget.
    /// A readable connection may still yield `Ok(0)` from `Transport::read`
    /// if the peer closed it.
    ///
    /// # Errors
    /// Returns an error if the readiness wait itself fails.
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Applies a receive timeout to the connection.
    ///
    /// # Errors
    /// Returns an error if the timeout could not be applied.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Releases the connection, discarding any pending error state.
    ///
    /// # Errors
    /// Returns an error if the connection could not be shut down cleanly.
    /// Callers tearing down a connection may ignore it.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A factory for [`Transport`] connections.
///
/// The client connects lazily and, without keep-alive, reconnects for
/// subsequent requests, so it needs a way to create transports rather than
/// a single instance. Injecting the factory keeps connection setup mockable.
pub trait Connector {
    /// The transport produced by this connector.
    type Transport: Transport;

    /// Opens a new connection to `endpoint`.
    ///
    /// # Errors
    /// Returns an error if socket creation or connection setup fails.
    fn connect(&mut self, endpoint: &Endpoint) -> io::Result<Self::Transport>;
}


#[cfg(unix)]
mod os {
    use std::io::{self, Read, Write};
    use std::net::TcpStream;
    use std::os::fd::{AsRawFd, RawFd};
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    use super::{Connector, Endpoint, Transport};

    /// A connected stream socket, either TCP or unix-domain.
    #[derive(Debug)]
    pub struct Socket {
        inner: Inner,
    }

    #[derive(Debug)]
    enum Inner {
        Tcp(TcpStream),
        Unix(UnixStream),
    }

    impl Socket {
        fn as_raw_fd(&self) -> RawFd {
            match &self.inner {
                Inner::Tcp(s) => s.as_raw_fd(),
                Inner::Unix(s) => s.as_raw_fd(),
            }
        }
    }

    impl Transport for Socket {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match &mut self.inner {
                Inner::Tcp(s) => s.read(buf),
                Inner::Unix(s) => s.read(buf),
            }
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            match &mut self.inner {
                Inner::Tcp(s) => s.write_all(buf),
                Inner::Unix(s) => s.write_all(buf),
            }
        }

        // Unsafe code is limited to the poll(2) call below
        #[allow(unsafe_code)]
        fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
            let mut pollfd = libc::pollfd {
                fd: self.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let millis = libc::c_int::try_from(timeout.as_millis())
                .unwrap_or(libc::c_int::MAX);

            loop {
                // SAFETY: `pollfd` is a valid, exclusively borrowed array of
                // length 1 for the duration of the call.
                let rc = unsafe { libc::poll(&mut pollfd, 1, millis) };
                if rc >= 0 {
                    return Ok(rc > 0);
                }
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }

        fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
            match &self.inner {
                Inner::Tcp(s) => s.set_read_timeout(timeout),
                Inner::Unix(s) => s.set_read_timeout(timeout),
            }
        }

        fn close(&mut self) -> io::Result<()> {
            match &self.inner {
                Inner::Tcp(s) => s.shutdown(std::net::Shutdown::Both),
                Inner::Unix(s) => s.shutdown(std::net::Shutdown::Both),
            }
        }
    }

    /// The default [`Connector`], dialing real OS sockets.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SocketConnector;

    impl Connector for SocketConnector {
        type Transport = Socket;

        fn connect(&mut self, endpoint: &Endpoint) -> io::Result<Socket> {
            let inner = match endpoint {
                Endpoint::Tcp { host, port } => {
                    Inner::Tcp(TcpStream::connect((host.as_str(), *port))?)
                }
                Endpoint::Unix(path) => Inner::Unix(UnixStream::connect(path)?),
            };
            Ok(Socket { inner })
        }
    }
}

#[cfg(unix)]
pub use os::{Socket, SocketConnector};
