//! Socket handles and dialling.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use coordwire_config::Endpoint;
use tracing::debug;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::error::ClientError;

/// Stream types a connection can run over.
#[derive(Debug)]
pub enum ConnectionStream {
    /// A TCP connection.
    Tcp(TcpStream),
    /// A Unix domain socket connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Opens a second handle to the same socket.
    ///
    /// # Errors
    ///
    /// Returns the operating system error if the handle cannot be duplicated.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    /// Shuts down both directions of the socket, waking any blocked reader.
    ///
    /// # Errors
    ///
    /// Returns the operating system error if the shutdown fails.
    pub fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl From<TcpStream> for ConnectionStream {
    fn from(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }
}

#[cfg(unix)]
impl From<UnixStream> for ConnectionStream {
    fn from(stream: UnixStream) -> Self {
        Self::Unix(stream)
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Connects to `endpoint`, bounding each attempt by `timeout` when one is given.
pub(crate) fn dial(
    endpoint: &Endpoint,
    timeout: Option<Duration>,
) -> Result<ConnectionStream, ClientError> {
    match endpoint {
        Endpoint::Tcp { host, port } => dial_tcp(endpoint, host, *port, timeout),
        Endpoint::Unix { path } => dial_unix(endpoint, path.as_str(), timeout),
    }
}

fn dial_tcp(
    endpoint: &Endpoint,
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<ConnectionStream, ClientError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| ClientError::Resolve {
            endpoint: endpoint.to_string(),
            source: Arc::new(source),
        })?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(limit) => TcpStream::connect_timeout(&addr, limit),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                if let Err(error) = stream.set_nodelay(true) {
                    debug!(%addr, %error, "failed to disable Nagle's algorithm");
                }
                return Ok(ConnectionStream::Tcp(stream));
            }
            Err(error) => {
                debug!(%addr, %error, "connect attempt failed");
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(source) => Err(ClientError::Connect {
            endpoint: endpoint.to_string(),
            source: Arc::new(source),
        }),
        None => Err(ClientError::NoAddrs {
            endpoint: endpoint.to_string(),
        }),
    }
}

#[cfg(unix)]
fn dial_unix(
    endpoint: &Endpoint,
    path: &str,
    timeout: Option<Duration>,
) -> Result<ConnectionStream, ClientError> {
    use socket2::{Domain, SockAddr, Socket, Type};

    let connect = || -> io::Result<UnixStream> {
        match timeout {
            Some(limit) => {
                let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
                socket.connect_timeout(&SockAddr::unix(path)?, limit)?;
                Ok(UnixStream::from(std::os::fd::OwnedFd::from(socket)))
            }
            None => UnixStream::connect(path),
        }
    };
    connect()
        .map(ConnectionStream::Unix)
        .map_err(|source| ClientError::Connect {
            endpoint: endpoint.to_string(),
            source: Arc::new(source),
        })
}

#[cfg(not(unix))]
fn dial_unix(
    endpoint: &Endpoint,
    _path: &str,
    _timeout: Option<Duration>,
) -> Result<ConnectionStream, ClientError> {
    Err(ClientError::Connect {
        endpoint: endpoint.to_string(),
        source: Arc::new(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets unsupported on this platform",
        )),
    })
}
