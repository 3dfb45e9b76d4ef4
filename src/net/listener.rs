//! Primary listener: TCP or Unix socket.
//!
//! # Responsibilities
//! - Resolve which transport to use (Unix wins over TCP)
//! - Bind the socket and, for Unix sockets, set the file mode
//! - Accept incoming connections as readable byte streams
//! - Remove the Unix socket file when the listener is closed

use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, UnixListener};

use crate::config::{ListenerConfig, ValidationError};

/// Error type for listener creation. Always fatal at startup.
#[derive(Debug, Error)]
pub enum BindError {
    /// Failed to bind to address.
    #[error("failed to bind {transport} listener on {address}: {source}")]
    Listen {
        transport: &'static str,
        address: String,
        #[source]
        source: io::Error,
    },

    /// Bound, but the socket file permissions could not be applied.
    #[error("failed to set permissions on unix socket file {}: {source}", .path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stale socket file was in the way and could not be removed.
    #[error("failed to remove stale unix socket file {}: {source}", .path.display())]
    StaleSocket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The transport selected for the primary listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Tcp(String),
    Unix(PathBuf),
}

impl Transport {
    /// Pick the transport by precedence: a non-empty Unix address wins.
    pub fn resolve(config: &ListenerConfig) -> Result<Self, ValidationError> {
        if !config.unix_address.is_empty() {
            Ok(Transport::Unix(PathBuf::from(&config.unix_address)))
        } else if !config.tcp_address.is_empty() {
            Ok(Transport::Tcp(config.tcp_address.clone()))
        } else {
            Err(ValidationError::NoPrimaryAddress)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transport::Tcp(_) => "tcp",
            Transport::Unix(_) => "unix",
        }
    }
}

/// Address the primary listener is actually bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "{}", addr),
            ListenAddr::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fill in the wildcard host for addresses written as ":port".
pub fn normalize_tcp_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// A bound primary listener.
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixSocketListener),
}

/// An accepted connection, reduced to what the relay needs: bytes in.
pub struct Accepted {
    pub stream: Box<dyn AsyncRead + Send + Unpin>,
    pub peer: String,
}

impl Listener {
    /// Bind the listener for `transport`.
    ///
    /// `socket_mode` is applied to the socket file for Unix transports.
    pub async fn bind(transport: &Transport, socket_mode: u32) -> Result<Self, BindError> {
        let listener = match transport {
            Transport::Tcp(addr) => {
                let addr = normalize_tcp_address(addr);
                let inner = TcpListener::bind(&addr)
                    .await
                    .map_err(|source| BindError::Listen {
                        transport: "tcp",
                        address: addr.clone(),
                        source,
                    })?;
                Listener::Tcp(inner)
            }
            Transport::Unix(path) => Listener::Unix(UnixSocketListener::bind(path, socket_mode)?),
        };

        tracing::info!(
            transport = transport.name(),
            address = %listener.local_addr(),
            "Listener bound"
        );

        Ok(listener)
    }

    /// Wait for the next connection.
    pub async fn accept(&self) -> io::Result<Accepted> {
        match self {
            Listener::Tcp(inner) => {
                let (stream, addr) = inner.accept().await?;
                Ok(Accepted {
                    stream: Box::new(stream),
                    peer: addr.to_string(),
                })
            }
            Listener::Unix(inner) => {
                let (stream, _addr) = inner.inner.accept().await?;
                Ok(Accepted {
                    stream: Box::new(stream),
                    // Unix clients are almost always unnamed.
                    peer: "unix".to_string(),
                })
            }
        }
    }

    /// Get the address this listener is bound to.
    pub fn local_addr(&self) -> ListenAddr {
        match self {
            Listener::Tcp(inner) => match inner.local_addr() {
                Ok(addr) => ListenAddr::Tcp(addr),
                Err(_) => ListenAddr::Tcp(SocketAddr::from(([0, 0, 0, 0], 0))),
            },
            Listener::Unix(inner) => ListenAddr::Unix(inner.path.clone()),
        }
    }

    /// Close the listener. Unix socket files are removed.
    pub fn close(self) {
        let addr = self.local_addr();
        drop(self);
        tracing::info!(address = %addr, "Listener closed");
    }
}

/// A source of connections for the accept loop.
pub trait Accept: Send + Sync + 'static {
    /// Wait for the next connection.
    fn accept(&self) -> impl Future<Output = io::Result<Accepted>> + Send;

    /// Stop accepting and release the socket.
    fn close(self);
}

impl Accept for Listener {
    fn accept(&self) -> impl Future<Output = io::Result<Accepted>> + Send {
        Listener::accept(self)
    }

    fn close(self) {
        Listener::close(self)
    }
}

/// Unix socket listener that unlinks its socket file when dropped.
pub struct UnixSocketListener {
    inner: UnixListener,
    path: PathBuf,
}

impl UnixSocketListener {
    fn bind(path: &Path, mode: u32) -> Result<Self, BindError> {
        remove_stale_socket(path)?;

        let inner = UnixListener::bind(path).map_err(|source| BindError::Listen {
            transport: "unix",
            address: path.display().to_string(),
            source,
        })?;

        // From here on the Drop impl owns cleanup of the socket file.
        let listener = Self {
            inner,
            path: path.to_path_buf(),
        };

        set_socket_permissions(path, mode)?;

        Ok(listener)
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove socket file"
                );
            }
        }
    }
}

/// Remove a leftover socket file from a previous run.
///
/// The file is only removed when nothing answers on it. A live listener
/// makes the bind fail with `AddrInUse`. Anything that is not a socket is
/// left alone and the bind will fail on it.
fn remove_stale_socket(path: &Path) -> Result<(), BindError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {}
        _ => return Ok(()),
    }

    match std::os::unix::net::UnixStream::connect(path) {
        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            fs::remove_file(path).map_err(|source| BindError::StaleSocket {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "Removed stale socket file");
            Ok(())
        }
        Ok(_) => Err(BindError::Listen {
            transport: "unix",
            address: path.display().to_string(),
            source: io::Error::new(
                io::ErrorKind::AddrInUse,
                "another listener is serving on this socket",
            ),
        }),
        Err(source) => Err(BindError::Listen {
            transport: "unix",
            address: path.display().to_string(),
            source,
        }),
    }
}

/// Set socket file permissions.
fn set_socket_permissions(path: &Path, mode: u32) -> Result<(), BindError> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|source| {
        BindError::Permissions {
            path: path.to_path_buf(),
            source,
        }
    })
}
