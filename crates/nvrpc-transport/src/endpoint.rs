use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{split, StreamPair};

/// Where the editor's RPC stream lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Filesystem unix socket (or named pipe path on other platforms).
    Unix(PathBuf),
    /// `host:port` TCP address.
    Tcp(String),
    /// This process's stdin/stdout.
    Stdio,
}

impl Endpoint {
    /// Open the byte stream for this endpoint.
    pub async fn connect(&self) -> Result<StreamPair> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => crate::uds::UnixDomainSocket::connect(path).await,
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported("unix domain socket")),
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await.map_err(|e| {
                    TransportError::ConnectTcp {
                        addr: addr.clone(),
                        source: e,
                    }
                })?;
                stream.set_nodelay(true)?;
                debug!(%addr, "connected to tcp endpoint");
                Ok(split(stream))
            }
            Endpoint::Stdio => {
                debug!("using process stdio as rpc stream");
                Ok(StreamPair::new(tokio::io::stdin(), tokio::io::stdout()))
            }
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Endpoint::Unix(_) => "unix-domain-socket",
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Stdio => "stdio",
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    /// `-` is stdio, anything containing a path separator is a socket path,
    /// `host:port` with a numeric port is TCP.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }
        if s == "-" {
            return Ok(Endpoint::Stdio);
        }
        if s.contains('/') || s.contains('\\') {
            return Ok(Endpoint::Unix(PathBuf::from(s)));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Endpoint::Tcp(s.to_string()))
            }
            _ => Ok(Endpoint::Unix(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
            Endpoint::Tcp(addr) => f.write_str(addr),
            Endpoint::Stdio => f.write_str("-"),
        }
    }
}
