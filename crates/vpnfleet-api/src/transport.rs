// Management endpoint addressing and stream construction.
//
// OpenVPN exposes its management interface on either a TCP port or a
// Unix socket. Both are opened here and erased behind `BoxedStream`
// so the client only ever sees a byte stream.

use std::fmt;
use std::net::SocketAddr;
#[cfg(unix)]
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::Error;

/// Default maximum length of a single reply line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024;

/// Any bidirectional byte stream usable as a management connection.
pub trait ManagementStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ManagementStream for T {}

/// Type-erased management stream (TCP or Unix).
pub type BoxedStream = Box<dyn ManagementStream>;

// ── ManagementEndpoint ──────────────────────────────────────────────

/// Where a tunnel-server process listens for management connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ManagementEndpoint {
    /// `host:port`, e.g. `127.42.0.1:11940`.
    Tcp(SocketAddr),
    /// Filesystem path of a Unix socket.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl fmt::Display for ManagementEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{addr}"),
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

impl FromStr for ManagementEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        #[cfg(unix)]
        {
            if let Some(path) = s.strip_prefix("unix:") {
                return Ok(Self::Unix(PathBuf::from(path)));
            }
            if s.starts_with('/') {
                return Ok(Self::Unix(PathBuf::from(s)));
            }
        }
        s.parse::<SocketAddr>()
            .map(Self::Tcp)
            .map_err(|_| Error::InvalidEndpoint { input: s.to_owned() })
    }
}

impl TryFrom<String> for ManagementEndpoint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ManagementEndpoint> for String {
    fn from(endpoint: ManagementEndpoint) -> Self {
        endpoint.to_string()
    }
}

impl From<SocketAddr> for ManagementEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::Tcp(addr)
    }
}

// ── TransportConfig ─────────────────────────────────────────────────

/// Connection tuning shared by every management client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bound on connect and on each command round trip.
    pub timeout: Duration,
    /// Longest accepted reply line in bytes.
    pub max_line_length: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn timeout_error(&self) -> Error {
        Error::Timeout {
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Open a raw stream to `endpoint`, bounded by the configured timeout.
    pub async fn open(&self, endpoint: &ManagementEndpoint) -> Result<BoxedStream, Error> {
        debug!(%endpoint, "opening management connection");
        let connect = async {
            let stream: BoxedStream = match endpoint {
                ManagementEndpoint::Tcp(addr) => {
                    let stream = tokio::net::TcpStream::connect(addr).await?;
                    stream.set_nodelay(true)?;
                    Box::new(stream)
                }
                #[cfg(unix)]
                ManagementEndpoint::Unix(path) => {
                    Box::new(tokio::net::UnixStream::connect(path).await?)
                }
            };
            Ok::<_, Error>(stream)
        };

        tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| self.timeout_error())?
    }
}
