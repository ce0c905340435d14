// Management connection client
//
// One `ManagementClient` owns one connection and runs at most one command
// at a time: replies carry no request identifier, so the terminator line
// is the only framing. A transport failure closes the connection for good;
// callers re-open rather than reuse.
//
// Lines are framed as raw bytes and decoded lossily: a common name that
// is not valid UTF-8 must not take the connection down.

use std::borrow::Cow;

use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Framed};
use tracing::{debug, trace};

use super::replies::{self, LoadStats, VersionInfo};
use super::status::{self, SessionRecord};
use super::{is_notification, is_terminator};
use crate::error::Error;
use crate::transport::{BoxedStream, ManagementEndpoint, ManagementStream, TransportConfig};

/// Lifecycle of a management connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    AwaitingReply,
    Closed,
}

/// Client for a single tunnel-server management socket.
pub struct ManagementClient<S = BoxedStream> {
    label: String,
    framed: Option<Framed<S, AnyDelimiterCodec>>,
    state: ConnectionState,
    config: TransportConfig,
}

impl ManagementClient<BoxedStream> {
    /// Connect to `endpoint` and switch off real-time log output.
    pub async fn connect(
        endpoint: &ManagementEndpoint,
        config: &TransportConfig,
    ) -> Result<Self, Error> {
        let stream = config.open(endpoint).await?;
        Self::from_stream(stream, endpoint.to_string(), config.clone()).await
    }
}

impl<S: ManagementStream> ManagementClient<S> {
    /// Wrap an already-open stream and perform the `log off` handshake.
    ///
    /// Log lines arrive asynchronously and would otherwise interleave with
    /// command replies, so they are disabled before any command is issued.
    pub async fn from_stream(
        stream: S,
        label: impl Into<String>,
        config: TransportConfig,
    ) -> Result<Self, Error> {
        let codec = AnyDelimiterCodec::new_with_max_length(
            b"\n".to_vec(),
            b"\n".to_vec(),
            config.max_line_length,
        );
        let mut client = Self {
            label: label.into(),
            framed: Some(Framed::new(stream, codec)),
            state: ConnectionState::Connected,
            config,
        };
        let reply = client.command("log off").await?;
        trace!(endpoint = %client.label, ?reply, "log output disabled");
        Ok(client)
    }

    /// A client that has not opened a connection yet.
    pub fn disconnected(label: impl Into<String>, config: TransportConfig) -> Self {
        Self {
            label: label.into(),
            framed: None,
            state: ConnectionState::Disconnected,
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Endpoint label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Send one command and collect its reply, terminator line included.
    pub async fn command(&mut self, text: &str) -> Result<Vec<String>, Error> {
        if text.contains(['\n', '\r']) {
            return Err(Error::InvalidCommand {
                reason: "command must be a single line".into(),
            });
        }
        if self.state != ConnectionState::Connected {
            return Err(Error::Closed);
        }
        let Some(framed) = self.framed.as_mut() else {
            return Err(Error::Closed);
        };

        debug!(endpoint = %self.label, command = text, "sending management command");
        self.state = ConnectionState::AwaitingReply;
        let max = self.config.max_line_length;
        let outcome = tokio::time::timeout(self.config.timeout, exchange(framed, text, max)).await;

        match outcome {
            Ok(Ok(lines)) => {
                self.state = ConnectionState::Connected;
                Ok(lines)
            }
            Ok(Err(e)) => {
                self.close();
                Err(e)
            }
            Err(_) => {
                self.close();
                Err(self.config.timeout_error())
            }
        }
    }

    /// Drop the underlying stream. Further commands fail with [`Error::Closed`].
    pub fn close(&mut self) {
        if self.framed.take().is_some() {
            debug!(endpoint = %self.label, "management connection closed");
        }
        self.state = ConnectionState::Closed;
    }

    // ── Typed commands ──────────────────────────────────────────────

    /// Run `status` and parse the client list and routing table.
    pub async fn status(&mut self) -> Result<Vec<SessionRecord>, Error> {
        let reply = self.command("status").await?;
        status::parse_status(&reply)
    }

    pub async fn version(&mut self) -> Result<VersionInfo, Error> {
        let reply = self.command("version").await?;
        replies::parse_version(&reply)
    }

    pub async fn load_stats(&mut self) -> Result<LoadStats, Error> {
        let reply = self.command("load-stats").await?;
        replies::parse_load_stats(&reply)
    }

    /// Disconnect every session of `common_name`. `Ok(false)` means the
    /// server answered but did not kill anything.
    pub async fn kill(&mut self, common_name: &str) -> Result<bool, Error> {
        if common_name.is_empty() || common_name.contains(char::is_whitespace) {
            return Err(Error::InvalidCommand {
                reason: format!("invalid common name '{common_name}'"),
            });
        }
        let reply = self.command(&format!("kill {common_name}")).await?;
        Ok(replies::is_success(&reply))
    }
}

/// Write `text` and read lines until a terminator.
async fn exchange<S: ManagementStream>(
    framed: &mut Framed<S, AnyDelimiterCodec>,
    text: &str,
    max_line_length: usize,
) -> Result<Vec<String>, Error> {
    framed
        .send(text)
        .await
        .map_err(|e| codec_error(e, max_line_length))?;

    let mut lines = Vec::new();
    loop {
        let line = match framed.next().await {
            Some(Ok(chunk)) => decode_line(&chunk),
            Some(Err(e)) => return Err(codec_error(e, max_line_length)),
            None => {
                return Err(Error::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before reply terminator",
                )));
            }
        };

        if is_notification(&line) {
            trace!(%line, "skipping real-time notification");
            continue;
        }
        let done = is_terminator(&line);
        lines.push(line);
        if done {
            return Ok(lines);
        }
    }
}

/// Decode one framed line, replacing invalid UTF-8 and dropping the `\r`.
fn decode_line(chunk: &[u8]) -> String {
    let text = String::from_utf8_lossy(chunk);
    if matches!(text, Cow::Owned(_)) {
        debug!(line = %text, "reply line is not valid UTF-8");
    }
    text.strip_suffix('\r').unwrap_or(&text).to_owned()
}

fn codec_error(err: AnyDelimiterCodecError, max: usize) -> Error {
    match err {
        AnyDelimiterCodecError::MaxChunkLengthExceeded => Error::LineTooLong { max },
        AnyDelimiterCodecError::Io(e) => Error::Transport(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const GREETING: &[u8] = b">INFO:OpenVPN Management Interface Version 1 -- type 'help' for more info\r\n";
    const LOG_OFF_OK: &[u8] = b"SUCCESS: real-time log notification set to OFF\r\n";

    fn config() -> TransportConfig {
        TransportConfig::default()
    }

    #[tokio::test]
    async fn handshake_disables_log_and_skips_greeting() {
        let mock = Builder::new()
            .write(b"log off\n")
            .read(GREETING)
            .read(LOG_OFF_OK)
            .build();

        let client = ManagementClient::from_stream(mock, "mock", config()).await.unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn command_reads_until_end_inclusive() {
        let mock = Builder::new()
            .write(b"log off\n")
            .read(LOG_OFF_OK)
            .write(b"version\n")
            .read(b"OpenVPN Version: OpenVPN 2.6.12 x86_64-redhat-linux-gnu\r\nManagement Version: 5\r\nEND\r\n")
            .build();

        let mut client = ManagementClient::from_stream(mock, "mock", config()).await.unwrap();
        let reply = client.command("version").await.unwrap();
        assert_eq!(
            reply,
            vec![
                "OpenVPN Version: OpenVPN 2.6.12 x86_64-redhat-linux-gnu",
                "Management Version: 5",
                "END",
            ]
        );
        assert!(client.is_open());
    }

    #[tokio::test]
    async fn kill_reports_success_prefix() {
        let mock = Builder::new()
            .write(b"log off\n")
            .read(LOG_OFF_OK)
            .write(b"kill alice\n")
            .read(b"SUCCESS: common name 'alice' found, 1 client(s) killed\r\n")
            .write(b"kill bob\n")
            .read(b"ERROR: common name 'bob' not found\r\n")
            .build();

        let mut client = ManagementClient::from_stream(mock, "mock", config()).await.unwrap();
        assert!(client.kill("alice").await.unwrap());
        assert!(!client.kill("bob").await.unwrap());
    }

    #[tokio::test]
    async fn eof_mid_reply_closes_connection() {
        let mock = Builder::new()
            .write(b"log off\n")
            .read(LOG_OFF_OK)
            .write(b"status\n")
            .read(b"OpenVPN CLIENT LIST\r\n")
            .build();

        let mut client = ManagementClient::from_stream(mock, "mock", config()).await.unwrap();
        let err = client.command("status").await.unwrap_err();
        assert!(err.is_transport(), "expected transport error, got {err:?}");
        assert_eq!(client.state(), ConnectionState::Closed);

        let again = client.command("status").await.unwrap_err();
        assert!(matches!(again, Error::Closed));
    }

    #[tokio::test]
    async fn read_error_is_transport_error() {
        let mock = Builder::new()
            .write(b"log off\n")
            .read(LOG_OFF_OK)
            .write(b"load-stats\n")
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let mut client = ManagementClient::from_stream(mock, "mock", config()).await.unwrap();
        let err = client.load_stats().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn latin1_common_name_keeps_connection_open() {
        let mock = Builder::new()
            .write(b"log off\n")
            .read(LOG_OFF_OK)
            .write(b"status\n")
            .read(b"OpenVPN CLIENT LIST\r\n")
            .read(b"Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since\r\n")
            .read(b"j\xe9r\xf4me,198.51.100.7:50312,1,2,Sun Jan  1 00:00:00 2017\r\n")
            .read(b"ROUTING TABLE\r\nGLOBAL STATS\r\nEND\r\n")
            .write(b"load-stats\n")
            .read(b"SUCCESS: nclients=1,bytesin=1,bytesout=2\r\n")
            .build();

        let mut client = ManagementClient::from_stream(mock, "mock", config()).await.unwrap();
        let sessions = client.status().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].common_name, "j\u{fffd}r\u{fffd}me");
        assert!(client.is_open());
        assert_eq!(client.load_stats().await.unwrap().clients, 1);
    }

    #[tokio::test]
    async fn multi_line_commands_are_rejected_before_sending() {
        let mock = Builder::new().write(b"log off\n").read(LOG_OFF_OK).build();

        let mut client = ManagementClient::from_stream(mock, "mock", config()).await.unwrap();
        let err = client.command("status\nkill alice").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCommand { .. }));
        assert!(client.is_open());
    }

    #[tokio::test]
    async fn disconnected_client_refuses_commands() {
        let mut client: ManagementClient<tokio_test::io::Mock> =
            ManagementClient::disconnected("nowhere", config());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(client.command("version").await, Err(Error::Closed)));
    }
}
