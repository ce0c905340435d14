#![allow(clippy::unwrap_used)]
// Integration tests for `ManagementClient` against a local TCP mock server.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use vpnfleet_api::{ConnectionState, Error, ManagementClient, ManagementEndpoint, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const STATUS_REPLY: &str = "OpenVPN CLIENT LIST\r\n\
Updated,Mon Oct 19 09:15:02 2026\r\n\
Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since\r\n\
alice,198.51.100.7:50312,4096,8192,Mon Oct 19 09:15:02 2026\r\n\
ROUTING TABLE\r\n\
Virtual Address,Common Name,Real Address,Last Ref\r\n\
10.42.42.2,alice,198.51.100.7:50312,Mon Oct 19 09:15:10 2026\r\n\
GLOBAL STATS\r\n\
Max bcast/mcast queue length,0\r\n\
END\r\n";

/// Answer a command the way an OpenVPN 2.6 server would.
fn respond(command: &str) -> Option<String> {
    let reply = match command {
        "log off" => "SUCCESS: real-time log notification set to OFF\r\n".to_owned(),
        "status" => STATUS_REPLY.to_owned(),
        "version" => "OpenVPN Version: OpenVPN 2.6.12 x86_64-pc-linux-gnu\r\nManagement Version: 5\r\nEND\r\n".to_owned(),
        "load-stats" => "SUCCESS: nclients=1,bytesin=4096,bytesout=8192\r\n".to_owned(),
        "kill alice" => "SUCCESS: common name 'alice' found, 1 client(s) killed\r\n".to_owned(),
        "hang" => return None,
        other if other.starts_with("kill ") => {
            format!("ERROR: common name '{}' not found\r\n", &other[5..])
        }
        _ => "ERROR: unknown command, enter 'help' for more options\r\n".to_owned(),
    };
    Some(reply)
}

/// Start a mock management server; returns its address.
async fn spawn_mock_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let _ = write
                    .write_all(b">INFO:OpenVPN Management Interface Version 5 -- type 'help' for more info\r\n")
                    .await;
                let mut lines = BufReader::new(read).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    match respond(line.trim_end()) {
                        Some(reply) => {
                            if write.write_all(reply.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                        None => tokio::time::sleep(Duration::from_secs(30)).await,
                    }
                }
            });
        }
    });

    addr
}

fn fast_config() -> TransportConfig {
    TransportConfig::default().with_timeout(Duration::from_millis(500))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_over_tcp() {
    let addr = spawn_mock_server().await;
    let mut client = ManagementClient::connect(&ManagementEndpoint::Tcp(addr), &fast_config())
        .await
        .unwrap();

    let sessions = client.status().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].common_name, "alice");
    assert_eq!(sessions[0].virtual_addresses, vec!["10.42.42.2"]);
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_version_and_load_stats() {
    let addr = spawn_mock_server().await;
    let mut client = ManagementClient::connect(&addr.into(), &fast_config())
        .await
        .unwrap();

    let version = client.version().await.unwrap();
    assert_eq!(version.management, Some(5));

    let stats = client.load_stats().await.unwrap();
    assert_eq!(stats.clients, 1);
    assert_eq!(stats.bytes_out, 8192);
}

#[tokio::test]
async fn test_kill_found_and_not_found() {
    let addr = spawn_mock_server().await;
    let mut client = ManagementClient::connect(&addr.into(), &fast_config())
        .await
        .unwrap();

    assert!(client.kill("alice").await.unwrap());
    assert!(!client.kill("nobody").await.unwrap());
}

#[tokio::test]
async fn test_unknown_command_returns_error_line() {
    let addr = spawn_mock_server().await;
    let mut client = ManagementClient::connect(&addr.into(), &fast_config())
        .await
        .unwrap();

    let reply = client.command("frobnicate").await.unwrap();
    assert_eq!(reply.len(), 1);
    assert!(reply[0].starts_with("ERROR: "));
}

#[tokio::test]
async fn test_command_timeout_closes_connection() {
    let addr = spawn_mock_server().await;
    let mut client = ManagementClient::connect(&addr.into(), &fast_config())
        .await
        .unwrap();

    let err = client.command("hang").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_ms: 500 }), "got {err:?}");
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let result = ManagementClient::connect(&addr.into(), &fast_config()).await;
    let err = result.err().unwrap();
    assert!(err.is_transport(), "expected transport error, got {err:?}");
}
