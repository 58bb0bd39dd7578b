//! Starts wiremock servers only where loopback sockets are permitted.

use std::net::TcpListener;

use wiremock::MockServer;

/// Returns `true` when the sandbox allows binding a loopback socket.
pub fn loopback_sockets_available() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Starts a mock server, or returns `None` when loopback sockets are
/// unavailable so the calling test can return early.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if !loopback_sockets_available() {
        eprintln!("skipping test: loopback sockets are not permitted in this environment");
        return None;
    }
    Some(MockServer::start().await)
}
