//! Starts wiremock servers only where loopback sockets are permitted.

use std::net::TcpListener;

use wiremock::MockServer;

/// Returns `true` when the sandbox allows binding a loopback socket.
pub(crate) fn loopback_sockets_available() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Starts a mock server, or returns `None` (and logs a skip notice) when
/// loopback sockets are unavailable.
pub(crate) async fn start_mock_server_or_skip() -> Option<MockServer> {
    if !loopback_sockets_available() {
        eprintln!("skipping test: loopback sockets are not permitted in this environment");
        return None;
    }
    Some(MockServer::start().await)
}
