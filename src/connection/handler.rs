//! Connection Handler Module
//!
//! This module handles individual client connections to keyreg.
//! Each client gets its own handler task that runs in a loop,
//! reading command frames and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP + WebSocket upgrade on /websocket)
//!        │
//!        ▼
//! 2. ConnectionHandler created
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  Read frame                  │
//!    │      │                       │
//!    │      ▼                       │
//!    │  Decode JSON (zero command   │
//!    │  on failure)                 │
//!    │      │                       │
//!    │      ▼                       │
//!    │  Dispatch                    │
//!    │      │                       │
//!    │      ▼                       │
//!    │  Write response frame        │
//!    │      │                       │
//!    │      ▼                       │
//!    │  [Loop back]                 │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Close frame / transport error / encode error
//!        │
//!        ▼
//! 5. Handler task ends, socket dropped
//! ```
//!
//! Frames are processed strictly one at a time: a response is fully written
//! before the next frame is read.

use crate::commands::CommandHandler;
use crate::protocol::{decode_command, encode_response, Command, ProtocolError, Response};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as UpgradeRequest, Response as UpgradeResponse,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, trace, warn};

/// Path on which the WebSocket upgrade is accepted.
pub const WEBSOCKET_PATH: &str = "/websocket";

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total data frames received
    pub frames_received: AtomicU64,
    /// Total responses written
    pub responses_sent: AtomicU64,
    /// Frames that could not be decoded into a command
    pub decode_failures: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_sent(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failed(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The upgraded socket for this connection
    ws: WebSocketStream<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// The command handler (shares the store with every other connection)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Performs the WebSocket upgrade and creates the handler.
    ///
    /// Upgrades on any path other than [`WEBSOCKET_PATH`] are refused with 404.
    pub async fn accept(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Result<Self, ConnectionError> {
        let ws = tokio_tungstenite::accept_hdr_async(stream, check_upgrade_path).await?;
        stats.connection_opened();

        Ok(Self {
            ws,
            addr,
            command_handler,
            stats,
        })
    }

    /// Runs the main connection loop until the client goes away.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(ConnectionError::WebSocket(
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
            )) => debug!(client = %self.addr, "Client disconnected"),
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The read-dispatch-write loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        while let Some(frame) = self.ws.next().await {
            let (payload, binary) = match frame? {
                Message::Text(text) => (text.into_bytes(), false),
                Message::Binary(data) => (data, true),
                Message::Close(reason) => {
                    // Keep polling so the close reply gets flushed.
                    debug!(client = %self.addr, ?reason, "Close frame received");
                    continue;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            self.stats.frame_received();
            trace!(
                client = %self.addr,
                frame = %String::from_utf8_lossy(&payload),
                "Received frame"
            );

            let command = self.decode_frame(&payload);
            let response = self.command_handler.dispatch(&command).await;
            self.send_response(&response, binary).await?;
        }

        Ok(())
    }

    /// Decodes a frame, falling back to the zero command on failure.
    fn decode_frame(&self, payload: &[u8]) -> Command {
        match decode_command(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Failed to decode command frame");
                self.stats.decode_failed();
                Command::default()
            }
        }
    }

    /// Sends a response using the same frame type as the request.
    async fn send_response(
        &mut self,
        response: &Response,
        binary: bool,
    ) -> Result<(), ConnectionError> {
        let text = encode_response(response)?;
        let len = text.len();

        let message = if binary {
            Message::Binary(text.into_bytes())
        } else {
            Message::Text(text)
        };
        self.ws.send(message).await?;

        self.stats.response_sent();
        trace!(client = %self.addr, bytes = len, "Sent response");
        Ok(())
    }
}

fn check_upgrade_path(
    request: &UpgradeRequest,
    response: UpgradeResponse,
) -> Result<UpgradeResponse, ErrorResponse> {
    if request.uri().path() == WEBSOCKET_PATH {
        return Ok(response);
    }

    let mut refusal = ErrorResponse::new(Some(format!(
        "no WebSocket endpoint at {}",
        request.uri().path()
    )));
    *refusal.status_mut() = StatusCode::NOT_FOUND;
    Err(refusal)
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Handshake, read or write failure on the socket
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// A response could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[from] ProtocolError),
}

/// Handles a client connection from handshake to teardown.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = match ConnectionHandler::accept(stream, addr, command_handler, stats).await {
        Ok(handler) => handler,
        Err(e) => {
            debug!(client = %addr, error = %e, "WebSocket upgrade failed");
            return;
        }
    };

    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}

/// Accepts connections forever, spawning one task per client.
pub async fn serve(
    listener: TcpListener,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = command_handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyStore, MemoryStore, StoreAdapter};
    use tokio::net::TcpStream as ClientStream;
    use tokio_tungstenite::{connect_async, MaybeTlsStream};

    type Client = WebSocketStream<MaybeTlsStream<ClientStream>>;

    async fn create_test_server() -> (SocketAddr, Arc<MemoryStore>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(MemoryStore::new());
        let stats = Arc::new(ConnectionStats::new());

        let handler = CommandHandler::new(StoreAdapter::new(
            Arc::clone(&store) as Arc<dyn KeyStore>
        ));
        tokio::spawn(serve(listener, handler, Arc::clone(&stats)));

        (addr, store, stats)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{}{}", addr, WEBSOCKET_PATH))
            .await
            .unwrap();
        client
    }

    async fn roundtrip(client: &mut Client, frame: &str) -> Response {
        client.send(Message::Text(frame.to_string())).await.unwrap();
        loop {
            match client.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    fn insert_frame(key: &str, identifier: &str) -> String {
        format!(
            r#"{{"action":"insert","parameters":[{{"key":"key","value":"{}"}},{{"key":"identifier","value":"{}"}}]}}"#,
            key, identifier
        )
    }

    #[tokio::test]
    async fn test_echo() {
        let (addr, _, _) = create_test_server().await;
        let mut client = connect(addr).await;

        let response = roundtrip(&mut client, r#"{"action":"echo","parameters":[]}"#).await;
        assert_eq!(response.action, "echo");
        assert_eq!(response.message, "");
    }

    #[tokio::test]
    async fn test_insert_read_count() {
        let (addr, store, _) = create_test_server().await;
        let mut client = connect(addr).await;

        let response = roundtrip(&mut client, &insert_frame("pk1", "alice")).await;
        assert_eq!(response.message, "inserted");

        let response = roundtrip(
            &mut client,
            r#"{"action":"read_identifier","parameters":[{"key":"key","value":"pk1"}]}"#,
        )
        .await;
        assert_eq!(response.action, "read_identifier");
        assert_eq!(response.message, "alice");

        let response = roundtrip(&mut client, r#"{"action":"count"}"#).await;
        assert_eq!(response.message, "1");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_value_inserts_empty_key() {
        let (addr, store, _) = create_test_server().await;
        let mut client = connect(addr).await;

        let response = roundtrip(
            &mut client,
            r#"{"action":"insert","parameters":[{"key":"pk1"},{"key":"identifier","value":"id1"}]}"#,
        )
        .await;
        assert_eq!(response.message, "inserted");
        assert_eq!(store.find_by_key("").unwrap(), Some("id1".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection() {
        let (addr, _, stats) = create_test_server().await;
        let mut client = connect(addr).await;

        let response = roundtrip(&mut client, "{not json").await;
        assert_eq!(response.action, "*");
        assert_eq!(response.message, "unrecognized command");
        assert_eq!(stats.decode_failures.load(Ordering::Relaxed), 1);

        // Still usable afterwards
        let response = roundtrip(&mut client, r#"{"action":"count"}"#).await;
        assert_eq!(response.message, "0");
    }

    #[tokio::test]
    async fn test_array_frame_is_not_a_command() {
        let (addr, store, stats) = create_test_server().await;
        let mut client = connect(addr).await;

        let response = roundtrip(
            &mut client,
            r#"["insert",[["key","pk9"],["identifier","x"]]]"#,
        )
        .await;
        assert_eq!(response.action, "*");
        assert_eq!(response.message, "unrecognized command");
        assert_eq!(stats.decode_failures.load(Ordering::Relaxed), 1);
        assert!(store.is_empty());

        let response = roundtrip(&mut client, r#"{"action":"count"}"#).await;
        assert_eq!(response.message, "0");
    }

    #[tokio::test]
    async fn test_null_and_cased_fields() {
        let (addr, store, _) = create_test_server().await;
        let mut client = connect(addr).await;

        let response = roundtrip(&mut client, r#"{"action":"count","parameters":null}"#).await;
        assert_eq!(response.action, "count");
        assert_eq!(response.message, "0");

        let response = roundtrip(
            &mut client,
            r#"{"Action":"insert","Parameters":[{"Key":"key","Value":"pk1"},{"key":"identifier","value":"alice"}]}"#,
        )
        .await;
        assert_eq!(response.message, "inserted");
        assert_eq!(store.find_by_key("pk1").unwrap(), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_binary_frame_gets_binary_reply() {
        let (addr, _, _) = create_test_server().await;
        let mut client = connect(addr).await;

        client
            .send(Message::Binary(br#"{"action":"count"}"#.to_vec()))
            .await
            .unwrap();

        match client.next().await.unwrap().unwrap() {
            Message::Binary(data) => {
                let response: Response = serde_json::from_slice(&data).unwrap();
                assert_eq!(response.message, "0");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_responses_in_order() {
        let (addr, _, _) = create_test_server().await;
        let mut client = connect(addr).await;

        // Queue several commands before reading any reply.
        for i in 0..3 {
            client
                .send(Message::Text(insert_frame(&format!("pk{}", i), &format!("id{}", i))))
                .await
                .unwrap();
        }
        client
            .send(Message::Text(r#"{"action":"count"}"#.to_string()))
            .await
            .unwrap();

        let mut actions = vec![];
        while actions.len() < 4 {
            if let Message::Text(text) = client.next().await.unwrap().unwrap() {
                let response: Response = serde_json::from_str(&text).unwrap();
                actions.push((response.action, response.message));
            }
        }

        assert_eq!(
            actions,
            vec![
                ("insert".to_string(), "inserted".to_string()),
                ("insert".to_string(), "inserted".to_string()),
                ("insert".to_string(), "inserted".to_string()),
                ("count".to_string(), "3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_wrong_path_refused() {
        let (addr, _, stats) = create_test_server().await;

        let err = connect_async(format!("ws://{}/other", addr))
            .await
            .unwrap_err();
        match err {
            tungstenite::Error::Http(response) => {
                assert_eq!(response.status(), StatusCode::NOT_FOUND)
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_across_connections() {
        let (addr, store, _) = create_test_server().await;

        let mut clients = vec![];
        for _ in 0..2 {
            clients.push(connect(addr).await);
        }

        let tasks: Vec<_> = clients
            .into_iter()
            .enumerate()
            .map(|(i, mut client)| {
                tokio::spawn(async move {
                    roundtrip(&mut client, &insert_frame(&format!("pk{}", i), "dup"))
                        .await
                        .message
                })
            })
            .collect();

        let mut messages = vec![];
        for task in tasks {
            messages.push(task.await.unwrap());
        }
        messages.sort();

        assert_eq!(messages, vec!["already_exist", "inserted"]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        let mut client = connect(addr).await;
        roundtrip(&mut client, r#"{"action":"echo"}"#).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert_eq!(stats.frames_received.load(Ordering::Relaxed), 1);
        assert_eq!(stats.responses_sent.load(Ordering::Relaxed), 1);

        client.close(None).await.unwrap();
        drop(client);

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
