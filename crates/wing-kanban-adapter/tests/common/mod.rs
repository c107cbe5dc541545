/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for wing-kanban-adapter tests

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
#[allow(dead_code)]
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Anon key used by every test client
#[allow(dead_code)]
pub fn mock_api_key() -> String {
    "test-anon-key".to_string()
}

/// Minimal realtime server: acks every join, forwards received frames to the
/// test, and pushes frames the test sends back to the client.
#[allow(dead_code)]
pub struct FakeRealtimeServer {
    pub url: Url,
    pub received: mpsc::UnboundedReceiver<serde_json::Value>,
    pub push: mpsc::UnboundedSender<serde_json::Value>,
}

#[allow(dead_code)]
pub async fn start_realtime_server() -> FakeRealtimeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<serde_json::Value>();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = accept_async(stream).await else {
            return;
        };
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                pushed = push_rx.recv() => {
                    let Some(frame) = pushed else { break };
                    if write.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            let frame: serde_json::Value = match serde_json::from_str(text.as_str()) {
                                Ok(value) => value,
                                Err(_) => continue,
                            };
                            if frame["event"] == "phx_join" {
                                let reply = serde_json::json!({
                                    "topic": frame["topic"],
                                    "event": "phx_reply",
                                    "payload": {"status": "ok", "response": {"postgres_changes": []}},
                                    "ref": frame["ref"],
                                });
                                let _ = write.send(WsMessage::Text(reply.to_string().into())).await;
                            }
                            let _ = received_tx.send(frame);
                        }
                        Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => {
                            let _ = received_tx.send(serde_json::json!({"event": "__closed"}));
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    });

    FakeRealtimeServer {
        url: Url::parse(&format!("ws://{addr}/realtime/v1/websocket")).expect("url"),
        received: received_rx,
        push: push_tx,
    }
}
