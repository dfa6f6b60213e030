#![allow(clippy::unwrap_used)]
// WebSocketTransport against a local tungstenite server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

use gatelink_api::{HandshakeHeaders, RealtimeTransport, TransportEvent, WebSocketTransport};

// ── Helpers ─────────────────────────────────────────────────────────

async fn next_event(transport: &mut WebSocketTransport) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(event) = transport.poll_event() {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for transport event")
}

fn headers() -> HandshakeHeaders {
    HandshakeHeaders {
        firmware_version: "1.2.3".into(),
        device_token: SecretString::from("secret-token".to_string()),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_handshake_frames_and_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (headers_tx, headers_rx) = oneshot::channel::<(String, String)>();
    let (frame_tx, frame_rx) = oneshot::channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let get = |name: &str| {
                req.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            };
            let _ = headers_tx.send((get("FirmwareVersion"), get("DeviceToken")));
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        ws.send(Message::Text(r#"{"ResponseType":1,"Data":true}"#.into()))
            .await
            .unwrap();

        let mut frame_tx = Some(frame_tx);
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if let Some(tx) = frame_tx.take() {
                    let _ = tx.send(text.as_str().to_owned());
                }
            }
        }
    });

    let mut transport = WebSocketTransport::new();
    let url = Url::parse(&format!("ws://{addr}/1/ws/device")).unwrap();
    transport.begin(&url, &headers());

    assert_eq!(next_event(&mut transport).await, TransportEvent::Connected);
    let (firmware, token) = headers_rx.await.unwrap();
    assert_eq!(firmware, "1.2.3");
    assert_eq!(token, "secret-token");

    assert_eq!(
        next_event(&mut transport).await,
        TransportEvent::Text(r#"{"ResponseType":1,"Data":true}"#.into())
    );

    transport.send_text(r#"{"requestType":0}"#).unwrap();
    assert_eq!(frame_rx.await.unwrap(), r#"{"requestType":0}"#);

    transport.disconnect();
    assert_eq!(next_event(&mut transport).await, TransportEvent::Disconnected);
}

#[tokio::test]
async fn test_refused_connection_reports_error_then_disconnect() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut transport = WebSocketTransport::new();
    let url = Url::parse(&format!("ws://{addr}/1/ws/device")).unwrap();
    transport.begin(&url, &headers());

    assert!(matches!(next_event(&mut transport).await, TransportEvent::Error(_)));
    assert_eq!(next_event(&mut transport).await, TransportEvent::Disconnected);
}
