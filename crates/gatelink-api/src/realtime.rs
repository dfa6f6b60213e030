//! Realtime gateway channel.
//!
//! The device keeps one websocket open to its assigned gateway. This module
//! exposes that channel as a pollable event source ([`RealtimeTransport`])
//! so the session state machine can drain it on its own schedule instead of
//! being called back re-entrantly.
//!
//! [`WebSocketTransport`] is the tokio-tungstenite implementation: a
//! background task owns the socket, forwards frames as [`TransportEvent`]s
//! through an unbounded queue and writes queued outbound frames.

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

/// Header carrying the firmware version on the websocket upgrade.
pub const FIRMWARE_VERSION_HEADER: &str = "FirmwareVersion";
/// Header carrying the device credential on the websocket upgrade.
pub const DEVICE_TOKEN_HEADER: &str = "DeviceToken";

// ── Events ───────────────────────────────────────────────────────────

/// Everything the transport can report back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; frames may flow.
    Connected,
    /// The connection is gone (closed, failed, or never established).
    Disconnected,
    /// One complete text frame.
    Text(String),
    /// A binary frame of the given length.
    Binary { len: usize },
    /// Start of a fragmented message.
    FragmentStart { binary: bool },
    /// Continuation fragment.
    Fragment,
    /// Final fragment.
    FragmentFin,
    Ping,
    Pong,
    /// Transport-level error. Always followed by `Disconnected` when fatal.
    Error(String),
}

/// Identification sent on the websocket upgrade request.
#[derive(Debug, Clone)]
pub struct HandshakeHeaders {
    pub firmware_version: String,
    pub device_token: SecretString,
}

// ── Transport trait ──────────────────────────────────────────────────

/// A pollable realtime connection.
///
/// Implementations never block: `begin` and `disconnect` only start work,
/// and results surface later through [`poll_event`](Self::poll_event).
pub trait RealtimeTransport: Send {
    /// Start a handshake to `url` carrying `headers`.
    fn begin(&mut self, url: &Url, headers: &HandshakeHeaders);

    /// Queue a text frame for sending.
    fn send_text(&mut self, text: &str) -> Result<(), Error>;

    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Start a graceful close. Completion is reported as `Disconnected`.
    fn disconnect(&mut self);
}

// ── WebSocketTransport ───────────────────────────────────────────────

enum Outbound {
    Text(String),
    Close,
}

/// One spawned connection attempt and the queues to talk to it.
struct Link {
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    cancel: CancellationToken,
}

/// tokio-tungstenite backed [`RealtimeTransport`].
///
/// Dropping the transport cancels the background task immediately.
#[derive(Default)]
pub struct WebSocketTransport {
    link: Option<Link>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RealtimeTransport for WebSocketTransport {
    fn begin(&mut self, url: &Url, headers: &HandshakeHeaders) {
        if let Some(old) = self.link.take() {
            old.cancel.cancel();
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task_cancel = cancel.clone();
                let url = url.clone();
                let headers = headers.clone();
                handle.spawn(async move {
                    run_connection(url, headers, event_tx, outbound_rx, task_cancel).await;
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "no tokio runtime for websocket task");
                let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                let _ = event_tx.send(TransportEvent::Disconnected);
            }
        }

        self.link = Some(Link {
            outbound: outbound_tx,
            events: event_rx,
            cancel,
        });
    }

    fn send_text(&mut self, text: &str) -> Result<(), Error> {
        let link = self.link.as_ref().ok_or(Error::WebSocketNotConnected)?;
        link.outbound
            .send(Outbound::Text(text.to_owned()))
            .map_err(|_| Error::WebSocketNotConnected)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.link.as_mut()?.events.try_recv().ok()
    }

    fn disconnect(&mut self) {
        if let Some(link) = &self.link {
            // Task already gone means Disconnected is queued or delivered.
            let _ = link.outbound.send(Outbound::Close);
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.cancel.cancel();
        }
    }
}

// ── Background connection task ───────────────────────────────────────

async fn run_connection(
    url: Url,
    headers: HandshakeHeaders,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!("websocket task cancelled");
            return;
        }
        result = connect_and_pump(&url, &headers, &events, outbound) => result,
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "websocket connection ended with error");
        let _ = events.send(TransportEvent::Error(e.to_string()));
    }
    let _ = events.send(TransportEvent::Disconnected);
}

/// Handshake, then shuttle frames both ways until the stream ends.
async fn connect_and_pump(
    url: &Url,
    headers: &HandshakeHeaders,
    events: &mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to gateway websocket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let request = ClientRequestBuilder::new(uri)
        .with_header(FIRMWARE_VERSION_HEADER, headers.firmware_version.clone())
        .with_header(
            DEVICE_TOKEN_HEADER,
            headers.device_token.expose_secret().to_owned(),
        );

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let _ = events.send(TransportEvent::Connected);

    let (mut write, mut read) = ws_stream.split();
    let mut closing = false;

    loop {
        tokio::select! {
            out = outbound.recv(), if !closing => {
                match out {
                    Some(Outbound::Text(text)) => {
                        write
                            .send(tungstenite::Message::Text(text.into()))
                            .await
                            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                    }
                    Some(Outbound::Close) | None => {
                        tracing::debug!("sending websocket close frame");
                        closing = true;
                        if let Err(e) = write.send(tungstenite::Message::Close(None)).await {
                            tracing::debug!(error = %e, "close frame not sent");
                            return Ok(());
                        }
                    }
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if let Some(event) = event_for(message) {
                            let closed = event == TransportEvent::Disconnected;
                            if closed {
                                return Ok(());
                            }
                            let _ = events.send(event);
                        }
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("websocket stream ended");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Translate one tungstenite message. `Close` maps to `Disconnected`.
fn event_for(message: tungstenite::Message) -> Option<TransportEvent> {
    use tungstenite::protocol::frame::coding::{Data, OpCode};

    match message {
        tungstenite::Message::Text(text) => Some(TransportEvent::Text(text.as_str().to_owned())),
        tungstenite::Message::Binary(data) => Some(TransportEvent::Binary { len: data.len() }),
        tungstenite::Message::Ping(_) => Some(TransportEvent::Ping),
        tungstenite::Message::Pong(_) => Some(TransportEvent::Pong),
        tungstenite::Message::Close(frame) => {
            if let Some(cf) = frame {
                tracing::info!(code = %cf.code, reason = %cf.reason, "websocket close frame received");
            }
            Some(TransportEvent::Disconnected)
        }
        tungstenite::Message::Frame(frame) => {
            let header = frame.header();
            match (header.opcode, header.is_final) {
                (OpCode::Data(Data::Text), _) => Some(TransportEvent::FragmentStart { binary: false }),
                (OpCode::Data(Data::Binary), _) => Some(TransportEvent::FragmentStart { binary: true }),
                (OpCode::Data(Data::Continue), true) => Some(TransportEvent::FragmentFin),
                (OpCode::Data(Data::Continue), false) => Some(TransportEvent::Fragment),
                _ => None,
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers() -> HandshakeHeaders {
        HandshakeHeaders {
            firmware_version: "1.0.0".into(),
            device_token: SecretString::from("tok".to_string()),
        }
    }

    #[test]
    fn begin_without_runtime_reports_failure() {
        let mut transport = WebSocketTransport::new();
        let url = Url::parse("wss://gw.example/1/ws/device").unwrap();

        transport.begin(&url, &headers());

        assert!(matches!(transport.poll_event(), Some(TransportEvent::Error(_))));
        assert_eq!(transport.poll_event(), Some(TransportEvent::Disconnected));
        assert_eq!(transport.poll_event(), None);
    }

    #[test]
    fn send_before_begin_is_rejected() {
        let mut transport = WebSocketTransport::new();
        let err = transport.send_text("{}").unwrap_err();
        assert!(matches!(err, Error::WebSocketNotConnected));
    }

    #[test]
    fn poll_before_begin_is_empty() {
        let mut transport = WebSocketTransport::new();
        assert_eq!(transport.poll_event(), None);
        transport.disconnect();
        assert_eq!(transport.poll_event(), None);
    }

    #[test]
    fn text_and_control_frames_translate() {
        assert_eq!(
            event_for(tungstenite::Message::Text("hi".into())),
            Some(TransportEvent::Text("hi".into()))
        );
        assert_eq!(
            event_for(tungstenite::Message::Binary(vec![1, 2, 3].into())),
            Some(TransportEvent::Binary { len: 3 })
        );
        assert_eq!(
            event_for(tungstenite::Message::Ping(Vec::new().into())),
            Some(TransportEvent::Ping)
        );
        assert_eq!(
            event_for(tungstenite::Message::Close(None)),
            Some(TransportEvent::Disconnected)
        );
    }
}
