// ── Gateway session ──
//
// One realtime connection to an assigned gateway, modelled as an explicit
// state machine over a pollable transport:
//
//   Disconnected --connect()--------> Connecting
//   Connecting   --Connected event--> Connected     (notify true, heartbeat)
//   Connected    --disconnect()-----> Disconnecting
//   *            --Disconnected ev.-> Disconnected  (notify false if it was up)
//
// A session is never reused across network loss or credential changes;
// the manager drops it and builds a new one.

use std::sync::Arc;
use std::time::Duration;

use gatelink_api::{HandshakeHeaders, RealtimeTransport, TransportEvent};
use serde::Serialize;
use strum::Display;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::clock::Clock;
use crate::config::{GATEWAY_WS_PATH, GATEWAY_WS_PORT};
use crate::dispatch::MessageDispatcher;
use crate::observers::ConnectionObservers;

// ── SessionState ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

// ── GatewayEndpoint ──────────────────────────────────────────────

/// Realtime gateway the backend assigned to this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub fqdn: String,
    pub country: String,
}

impl GatewayEndpoint {
    pub fn new(fqdn: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            country: country.into(),
        }
    }

    /// `wss://{fqdn}:443/1/ws/device`
    pub fn websocket_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "wss://{}:{GATEWAY_WS_PORT}{GATEWAY_WS_PATH}",
            self.fqdn
        ))
    }
}

/// Keep-alive frame, `{"requestType":0}` on the wire.
#[derive(Serialize)]
struct KeepAlive {
    #[serde(rename = "requestType")]
    request_type: u8,
}

// ── Session ──────────────────────────────────────────────────────

pub struct Session {
    state: SessionState,
    transport: Box<dyn RealtimeTransport>,
    headers: HandshakeHeaders,
    endpoint: Option<GatewayEndpoint>,
    last_heartbeat_ms: u64,
    heartbeat_interval_ms: u64,
    clock: Arc<dyn Clock>,
    dispatcher: MessageDispatcher,
    observers: ConnectionObservers,
}

impl Session {
    /// Build an idle session. Nothing touches the network until
    /// [`connect`](Self::connect).
    pub fn new(
        transport: Box<dyn RealtimeTransport>,
        headers: HandshakeHeaders,
        heartbeat_interval: Duration,
        clock: Arc<dyn Clock>,
        dispatcher: MessageDispatcher,
        observers: ConnectionObservers,
    ) -> Self {
        debug!("creating gateway session");
        Self {
            state: SessionState::Disconnected,
            transport,
            headers,
            endpoint: None,
            last_heartbeat_ms: 0,
            heartbeat_interval_ms: u64::try_from(heartbeat_interval.as_millis())
                .unwrap_or(u64::MAX),
            clock,
            dispatcher,
            observers,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Gateway of the current or most recent connection attempt.
    pub fn endpoint(&self) -> Option<&GatewayEndpoint> {
        self.endpoint.as_ref()
    }

    pub fn last_heartbeat_ms(&self) -> u64 {
        self.last_heartbeat_ms
    }

    /// Start a handshake. No-op unless `Disconnected`.
    pub fn connect(&mut self, endpoint: GatewayEndpoint) {
        if self.state != SessionState::Disconnected {
            debug!(state = %self.state, "connect ignored, session not disconnected");
            return;
        }

        let url = match endpoint.websocket_url() {
            Ok(url) => url,
            Err(e) => {
                error!(fqdn = %endpoint.fqdn, error = %e, "invalid gateway endpoint");
                return;
            }
        };

        self.state = SessionState::Connecting;
        self.transport.begin(&url, &self.headers);
        self.endpoint = Some(endpoint);
    }

    /// Start a graceful close. No-op unless `Connected`; the transport's
    /// `Disconnected` event completes the transition.
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Connected {
            debug!(state = %self.state, "disconnect ignored, session not connected");
            return;
        }

        self.state = SessionState::Disconnecting;
        self.transport.disconnect();
    }

    /// Per-tick work. Returns `true` while the session is busy (handshake,
    /// teardown, or live connection) and `false` once it sits idle in
    /// `Disconnected`, which is the caller's cue to reconnect.
    pub fn tick(&mut self) -> bool {
        if self.state == SessionState::Disconnected {
            return false;
        }

        while let Some(event) = self.transport.poll_event() {
            self.handle_event(event);
        }

        if self.state != SessionState::Connected {
            return true;
        }

        let now = self.clock.now_ms();
        if now.saturating_sub(self.last_heartbeat_ms) >= self.heartbeat_interval_ms {
            self.send_keep_alive();
            self.last_heartbeat_ms = now;
        }

        true
    }

    /// Apply one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!(
                    fqdn = self.endpoint.as_ref().map_or("", |e| e.fqdn.as_str()),
                    "connected to gateway"
                );
                self.state = SessionState::Connected;
                self.observers.notify(true);
                self.send_keep_alive();
                self.last_heartbeat_ms = self.clock.now_ms();
            }
            TransportEvent::Disconnected => {
                let was_up = matches!(
                    self.state,
                    SessionState::Connected | SessionState::Disconnecting
                );
                self.state = SessionState::Disconnected;
                if was_up {
                    info!("disconnected from gateway");
                    self.observers.notify(false);
                } else {
                    debug!("gateway handshake did not complete");
                }
            }
            TransportEvent::Text(frame) => {
                if self.state == SessionState::Connected {
                    self.dispatcher.dispatch(&frame);
                } else {
                    debug!(state = %self.state, "dropping text frame outside connected state");
                }
            }
            TransportEvent::Binary { len } => {
                error!(len, "received binary frame from gateway, this is not supported");
            }
            TransportEvent::FragmentStart { binary: true } => {
                error!("received binary fragment start from gateway, this is not supported");
            }
            TransportEvent::FragmentStart { binary: false }
            | TransportEvent::Fragment
            | TransportEvent::FragmentFin
            | TransportEvent::Ping
            | TransportEvent::Pong => {
                debug!(?event, "transport housekeeping");
            }
            TransportEvent::Error(message) => {
                error!(%message, "received error from gateway transport");
            }
        }
    }

    fn send_keep_alive(&mut self) {
        let frame = match serde_json::to_string(&KeepAlive { request_type: 0 }) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "failed to encode keep-alive");
                return;
            }
        };

        debug!("sending keep-alive");
        if let Err(e) = self.transport.send_text(&frame) {
            warn!(error = %e, "keep-alive not sent");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(state = %self.state, "destroying gateway session");
        self.transport.disconnect();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .field("last_heartbeat_ms", &self.last_heartbeat_ms)
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use secrecy::SecretString;

    use super::*;
    use crate::clock::ManualClock;
    use crate::dispatch::{CommandExecutor, FeatureToggle, ShockerCommand};
    use crate::error::CommandRejected;

    #[derive(Default)]
    struct Wire {
        pending: VecDeque<TransportEvent>,
        sent: Vec<String>,
        begun: Vec<Url>,
        disconnects: usize,
    }

    struct ScriptedTransport(Arc<Mutex<Wire>>);

    impl RealtimeTransport for ScriptedTransport {
        fn begin(&mut self, url: &Url, _headers: &HandshakeHeaders) {
            self.0.lock().unwrap().begun.push(url.clone());
        }

        fn send_text(&mut self, text: &str) -> Result<(), gatelink_api::Error> {
            self.0.lock().unwrap().sent.push(text.to_owned());
            Ok(())
        }

        fn poll_event(&mut self) -> Option<TransportEvent> {
            self.0.lock().unwrap().pending.pop_front()
        }

        fn disconnect(&mut self) {
            self.0.lock().unwrap().disconnects += 1;
        }
    }

    #[derive(Default)]
    struct CountingExecutor(Mutex<usize>);

    impl CommandExecutor for CountingExecutor {
        fn execute(&self, _command: &ShockerCommand) -> Result<(), CommandRejected> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct NoToggle;

    impl FeatureToggle for NoToggle {
        fn set_always_enabled(&self, _enabled: bool) {}
    }

    struct Fixture {
        session: Session,
        wire: Arc<Mutex<Wire>>,
        clock: ManualClock,
        executor: Arc<CountingExecutor>,
        notified: Arc<Mutex<Vec<bool>>>,
    }

    fn fixture() -> Fixture {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let clock = ManualClock::new(1_000);
        let executor = Arc::new(CountingExecutor::default());
        let observers = ConnectionObservers::new();
        let notified = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notified);
        observers.register(move |up| sink.lock().unwrap().push(up));

        let session = Session::new(
            Box::new(ScriptedTransport(Arc::clone(&wire))),
            HandshakeHeaders {
                firmware_version: "1.0.0".into(),
                device_token: SecretString::from("tok".to_string()),
            },
            Duration::from_secs(30),
            Arc::new(clock.clone()),
            MessageDispatcher::new(executor.clone(), Arc::new(NoToggle)),
            observers,
        );

        Fixture {
            session,
            wire,
            clock,
            executor,
            notified,
        }
    }

    impl Fixture {
        fn push(&self, event: TransportEvent) {
            self.wire.lock().unwrap().pending.push_back(event);
        }

        fn sent(&self) -> usize {
            self.wire.lock().unwrap().sent.len()
        }

        fn connected(mut self) -> Self {
            self.session.connect(GatewayEndpoint::new("de1.gw.example", "DE"));
            self.push(TransportEvent::Connected);
            assert!(self.session.tick());
            self
        }

        /// For a session already in `Connecting`.
        fn connected_after_connect(mut self) -> Self {
            self.push(TransportEvent::Connected);
            self.session.tick();
            self
        }
    }

    #[test]
    fn idle_session_is_not_busy() {
        let mut fx = fixture();
        assert_eq!(fx.session.state(), SessionState::Disconnected);
        assert!(!fx.session.tick());
    }

    #[test]
    fn connect_starts_handshake_to_gateway_path() {
        let mut fx = fixture();
        fx.session.connect(GatewayEndpoint::new("de1.gw.example", "DE"));

        assert_eq!(fx.session.state(), SessionState::Connecting);
        let begun = fx.wire.lock().unwrap().begun.clone();
        assert_eq!(begun.len(), 1);
        assert_eq!(begun[0].host_str(), Some("de1.gw.example"));
        assert_eq!(begun[0].path(), "/1/ws/device");
        assert!(fx.session.tick(), "handshake in progress is busy");
    }

    #[test]
    fn connect_is_noop_unless_disconnected() {
        let mut fx = fixture();
        fx.session.connect(GatewayEndpoint::new("a.gw.example", "DE"));
        fx.session.connect(GatewayEndpoint::new("b.gw.example", "US"));

        assert_eq!(fx.session.state(), SessionState::Connecting);
        assert_eq!(fx.wire.lock().unwrap().begun.len(), 1);
        assert_eq!(fx.session.endpoint().unwrap().fqdn, "a.gw.example");
    }

    #[test]
    fn disconnect_is_noop_unless_connected() {
        let mut fx = fixture();
        fx.session.disconnect();
        assert_eq!(fx.session.state(), SessionState::Disconnected);

        fx.session.connect(GatewayEndpoint::new("a.gw.example", "DE"));
        fx.session.disconnect();
        assert_eq!(fx.session.state(), SessionState::Connecting);
        assert_eq!(fx.wire.lock().unwrap().disconnects, 0);
    }

    #[test]
    fn connected_event_notifies_and_sends_heartbeat() {
        let fx = fixture().connected();

        assert!(fx.session.is_connected());
        assert_eq!(*fx.notified.lock().unwrap(), vec![true]);
        let sent = fx.wire.lock().unwrap().sent.clone();
        assert_eq!(sent.len(), 1);
        let frame: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(frame, serde_json::json!({ "requestType": 0 }));
    }

    #[test]
    fn heartbeat_waits_full_interval() {
        let mut fx = fixture().connected();
        assert_eq!(fx.sent(), 1);

        fx.clock.advance(29_999);
        assert!(fx.session.tick());
        assert_eq!(fx.sent(), 1, "no heartbeat before 30s");

        fx.clock.advance(1);
        assert!(fx.session.tick());
        assert_eq!(fx.sent(), 2, "exactly one heartbeat at 30s");

        assert!(fx.session.tick());
        assert_eq!(fx.sent(), 2);
        assert_eq!(fx.session.last_heartbeat_ms(), 31_000);
    }

    #[test]
    fn graceful_disconnect_completes_on_transport_event() {
        let mut fx = fixture().connected();

        fx.session.disconnect();
        assert_eq!(fx.session.state(), SessionState::Disconnecting);
        assert_eq!(fx.wire.lock().unwrap().disconnects, 1);
        assert!(fx.session.tick(), "teardown in progress is busy");

        fx.push(TransportEvent::Disconnected);
        assert!(fx.session.tick());
        assert_eq!(fx.session.state(), SessionState::Disconnected);
        assert_eq!(*fx.notified.lock().unwrap(), vec![true, false]);
        assert!(!fx.session.tick());
    }

    #[test]
    fn failed_handshake_does_not_notify() {
        let mut fx = fixture();
        fx.session.connect(GatewayEndpoint::new("a.gw.example", "DE"));
        fx.push(TransportEvent::Error("refused".into()));
        fx.push(TransportEvent::Disconnected);

        fx.session.tick();

        assert_eq!(fx.session.state(), SessionState::Disconnected);
        assert!(fx.notified.lock().unwrap().is_empty());
    }

    #[test]
    fn text_frames_reach_dispatcher_only_when_connected() {
        let mut fx = fixture();
        let frame = r#"{"ResponseType":0,"Data":[{"Id":1,"Type":1,"Intensity":5,"Duration":100,"Model":0}]}"#;

        fx.session.connect(GatewayEndpoint::new("a.gw.example", "DE"));
        fx.push(TransportEvent::Text(frame.into()));
        fx.session.tick();
        assert_eq!(*fx.executor.0.lock().unwrap(), 0);

        let mut fx = fx.connected_after_connect();
        fx.push(TransportEvent::Text(frame.into()));
        fx.session.tick();
        assert_eq!(*fx.executor.0.lock().unwrap(), 1);
    }

    #[test]
    fn binary_and_housekeeping_frames_keep_connection_open() {
        let mut fx = fixture().connected();
        for event in [
            TransportEvent::Binary { len: 4 },
            TransportEvent::FragmentStart { binary: true },
            TransportEvent::FragmentStart { binary: false },
            TransportEvent::Fragment,
            TransportEvent::FragmentFin,
            TransportEvent::Ping,
            TransportEvent::Pong,
            TransportEvent::Error("hiccup".into()),
        ] {
            fx.push(event);
        }

        assert!(fx.session.tick());
        assert!(fx.session.is_connected());
        assert_eq!(*fx.executor.0.lock().unwrap(), 0);
    }

    #[test]
    fn drop_requests_transport_disconnect() {
        let fx = fixture();
        let wire = Arc::clone(&fx.wire);
        drop(fx);
        assert_eq!(wire.lock().unwrap().disconnects, 1);
    }
}
