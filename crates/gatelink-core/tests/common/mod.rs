#![allow(clippy::unwrap_used, dead_code)]
// Shared fixtures for connection manager integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gatelink_api::{GatewayClient, HandshakeHeaders, RealtimeTransport, TransportEvent};
use gatelink_core::{
    CommandExecutor, CommandRejected, ConnectionManager, CredentialStore, FeatureToggle,
    GatewayConfig, ManualClock, MemoryCredentialStore, MessageDispatcher, ShockerCommand,
};
use secrecy::ExposeSecret;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "device-token";

// ── Scripted transport ──────────────────────────────────────────────

/// Everything the manager did to the transports it created, plus the
/// events queued for the current one.
#[derive(Default)]
pub struct Wire {
    pub created: usize,
    pub begun: Vec<Url>,
    pub tokens: Vec<String>,
    pub firmware: Vec<String>,
    pub sent: Vec<String>,
    pub pending: VecDeque<TransportEvent>,
    pub disconnects: usize,
}

struct ScriptedTransport(Arc<Mutex<Wire>>);

impl RealtimeTransport for ScriptedTransport {
    fn begin(&mut self, url: &Url, headers: &HandshakeHeaders) {
        let mut wire = self.0.lock().unwrap();
        wire.begun.push(url.clone());
        wire.tokens
            .push(headers.device_token.expose_secret().to_owned());
        wire.firmware.push(headers.firmware_version.clone());
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

// ── Host collaborators ──────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingExecutor(pub Mutex<Vec<ShockerCommand>>);

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, command: &ShockerCommand) -> Result<(), CommandRejected> {
        self.0.lock().unwrap().push(*command);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingToggle(pub Mutex<Vec<bool>>);

impl FeatureToggle for RecordingToggle {
    fn set_always_enabled(&self, enabled: bool) {
        self.0.lock().unwrap().push(enabled);
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub server: MockServer,
    pub manager: ConnectionManager,
    pub credentials: Arc<MemoryCredentialStore>,
    pub clock: ManualClock,
    pub wire: Arc<Mutex<Wire>>,
    pub executor: Arc<RecordingExecutor>,
    pub toggle: Arc<RecordingToggle>,
    pub notified: Arc<Mutex<Vec<bool>>>,
}

/// Manager against a fresh mock server. `token` seeds the credential store.
pub async fn harness(token: Option<&str>) -> Harness {
    let server = MockServer::start().await;

    let mut config = GatewayConfig::new(Url::parse(&server.uri()).unwrap());
    config.firmware_version = "1.2.3".into();
    config.timeout = Duration::from_secs(5);

    let credentials = Arc::new(match token {
        Some(token) => MemoryCredentialStore::with_credential(token),
        None => MemoryCredentialStore::new(),
    });
    let clock = ManualClock::new(100_000);
    let wire = Arc::new(Mutex::new(Wire::default()));
    let executor = Arc::new(RecordingExecutor::default());
    let toggle = Arc::new(RecordingToggle::default());

    let factory_wire = Arc::clone(&wire);
    let transports = Box::new(move || -> Box<dyn RealtimeTransport> {
        let mut wire = factory_wire.lock().unwrap();
        wire.created += 1;
        wire.pending.clear();
        Box::new(ScriptedTransport(Arc::clone(&factory_wire)))
    });

    let api = GatewayClient::new(config.api_url.clone(), &config.transport()).unwrap();
    let store: Arc<dyn CredentialStore> = credentials.clone();
    let manager = ConnectionManager::new(
        config,
        api,
        store,
        MessageDispatcher::new(executor.clone(), toggle.clone()),
        transports,
        Arc::new(clock.clone()),
    );

    let notified = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    manager.register_connected_changed_handler(move |up| sink.lock().unwrap().push(up));

    Harness {
        server,
        manager,
        credentials,
        clock,
        wire,
        executor,
        toggle,
        notified,
    }
}

impl Harness {
    pub fn push(&self, event: TransportEvent) {
        self.wire.lock().unwrap().pending.push_back(event);
    }

    pub fn begun(&self) -> usize {
        self.wire.lock().unwrap().begun.len()
    }

    pub fn created(&self) -> usize {
        self.wire.lock().unwrap().created
    }

    pub fn notified(&self) -> Vec<bool> {
        self.notified.lock().unwrap().clone()
    }

    pub fn stored_token(&self) -> Option<String> {
        self.credentials
            .credential()
            .map(|t| t.expose_secret().to_owned())
    }

    /// Drive the manager through verify, assign and the handshake.
    pub async fn connect(&mut self) {
        self.manager
            .handle_network_event(gatelink_core::NetworkEvent::Available);
        self.manager.tick().await;
        self.push(TransportEvent::Connected);
        self.manager.tick().await;
        assert!(self.manager.is_connected(), "harness failed to connect");
    }
}

// ── Mock backend ────────────────────────────────────────────────────

pub async fn mount_self_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/1/device/self"))
        .and(header("DeviceToken", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "",
            "data": {
                "id": "7b9c3e0a-1f2d-4e5a-9b8c-0d1e2f3a4b5c",
                "name": "bench-hub",
                "shockers": [
                    { "id": "0f3c2a10-5b6d-4e7f-8a9b-1c2d3e4f5a6b", "rfId": 4711, "model": 0 }
                ]
            }
        })))
        .mount(server)
        .await;
}

pub async fn mount_assign_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/1/device/assignLCG"))
        .and(header("DeviceToken", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "",
            "data": { "fqdn": "de1-gateway.example.net", "country": "DE" }
        })))
        .mount(server)
        .await;
}
