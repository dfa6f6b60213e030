// ── Connection manager ──
//
// The driving loop. Owns the connection flags, the single optional
// session and the retry gates, and is the only thing that mutates them.
// Hosts call `tick()` repeatedly and feed network changes in between;
// `run()` does both from one task.

use std::sync::Arc;
use std::time::Duration;

use gatelink_api::{
    DeviceSelf, GatewayClient, HandshakeHeaders, RealtimeTransport, WebSocketTransport,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::GatewayConfig;
use crate::credential::CredentialStore;
use crate::dispatch::MessageDispatcher;
use crate::error::CoreError;
use crate::flags::ConnectionFlags;
use crate::observers::{ConnectionObservers, HandlerId};
use crate::pairing::PairingClient;
use crate::session::{GatewayEndpoint, Session, SessionState};

// ── Host signals ─────────────────────────────────────────────────

/// Network availability as reported by the host's network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// An address was acquired.
    Available,
    /// The link or address is gone.
    Lost,
}

/// Builds one transport per session.
pub trait TransportFactory: Send {
    fn create(&mut self) -> Box<dyn RealtimeTransport>;
}

impl<F> TransportFactory for F
where
    F: FnMut() -> Box<dyn RealtimeTransport> + Send,
{
    fn create(&mut self) -> Box<dyn RealtimeTransport> {
        self()
    }
}

// ── Context ──────────────────────────────────────────────────────

/// All mutable connection state, in one place.
#[derive(Debug, Default)]
struct ManagerContext {
    flags: ConnectionFlags,
    session: Option<Session>,
    /// Last gateway assignment request. Survives network loss so the
    /// cooldown holds across reconnect cycles.
    last_gateway_attempt_ms: Option<u64>,
    /// Earliest time a transiently failed verification may be retried.
    verify_retry_at_ms: Option<u64>,
}

// ── ConnectionManager ────────────────────────────────────────────

pub struct ConnectionManager {
    config: GatewayConfig,
    pairing: PairingClient,
    dispatcher: MessageDispatcher,
    observers: ConnectionObservers,
    clock: Arc<dyn Clock>,
    transports: Box<dyn TransportFactory>,
    ctx: ManagerContext,
}

impl ConnectionManager {
    /// Assemble a manager from explicit parts. Starts with no network.
    pub fn new(
        config: GatewayConfig,
        api: GatewayClient,
        credentials: Arc<dyn CredentialStore>,
        dispatcher: MessageDispatcher,
        transports: Box<dyn TransportFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            pairing: PairingClient::new(api, credentials),
            dispatcher,
            observers: ConnectionObservers::new(),
            clock,
            transports,
            ctx: ManagerContext::default(),
        }
    }

    /// Production wiring: reqwest gateway client, websocket transport and
    /// the monotonic clock.
    pub fn from_config(
        config: GatewayConfig,
        credentials: Arc<dyn CredentialStore>,
        dispatcher: MessageDispatcher,
    ) -> Result<Self, CoreError> {
        let api = GatewayClient::new(config.api_url.clone(), &config.transport())?;
        let transports: Box<dyn TransportFactory> =
            Box::new(|| -> Box<dyn RealtimeTransport> { Box::new(WebSocketTransport::new()) });
        Ok(Self::new(
            config,
            api,
            credentials,
            dispatcher,
            transports,
            Arc::new(MonotonicClock::new()),
        ))
    }

    // ── Observer API ─────────────────────────────────────────────

    pub fn observers(&self) -> &ConnectionObservers {
        &self.observers
    }

    pub fn register_connected_changed_handler(
        &self,
        handler: impl Fn(bool) + Send + Sync + 'static,
    ) -> HandlerId {
        self.observers.register(handler)
    }

    pub fn unregister_connected_changed_handler(&self, id: HandlerId) {
        self.observers.unregister(id);
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.session.as_ref().is_some_and(Session::is_connected)
    }

    pub fn is_paired(&self) -> bool {
        self.ctx.flags.is_authenticated()
    }

    pub fn flags(&self) -> ConnectionFlags {
        self.ctx.flags
    }

    /// `None` when no session exists.
    pub fn session_state(&self) -> Option<SessionState> {
        self.ctx.session.as_ref().map(Session::state)
    }

    // ── Pairing ──────────────────────────────────────────────────

    /// Pair with a human-entered code. Tears down any current session.
    pub async fn pair(&mut self, code: u32) -> Result<(), CoreError> {
        if !self.ctx.flags.has_network() {
            return Err(CoreError::NoNetwork);
        }
        self.destroy_session();
        self.pairing.pair(&mut self.ctx.flags, code).await
    }

    /// Forget the credential and drop the session. Offline operation.
    pub fn unpair(&mut self) {
        self.pairing.unpair(&mut self.ctx.flags);
        self.destroy_session();
    }

    /// Gracefully close the live gateway connection. The session stays and
    /// reconnects on a later tick once the assignment cooldown allows.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.ctx.session.as_mut() {
            session.disconnect();
        }
    }

    /// Check the stored credential now, outside the tick cycle. Same
    /// consequences as the check a tick performs before building a session.
    pub async fn verify(&mut self) -> Result<DeviceSelf, CoreError> {
        let token = self
            .pairing
            .credentials()
            .credential()
            .ok_or(CoreError::NoCredential)?;
        self.pairing
            .verify_credential(&mut self.ctx.flags, &token)
            .await
    }

    // ── Host signals ─────────────────────────────────────────────

    pub fn handle_network_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Available => {
                debug!("network available");
                self.ctx.flags.set_network();
            }
            NetworkEvent::Lost => {
                debug!("network lost");
                self.ctx.flags.reset();
                self.ctx.verify_retry_at_ms = None;
                self.destroy_session();
            }
        }
    }

    // ── Driving loop ─────────────────────────────────────────────

    /// One pass of the orchestration loop. Never fails: every error is
    /// logged and retried on a later tick.
    pub async fn tick(&mut self) {
        if self.ctx.session.is_none() && !self.establish_session().await {
            return;
        }

        let Some(session) = self.ctx.session.as_mut() else {
            return;
        };

        if session.tick() {
            return;
        }

        self.connect_to_gateway().await;
    }

    /// Tick on `tick_interval` and apply network events until `cancel`
    /// fires or the event channel closes.
    pub async fn run(
        mut self,
        mut network: mpsc::Receiver<NetworkEvent>,
        tick_interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = network.recv() => match event {
                    Some(event) => self.handle_network_event(event),
                    None => break,
                },
                _ = ticker.tick() => self.tick().await,
            }
        }

        debug!("connection manager loop exiting");
        self.destroy_session();
    }

    // ── Internals ────────────────────────────────────────────────

    /// Verify the stored credential and build an idle session.
    /// Returns `false` when no session could be created this tick.
    async fn establish_session(&mut self) -> bool {
        if !self.ctx.flags.has_network() {
            return false;
        }

        let Some(token) = self.pairing.credentials().credential() else {
            return false;
        };

        let now = self.clock.now_ms();
        if self.ctx.verify_retry_at_ms.is_some_and(|at| now < at) {
            return false;
        }

        match self.pairing.verify_credential(&mut self.ctx.flags, &token).await {
            Ok(_) => {
                self.ctx.verify_retry_at_ms = None;
            }
            Err(e) if e.is_invalid_credential() => {
                self.ctx.verify_retry_at_ms = None;
                return false;
            }
            Err(e) => {
                debug!(error = %e, "credential verification deferred");
                self.ctx.verify_retry_at_ms =
                    Some(now.saturating_add(self.config.reconnect_cooldown_ms()));
                return false;
            }
        }

        debug!("device credential verified, creating session");

        let headers = HandshakeHeaders {
            firmware_version: self.config.firmware_version.clone(),
            device_token: token,
        };
        self.ctx.session = Some(Session::new(
            self.transports.create(),
            headers,
            self.config.heartbeat_interval,
            Arc::clone(&self.clock),
            self.dispatcher.clone(),
            self.observers.clone(),
        ));
        true
    }

    /// Ask the backend for a gateway and point the idle session at it.
    /// At most one request per cooldown window.
    async fn connect_to_gateway(&mut self) {
        let now = self.clock.now_ms();
        if let Some(last) = self.ctx.last_gateway_attempt_ms {
            if now.saturating_sub(last) < self.config.reconnect_cooldown_ms() {
                return;
            }
        }
        self.ctx.last_gateway_attempt_ms = Some(now);

        let Some(token) = self.pairing.credentials().credential() else {
            debug!("no device credential, cannot request a gateway");
            return;
        };

        let assignment = match self.pairing.api().assign_lcg(&token).await {
            Ok(assignment) => assignment,
            Err(e) if e.is_invalid_token() => {
                info!("gateway assignment rejected the device credential, clearing it");
                self.pairing.credentials().clear_credential();
                self.ctx.flags.clear_credential();
                self.destroy_session();
                return;
            }
            Err(e) => {
                warn!(error = %e, "error while fetching gateway assignment");
                return;
            }
        };

        let Some((fqdn, country)) = assignment.endpoint() else {
            error!("received invalid gateway assignment");
            return;
        };

        info!(fqdn, country, "connecting to assigned gateway");
        if let Some(session) = self.ctx.session.as_mut() {
            session.connect(GatewayEndpoint::new(fqdn, country));
        }
    }

    /// Drop the session unconditionally. Handlers hear about it if the
    /// session was up, since its transport events die with it.
    fn destroy_session(&mut self) {
        let Some(session) = self.ctx.session.take() else {
            return;
        };

        let was_up = matches!(
            session.state(),
            SessionState::Connected | SessionState::Disconnecting
        );
        drop(session);

        if was_up {
            self.observers.notify(false);
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("flags", &self.ctx.flags)
            .field("session", &self.ctx.session)
            .finish_non_exhaustive()
    }
}
