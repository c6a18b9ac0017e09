//! Connection lifecycle state machine
//!
//! # Architecture
//!
//! ```text
//!   API commands ──┐
//!   transport ─────┤                       ┌──> ObserverRegistry (per-subscriber callbacks)
//!   timers ────────┼──> mailbox ──> handle ┤
//!   reachability ──┘                       └──> LifecycleBroadcaster (app-wide signals)
//! ```
//!
//! The machine is plain synchronous code: it never awaits and never spawns
//! except through its [`TimerScheduler`]. The task owning it feeds it one
//! [`Input`] at a time, so every notification for one transition is
//! delivered before the next input is looked at.
//!
//! State only changes through [`ConnectionStateMachine::set_state`], which
//! decides whether subscribers hear about the change, publishes the atomic
//! mirror and drives the debounced lifecycle signals.

use super::command::{Command, Input};
use super::config::ManagerConfig;
use super::connection_state::{AtomicConnectionState, ConnectionState};
use super::credential::Credential;
use super::lifecycle::{LifecycleBroadcaster, LifecycleSignal};
use super::registry::{ConnectionObserver, ConnectionToken, DataToken, ObserverRegistry};
use super::request::RequestBuilder;
use super::timers::{TimerKind, TimerScheduler, TimerSlots};
use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Timings the machine applies itself
///
/// The reconnect delay is not here: it comes from the
/// [`ReconnectionStrategy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineTiming {
    pub watchdog_timeout: Duration,
    pub truly_lost_after: Duration,
    pub expiry_skew: Duration,
}

impl Default for MachineTiming {
    fn default() -> Self {
        Self {
            watchdog_timeout: Duration::from_secs(5),
            truly_lost_after: Duration::from_secs(10),
            expiry_skew: Duration::ZERO,
        }
    }
}

impl From<&ManagerConfig> for MachineTiming {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            watchdog_timeout: config.timing.watchdog_timeout(),
            truly_lost_after: config.timing.truly_lost_after(),
            expiry_skew: config.expiry_skew(),
        }
    }
}

/// Pluggable parts of the machine
pub struct Collaborators {
    pub request_builder: Arc<dyn RequestBuilder>,
    pub transport_factory: Arc<dyn TransportFactory>,
    pub reachability_factory: Arc<dyn ReachabilityFactory>,
    pub reconnect_strategy: Box<dyn ReconnectionStrategy>,
    pub scheduler: Box<dyn TimerScheduler>,
}

pub struct ConnectionStateMachine {
    state: ConnectionState,
    mirror: Arc<AtomicConnectionState>,
    credential: Credential,
    registry: ObserverRegistry,
    lifecycle: LifecycleBroadcaster,
    timers: TimerSlots,
    timing: MachineTiming,

    request_builder: Arc<dyn RequestBuilder>,
    transport_factory: Arc<dyn TransportFactory>,
    reachability_factory: Arc<dyn ReachabilityFactory>,
    reconnect_strategy: Box<dyn ReconnectionStrategy>,
    scheduler: Box<dyn TimerScheduler>,

    mailbox: UnboundedSender<Input>,
    transport: Option<Box<dyn Transport>>,
    reachability: Option<Box<dyn ReachabilityMonitor>>,
    /// Bumped on every transport creation and teardown
    generation: u64,
    reconnect_attempt: usize,
}

impl ConnectionStateMachine {
    /// Create the machine in `Disconnected`
    ///
    /// A usable credential creates the transport right away (without
    /// opening it); an empty or expired one defers creation to the first
    /// `connect`/`update`.
    pub fn new(
        credential: Credential,
        collaborators: Collaborators,
        timing: MachineTiming,
        mirror: Arc<AtomicConnectionState>,
        lifecycle: LifecycleBroadcaster,
        mailbox: UnboundedSender<Input>,
    ) -> Self {
        mirror.set(ConnectionState::Disconnected);

        let mut machine = Self {
            state: ConnectionState::Disconnected,
            mirror,
            credential,
            registry: ObserverRegistry::new(),
            lifecycle,
            timers: TimerSlots::new(),
            timing,
            request_builder: collaborators.request_builder,
            transport_factory: collaborators.transport_factory,
            reachability_factory: collaborators.reachability_factory,
            reconnect_strategy: collaborators.reconnect_strategy,
            scheduler: collaborators.scheduler,
            mailbox,
            transport: None,
            reachability: None,
            generation: 0,
            reconnect_attempt: 0,
        };

        if machine.credential.is_usable() {
            machine.create_transport();
        }

        machine
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Generation of the current (or last torn down) transport
    pub fn transport_generation(&self) -> u64 {
        self.generation
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    pub fn is_timer_pending(&self, kind: TimerKind) -> bool {
        self.timers.is_pending(kind)
    }

    /// Process one input. Returns false once the owning task should stop.
    pub fn handle(&mut self, input: Input) -> bool {
        match input {
            Input::Command(command) => return self.handle_command(command),
            Input::Transport { generation, event } => {
                if generation != self.generation {
                    debug!(
                        "Dropping {:?} from stale transport generation {} (current {})",
                        event, generation, self.generation
                    );
                } else {
                    self.handle_transport_event(event);
                }
            }
            Input::TimerFired { kind, id } => {
                if self.timers.take_fired(kind, id) {
                    self.handle_timer(kind);
                } else {
                    debug!("Ignoring stale {} timer #{}", kind, id);
                }
            }
            Input::HostReachable { generation } => {
                if generation != self.generation {
                    debug!("Ignoring reachability change from stale monitor");
                } else {
                    self.handle_reachable();
                }
            }
        }
        true
    }

    // ----------------------------------------------------------------
    // Commands
    // ----------------------------------------------------------------

    fn handle_command(&mut self, command: Command) -> bool {
        debug!("Command: {:?} | state: {}", command, self.state);

        match command {
            Command::Connect {
                credential,
                token,
                observer,
            } => self.connect(credential, token, observer),
            Command::Disconnect { forced } => self.disconnect(forced),
            Command::Reconnect => self.reconnect(),
            Command::Send {
                payload,
                on_complete,
            } => match self.transport.as_mut() {
                Some(transport) => transport.send(payload, on_complete),
                None => warn!(
                    "No transport initialized, dropping {} bytes",
                    payload.len()
                ),
            },
            Command::ReceiveData { token, observer } => {
                self.registry.register_data(token, observer);
            }
            Command::Update {
                credential,
                needs_reconnect,
                reconnect_manually,
            } => self.update(credential, needs_reconnect, reconnect_manually),
            Command::UnregisterConnection(token) => {
                if !self.registry.unregister_connection(token) {
                    debug!("{} was not registered", token);
                }
            }
            Command::UnregisterData(token) => {
                if !self.registry.unregister_data(token) {
                    debug!("{} was not registered", token);
                }
            }
            Command::UnregisterAndDisconnectIfPossible {
                connection_tokens,
                data_token,
            } => self.unregister_and_disconnect_if_possible(connection_tokens, data_token),
            Command::Close => self.close(),
            Command::Shutdown(reply) => {
                self.close();
                let _ = reply.send(self.state);
                return false;
            }
        }
        true
    }

    fn connect(&mut self, credential: Credential, token: ConnectionToken, observer: ConnectionObserver) {
        self.registry.register_connection(token, observer);
        self.update(credential, false, false);

        match self.state {
            ConnectionState::Closed | ConnectionState::Disconnected => {
                self.set_state(ConnectionState::Connecting);
                self.open_transport();
            }
            ConnectionState::Connected | ConnectionState::Connecting => {
                self.registry.notify_one(token, self.state);
            }
            ConnectionState::ConnectionLost { .. } => {
                self.open_transport();
            }
        }
    }

    fn disconnect(&mut self, forced: bool) {
        self.timers.cancel(TimerKind::Reconnect);
        self.timers.cancel(TimerKind::Watchdog);
        self.set_state(ConnectionState::Disconnected);

        if forced {
            self.force_teardown();
        } else if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
    }

    fn reconnect(&mut self) {
        info!("Reconnect requested | connected: {}", self.is_connected());

        self.recreate_transport();
        self.timers.cancel(TimerKind::Reconnect);

        // The watchdog, then the reconnect timer, drives the next open
        if !self.is_connected() {
            self.timers.arm(
                self.scheduler.as_mut(),
                TimerKind::Watchdog,
                self.timing.watchdog_timeout,
            );
            self.set_state(ConnectionState::Connecting);
        }
    }

    fn update(&mut self, credential: Credential, needs_reconnect: bool, reconnect_manually: bool) {
        self.credential = credential;
        self.recreate_transport();

        debug!(
            "Credential updated | needs reconnect: {} | reconnect manually: {}",
            needs_reconnect, reconnect_manually
        );

        if needs_reconnect {
            if reconnect_manually {
                self.reconnect();
            } else {
                self.open_transport();
            }
        }
    }

    fn unregister_and_disconnect_if_possible(
        &mut self,
        connection_tokens: Vec<ConnectionToken>,
        data_token: Option<DataToken>,
    ) {
        for token in connection_tokens {
            self.registry.unregister_connection(token);
        }
        if let Some(token) = data_token {
            self.registry.unregister_data(token);
        }

        if self.registry.is_empty() {
            info!("Last subscriber gone, closing connection");
            self.close();
        } else {
            debug!(
                "Keeping connection open for {} state and {} data subscribers",
                self.registry.connection_count(),
                self.registry.data_count()
            );
        }
    }

    fn close(&mut self) {
        self.set_state(ConnectionState::Closed);
        self.registry.clear();
        self.timers.cancel_all();
        self.force_teardown();
    }

    // ----------------------------------------------------------------
    // Transport events
    // ----------------------------------------------------------------

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                debug!("Transport connected | previous state: {}", self.state);
                match self.state {
                    ConnectionState::Closed | ConnectionState::Disconnected => {
                        debug!("Ignoring transport connect while {}", self.state);
                    }
                    _ => {
                        self.timers.cancel(TimerKind::Watchdog);
                        self.timers.cancel(TimerKind::Reconnect);
                        self.set_state(ConnectionState::Connected);
                    }
                }
            }
            TransportEvent::Disconnected { reason, code } => {
                debug!(
                    "Transport disconnected | reason: {} | code: {:?} | previous state: {}",
                    reason, code, self.state
                );
                self.handle_disconnected();
            }
            TransportEvent::Cancelled => {
                debug!("Transport cancelled");
                self.handle_disconnected();
            }
            TransportEvent::Data(payload) => {
                debug!(
                    "Transport data: {} bytes | state: {} | listeners: {}",
                    payload.len(),
                    self.state,
                    self.registry.data_count()
                );
                self.timers.cancel(TimerKind::Watchdog);
                self.registry.notify_data(&payload);
            }
            TransportEvent::Text(text) => {
                debug!("Transport text frame: {}", text);
                self.timers.cancel(TimerKind::Watchdog);
            }
            TransportEvent::Ping | TransportEvent::Pong => {
                self.timers.cancel(TimerKind::Watchdog);
                self.set_state(ConnectionState::Connected);
            }
            TransportEvent::ViabilityChanged(viable) => {
                debug!(
                    "Transport viability changed: {} | connected: {}",
                    viable,
                    self.is_connected()
                );
                if !viable || self.is_connected() {
                    self.timers.arm(
                        self.scheduler.as_mut(),
                        TimerKind::Watchdog,
                        self.timing.watchdog_timeout,
                    );
                    if let Some(transport) = self.transport.as_mut() {
                        transport.ping();
                    }
                }
            }
            TransportEvent::ReconnectSuggested(should_reconnect) => {
                debug!("Transport suggests reconnect: {}", should_reconnect);
                if should_reconnect {
                    self.timers.cancel(TimerKind::Watchdog);
                    self.timers.cancel(TimerKind::Reconnect);
                    self.force_teardown();
                    self.set_state(ConnectionState::Connecting);
                    self.recreate_transport();
                    self.open_transport();
                }
            }
            TransportEvent::Error(Some(message)) => error!("Transport error: {}", message),
            TransportEvent::Error(None) => error!("Transport error: unknown"),
        }
    }

    /// Shared by transport disconnects and the watchdog
    fn handle_disconnected(&mut self) {
        if self.state.is_stopped() {
            debug!("Already {}, ignoring disconnect", self.state);
            return;
        }

        self.timers.cancel(TimerKind::Watchdog);

        let needs_credential_refresh = self.credential_expired();
        self.set_state(ConnectionState::ConnectionLost {
            needs_credential_refresh,
        });

        if needs_credential_refresh {
            info!("Connection lost with an expired credential, waiting for reachability");
            self.arm_reachability();
        } else {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        match self.reconnect_strategy.next_delay(self.reconnect_attempt) {
            Some(delay) => {
                self.reconnect_attempt += 1;
                info!(
                    "Reconnecting in {:?} (attempt {})",
                    delay, self.reconnect_attempt
                );
                self.timers
                    .arm(self.scheduler.as_mut(), TimerKind::Reconnect, delay);
            }
            None => warn!(
                "Reconnection strategy exhausted after {} attempts, staying disconnected",
                self.reconnect_attempt
            ),
        }
    }

    // ----------------------------------------------------------------
    // Timers and reachability
    // ----------------------------------------------------------------

    fn handle_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Reconnect => {
                if self.state.is_stopped() {
                    debug!("Reconnect timer fired while {}, skipping", self.state);
                } else {
                    self.open_transport();
                }
            }
            TimerKind::Watchdog => {
                warn!("No transport activity before the watchdog fired, presuming the connection dead");
                self.handle_disconnected();
            }
            TimerKind::Debounce => {
                if !self.is_connected() {
                    self.lifecycle.emit(LifecycleSignal::ConnectionTrulyLost);
                }
            }
        }
    }

    fn arm_reachability(&mut self) {
        match self.reachability.as_mut() {
            Some(monitor) if monitor.is_armed() => {}
            Some(monitor) => {
                debug!("Arming reachability monitor");
                monitor.arm();
            }
            None => debug!("No reachability monitor available"),
        }
    }

    fn handle_reachable(&mut self) {
        if let Some(monitor) = self.reachability.as_mut() {
            monitor.disarm();
        }

        let needs_credential_refresh = self.credential_expired();
        debug!(
            "Host reachable again | needs credential refresh: {}",
            needs_credential_refresh
        );

        if !needs_credential_refresh || self.state.is_stopped() {
            return;
        }

        let lost = ConnectionState::ConnectionLost {
            needs_credential_refresh: true,
        };
        if self.state == lost {
            // Same value, announced again so callers can prompt for a new credential
            self.registry.notify_connection(self.state);
        } else {
            self.set_state(lost);
        }
    }

    // ----------------------------------------------------------------
    // State
    // ----------------------------------------------------------------

    fn set_state(&mut self, next: ConnectionState) {
        let previous = self.state;
        if !previous.should_notify(&next) {
            return;
        }

        self.state = next;
        self.mirror.set(next);
        debug!("Connection state: {} -> {}", previous, next);

        if next.is_connected() {
            self.reconnect_attempt = 0;
            self.reconnect_strategy.reset();
        }

        self.announce_lifecycle(previous, next);
        self.registry.notify_connection(next);
    }

    fn announce_lifecycle(&mut self, previous: ConnectionState, next: ConnectionState) {
        if previous.same_phase(&next) {
            return;
        }

        match next {
            ConnectionState::Closed | ConnectionState::Disconnected => {
                self.timers.cancel(TimerKind::Debounce);
                self.lifecycle.emit(LifecycleSignal::Disconnected);
            }
            ConnectionState::Connected => {
                self.timers.cancel(TimerKind::Debounce);
                self.lifecycle.emit(LifecycleSignal::Connected);
            }
            ConnectionState::Connecting => {}
            ConnectionState::ConnectionLost { .. } => {
                if self.timers.is_pending(TimerKind::Debounce) {
                    return;
                }
                self.lifecycle.emit(LifecycleSignal::StartReconnecting);
                self.timers.arm(
                    self.scheduler.as_mut(),
                    TimerKind::Debounce,
                    self.timing.truly_lost_after,
                );
            }
        }
    }

    fn credential_expired(&self) -> bool {
        self.credential.is_expired_with_skew(self.timing.expiry_skew)
    }

    // ----------------------------------------------------------------
    // Transport ownership
    // ----------------------------------------------------------------

    fn create_transport(&mut self) {
        self.generation += 1;

        let request = self.request_builder.build(&self.credential);
        let host = request.host.clone();

        debug!(
            "Creating transport generation {} for {}",
            self.generation, request.url
        );

        let sink = TransportEventSink::new(self.generation, self.mailbox.clone());
        self.transport = Some(self.transport_factory.create(request, sink));

        let sink = ReachabilitySink::new(self.generation, self.mailbox.clone());
        self.reachability = Some(self.reachability_factory.create(&host, sink));
    }

    /// Create the transport if there is none, otherwise refresh its request
    fn recreate_transport(&mut self) {
        if self.transport.is_none() {
            self.create_transport();
        } else {
            let request = self.request_builder.build(&self.credential);
            if let Some(transport) = self.transport.as_mut() {
                transport.set_request(request);
            }
        }
    }

    fn force_teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!("Tearing down transport generation {}", self.generation);
            transport.force_close();
        }
        if let Some(mut monitor) = self.reachability.take() {
            monitor.disarm();
        }
        self.generation += 1;
    }

    fn open_transport(&mut self) {
        match self.transport.as_mut() {
            Some(transport) => transport.open(),
            None => warn!("No transport initialized, cannot open connection"),
        }
    }
}
