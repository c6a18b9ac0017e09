use crate::core::command::{Command, Input};
use crate::core::config::ManagerConfig;
use crate::core::connection_state::{AtomicConnectionState, ConnectionState};
use crate::core::credential::Credential;
use crate::core::lifecycle::{LifecycleBroadcaster, LifecycleSignal};
use crate::core::machine::{Collaborators, ConnectionStateMachine, MachineTiming};
use crate::core::registry::{ConnectionToken, DataToken};
use crate::net::{PollingReachability, WsTransportFactory};
use crate::traits::{LiveLinkError, Result, SendCompletion};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Shared {
    mailbox: UnboundedSender<Input>,
    state: Arc<AtomicConnectionState>,
    lifecycle: LifecycleBroadcaster,
    /// Shared by both token kinds so every handle is unique
    next_token: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Last handle gone: stop the task even if nobody called shutdown()
        let (reply, _) = oneshot::channel();
        let _ = self.mailbox.send(Input::Command(Command::Shutdown(reply)));
    }
}

/// Handle to one managed connection
///
/// Cheap to clone; all clones drive the same state machine. Every method
/// except [`shutdown`](Self::shutdown) enqueues work for the owning task
/// and returns immediately, so the effect of a call is visible once the
/// task processed it (observers are told about every state change).
///
/// # Example
/// ```ignore
/// let manager = livelink::builder()
///     .endpoint("wss://live.example.com/socket")
///     .transport(WsTransportFactory::new())
///     .build()?;
///
/// let token = manager.connect(credential, |state| {
///     if matches!(state, ConnectionState::ConnectionLost { needs_credential_refresh: true }) {
///         // fetch a new token, then call manager.update(..)
///     }
/// });
///
/// let data = manager.receive_data(|payload| println!("{} bytes", payload.len()));
/// manager.send(b"hello".to_vec(), None);
///
/// manager.unregister_and_disconnect_if_possible(Some(token), Some(data));
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Spawn the task owning the state machine
    pub(crate) fn start(
        credential: Credential,
        collaborators: Collaborators,
        timing: MachineTiming,
        mailbox: UnboundedSender<Input>,
        inbox: UnboundedReceiver<Input>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            LiveLinkError::Configuration(
                "connection manager must be built inside a tokio runtime".to_string(),
            )
        })?;

        let state = Arc::new(AtomicConnectionState::default());
        let lifecycle = LifecycleBroadcaster::new();

        // Entering the runtime so an eagerly created transport can spawn
        let machine = {
            let _guard = runtime.enter();
            ConnectionStateMachine::new(
                credential,
                collaborators,
                timing,
                Arc::clone(&state),
                lifecycle.clone(),
                mailbox.clone(),
            )
        };

        let task = runtime.spawn(run_state_machine(machine, inbox));

        Ok(Self {
            shared: Arc::new(Shared {
                mailbox,
                state,
                lifecycle,
                next_token: AtomicU64::new(1),
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// WebSocket manager wired from a loaded configuration
    ///
    /// Uses [`WsTransportFactory`] (with the configured heartbeat) and
    /// [`PollingReachability`] over TCP.
    pub fn websocket(config: &ManagerConfig, credential: Credential) -> Result<Self> {
        config
            .validate()
            .map_err(|e| LiveLinkError::Configuration(e.to_string()))?;

        crate::builder()
            .endpoint(config.endpoint.clone())
            .transport(WsTransportFactory::from_config(config))
            .reachability(PollingReachability::from_config(config))
            .config(config)
            .credential(credential)
            .build()
    }

    fn submit(&self, command: Command) {
        if let Err(rejected) = self.shared.mailbox.send(Input::Command(command)) {
            warn!("Connection manager stopped, dropping {:?}", rejected.0);
        }
    }

    fn next_token(&self) -> u64 {
        self.shared.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether the last published state is `Connected`
    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    /// Last state published by the owning task
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Subscribe to state changes and start connecting
    ///
    /// The credential replaces the current one. A new subscriber joining an
    /// already `Connecting`/`Connected` manager is told the current state
    /// once; otherwise it hears about the transition it caused.
    pub fn connect<F>(&self, credential: Credential, on_state: F) -> ConnectionToken
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let token = ConnectionToken(self.next_token());
        info!("Connect requested by {}", token);
        self.submit(Command::Connect {
            credential,
            token,
            observer: Arc::new(on_state),
        });
        token
    }

    /// Stop the connection
    ///
    /// `forced` drops the transport immediately; otherwise it is closed
    /// gracefully and kept for the next `connect`.
    pub fn disconnect(&self, forced: bool) {
        self.submit(Command::Disconnect { forced });
    }

    /// Reconnect now, guarded by the liveness watchdog. No-op while connected.
    pub fn reconnect(&self) {
        self.submit(Command::Reconnect);
    }

    /// Write a binary payload; without a transport the payload is dropped and logged
    pub fn send(&self, payload: impl Into<Vec<u8>>, on_complete: Option<SendCompletion>) {
        self.submit(Command::Send {
            payload: payload.into(),
            on_complete,
        });
    }

    /// Subscribe to inbound binary payloads
    pub fn receive_data<F>(&self, on_data: F) -> DataToken
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let token = DataToken(self.next_token());
        self.submit(Command::ReceiveData {
            token,
            observer: Arc::new(on_data),
        });
        token
    }

    /// Replace the credential
    ///
    /// # Arguments
    /// * `needs_reconnect` - open the transport with the new credential
    /// * `reconnect_manually` - go through [`reconnect`](Self::reconnect) (watchdog, `Connecting`) instead of a bare open
    pub fn update(&self, credential: Credential, needs_reconnect: bool, reconnect_manually: bool) {
        self.submit(Command::Update {
            credential,
            needs_reconnect,
            reconnect_manually,
        });
    }

    pub fn unregister_connection(&self, token: Option<ConnectionToken>) {
        if let Some(token) = token {
            self.submit(Command::UnregisterConnection(token));
        }
    }

    pub fn unregister_data(&self, token: Option<DataToken>) {
        if let Some(token) = token {
            self.submit(Command::UnregisterData(token));
        }
    }

    /// Unregister, then `close()` if no subscriber of either kind is left
    pub fn unregister_and_disconnect_if_possible(
        &self,
        connection_token: Option<ConnectionToken>,
        data_token: Option<DataToken>,
    ) {
        self.unregister_many_and_disconnect_if_possible(
            connection_token.into_iter().collect(),
            data_token,
        );
    }

    pub fn unregister_many_and_disconnect_if_possible(
        &self,
        connection_tokens: Vec<ConnectionToken>,
        data_token: Option<DataToken>,
    ) {
        self.submit(Command::UnregisterAndDisconnectIfPossible {
            connection_tokens,
            data_token,
        });
    }

    /// Move to `Closed`, drop every subscriber, cancel all timers and
    /// tear the transport down. A later `connect` starts over.
    pub fn close(&self) {
        self.submit(Command::Close);
    }

    /// Independent receiver for app-wide lifecycle signals
    pub fn lifecycle_events(&self) -> Receiver<LifecycleSignal> {
        self.shared.lifecycle.subscribe()
    }

    /// Close and stop the owning task, returning the final state
    ///
    /// Calls made on any clone afterwards are logged and dropped.
    pub async fn shutdown(&self) -> Result<ConnectionState> {
        let (reply, response) = oneshot::channel();
        self.shared
            .mailbox
            .send(Input::Command(Command::Shutdown(reply)))
            .map_err(|_| LiveLinkError::ManagerStopped)?;

        let state = response.await.map_err(|_| LiveLinkError::ManagerStopped)?;

        let task = self.shared.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Connection manager task ended abnormally: {}", e);
            }
        }

        Ok(state)
    }
}

/// Owning task: feeds mailbox inputs to the machine until shutdown
async fn run_state_machine(mut machine: ConnectionStateMachine, mut inbox: UnboundedReceiver<Input>) {
    debug!("Connection manager task started | state: {}", machine.state());

    while let Some(input) = inbox.recv().await {
        if !machine.handle(input) {
            break;
        }
    }

    info!("Connection manager task stopped | final state: {}", machine.state());
}
