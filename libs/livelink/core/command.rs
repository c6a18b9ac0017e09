//! Mailbox inputs of the state machine task

use super::connection_state::ConnectionState;
use super::credential::Credential;
use super::registry::{ConnectionObserver, ConnectionToken, DataObserver, DataToken};
use super::timers::TimerKind;
use crate::traits::{SendCompletion, TransportEvent};
use std::fmt;
use tokio::sync::oneshot;

/// Public API calls, serialized onto the owning task
pub enum Command {
    Connect {
        credential: Credential,
        token: ConnectionToken,
        observer: ConnectionObserver,
    },
    Disconnect {
        forced: bool,
    },
    Reconnect,
    Send {
        payload: Vec<u8>,
        on_complete: Option<SendCompletion>,
    },
    ReceiveData {
        token: DataToken,
        observer: DataObserver,
    },
    Update {
        credential: Credential,
        needs_reconnect: bool,
        reconnect_manually: bool,
    },
    UnregisterConnection(ConnectionToken),
    UnregisterData(DataToken),
    /// Unregister, then close if no subscriber of either kind is left
    UnregisterAndDisconnectIfPossible {
        connection_tokens: Vec<ConnectionToken>,
        data_token: Option<DataToken>,
    },
    Close,
    /// Close and stop the owning task; replies with the final state
    Shutdown(oneshot::Sender<ConnectionState>),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect { token, .. } => write!(f, "Connect({})", token),
            Command::Disconnect { forced } => write!(f, "Disconnect(forced: {})", forced),
            Command::Reconnect => write!(f, "Reconnect"),
            Command::Send { payload, .. } => write!(f, "Send({} bytes)", payload.len()),
            Command::ReceiveData { token, .. } => write!(f, "ReceiveData({})", token),
            Command::Update {
                needs_reconnect,
                reconnect_manually,
                ..
            } => write!(
                f,
                "Update(needs_reconnect: {}, reconnect_manually: {})",
                needs_reconnect, reconnect_manually
            ),
            Command::UnregisterConnection(token) => write!(f, "UnregisterConnection({})", token),
            Command::UnregisterData(token) => write!(f, "UnregisterData({})", token),
            Command::UnregisterAndDisconnectIfPossible {
                connection_tokens,
                data_token,
            } => write!(
                f,
                "UnregisterAndDisconnectIfPossible({} connection tokens, data token: {:?})",
                connection_tokens.len(),
                data_token
            ),
            Command::Close => write!(f, "Close"),
            Command::Shutdown(_) => write!(f, "Shutdown"),
        }
    }
}

/// Everything the owning task reacts to, in arrival order
#[derive(Debug)]
pub enum Input {
    Command(Command),
    Transport { generation: u64, event: TransportEvent },
    TimerFired { kind: TimerKind, id: u64 },
    HostReachable { generation: u64 },
}
