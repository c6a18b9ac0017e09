//! Transport abstraction
//!
//! The state machine never touches a socket directly. It drives a
//! [`Transport`] through commands and learns about the outcome from
//! [`TransportEvent`]s pushed into a [`TransportEventSink`].
//!
//! ```text
//! StateMachine ──open/send/ping/close──> Transport ──frames──> network
//!      ^                                     │
//!      └──── mailbox <── TransportEventSink <┘
//! ```

use crate::core::command::Input;
use crate::core::request::HandshakeRequest;
use tokio::sync::mpsc::UnboundedSender;

/// Callback invoked once the transport confirmed a write
pub type SendCompletion = Box<dyn FnOnce() + Send + 'static>;

/// Everything a transport can report back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake finished, the stream is open
    Connected,
    /// The stream ended, with the close reason and code if the peer sent one
    Disconnected { reason: String, code: Option<u16> },
    /// Binary payload
    Data(Vec<u8>),
    /// Text frame; counts as activity but is not forwarded to data observers
    Text(String),
    Ping,
    Pong,
    /// The network path became usable or unusable
    ViabilityChanged(bool),
    /// A better path is available and the stream should be rebuilt
    ReconnectSuggested(bool),
    /// The transport gave up on the stream without a close handshake
    Cancelled,
    Error(Option<String>),
}

/// Duplex byte stream to a fixed endpoint
///
/// Every method must return without blocking; outcomes are reported as
/// events through the sink handed to [`TransportFactory::create`].
pub trait Transport: Send {
    /// Start the handshake, abandoning any previous stream first.
    fn open(&mut self);

    /// Replace the handshake request used by the next `open`
    fn set_request(&mut self, request: HandshakeRequest);

    /// Write a binary payload, calling `on_complete` once it was written
    fn send(&mut self, payload: Vec<u8>, on_complete: Option<SendCompletion>);

    /// Write a keepalive ping
    fn ping(&mut self);

    /// Graceful close; a `Disconnected` event follows
    fn close(&mut self);

    /// Drop the stream immediately without reporting anything
    fn force_close(&mut self);
}

/// Creates transports bound to a handshake request
pub trait TransportFactory: Send + Sync {
    fn create(&self, request: HandshakeRequest, events: TransportEventSink) -> Box<dyn Transport>;
}

/// Generation-tagged channel from a transport into the state machine mailbox
///
/// Each transport instance gets its own generation, so events still in
/// flight from a torn-down transport are recognised and dropped.
#[derive(Debug, Clone)]
pub struct TransportEventSink {
    generation: u64,
    mailbox: UnboundedSender<Input>,
}

impl TransportEventSink {
    pub(crate) fn new(generation: u64, mailbox: UnboundedSender<Input>) -> Self {
        Self {
            generation,
            mailbox,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Push an event. Returns false once the manager has stopped.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.mailbox
            .send(Input::Transport {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}
