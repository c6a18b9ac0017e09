//! Common test utilities for LiveLink integration tests
//!
//! Scripted transport and reachability doubles driven from the test body,
//! plus an in-process WebSocket echo server for the real transport.

#![allow(dead_code)]

use livelink::core::connection_state::ConnectionState;
use livelink::core::lifecycle::LifecycleSignal;
use livelink::core::request::HandshakeRequest;
use livelink::traits::*;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Let the manager task drain its mailbox
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock, then let the manager react
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

// ----------------------------------------------------------------
// Scripted transport
// ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Open,
    SetRequest,
    Send(Vec<u8>),
    Ping,
    Close,
    ForceClose,
}

#[derive(Default)]
struct TransportLog {
    calls: Vec<(u64, TransportCall)>,
    sinks: Vec<TransportEventSink>,
    requests: Vec<HandshakeRequest>,
}

/// Records every transport call; the test plays the network side
#[derive(Clone, Default)]
pub struct ScriptedTransports {
    log: Arc<Mutex<TransportLog>>,
}

impl ScriptedTransports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an event from the most recently created transport
    pub fn emit(&self, event: TransportEvent) {
        let sink = self.log.lock().sinks.last().cloned();
        match sink {
            Some(sink) => {
                sink.emit(event);
            }
            None => panic!("no transport created yet"),
        }
    }

    pub fn created(&self) -> usize {
        self.log.lock().sinks.len()
    }

    pub fn opens(&self) -> usize {
        self.count(|call| *call == TransportCall::Open)
    }

    pub fn count(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        self.log.lock().calls.iter().filter(|(_, call)| predicate(call)).count()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.log.lock().calls.iter().map(|(_, call)| call.clone()).collect()
    }

    pub fn last_request(&self) -> Option<HandshakeRequest> {
        self.log.lock().requests.last().cloned()
    }
}

struct ScriptedTransport {
    generation: u64,
    log: Arc<Mutex<TransportLog>>,
}

impl ScriptedTransport {
    fn record(&self, call: TransportCall) {
        self.log.lock().calls.push((self.generation, call));
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) {
        self.record(TransportCall::Open);
    }

    fn set_request(&mut self, request: HandshakeRequest) {
        self.log.lock().requests.push(request);
        self.record(TransportCall::SetRequest);
    }

    fn send(&mut self, payload: Vec<u8>, on_complete: Option<SendCompletion>) {
        self.record(TransportCall::Send(payload));
        if let Some(done) = on_complete {
            done();
        }
    }

    fn ping(&mut self) {
        self.record(TransportCall::Ping);
    }

    fn close(&mut self) {
        self.record(TransportCall::Close);
    }

    fn force_close(&mut self) {
        self.record(TransportCall::ForceClose);
    }
}

impl TransportFactory for ScriptedTransports {
    fn create(&self, request: HandshakeRequest, events: TransportEventSink) -> Box<dyn Transport> {
        let mut log = self.log.lock();
        log.requests.push(request);
        log.sinks.push(events.clone());
        Box::new(ScriptedTransport {
            generation: events.generation(),
            log: Arc::clone(&self.log),
        })
    }
}

// ----------------------------------------------------------------
// Scripted reachability
// ----------------------------------------------------------------

#[derive(Default)]
struct ReachabilityLog {
    armed: bool,
    arm_count: usize,
    sinks: Vec<ReachabilitySink>,
}

/// Reachability whose "host became reachable" is triggered by the test
#[derive(Clone, Default)]
pub struct ScriptedReachability {
    log: Arc<Mutex<ReachabilityLog>>,
}

impl ScriptedReachability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.log.lock().armed
    }

    pub fn arm_count(&self) -> usize {
        self.log.lock().arm_count
    }

    /// Report the host reachable if the latest monitor is armed
    pub fn host_reachable(&self) -> bool {
        let mut log = self.log.lock();
        if !log.armed {
            return false;
        }
        log.armed = false;
        match log.sinks.last() {
            Some(sink) => sink.notify_reachable(),
            None => false,
        }
    }
}

struct ScriptedMonitor {
    log: Arc<Mutex<ReachabilityLog>>,
}

impl ReachabilityMonitor for ScriptedMonitor {
    fn arm(&mut self) {
        let mut log = self.log.lock();
        log.armed = true;
        log.arm_count += 1;
    }

    fn disarm(&mut self) {
        self.log.lock().armed = false;
    }

    fn is_armed(&self) -> bool {
        self.log.lock().armed
    }
}

impl ReachabilityFactory for ScriptedReachability {
    fn create(&self, _host: &str, sink: ReachabilitySink) -> Box<dyn ReachabilityMonitor> {
        self.log.lock().sinks.push(sink);
        Box::new(ScriptedMonitor {
            log: Arc::clone(&self.log),
        })
    }
}

// ----------------------------------------------------------------
// Observers
// ----------------------------------------------------------------

/// Collects what one subscriber was told
#[derive(Clone, Default)]
pub struct StateLog {
    states: Arc<Mutex<Vec<ConnectionState>>>,
}

impl StateLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer(&self) -> impl Fn(ConnectionState) + Send + Sync + 'static {
        let states = Arc::clone(&self.states);
        move |state| states.lock().push(state)
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.states.lock().clone()
    }

    pub fn last(&self) -> Option<ConnectionState> {
        self.states.lock().last().copied()
    }

    pub fn count(&self, state: ConnectionState) -> usize {
        self.states.lock().iter().filter(|s| **s == state).count()
    }
}

pub fn drain(signals: &crossbeam_channel::Receiver<LifecycleSignal>) -> Vec<LifecycleSignal> {
    signals.try_iter().collect()
}

// ----------------------------------------------------------------
// WebSocket echo server
// ----------------------------------------------------------------

/// A simple mock WebSocket server for testing
///
/// Echoes text and binary frames, answers pings, and records the
/// `Authorization` header of every upgrade.
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    auth_headers: Arc<Mutex<Vec<String>>>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let auth_headers = Arc::new(Mutex::new(Vec::new()));

        let shutdown_clone = shutdown.clone();
        let auth_clone = auth_headers.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                let auth = auth_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown, auth).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            auth_headers,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        shutdown: Arc<Notify>,
        auth_headers: Arc<Mutex<Vec<String>>>,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_hdr_async;
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

        let record = move |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            if let Some(value) = request.headers().get("authorization") {
                auth_headers
                    .lock()
                    .push(value.to_str().unwrap_or_default().to_string());
            }
            Ok(response)
        };

        let ws_stream = match accept_hdr_async(stream, record).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                // Echo the message back
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                let _ = write.close().await;
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.auth_headers.lock().clone()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// WebSocket server that completes the handshake and then never reads
///
/// Models a peer whose socket died without a FIN: pings and close frames
/// go unanswered and the client's read never finishes.
pub struct SilentWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    accepted: Arc<std::sync::atomic::AtomicUsize>,
}

impl SilentWsServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let accepted = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let shutdown_clone = shutdown.clone();
        let accepted_clone = accepted.clone();

        tokio::spawn(async move {
            // Held open until shutdown so the client never sees EOF
            let held = Arc::new(Mutex::new(Vec::new()));
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        accepted_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        let held = held.clone();
                        tokio::spawn(async move {
                            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                                held.lock().push(ws);
                            }
                        });
                    }
                    _ = shutdown_clone.notified() => break,
                }
            }
        });

        Self {
            addr,
            shutdown,
            accepted,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of TCP connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Drop for SilentWsServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}
