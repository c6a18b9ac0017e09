//! WebSocket transport on tokio-tungstenite
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  WsCommand   ┌─────────────────────────────┐
//! │ WsTransport  │ ───────────> │ connection task (per open)  │
//! │ (state task) │              │  select! {                  │
//! └──────────────┘              │    read frame  -> event     │──> TransportEventSink
//!                               │    command     -> write     │
//!                               │    heartbeat   -> ping      │
//!                               │  }                          │
//!                               └─────────────────────────────┘
//! ```
//!
//! Each `open` spawns one task that performs the handshake (bounded by the
//! request timeout) and then runs the read/write loop until the stream
//! ends. Every way the task can end, except `force_close`, reports a
//! `Disconnected` event.

use super::liveness::LivenessTracker;
use crate::core::config::{HeartbeatConfig, ManagerConfig};
use crate::core::request::HandshakeRequest;
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Work for the connection task
enum WsCommand {
    Send(Vec<u8>, Option<SendCompletion>),
    Ping,
    Close,
}

/// Keepalive settings for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub interval: Duration,
    pub pong_timeout: Duration,
}

impl From<&HeartbeatConfig> for Heartbeat {
    fn from(config: &HeartbeatConfig) -> Self {
        Self {
            interval: config.interval(),
            pong_timeout: config.pong_timeout(),
        }
    }
}

/// Creates [`WsTransport`]s
#[derive(Debug, Clone, Default)]
pub struct WsTransportFactory {
    heartbeat: Option<Heartbeat>,
}

impl WsTransportFactory {
    /// Factory without heartbeat; liveness then relies on the watchdog only
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heartbeat(mut self, interval: Duration, pong_timeout: Duration) -> Self {
        self.heartbeat = Some(Heartbeat {
            interval,
            pong_timeout,
        });
        self
    }

    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            heartbeat: config.heartbeat.as_ref().map(Heartbeat::from),
        }
    }
}

impl TransportFactory for WsTransportFactory {
    fn create(&self, request: HandshakeRequest, events: TransportEventSink) -> Box<dyn Transport> {
        Box::new(WsTransport::new(request, events, self.heartbeat))
    }
}

struct Connection {
    commands: UnboundedSender<WsCommand>,
    task: JoinHandle<()>,
}

impl Connection {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

/// One WebSocket endpoint, reopened as often as the state machine asks
pub struct WsTransport {
    request: HandshakeRequest,
    events: TransportEventSink,
    heartbeat: Option<Heartbeat>,
    connection: Option<Connection>,
}

impl WsTransport {
    pub fn new(request: HandshakeRequest, events: TransportEventSink, heartbeat: Option<Heartbeat>) -> Self {
        Self {
            request,
            events,
            heartbeat,
            connection: None,
        }
    }

    fn live_connection(&self) -> Option<&Connection> {
        self.connection.as_ref().filter(|connection| connection.is_live())
    }

    fn command(&self, command: WsCommand) -> bool {
        match self.live_connection() {
            Some(connection) => connection.commands.send(command).is_ok(),
            None => false,
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self) {
        // A live task may be hung on a dead socket, so every open starts over
        if self.live_connection().is_some() {
            debug!("Abandoning previous connection task before reopening");
        }
        self.force_close();

        let (commands, command_rx) = unbounded_channel();
        let task = tokio::spawn(run_connection(
            self.request.clone(),
            self.events.clone(),
            self.heartbeat,
            command_rx,
        ));

        self.connection = Some(Connection { commands, task });
    }

    fn set_request(&mut self, request: HandshakeRequest) {
        self.request = request;
    }

    fn send(&mut self, payload: Vec<u8>, on_complete: Option<SendCompletion>) {
        let len = payload.len();
        if !self.command(WsCommand::Send(payload, on_complete)) {
            warn!("Transport not open, dropping {} bytes", len);
        }
    }

    fn ping(&mut self) {
        if !self.command(WsCommand::Ping) {
            debug!("Transport not open, skipping ping");
        }
    }

    fn close(&mut self) {
        if !self.command(WsCommand::Close) {
            debug!("Transport not open, nothing to close");
        }
    }

    fn force_close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.force_close();
    }
}

/// Translate a handshake request into a tungstenite client request
///
/// Invalid header names or values are skipped with a warning. Later
/// entries replace earlier ones with the same name.
pub fn client_request(request: &HandshakeRequest) -> Result<Request> {
    let mut client_request = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| LiveLinkError::WebSocket(format!("Failed to create request: {}", e)))?;

    for (key, value) in &request.headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                client_request.headers_mut().insert(name, value);
            }
            (Err(_), _) => warn!("Invalid header name: {}", key),
            (_, Err(_)) => warn!("Invalid header value for key '{}'", key),
        }
    }

    Ok(client_request)
}

async fn run_connection(
    request: HandshakeRequest,
    events: TransportEventSink,
    heartbeat: Option<Heartbeat>,
    commands: UnboundedReceiver<WsCommand>,
) {
    let client_request = match client_request(&request) {
        Ok(client_request) => client_request,
        Err(e) => {
            report_failure(&events, e.to_string());
            return;
        }
    };

    debug!("Connecting to {} with {} headers", request.url, request.headers.len());

    match tokio::time::timeout(request.timeout, connect_async(client_request)).await {
        Ok(Ok((stream, _))) => {
            info!("Connected to {}", request.url);
            events.emit(TransportEvent::Connected);
            message_loop(stream, &events, heartbeat, commands).await;
        }
        Ok(Err(e)) => {
            error!("Failed to connect to {}: {}", request.url, e);
            report_failure(&events, e.to_string());
        }
        Err(_) => {
            error!("Handshake with {} timed out after {:?}", request.url, request.timeout);
            report_failure(&events, "handshake timed out".to_string());
        }
    }

    debug!("Connection task exiting");
}

fn report_failure(events: &TransportEventSink, reason: String) {
    events.emit(TransportEvent::Error(Some(reason.clone())));
    events.emit(TransportEvent::Disconnected { reason, code: None });
}

fn heartbeat_ticker(heartbeat: &Heartbeat) -> Interval {
    // Skip the immediate first tick
    let mut ticker = interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn message_loop(
    stream: WsStream,
    events: &TransportEventSink,
    heartbeat: Option<Heartbeat>,
    mut commands: UnboundedReceiver<WsCommand>,
) {
    let (mut write, mut read) = stream.split();

    let mut ticker = heartbeat.as_ref().map(heartbeat_ticker);
    let mut liveness = heartbeat.map(|hb| LivenessTracker::new(hb.pong_timeout));

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Binary(payload))) => {
                        events.emit(TransportEvent::Data(payload));
                    }
                    Some(Ok(Message::Text(text))) => {
                        events.emit(TransportEvent::Text(text));
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong reply itself
                        events.emit(TransportEvent::Ping);
                    }
                    Some(Ok(Message::Pong(_))) => {
                        if let Some(Some(viable)) = liveness.as_mut().map(|l| l.record_pong_received()) {
                            events.emit(TransportEvent::ViabilityChanged(viable));
                        }
                        events.emit(TransportEvent::Pong);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (reason, code) = close_details(frame);
                        info!("Server closed connection | code: {:?} | reason: {}", code, reason);
                        events.emit(TransportEvent::Disconnected { reason, code });
                        return;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        report_failure(events, e.to_string());
                        return;
                    }
                    None => {
                        warn!("WebSocket stream closed");
                        events.emit(TransportEvent::Disconnected {
                            reason: "stream ended".to_string(),
                            code: None,
                        });
                        return;
                    }
                }
            }

            command = commands.recv() => {
                match command {
                    Some(WsCommand::Send(payload, on_complete)) => {
                        if let Err(e) = write.send(Message::Binary(payload)).await {
                            error!("Failed to send payload: {}", e);
                            report_failure(events, e.to_string());
                            return;
                        }
                        if let Some(done) = on_complete {
                            done();
                        }
                    }
                    Some(WsCommand::Ping) => {
                        if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                            warn!("Failed to send ping: {}", e);
                        } else if let Some(liveness) = liveness.as_mut() {
                            liveness.record_ping_sent();
                        }
                    }
                    Some(WsCommand::Close) => {
                        debug!("Closing connection");
                        // The peer's close frame ends the loop with a Disconnected event
                        if let Err(e) = write.close().await {
                            debug!("Close handshake failed: {}", e);
                            events.emit(TransportEvent::Disconnected {
                                reason: "closed".to_string(),
                                code: None,
                            });
                            return;
                        }
                    }
                    None => {
                        debug!("Transport dropped, ending connection");
                        return;
                    }
                }
            }

            _ = async {
                match ticker.as_mut() {
                    Some(ticker) => {
                        ticker.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {
                if let Some(liveness) = liveness.as_mut() {
                    if let Some(viable) = liveness.check() {
                        warn!("No pong within {:?}, connection may be dead", heartbeat.map(|hb| hb.pong_timeout));
                        events.emit(TransportEvent::ViabilityChanged(viable));
                    }
                }

                debug!("Heartbeat tick - sending ping");
                match write.send(Message::Ping(Vec::new())).await {
                    Ok(()) => {
                        if let Some(liveness) = liveness.as_mut() {
                            liveness.record_ping_sent();
                        }
                    }
                    Err(e) => warn!("Failed to send heartbeat: {}", e),
                }
            }
        }
    }
}

fn close_details(frame: Option<CloseFrame<'_>>) -> (String, Option<u16>) {
    match frame {
        Some(frame) => (frame.reason.into_owned(), Some(u16::from(frame.code))),
        None => ("closed without frame".to_string(), None),
    }
}
