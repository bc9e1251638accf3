//! The STOMP session state machine.
//!
//! A [`StompSession`] drives the CONNECT handshake, then spawns one
//! background task that owns both halves of the transport. That task is the
//! only reader of incoming frames, so dispatch to subscriptions and
//! receipts follows wire arrival order; it is also the only writer, fed by
//! an outbound channel, so the heartbeat ticker sees every frame in both
//! directions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::{debug, warn};

use crate::assembler::PartialMessageAssembler;
use crate::codec::{StompItem, decode_message, encode_frame};
use crate::config::StompConfig;
use crate::error::StompError;
use crate::frame::{Command, Frame};
use crate::headers::{ConnectedHeaders, ErrorHeaders, MessageHeaders, ReceiptHeaders};
use crate::heartbeat::{self, HeartBeat, HeartBeatTicker, TickerEvent};
use crate::receipt::ReceiptTracker;
use crate::subscription::{AckMode, Subscription};
use crate::transport::{WsConnector, WsFrame, WsReceiver, WsSender};
use crate::version::StompVersion;

/// Session lifecycle. `Failed` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnecting,
    Closed,
    Failed,
}

/// Per-subscription routing entry; the map is keyed by subscription id.
/// The channel is unbounded: a slow consumer buffers, it never loses
/// messages, and the IO loop never blocks on dispatch.
struct SubscriptionEntry {
    sender: mpsc::UnboundedSender<Frame>,
}

type Subscriptions = HashMap<String, SubscriptionEntry>;

/// An established STOMP session over one (logical) WebSocket connection.
///
/// Cloning the handle is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct StompSession {
    outbound_tx: mpsc::Sender<Frame>,
    shutdown_tx: broadcast::Sender<()>,
    receipts: ReceiptTracker,
    subscriptions: Arc<Mutex<Subscriptions>>,
    sub_id_counter: Arc<AtomicU64>,
    state: Arc<StdMutex<SessionState>>,
    cause: Arc<StdMutex<Option<StompError>>>,
    config: Arc<StompConfig>,
    version: StompVersion,
    heart_beat: HeartBeat,
}

impl std::fmt::Debug for StompSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StompSession")
            .field("state", &self.state())
            .field("version", &self.version)
            .field("heart_beat", &self.heart_beat)
            .finish_non_exhaustive()
    }
}

impl StompSession {
    /// Perform the STOMP handshake over an already-open WebSocket
    /// connection and return the connected session.
    ///
    /// Sends CONNECT (or STOMP per config), awaits CONNECTED within
    /// `connection_timeout`, negotiates version and heart-beat, and starts
    /// the background dispatch task and heartbeat ticker.
    pub async fn connect(
        mut sender: Box<dyn WsSender>,
        mut receiver: Box<dyn WsReceiver>,
        config: StompConfig,
    ) -> Result<Self, StompError> {
        let command = if config.connect_with_stomp_command {
            Command::Stomp
        } else {
            Command::Connect
        };
        let mut connect = Frame::new(command)
            .header("accept-version", StompVersion::accept_version_header())
            .header("heart-beat", config.heart_beat.to_header_value());
        if let Some(host) = &config.host {
            connect = connect.header("host", host);
        }
        if let Some(login) = &config.login {
            connect = connect.header("login", login);
        }
        if let Some(passcode) = &config.passcode {
            connect = connect.header("passcode", passcode);
        }

        send_encoded(&mut sender, &connect, config.auto_content_length).await?;

        let mut assembler = PartialMessageAssembler::new();
        let connected = tokio::time::timeout(
            config.connection_timeout,
            await_connected(&mut receiver, &mut assembler),
        )
        .await
        .map_err(|_| StompError::ConnectionTimeout)??;

        let connected_view = ConnectedHeaders(&connected);
        let version = StompVersion::negotiate(connected.get_header("version"))?;
        let server_heart_beat = connected_view
            .heart_beat()
            .map(heartbeat::parse_heart_beat_header)
            .unwrap_or(HeartBeat::NONE);
        let negotiated = heartbeat::negotiate(config.heart_beat, server_heart_beat);
        debug!(%version, ?negotiated, "session connected");

        let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(32);
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let (ticker_tx, ticker_rx) = mpsc::channel::<TickerEvent>(4);
        let ticker = HeartBeatTicker::start(negotiated, config.heart_beat_tolerance, ticker_tx);

        let session = StompSession {
            outbound_tx,
            shutdown_tx,
            receipts: ReceiptTracker::new(),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            sub_id_counter: Arc::new(AtomicU64::new(1)),
            state: Arc::new(StdMutex::new(SessionState::Connected)),
            cause: Arc::new(StdMutex::new(None)),
            config: Arc::new(config),
            version,
            heart_beat: negotiated,
        };

        let io = IoTask {
            sender,
            receiver,
            assembler,
            ticker,
            outbound_rx,
            ticker_rx,
            shutdown_rx,
            receipts: session.receipts.clone(),
            subscriptions: session.subscriptions.clone(),
            state: session.state.clone(),
            cause: session.cause.clone(),
            auto_content_length: session.config.auto_content_length,
            incoming_deadline: negotiated.expected_period
                + session.config.heart_beat_tolerance.incoming_margin,
        };
        tokio::spawn(io.run());

        Ok(session)
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> StompVersion {
        self.version
    }

    /// Negotiated heart-beat (zero periods mean the direction is off).
    pub fn heart_beat(&self) -> HeartBeat {
        self.heart_beat
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// The terminal failure cause, once the session has failed.
    pub fn failure_cause(&self) -> Option<StompError> {
        self.cause.lock().expect("cause lock poisoned").clone()
    }

    fn terminal_error(&self) -> StompError {
        self.failure_cause().unwrap_or(StompError::SessionClosed)
    }

    fn ensure_active(&self) -> Result<(), StompError> {
        match self.state() {
            SessionState::Connected => Ok(()),
            SessionState::Failed => Err(self.terminal_error()),
            _ => Err(StompError::SessionClosed),
        }
    }

    async fn enqueue(&self, frame: Frame) -> Result<(), StompError> {
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| self.terminal_error())
    }

    /// Send a client frame.
    ///
    /// When the frame carries a `receipt` header, or `auto_receipt` is on,
    /// this suspends until the matching RECEIPT arrives, failing with
    /// [`StompError::LostReceipt`] after `receipt_timeout`. Otherwise it
    /// returns as soon as the frame is handed to the transport task.
    pub async fn send(&self, mut frame: Frame) -> Result<(), StompError> {
        self.ensure_active()?;

        let receipt_id = match frame.get_header("receipt") {
            Some(id) => Some(id.to_string()),
            None if self.config.auto_receipt => {
                let id = self.receipts.next_id();
                frame = frame.header("receipt", id.clone());
                Some(id)
            }
            None => None,
        };

        match receipt_id {
            Some(id) => self.send_tracked(frame, id).await,
            None => self.enqueue(frame).await,
        }
    }

    async fn send_tracked(&self, frame: Frame, receipt_id: String) -> Result<(), StompError> {
        let rx = self.receipts.register(&receipt_id).await;
        self.enqueue(frame).await?;
        match tokio::time::timeout(self.config.receipt_timeout, rx).await {
            Ok(Ok(result)) => result,
            // sender dropped without resolution: session died mid-wait
            Ok(Err(_)) => Err(self.terminal_error()),
            Err(_) => {
                self.receipts.forget(&receipt_id).await;
                Err(StompError::LostReceipt(receipt_id))
            }
        }
    }

    /// Send a SEND frame to `destination` with the given body.
    pub async fn send_to(
        &self,
        destination: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<(), StompError> {
        self.send(Frame::send(destination).body(body)).await
    }

    /// Subscribe to a destination and receive its MESSAGE frames.
    pub async fn subscribe(
        &self,
        destination: &str,
        ack: AckMode,
    ) -> Result<Subscription, StompError> {
        self.subscribe_with_headers(destination, ack, Vec::new())
            .await
    }

    /// Subscribe with extra headers forwarded on the SUBSCRIBE frame.
    pub async fn subscribe_with_headers(
        &self,
        destination: &str,
        ack: AckMode,
        extra_headers: Vec<(String, String)>,
    ) -> Result<Subscription, StompError> {
        self.ensure_active()?;

        let id = self
            .sub_id_counter
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let (tx, rx) = mpsc::unbounded_channel::<Frame>();
        self.subscriptions
            .lock()
            .await
            .insert(id.clone(), SubscriptionEntry { sender: tx });

        let mut frame = Frame::subscribe(&id, destination, ack.as_str());
        for (k, v) in extra_headers {
            frame = frame.header(k, v);
        }
        if let Err(e) = self.enqueue(frame).await {
            self.subscriptions.lock().await.remove(&id);
            return Err(e);
        }

        Ok(Subscription::new(
            id,
            destination.to_string(),
            rx,
            self.clone(),
        ))
    }

    /// Send UNSUBSCRIBE and stop routing for `subscription_id`.
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<(), StompError> {
        self.subscriptions.lock().await.remove(subscription_id);
        self.ensure_active()?;
        self.enqueue(Frame::unsubscribe(subscription_id)).await
    }

    /// Acknowledge a message. One-shot; add a `receipt` header via
    /// [`StompSession::send`] for receipt tracking.
    pub async fn ack(&self, message_id: &str, subscription_id: &str) -> Result<(), StompError> {
        self.ensure_active()?;
        self.enqueue(Frame::ack(message_id, subscription_id)).await
    }

    /// Negative-acknowledge a message.
    pub async fn nack(&self, message_id: &str, subscription_id: &str) -> Result<(), StompError> {
        self.ensure_active()?;
        self.enqueue(Frame::nack(message_id, subscription_id)).await
    }

    /// Begin a transaction.
    pub async fn begin(&self, transaction_id: &str) -> Result<(), StompError> {
        self.ensure_active()?;
        self.enqueue(Frame::begin(transaction_id)).await
    }

    /// Commit a transaction.
    pub async fn commit(&self, transaction_id: &str) -> Result<(), StompError> {
        self.ensure_active()?;
        self.enqueue(Frame::commit(transaction_id)).await
    }

    /// Abort a transaction.
    pub async fn abort(&self, transaction_id: &str) -> Result<(), StompError> {
        self.ensure_active()?;
        self.enqueue(Frame::abort(transaction_id)).await
    }

    /// Shut the session down.
    ///
    /// With `graceful_disconnect` the DISCONNECT frame carries a receipt
    /// and we wait up to `disconnect_timeout` for it; servers that close
    /// before replying are tolerated, so the timeout is not an error. The
    /// transport is closed unconditionally.
    pub async fn disconnect(&self) -> Result<(), StompError> {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            match *state {
                SessionState::Connected => *state = SessionState::Disconnecting,
                // already terminating or terminated
                _ => return Ok(()),
            }
        }

        if self.config.graceful_disconnect {
            eprintln!("DBG: graceful path, timeout={:?}", self.config.disconnect_timeout);
            let receipt_id = self.receipts.next_id();
            let rx = self.receipts.register(&receipt_id).await;
            let frame = Frame::disconnect().header("receipt", receipt_id.clone());
            eprintln!("DBG: sending DISCONNECT");
            if self.outbound_tx.send(frame).await.is_ok() {
                eprintln!("DBG: sent, awaiting timeout");
                // expiry here is tolerated: some servers close right away
                if tokio::time::timeout(self.config.disconnect_timeout, rx)
                    .await
                    .is_err()
                {
                    debug!(receipt_id, "disconnect receipt timed out, closing anyway");
                    self.receipts.forget(&receipt_id).await;
                }
                eprintln!("DBG: timeout wait done");
            }
        }

        eprintln!("DBG: sending shutdown");
        let _ = self.shutdown_tx.send(());
        let mut state = self.state.lock().expect("state lock poisoned");
        if *state == SessionState::Disconnecting {
            *state = SessionState::Closed;
        }
        Ok(())
    }
}

/// Convenience entry point tying a [`WsConnector`] to session config.
pub struct StompClient {
    config: StompConfig,
    connector: Arc<dyn WsConnector>,
}

impl StompClient {
    /// Client over the native tokio-tungstenite transport.
    #[cfg(feature = "tungstenite")]
    pub fn new(config: StompConfig) -> Self {
        Self::with_connector(crate::transport::TungsteniteConnector, config)
    }

    pub fn with_connector(connector: impl WsConnector + 'static, config: StompConfig) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
        }
    }

    /// Wrap the transport in transparent reconnection.
    pub fn reconnecting(self, reconnect: crate::config::ReconnectConfig) -> Self {
        let connector =
            crate::reconnect::ReconnectingConnector::new(ArcConnector(self.connector), reconnect);
        Self {
            config: self.config,
            connector: Arc::new(connector),
        }
    }

    /// Open the WebSocket connection and perform the STOMP handshake.
    pub async fn connect(&self, url: &str) -> Result<StompSession, StompError> {
        let (sender, receiver) = self.connector.connect(url).await?;
        StompSession::connect(sender, receiver, self.config.clone()).await
    }
}

/// Adapter so an `Arc<dyn WsConnector>` can be handed to a wrapper that
/// wants ownership of a connector.
struct ArcConnector(Arc<dyn WsConnector>);

#[async_trait::async_trait]
impl WsConnector for ArcConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn WsSender>, Box<dyn WsReceiver>), StompError> {
        self.0.connect(url).await
    }
}

async fn send_encoded(
    sender: &mut Box<dyn WsSender>,
    frame: &Frame,
    auto_content_length: bool,
) -> Result<(), StompError> {
    let bytes = encode_frame(frame, auto_content_length)?;
    // STOMP over WebSocket is text unless the body forces binary
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => sender.send_text(text).await,
        Err(_) => sender.send_binary(bytes.to_vec()).await,
    }
}

/// Read frames until CONNECTED. ERROR fails the handshake; anything else
/// before CONNECTED is a protocol violation.
async fn await_connected(
    receiver: &mut Box<dyn WsReceiver>,
    assembler: &mut PartialMessageAssembler,
) -> Result<Frame, StompError> {
    loop {
        let ws_frame = match receiver.recv().await {
            Some(Ok(f)) => f,
            Some(Err(e)) => return Err(e),
            None => {
                return Err(StompError::UnexpectedTransportClose(
                    "connection closed during handshake".to_string(),
                ));
            }
        };
        let payload = match assembler.push(ws_frame) {
            Some(WsFrame::Text { payload, .. }) => payload.into_bytes(),
            Some(WsFrame::Binary { payload, .. }) => payload,
            Some(WsFrame::Close { code, reason }) => {
                return Err(StompError::UnexpectedTransportClose(format!(
                    "closed during handshake ({code}: {reason})"
                )));
            }
            None => continue,
        };
        match decode_message(&payload)? {
            StompItem::Heartbeat => continue,
            StompItem::Frame(frame) => match frame.command {
                Command::Connected => return Ok(frame),
                Command::Error => {
                    return Err(StompError::ErrorFrameReceived(
                        ErrorHeaders(&frame).describe(),
                    ));
                }
                other => {
                    return Err(StompError::Transport(format!(
                        "unexpected {other} frame before CONNECTED"
                    )));
                }
            },
        }
    }
}

/// The background task owning the transport: sole reader, sole writer.
struct IoTask {
    sender: Box<dyn WsSender>,
    receiver: Box<dyn WsReceiver>,
    assembler: PartialMessageAssembler,
    ticker: HeartBeatTicker,
    outbound_rx: mpsc::Receiver<Frame>,
    ticker_rx: mpsc::Receiver<TickerEvent>,
    shutdown_rx: broadcast::Receiver<()>,
    receipts: ReceiptTracker,
    subscriptions: Arc<Mutex<Subscriptions>>,
    state: Arc<StdMutex<SessionState>>,
    cause: Arc<StdMutex<Option<StompError>>>,
    auto_content_length: bool,
    incoming_deadline: std::time::Duration,
}

enum LoopExit {
    Clean,
    Failed(StompError),
}

impl IoTask {
    async fn run(mut self) {
        let exit = self.io_loop().await;
        self.ticker.stop();

        match exit {
            LoopExit::Clean => {
                let _ = self.sender.close(1000, "client disconnect").await;
                self.receipts.fail_all(&StompError::SessionClosed).await;
            }
            LoopExit::Failed(cause) => {
                warn!(error = %cause, "session failed");
                let _ = self.sender.close(1002, "protocol failure").await;
                {
                    let mut state = self.state.lock().expect("state lock poisoned");
                    *state = SessionState::Failed;
                }
                *self.cause.lock().expect("cause lock poisoned") = Some(cause.clone());
                self.receipts.fail_all(&cause).await;
            }
        }
        // dropping the senders closes every subscription's message channel
        self.subscriptions.lock().await.clear();
    }

    async fn io_loop(&mut self) -> LoopExit {
        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    return LoopExit::Clean;
                }
                maybe = self.outbound_rx.recv() => {
                    let frame = match maybe {
                        Some(frame) => frame,
                        // every session handle dropped
                        None => return LoopExit::Clean,
                    };
                    let result =
                        send_encoded(&mut self.sender, &frame, self.auto_content_length).await;
                    if let Err(e) = result {
                        return LoopExit::Failed(e);
                    }
                    self.ticker.notify_msg_sent();
                }
                event = self.ticker_rx.recv() => {
                    match event {
                        Some(TickerEvent::SendHeartBeat) => {
                            if let Err(e) = self.sender.send_text("\n".to_string()).await {
                                return LoopExit::Failed(e);
                            }
                            self.ticker.notify_msg_sent();
                        }
                        Some(TickerEvent::IncomingDead) => {
                            return LoopExit::Failed(
                                StompError::MissingHeartBeat(self.incoming_deadline),
                            );
                        }
                        None => {}
                    }
                }
                item = self.receiver.recv() => {
                    match self.handle_incoming(item).await {
                        Ok(None) => {}
                        Ok(Some(exit)) => return exit,
                        Err(e) => return LoopExit::Failed(e),
                    }
                }
            }
        }
    }

    /// Returns `Ok(Some(_))` when the loop must stop.
    async fn handle_incoming(
        &mut self,
        item: Option<Result<WsFrame, StompError>>,
    ) -> Result<Option<LoopExit>, StompError> {
        let ws_frame = match item {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(e),
            None => return Ok(Some(self.close_exit("incoming stream ended".to_string()))),
        };

        // any wire traffic proves the peer is alive, including non-final
        // fragments that have not yet formed a complete message
        self.ticker.notify_msg_received();

        let payload = match self.assembler.push(ws_frame) {
            None => return Ok(None),
            Some(WsFrame::Close { code, reason }) => {
                return Ok(Some(
                    self.close_exit(format!("close frame ({code}: {reason})")),
                ));
            }
            Some(WsFrame::Text { payload, .. }) => payload.into_bytes(),
            Some(WsFrame::Binary { payload, .. }) => payload,
        };

        match decode_message(&payload)? {
            StompItem::Heartbeat => Ok(None),
            StompItem::Frame(frame) => self.dispatch(frame).await,
        }
    }

    /// A transport close is clean while disconnecting, a failure otherwise.
    fn close_exit(&self, reason: String) -> LoopExit {
        let state = *self.state.lock().expect("state lock poisoned");
        match state {
            SessionState::Disconnecting | SessionState::Closed => LoopExit::Clean,
            _ => LoopExit::Failed(StompError::UnexpectedTransportClose(reason)),
        }
    }

    async fn dispatch(&mut self, frame: Frame) -> Result<Option<LoopExit>, StompError> {
        match frame.command {
            Command::Message => {
                let sub_id = MessageHeaders(&frame).subscription().map(str::to_string);
                match sub_id {
                    Some(id) => {
                        let subscriptions = self.subscriptions.lock().await;
                        match subscriptions.get(&id) {
                            Some(entry) => {
                                // fails only when the receiver is gone
                                if entry.sender.send(frame).is_err() {
                                    warn!(
                                        subscription = %id,
                                        "subscription handle dropped, discarding message"
                                    );
                                }
                            }
                            None => {
                                warn!(subscription = %id, "MESSAGE for unknown subscription");
                            }
                        }
                    }
                    None => warn!("MESSAGE frame without subscription header"),
                }
                Ok(None)
            }
            Command::Receipt => {
                match ReceiptHeaders(&frame).receipt_id() {
                    Some(id) => {
                        if !self.receipts.resolve(id).await {
                            debug!(receipt_id = %id, "RECEIPT with no pending waiter");
                        }
                    }
                    None => warn!("RECEIPT frame without receipt-id header"),
                }
                Ok(None)
            }
            Command::Error => {
                let message = ErrorHeaders(&frame).describe();
                Ok(Some(LoopExit::Failed(StompError::ErrorFrameReceived(
                    message,
                ))))
            }
            other => Ok(Some(LoopExit::Failed(StompError::Transport(format!(
                "unexpected {other} frame from server"
            ))))),
        }
    }
}
