//! In-memory WebSocket transport for driving a session from the
//! server side in tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use stomp_ws::{
    StompConfig, StompError, StompSession, WsConnector, WsFrame, WsReceiver, WsSender,
};
use tokio::sync::mpsc;

pub struct MockSender {
    out_tx: mpsc::Sender<WsFrame>,
    close_tx: mpsc::Sender<(u16, String)>,
}

pub struct MockReceiver {
    in_rx: mpsc::Receiver<Result<WsFrame, StompError>>,
}

/// The server side of a mock connection: read what the client sent, feed
/// frames back, observe close calls.
pub struct MockLink {
    pub to_client: mpsc::Sender<Result<WsFrame, StompError>>,
    pub from_client: mpsc::Receiver<WsFrame>,
    pub closed: mpsc::Receiver<(u16, String)>,
}

pub fn mock_connection() -> (Box<dyn WsSender>, Box<dyn WsReceiver>, MockLink) {
    let (out_tx, from_client) = mpsc::channel(32);
    let (to_client, in_rx) = mpsc::channel(32);
    let (close_tx, closed) = mpsc::channel(4);
    (
        Box::new(MockSender { out_tx, close_tx }),
        Box::new(MockReceiver { in_rx }),
        MockLink {
            to_client,
            from_client,
            closed,
        },
    )
}

#[async_trait]
impl WsSender for MockSender {
    async fn send_text(&mut self, text: String) -> Result<(), StompError> {
        self.out_tx
            .send(WsFrame::text(text))
            .await
            .map_err(|_| StompError::Transport("mock peer gone".to_string()))
    }

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), StompError> {
        self.out_tx
            .send(WsFrame::binary(data))
            .await
            .map_err(|_| StompError::Transport("mock peer gone".to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), StompError> {
        let _ = self.close_tx.send((code, reason.to_string())).await;
        Ok(())
    }
}

#[async_trait]
impl WsReceiver for MockReceiver {
    async fn recv(&mut self) -> Option<Result<WsFrame, StompError>> {
        self.in_rx.recv().await
    }
}

/// Text payload of a frame the client sent.
pub fn payload_text(frame: &WsFrame) -> String {
    match frame {
        WsFrame::Text { payload, .. } => payload.clone(),
        WsFrame::Binary { payload, .. } => String::from_utf8_lossy(payload).into_owned(),
        WsFrame::Close { .. } => panic!("expected a data frame, got close"),
    }
}

/// First line of a STOMP frame the client sent.
pub fn command_of(frame: &WsFrame) -> String {
    payload_text(frame)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Value of `header` in a raw frame the client sent (unescaped form is the
/// caller's concern).
pub fn header_of(frame: &WsFrame, header: &str) -> Option<String> {
    let text = payload_text(frame);
    let head = text.split("\n\n").next()?;
    head.lines().skip(1).find_map(|line| {
        line.strip_prefix(&format!("{header}:"))
            .map(str::to_string)
    })
}

/// A CONNECTED reply frame.
pub fn connected(version: &str, heart_beat: &str) -> Result<WsFrame, StompError> {
    Ok(WsFrame::text(format!(
        "CONNECTED\nversion:{version}\nheart-beat:{heart_beat}\n\n\0"
    )))
}

/// A RECEIPT frame for `receipt_id`.
pub fn receipt(receipt_id: &str) -> Result<WsFrame, StompError> {
    Ok(WsFrame::text(format!(
        "RECEIPT\nreceipt-id:{receipt_id}\n\n\0"
    )))
}

/// A MESSAGE frame routed to `subscription`.
pub fn message(subscription: &str, message_id: &str, body: &str) -> Result<WsFrame, StompError> {
    Ok(WsFrame::text(format!(
        "MESSAGE\ndestination:/queue/test\nmessage-id:{message_id}\nsubscription:{subscription}\n\n{body}\0"
    )))
}

/// Drive the handshake against a fresh mock connection and return the
/// connected session plus the server-side link.
pub async fn connect_session(config: StompConfig) -> (StompSession, MockLink) {
    connect_session_with(config, "1.2", "0,0").await
}

pub async fn connect_session_with(
    config: StompConfig,
    version: &str,
    server_heart_beat: &str,
) -> (StompSession, MockLink) {
    let (sender, receiver, mut link) = mock_connection();
    let handshake = tokio::spawn(StompSession::connect(sender, receiver, config));

    let first = link.from_client.recv().await.expect("no CONNECT sent");
    assert!(
        matches!(command_of(&first).as_str(), "CONNECT" | "STOMP"),
        "expected handshake frame, got {:?}",
        payload_text(&first)
    );
    link.to_client
        .send(connected(version, server_heart_beat))
        .await
        .expect("session dropped receiver");

    let session = handshake
        .await
        .expect("handshake task panicked")
        .expect("handshake failed");
    (session, link)
}

/// Connector that refuses its first `fail_first` dials, then hands out mock
/// connections, pushing each server link into `links`.
pub struct FlakyConnector {
    fail_first: u32,
    pub attempts: Arc<AtomicU32>,
    links: mpsc::Sender<MockLink>,
}

impl FlakyConnector {
    pub fn new(fail_first: u32) -> (Self, mpsc::Receiver<MockLink>) {
        let (links, links_rx) = mpsc::channel(8);
        (
            Self {
                fail_first,
                attempts: Arc::new(AtomicU32::new(0)),
                links,
            },
            links_rx,
        )
    }
}

#[async_trait]
impl WsConnector for FlakyConnector {
    async fn connect(
        &self,
        _url: &str,
    ) -> Result<(Box<dyn WsSender>, Box<dyn WsReceiver>), StompError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(StompError::Transport(format!(
                "dial refused (attempt {attempt})"
            )));
        }
        let (sender, receiver, link) = mock_connection();
        self.links
            .send(link)
            .await
            .map_err(|_| StompError::Transport("test finished".to_string()))?;
        Ok((sender, receiver))
    }
}
