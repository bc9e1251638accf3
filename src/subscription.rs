//! Subscription handles.

use tokio::sync::mpsc;

use crate::error::StompError;
use crate::frame::Frame;
use crate::session::StompSession;

/// Subscription acknowledgement modes defined by STOMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

/// Handle to one active subscription.
///
/// Owns the receiving side of the subscription's message channel: a single
/// consumer, delivered in wire arrival order, not replayable. The channel
/// is unbounded, so a consumer that falls behind buffers messages rather
/// than losing them. It closes when the subscription is cancelled or the
/// session terminates; after a failure the cause is available from
/// [`StompSession::failure_cause`].
pub struct Subscription {
    id: String,
    destination: String,
    receiver: mpsc::UnboundedReceiver<Frame>,
    session: StompSession,
}

impl Subscription {
    pub(crate) fn new(
        id: String,
        destination: String,
        receiver: mpsc::UnboundedReceiver<Frame>,
        session: StompSession,
    ) -> Self {
        Self {
            id,
            destination,
            receiver,
            session,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Await the next MESSAGE frame for this subscription. `None` means the
    /// subscription was cancelled or the session terminated.
    pub async fn next(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Acknowledge a message by its ack id (`ack` header under STOMP 1.2,
    /// `message-id` before that).
    pub async fn ack(&self, message_id: &str) -> Result<(), StompError> {
        self.session.ack(message_id, &self.id).await
    }

    /// Negative-acknowledge a message.
    pub async fn nack(&self, message_id: &str) -> Result<(), StompError> {
        self.session.nack(message_id, &self.id).await
    }

    /// Send UNSUBSCRIBE and close this subscription's message channel.
    pub async fn unsubscribe(self) -> Result<(), StompError> {
        self.session.unsubscribe(&self.id).await
    }
}
