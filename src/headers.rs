//! Typed read-only views over a frame's raw header list.
//!
//! Each view borrows the [`Frame`] and parses specific keys on demand;
//! anything not covered stays reachable through `Frame::get_header`.

use crate::frame::Frame;
use crate::version::StompVersion;

/// View over a CONNECTED frame's headers.
pub struct ConnectedHeaders<'a>(pub &'a Frame);

impl<'a> ConnectedHeaders<'a> {
    pub fn version(&self) -> Option<StompVersion> {
        self.0
            .get_header("version")
            .and_then(StompVersion::from_header_value)
    }

    /// Raw `heart-beat` header value ("sx,sy"), if advertised.
    pub fn heart_beat(&self) -> Option<&'a str> {
        self.0.get_header("heart-beat")
    }

    pub fn server(&self) -> Option<&'a str> {
        self.0.get_header("server")
    }

    pub fn session(&self) -> Option<&'a str> {
        self.0.get_header("session")
    }
}

/// View over a MESSAGE frame's headers.
pub struct MessageHeaders<'a>(pub &'a Frame);

impl<'a> MessageHeaders<'a> {
    pub fn destination(&self) -> Option<&'a str> {
        self.0.get_header("destination")
    }

    pub fn message_id(&self) -> Option<&'a str> {
        self.0.get_header("message-id")
    }

    pub fn subscription(&self) -> Option<&'a str> {
        self.0.get_header("subscription")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.0
            .get_header("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn content_type(&self) -> Option<&'a str> {
        self.0.get_header("content-type")
    }

    /// The `ack` header value (the id to ACK with under STOMP 1.2).
    pub fn ack(&self) -> Option<&'a str> {
        self.0.get_header("ack")
    }
}

/// View over a RECEIPT frame's headers.
pub struct ReceiptHeaders<'a>(pub &'a Frame);

impl<'a> ReceiptHeaders<'a> {
    pub fn receipt_id(&self) -> Option<&'a str> {
        self.0.get_header("receipt-id")
    }
}

/// View over an ERROR frame's headers.
pub struct ErrorHeaders<'a>(pub &'a Frame);

impl<'a> ErrorHeaders<'a> {
    pub fn message(&self) -> Option<&'a str> {
        self.0.get_header("message")
    }

    pub fn content_type(&self) -> Option<&'a str> {
        self.0.get_header("content-type")
    }

    /// Best human-readable description: `message` header, else the body
    /// text, else a placeholder.
    pub fn describe(&self) -> String {
        if let Some(msg) = self.message() {
            return msg.to_string();
        }
        match self.0.body_as_text() {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => "(no message)".to_string(),
        }
    }
}
