use std::fmt;

use crate::error::DecodeError;

/// The STOMP commands of protocol versions 1.0 through 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// Parse a command line. Unknown commands are a decode error so the
    /// caller can distinguish garbage from valid-but-unsupported frames.
    pub fn parse(s: &str) -> Result<Self, DecodeError> {
        Ok(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(DecodeError::UnknownCommand(other.to_string())),
        })
    }

    /// Header escaping applies to every command except CONNECT and CONNECTED,
    /// which stay unescaped for STOMP 1.0 backward compatibility.
    pub fn supports_header_escapes(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }

    /// Only SEND, MESSAGE and ERROR frames may carry a body.
    pub fn allows_body(&self) -> bool {
        matches!(self, Command::Send | Command::Message | Command::Error)
    }

    /// Commands a client can receive. Everything else is client-to-server
    /// only and is rejected by the decoder.
    pub fn is_server_command(&self) -> bool {
        matches!(
            self,
            Command::Connected | Command::Message | Command::Receipt | Command::Error
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STOMP frame: command, ordered headers and raw body bytes.
///
/// Headers are kept in insertion order as `(key, value)` pairs;
/// `get_header` returns the first match, which is also the decode rule for
/// repeated keys (first occurrence wins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header (builder style).
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the frame body (builder style).
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First header value for `key`, if any.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, key: &str) -> bool {
        self.headers.iter().any(|(k, _)| k == key)
    }

    /// Body interpreted as UTF-8 text, if it is valid UTF-8.
    pub fn body_as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    // Convenience constructors for the client-originated frames.

    pub fn send(destination: &str) -> Self {
        Frame::new(Command::Send).header("destination", destination)
    }

    pub fn subscribe(id: &str, destination: &str, ack: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", ack)
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn ack(message_id: &str, subscription: &str) -> Self {
        Frame::new(Command::Ack)
            .header("id", message_id)
            .header("subscription", subscription)
    }

    pub fn nack(message_id: &str, subscription: &str) -> Self {
        Frame::new(Command::Nack)
            .header("id", message_id)
            .header("subscription", subscription)
    }

    pub fn begin(transaction: &str) -> Self {
        Frame::new(Command::Begin).header("transaction", transaction)
    }

    pub fn commit(transaction: &str) -> Self {
        Frame::new(Command::Commit).header("transaction", transaction)
    }

    pub fn abort(transaction: &str) -> Self {
        Frame::new(Command::Abort).header("transaction", transaction)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.command)?;
        for (k, v) in &self.headers {
            writeln!(f, "{}: {}", k, v)?;
        }
        writeln!(f, "({} body bytes)", self.body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_header_wins_on_lookup() {
        let f = Frame::send("/queue/a")
            .header("foo", "one")
            .header("foo", "two");
        assert_eq!(f.get_header("foo"), Some("one"));
    }

    #[test]
    fn escape_support_excludes_connect_frames() {
        assert!(!Command::Connect.supports_header_escapes());
        assert!(!Command::Connected.supports_header_escapes());
        assert!(Command::Send.supports_header_escapes());
        assert!(Command::Message.supports_header_escapes());
    }

    #[test]
    fn body_allowed_only_for_send_message_error() {
        for cmd in [Command::Send, Command::Message, Command::Error] {
            assert!(cmd.allows_body(), "{cmd} should allow a body");
        }
        for cmd in [Command::Subscribe, Command::Ack, Command::Disconnect] {
            assert!(!cmd.allows_body(), "{cmd} should not allow a body");
        }
    }
}
