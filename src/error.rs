use thiserror::Error;

/// Errors produced while decoding bytes into a STOMP frame or encoding one
/// for the wire.
///
/// All variants carry owned data so the error can be cloned and fanned out
/// to every waiter when a session terminates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The command line did not match any known STOMP command.
    #[error("unknown STOMP command: {0:?}")]
    UnknownCommand(String),
    /// The command is valid STOMP but is never sent by a server, so a client
    /// has no business decoding it.
    #[error("unsupported frame type for a client: {0}")]
    UnsupportedFrame(String),
    /// A header line contained no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeaderLine(String),
    /// `content-length` was present but not a valid unsigned integer.
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),
    /// A `content-length` body was not followed by the NUL terminator.
    #[error("missing NUL terminator after body")]
    MissingNullTerminator,
    /// Command or header bytes were not valid UTF-8.
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(String),
    /// A header contained a `\` escape other than `\r`, `\n`, `\c`, `\\`.
    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),
    /// A body was supplied on a command that does not allow one.
    #[error("command {0} does not allow a body")]
    BodyNotAllowed(String),
    /// The input ended before a complete frame was available.
    #[error("truncated frame")]
    Truncated,
    /// I/O failure reported by the framing layer.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        DecodeError::Io(e.to_string())
    }
}

/// Errors surfaced by the session, transport and reconnection layers.
#[derive(Error, Debug, Clone)]
pub enum StompError {
    /// No CONNECTED frame arrived within the connection timeout.
    #[error("timed out waiting for CONNECTED frame")]
    ConnectionTimeout,
    /// A requested RECEIPT was not observed within the receipt timeout.
    #[error("no RECEIPT received for '{0}' within timeout")]
    LostReceipt(String),
    /// The server went silent past the negotiated heartbeat period plus
    /// tolerance margin.
    #[error("server heartbeat missing (expected every {0:?})")]
    MissingHeartBeat(std::time::Duration),
    /// The server sent an ERROR frame; carries its `message` header or body.
    #[error("STOMP ERROR frame received: {0}")]
    ErrorFrameReceived(String),
    /// The transport closed without a client-initiated disconnect.
    #[error("transport closed unexpectedly: {0}")]
    UnexpectedTransportClose(String),
    /// All reconnection attempts were consumed without a successful connect.
    #[error("reconnection exhausted after {attempts} attempts: {last_error}")]
    ReconnectionExhausted { attempts: u32, last_error: String },
    /// A frame could not be decoded or encoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    /// Transport-level send/receive/connect failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The session is closed (or disconnecting) and accepts no new work.
    #[error("session is closed")]
    SessionClosed,
}
