//! Async STOMP 1.0-1.2 client over WebSocket.
//!
//! The crate is organized around three pieces:
//!
//! - a byte-exact frame codec ([`codec`], [`frame`], [`parser`]) handling
//!   header escaping, `content-length` bodies and NUL termination;
//! - a session state machine ([`session`]) driving the CONNECT handshake,
//!   heart-beat negotiation ([`heartbeat`]), receipt-tracked sends
//!   ([`receipt`]), subscriptions ([`subscription`]), transactions and
//!   graceful shutdown over one WebSocket connection;
//! - a transparent reconnection layer ([`reconnect`]) presenting one
//!   logical connection across transport failures.
//!
//! The WebSocket transport itself is a capability injected through the
//! traits in [`transport`]; the `tungstenite` feature (on by default)
//! supplies a native tokio-tungstenite implementation.
//!
//! ```no_run
//! use stomp_ws::{AckMode, StompClient, StompConfig};
//!
//! # async fn demo() -> Result<(), stomp_ws::StompError> {
//! let client = StompClient::new(StompConfig::default());
//! let session = client.connect("ws://localhost:15674/ws").await?;
//!
//! let mut sub = session.subscribe("/queue/greetings", AckMode::Auto).await?;
//! session.send_to("/queue/greetings", "hello").await?;
//! if let Some(message) = sub.next().await {
//!     println!("got: {:?}", message.body_as_text());
//! }
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod headers;
mod parser;
pub mod receipt;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod version;

pub mod heartbeat;
pub use heartbeat::{
    HeartBeat, HeartBeatTicker, HeartBeatTolerance, TickerEvent, negotiate,
    parse_heart_beat_header,
};

pub use assembler::PartialMessageAssembler;
pub use codec::{StompCodec, StompItem, decode_message, encode_frame};
pub use config::{ReconnectConfig, RetryDelayStrategy, StompConfig};
pub use error::{DecodeError, StompError};
pub use frame::{Command, Frame};
pub use reconnect::ReconnectingConnector;
pub use session::{SessionState, StompClient, StompSession};
pub use subscription::{AckMode, Subscription};
pub use transport::{WsConnector, WsFrame, WsReceiver, WsSender};
pub use version::StompVersion;
