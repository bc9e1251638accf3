//! The WebSocket capability consumed by the session.
//!
//! The core never selects a transport itself: it talks to a pair of trait
//! objects produced by a [`WsConnector`]. The send and receive halves are
//! separate traits so a reconnecting wrapper can forward the incoming
//! stream from a supervising task while sends go straight to the current
//! connection.

use async_trait::async_trait;

use crate::error::StompError;

/// One WebSocket frame as exposed to the STOMP layer.
///
/// `fin` marks the final fragment of a message; non-final fragments are
/// buffered by the assembler before STOMP decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text { payload: String, fin: bool },
    Binary { payload: Vec<u8>, fin: bool },
    Close { code: u16, reason: String },
}

impl WsFrame {
    pub fn text(payload: impl Into<String>) -> Self {
        WsFrame::Text {
            payload: payload.into(),
            fin: true,
        }
    }

    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        WsFrame::Binary {
            payload: payload.into(),
            fin: true,
        }
    }
}

/// Sending half of a WebSocket connection.
#[async_trait]
pub trait WsSender: Send {
    async fn send_text(&mut self, text: String) -> Result<(), StompError>;
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), StompError>;
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), StompError>;
}

impl std::fmt::Debug for dyn WsSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WsSender")
    }
}

/// Receiving half of a WebSocket connection. `None` means the stream ended
/// without a Close frame.
#[async_trait]
pub trait WsReceiver: Send {
    async fn recv(&mut self) -> Option<Result<WsFrame, StompError>>;
}

impl std::fmt::Debug for dyn WsReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WsReceiver")
    }
}

/// Factory for WebSocket connections; the session (or the reconnecting
/// wrapper) calls this once per physical connection.
#[async_trait]
pub trait WsConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn WsSender>, Box<dyn WsReceiver>), StompError>;
}

#[cfg(feature = "tungstenite")]
pub use tungstenite_impl::TungsteniteConnector;

#[cfg(feature = "tungstenite")]
mod tungstenite_impl {
    use super::*;

    use futures::stream::{SplitSink, SplitStream};
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
    use tracing::debug;

    use crate::version::StompVersion;

    type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Native transport backed by tokio-tungstenite.
    ///
    /// Tungstenite reassembles fragmented messages internally, so every
    /// frame it yields is final.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct TungsteniteConnector;

    pub struct TungsteniteSender {
        sink: SplitSink<WsStream, Message>,
    }

    pub struct TungsteniteReceiver {
        stream: SplitStream<WsStream>,
    }

    #[async_trait]
    impl WsConnector for TungsteniteConnector {
        async fn connect(
            &self,
            url: &str,
        ) -> Result<(Box<dyn WsSender>, Box<dyn WsReceiver>), StompError> {
            debug!(url, "opening websocket connection");
            let mut request = url
                .into_client_request()
                .map_err(|e| StompError::Transport(e.to_string()))?;
            let offered = StompVersion::PREFERRED
                .iter()
                .map(|v| v.subprotocol())
                .collect::<Vec<_>>()
                .join(", ");
            request.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                HeaderValue::from_str(&offered)
                    .map_err(|e| StompError::Transport(e.to_string()))?,
            );
            let (ws, _response) = connect_async(request)
                .await
                .map_err(|e| StompError::Transport(e.to_string()))?;
            let (sink, stream) = ws.split();
            Ok((
                Box::new(TungsteniteSender { sink }),
                Box::new(TungsteniteReceiver { stream }),
            ))
        }
    }

    #[async_trait]
    impl WsSender for TungsteniteSender {
        async fn send_text(&mut self, text: String) -> Result<(), StompError> {
            self.sink
                .send(Message::Text(text))
                .await
                .map_err(|e| StompError::Transport(e.to_string()))
        }

        async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), StompError> {
            self.sink
                .send(Message::Binary(data))
                .await
                .map_err(|e| StompError::Transport(e.to_string()))
        }

        async fn close(&mut self, code: u16, reason: &str) -> Result<(), StompError> {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_string().into(),
            };
            self.sink
                .send(Message::Close(Some(frame)))
                .await
                .map_err(|e| StompError::Transport(e.to_string()))
        }
    }

    #[async_trait]
    impl WsReceiver for TungsteniteReceiver {
        async fn recv(&mut self) -> Option<Result<WsFrame, StompError>> {
            loop {
                match self.stream.next().await? {
                    Ok(Message::Text(text)) => {
                        return Some(Ok(WsFrame::text(text.to_string())));
                    }
                    Ok(Message::Binary(data)) => {
                        return Some(Ok(WsFrame::binary(data.to_vec())));
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(f) => (f.code.into(), f.reason.to_string()),
                            None => (1005, String::new()),
                        };
                        return Some(Ok(WsFrame::Close { code, reason }));
                    }
                    // control frames are transport liveness, not STOMP traffic
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                        continue;
                    }
                    Err(e) => return Some(Err(StompError::Transport(e.to_string()))),
                }
            }
        }
    }
}
