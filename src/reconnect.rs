//! Transparent reconnection.
//!
//! [`ReconnectingConnector`] wraps any [`WsConnector`] and hands out proxy
//! halves that keep their identity across transport failures. A supervising
//! task owns the current underlying receiver and republishes its frames
//! through one forwarding channel; when the stream fails it re-dials the
//! same URL per the configured delay strategy, swaps the sender under the
//! shared lock, runs the `after_reconnect` hook and resumes forwarding.
//! Once `max_attempts` retries are consumed in a single outage the stream
//! is closed with [`StompError::ReconnectionExhausted`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::config::ReconnectConfig;
use crate::error::StompError;
use crate::transport::{WsConnector, WsFrame, WsReceiver, WsSender};

/// Wraps a connector with reconnect-on-failure behavior. The session using
/// the proxy connection never observes the intermediate failures.
pub struct ReconnectingConnector {
    inner: Arc<dyn WsConnector>,
    config: ReconnectConfig,
}

impl ReconnectingConnector {
    pub fn new(inner: impl WsConnector + 'static, config: ReconnectConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            config,
        }
    }
}

#[async_trait]
impl WsConnector for ReconnectingConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn WsSender>, Box<dyn WsReceiver>), StompError> {
        // First connection: delegate to the factory, retrying per policy so
        // a flaky first dial is recovered like any later outage.
        let (sender, receiver) = match self.inner.connect(url).await {
            Ok(pair) => pair,
            Err(e) => redial(&*self.inner, url, &self.config, e).await?,
        };

        let current = Arc::new(Mutex::new(sender));
        let (fwd_tx, fwd_rx) = mpsc::channel::<Result<WsFrame, StompError>>(32);
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);

        let task = SuperviseTask {
            connector: self.inner.clone(),
            config: self.config.clone(),
            url: url.to_string(),
            current: current.clone(),
            fwd_tx,
            stop_rx,
        };
        tokio::spawn(task.run(receiver));

        Ok((
            Box::new(ReconnectSender { current, stop_tx }),
            Box::new(ReconnectReceiver { fwd_rx }),
        ))
    }
}

/// Dial `url` until it succeeds or the retry budget is spent. `attempt` is
/// 0-based, so attempt 0 waits `delay_for(0)` first.
async fn redial(
    connector: &dyn WsConnector,
    url: &str,
    config: &ReconnectConfig,
    first_error: StompError,
) -> Result<(Box<dyn WsSender>, Box<dyn WsReceiver>), StompError> {
    let mut last_error = first_error.to_string();
    for attempt in 0..config.max_attempts {
        let delay = config.delay_strategy.delay_for(attempt);
        debug!(url, attempt, ?delay, "reconnect attempt scheduled");
        tokio::time::sleep(delay).await;
        match connector.connect(url).await {
            Ok(pair) => {
                debug!(url, attempt, "reconnected");
                return Ok(pair);
            }
            Err(e) => {
                warn!(url, attempt, error = %e, "reconnect attempt failed");
                last_error = e.to_string();
            }
        }
    }
    Err(StompError::ReconnectionExhausted {
        attempts: config.max_attempts,
        last_error,
    })
}

struct SuperviseTask {
    connector: Arc<dyn WsConnector>,
    config: ReconnectConfig,
    url: String,
    current: Arc<Mutex<Box<dyn WsSender>>>,
    fwd_tx: mpsc::Sender<Result<WsFrame, StompError>>,
    stop_rx: mpsc::Receiver<()>,
}

impl SuperviseTask {
    async fn run(mut self, mut receiver: Box<dyn WsReceiver>) {
        loop {
            let failure = tokio::select! {
                _ = self.stop_rx.recv() => return,
                item = receiver.recv() => match item {
                    Some(Ok(frame)) => {
                        if self.fwd_tx.send(Ok(frame)).await.is_err() {
                            return;
                        }
                        continue;
                    }
                    Some(Err(e)) => e,
                    None => StompError::UnexpectedTransportClose(
                        "incoming stream ended".to_string(),
                    ),
                },
            };

            debug!(url = %self.url, error = %failure, "connection lost, reconnecting");
            // a close() on the proxy must abort an in-progress redial, not
            // wait for the retry budget to resolve
            let redialed = tokio::select! {
                _ = self.stop_rx.recv() => return,
                result = redial(&*self.connector, &self.url, &self.config, failure) => result,
            };
            match redialed {
                Ok((sender, new_receiver)) => {
                    *self.current.lock().await = sender;
                    receiver = new_receiver;
                    if let Some(hook) = &self.config.after_reconnect {
                        hook().await;
                    }
                }
                Err(exhausted) => {
                    let _ = self.fwd_tx.send(Err(exhausted)).await;
                    return;
                }
            }
        }
    }
}

/// Sending half of the proxy: delegates to whichever underlying connection
/// is current at call time.
struct ReconnectSender {
    current: Arc<Mutex<Box<dyn WsSender>>>,
    stop_tx: mpsc::Sender<()>,
}

#[async_trait]
impl WsSender for ReconnectSender {
    async fn send_text(&mut self, text: String) -> Result<(), StompError> {
        self.current.lock().await.send_text(text).await
    }

    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), StompError> {
        self.current.lock().await.send_binary(data).await
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), StompError> {
        let _ = self.stop_tx.send(()).await;
        self.current.lock().await.close(code, reason).await
    }
}

/// Receiving half of the proxy: one stable stream across reconnects.
struct ReconnectReceiver {
    fwd_rx: mpsc::Receiver<Result<WsFrame, StompError>>,
}

#[async_trait]
impl WsReceiver for ReconnectReceiver {
    async fn recv(&mut self) -> Option<Result<WsFrame, StompError>> {
        self.fwd_rx.recv().await
    }
}
