//! Heart-beat negotiation and the liveness ticker.
//!
//! The ticker runs one independent task per enabled direction. Each task
//! races a reset signal against a deadline: a reset restarts the deadline,
//! the deadline firing emits a [`TickerEvent`] and restarts. Any frame
//! traffic counts as liveness, so the session calls `notify_msg_sent` /
//! `notify_msg_received` for every frame, not only heartbeats.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A heart-beat declaration: `(min_send_period, expected_period)` in the
/// sense of the STOMP `heart-beat` header. Zero disables a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval at which this side can send heartbeats.
    pub min_send_period: Duration,
    /// Largest interval at which this side wants to receive heartbeats.
    pub expected_period: Duration,
}

impl HeartBeat {
    pub const NONE: HeartBeat = HeartBeat {
        min_send_period: Duration::ZERO,
        expected_period: Duration::ZERO,
    };

    pub fn new(min_send_period: Duration, expected_period: Duration) -> Self {
        Self {
            min_send_period,
            expected_period,
        }
    }

    /// Value for the `heart-beat` header: "<sendMs>,<expectMs>".
    pub fn to_header_value(&self) -> String {
        format!(
            "{},{}",
            self.min_send_period.as_millis(),
            self.expected_period.as_millis()
        )
    }
}

/// Margins applied to the negotiated periods: outgoing heartbeats fire
/// early by `outgoing_margin`; incoming liveness is only declared dead
/// after `expected_period + incoming_margin` of silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeatTolerance {
    pub outgoing_margin: Duration,
    pub incoming_margin: Duration,
}

impl Default for HeartBeatTolerance {
    fn default() -> Self {
        Self {
            outgoing_margin: Duration::from_millis(100),
            incoming_margin: Duration::from_millis(500),
        }
    }
}

/// Parse a `heart-beat` header value ("cx,cy" in milliseconds). Missing or
/// invalid fields default to 0 (disabled), matching lenient server behavior.
pub fn parse_heart_beat_header(header: &str) -> HeartBeat {
    let mut parts = header.split(',');
    let min_send = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let expected = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    HeartBeat::new(
        Duration::from_millis(min_send),
        Duration::from_millis(expected),
    )
}

fn negotiate_direction(a: Duration, b: Duration) -> Duration {
    if a.is_zero() || b.is_zero() {
        Duration::ZERO
    } else {
        a.max(b)
    }
}

/// Negotiate the effective heart-beat from the client's request and the
/// server's CONNECTED reply: a direction is disabled when either side
/// declares 0, otherwise the period is the larger of the two.
pub fn negotiate(client: HeartBeat, server: HeartBeat) -> HeartBeat {
    HeartBeat {
        // what we must send: our ability vs. what the server wants to receive
        min_send_period: negotiate_direction(client.min_send_period, server.expected_period),
        // what we expect: our desire vs. what the server can send
        expected_period: negotiate_direction(client.expected_period, server.min_send_period),
    }
}

/// Events emitted by the ticker toward the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerEvent {
    /// The outgoing deadline elapsed with no traffic: send a heartbeat now.
    SendHeartBeat,
    /// The incoming deadline (period + margin) elapsed with no traffic.
    IncomingDead,
}

/// Independent outgoing/incoming liveness timers with reset-on-activity
/// semantics. Created by [`HeartBeatTicker::start`]; dropping the ticker
/// aborts both timer tasks.
pub struct HeartBeatTicker {
    sent_tx: Option<mpsc::UnboundedSender<()>>,
    received_tx: Option<mpsc::UnboundedSender<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl HeartBeatTicker {
    /// Start timer tasks for the negotiated heart-beat. A direction with a
    /// zero period gets no task. Events are delivered on `events`; the
    /// session loop decides how to react (send `\n`, or fail the session).
    pub fn start(
        negotiated: HeartBeat,
        tolerance: HeartBeatTolerance,
        events: mpsc::Sender<TickerEvent>,
    ) -> Self {
        let mut tasks = Vec::new();

        let sent_tx = if negotiated.min_send_period.is_zero() {
            None
        } else {
            let period = negotiated
                .min_send_period
                .saturating_sub(tolerance.outgoing_margin)
                .max(Duration::from_millis(1));
            let (tx, rx) = mpsc::unbounded_channel();
            debug!(?period, "starting outgoing heartbeat timer");
            tasks.push(tokio::spawn(timer_loop(
                period,
                rx,
                events.clone(),
                TickerEvent::SendHeartBeat,
            )));
            Some(tx)
        };

        let received_tx = if negotiated.expected_period.is_zero() {
            None
        } else {
            let period = negotiated.expected_period + tolerance.incoming_margin;
            let (tx, rx) = mpsc::unbounded_channel();
            debug!(?period, "starting incoming heartbeat watchdog");
            tasks.push(tokio::spawn(timer_loop(
                period,
                rx,
                events,
                TickerEvent::IncomingDead,
            )));
            Some(tx)
        };

        Self {
            sent_tx,
            received_tx,
            tasks,
        }
    }

    /// Reset the outgoing timer: a frame just went out.
    pub fn notify_msg_sent(&self) {
        if let Some(tx) = &self.sent_tx {
            let _ = tx.send(());
        }
    }

    /// Reset the incoming timer: a frame just came in.
    pub fn notify_msg_received(&self) {
        if let Some(tx) = &self.received_tx {
            let _ = tx.send(());
        }
    }

    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for HeartBeatTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Race a reset signal against the deadline. Reset first: restart the
/// deadline from now. Deadline first: emit the event and restart. Ends when
/// the reset channel or the event channel closes.
async fn timer_loop(
    period: Duration,
    mut reset_rx: mpsc::UnboundedReceiver<()>,
    events: mpsc::Sender<TickerEvent>,
    event: TickerEvent,
) {
    loop {
        tokio::select! {
            reset = reset_rx.recv() => {
                match reset {
                    Some(()) => {
                        trace!(?event, "heartbeat timer reset");
                        continue;
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(period) => {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }
    }
}
