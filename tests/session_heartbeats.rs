//! Heart-beats at the session level: negotiation, pulses and the watchdog.

mod common;

use std::time::Duration;

use common::*;
use stomp_ws::{HeartBeat, HeartBeatTolerance, SessionState, StompConfig, StompError, WsFrame};

fn hb_config(send_ms: u64, expect_ms: u64) -> StompConfig {
    StompConfig::default()
        .heart_beat(HeartBeat::new(
            Duration::from_millis(send_ms),
            Duration::from_millis(expect_ms),
        ))
        .heart_beat_tolerance(HeartBeatTolerance {
            outgoing_margin: Duration::from_millis(100),
            incoming_margin: Duration::from_millis(500),
        })
}

#[tokio::test]
async fn negotiation_takes_the_stricter_period() {
    let (session, _link) = connect_session_with(hb_config(1_000, 2_000), "1.2", "0,0").await;
    assert_eq!(session.heart_beat(), HeartBeat::NONE);

    let (session, _link) = connect_session_with(hb_config(1_000, 2_000), "1.2", "3000,4000").await;
    // send: max(1000, server expects 4000); expect: max(2000, server sends 3000)
    assert_eq!(
        session.heart_beat(),
        HeartBeat::new(Duration::from_millis(4_000), Duration::from_millis(3_000))
    );
}

#[tokio::test(start_paused = true)]
async fn idle_session_emits_newline_pulses() {
    let (_session, mut link) = connect_session_with(hb_config(1_000, 0), "1.2", "0,1000").await;

    // negotiated send period 1000ms, fired 100ms early
    let pulse = link.from_client.recv().await.expect("no heartbeat pulse");
    assert_eq!(payload_text(&pulse), "\n");
    let pulse = link.from_client.recv().await.expect("no second pulse");
    assert_eq!(payload_text(&pulse), "\n");
}

#[tokio::test(start_paused = true)]
async fn outgoing_frames_defer_the_pulse() {
    let (session, mut link) = connect_session_with(hb_config(1_000, 0), "1.2", "0,1000").await;

    let start = tokio::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(600)).await;
    session.send_to("/queue/x", "traffic").await.unwrap();
    let frame = link.from_client.recv().await.expect("no SEND");
    assert_eq!(command_of(&frame), "SEND");

    // the pulse restarts from the SEND, not from connect
    let pulse = link.from_client.recv().await.expect("no pulse");
    assert_eq!(payload_text(&pulse), "\n");
    assert!(start.elapsed() >= Duration::from_millis(1_400));
}

#[tokio::test(start_paused = true)]
async fn silent_server_fails_with_missing_heart_beat() {
    let (session, _link) = connect_session_with(hb_config(0, 1_000), "1.2", "1000,0").await;

    // expected period 1000ms + 500ms margin of silence
    tokio::time::sleep(Duration::from_millis(1_600)).await;
    assert_eq!(session.state(), SessionState::Failed);
    match session.failure_cause() {
        Some(StompError::MissingHeartBeat(deadline)) => {
            assert_eq!(deadline, Duration::from_millis(1_500));
        }
        other => panic!("expected MissingHeartBeat, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn message_fragments_keep_the_session_alive() {
    let (session, link) = connect_session_with(hb_config(0, 1_000), "1.2", "1000,0").await;

    // a slow multi-fragment message never completes within the watchdog
    // window, but each fragment is traffic and must reset it
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(700)).await;
        link.to_client
            .send(Ok(WsFrame::Text {
                payload: "MESS".to_string(),
                fin: false,
            }))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn incoming_heartbeats_keep_the_session_alive() {
    let (session, link) = connect_session_with(hb_config(0, 1_000), "1.2", "1000,0").await;

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        link.to_client
            .send(Ok(WsFrame::text("\n")))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.state(), SessionState::Connected);
}
