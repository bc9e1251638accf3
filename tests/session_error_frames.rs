//! Terminal failures: ERROR frames and unexpected transport loss.

mod common;

use std::time::Duration;

use common::*;
use stomp_ws::{AckMode, SessionState, StompConfig, StompError, WsFrame};

async fn wait_for_failure(session: &stomp_ws::StompSession) {
    for _ in 0..200 {
        if session.state() == SessionState::Failed {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session never failed, state is {:?}", session.state());
}

#[tokio::test]
async fn error_frame_fails_the_session() {
    let (session, mut link) = connect_session(StompConfig::default()).await;

    link.to_client
        .send(Ok(WsFrame::text(
            "ERROR\nmessage:queue does not exist\n\n\0",
        )))
        .await
        .unwrap();

    wait_for_failure(&session).await;
    match session.failure_cause() {
        Some(StompError::ErrorFrameReceived(msg)) => assert_eq!(msg, "queue does not exist"),
        other => panic!("expected ErrorFrameReceived cause, got {other:?}"),
    }

    // the transport is closed after the failure
    let (code, _) = link.closed.recv().await.expect("transport not closed");
    assert_eq!(code, 1002);
}

#[tokio::test]
async fn error_body_is_used_when_the_message_header_is_absent() {
    let (session, mut link) = connect_session(StompConfig::default()).await;

    link.to_client
        .send(Ok(WsFrame::text("ERROR\n\ndetails in body\0")))
        .await
        .unwrap();

    wait_for_failure(&session).await;
    match session.failure_cause() {
        Some(StompError::ErrorFrameReceived(msg)) => assert_eq!(msg, "details in body"),
        other => panic!("expected ErrorFrameReceived cause, got {other:?}"),
    }
}

#[tokio::test]
async fn pending_receipt_waiters_observe_the_failure() {
    let (session, mut link) = connect_session(StompConfig::default().auto_receipt(true)).await;

    let send = tokio::spawn({
        let session = session.clone();
        async move { session.send_to("/queue/orders", "hello").await }
    });
    let _frame = link.from_client.recv().await.expect("no SEND");

    link.to_client
        .send(Ok(WsFrame::text("ERROR\nmessage:boom\n\n\0")))
        .await
        .unwrap();

    match send.await.unwrap() {
        Err(StompError::ErrorFrameReceived(msg)) => assert_eq!(msg, "boom"),
        other => panic!("expected the terminal cause, got {other:?}"),
    }
}

#[tokio::test]
async fn subscriptions_end_when_the_session_fails() {
    let (session, mut link) = connect_session(StompConfig::default()).await;

    let mut sub = session.subscribe("/topic/prices", AckMode::Auto).await.unwrap();
    let _ = link.from_client.recv().await;

    link.to_client
        .send(Ok(WsFrame::text("ERROR\nmessage:boom\n\n\0")))
        .await
        .unwrap();

    assert!(sub.next().await.is_none());
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn sends_after_failure_return_the_cause() {
    let (session, mut link) = connect_session(StompConfig::default()).await;

    link.to_client
        .send(Ok(WsFrame::text("ERROR\nmessage:boom\n\n\0")))
        .await
        .unwrap();
    wait_for_failure(&session).await;

    match session.send_to("/queue/orders", "late").await {
        Err(StompError::ErrorFrameReceived(msg)) => assert_eq!(msg, "boom"),
        other => panic!("expected the terminal cause, got {other:?}"),
    }
}

#[tokio::test]
async fn server_close_frame_is_an_unexpected_close() {
    let (session, mut link) = connect_session(StompConfig::default()).await;

    link.to_client
        .send(Ok(WsFrame::Close {
            code: 1001,
            reason: "going away".to_string(),
        }))
        .await
        .unwrap();

    wait_for_failure(&session).await;
    assert!(matches!(
        session.failure_cause(),
        Some(StompError::UnexpectedTransportClose(_))
    ));
}

#[tokio::test]
async fn dropped_transport_is_an_unexpected_close() {
    let (session, link) = connect_session(StompConfig::default()).await;

    drop(link);
    wait_for_failure(&session).await;
    assert!(matches!(
        session.failure_cause(),
        Some(StompError::UnexpectedTransportClose(_))
    ));
}
