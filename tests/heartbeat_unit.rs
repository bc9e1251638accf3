//! Heart-beat header parsing and negotiation.

use std::time::Duration;

use stomp_ws::{HeartBeat, negotiate, parse_heart_beat_header};

fn hb(send_ms: u64, expect_ms: u64) -> HeartBeat {
    HeartBeat::new(
        Duration::from_millis(send_ms),
        Duration::from_millis(expect_ms),
    )
}

#[test]
fn parse_standard_header() {
    assert_eq!(parse_heart_beat_header("10000,10000"), hb(10_000, 10_000));
    assert_eq!(parse_heart_beat_header("0,0"), HeartBeat::NONE);
    assert_eq!(parse_heart_beat_header("5000,15000"), hb(5_000, 15_000));
}

#[test]
fn parse_is_lenient() {
    assert_eq!(parse_heart_beat_header(" 10000 , 10000 "), hb(10_000, 10_000));
    assert_eq!(parse_heart_beat_header("10000"), hb(10_000, 0));
    assert_eq!(parse_heart_beat_header("10000,"), hb(10_000, 0));
    assert_eq!(parse_heart_beat_header(",10000"), hb(0, 10_000));
    assert_eq!(parse_heart_beat_header(""), HeartBeat::NONE);
    assert_eq!(parse_heart_beat_header("abc,10000"), hb(0, 10_000));
}

#[test]
fn header_formatting() {
    assert_eq!(hb(10_000, 5_000).to_header_value(), "10000,5000");
    assert_eq!(HeartBeat::NONE.to_header_value(), "0,0");
}

#[test]
fn client_zero_disables_both_directions() {
    assert_eq!(negotiate(HeartBeat::NONE, hb(10_000, 10_000)), HeartBeat::NONE);
}

#[test]
fn server_zero_disables_both_directions() {
    assert_eq!(negotiate(hb(5_000, 5_000), HeartBeat::NONE), HeartBeat::NONE);
}

#[test]
fn both_nonzero_takes_max() {
    // client can send every 4s, server wants every 5s -> send every 5s
    // client expects every 6s, server sends every 10s -> expect every 10s
    let n = negotiate(hb(4_000, 6_000), hb(10_000, 5_000));
    assert_eq!(n, hb(5_000, 10_000));
}

#[test]
fn directions_negotiate_independently() {
    // outgoing enabled, incoming disabled by the server
    let n = negotiate(hb(1_000, 1_000), hb(0, 2_000));
    assert_eq!(n.min_send_period, Duration::from_millis(2_000));
    assert_eq!(n.expected_period, Duration::ZERO);
}

#[test]
fn symmetric_negotiation() {
    let a = hb(3_000, 7_000);
    let b = hb(9_000, 1_000);
    let ab = negotiate(a, b);
    let ba = negotiate(b, a);
    // what one side sends is what the other expects
    assert_eq!(ab.min_send_period, ba.expected_period);
    assert_eq!(ab.expected_period, ba.min_send_period);
}
