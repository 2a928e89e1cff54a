// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_topic_and_payload() {
    let envelope = Envelope::parse(
        r#"{"topic":"get_device_status","payload":{"correlation_id":7,"device_id":"plc-a"}}"#,
    )
    .unwrap();
    assert_eq!(envelope.topic, "get_device_status");
    assert_eq!(envelope.payload["device_id"], "plc-a");
    assert_eq!(envelope.correlation_id(), serde_json::json!(7));
}

#[test]
fn missing_payload_defaults_to_null() {
    let envelope = Envelope::parse(r#"{"topic":"connect"}"#).unwrap();
    assert_eq!(envelope.topic, "connect");
    assert!(envelope.payload.is_null());
    assert!(envelope.correlation_id().is_null());
}

#[test]
fn frame_round_trip() {
    let envelope = Envelope::new("heartbeat", serde_json::json!({"cpu_usage": 1.5}));
    let frame = envelope.to_frame().unwrap();
    let back = Envelope::parse(&frame).unwrap();
    assert_eq!(back, envelope);
}

#[test]
fn malformed_frame_is_an_error() {
    assert!(Envelope::parse("not json").is_err());
    assert!(Envelope::parse(r#"{"payload":{}}"#).is_err());
}
