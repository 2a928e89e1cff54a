// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn network_change_event_parses() {
    let line = r#"{"type":"network_change","data":{"interface":"eno1","index":2,"operstate":"UP","ipv4_addresses":[{"address":"192.168.2.10","prefixlen":24,"subnet":"192.168.2.0/24","network_address":"192.168.2.0"}],"gateway":"192.168.2.1","timestamp":"2026-01-05T10:00:00"}}"#;
    let parsed = SidecarLine::parse(line).unwrap();
    let SidecarLine::Event(NetmonEvent::NetworkChange(report)) = parsed else {
        panic!("expected network_change, got {parsed:?}");
    };
    assert_eq!(report.interface, "eno1");
    assert_eq!(report.primary_subnet(), Some("192.168.2.0/24"));
    assert_eq!(report.gateway.as_deref(), Some("192.168.2.1"));
}

#[test]
fn discovery_events_parse() {
    let line = r#"{"type":"network_discovery","data":{"interfaces":[],"timestamp":"t"}}"#;
    assert!(matches!(
        SidecarLine::parse(line).unwrap(),
        SidecarLine::Event(NetmonEvent::NetworkDiscovery(_))
    ));

    let line = r#"{"type":"device_discovery","data":{"devices":[{"path":"/dev/ttyUSB0","subsystem":"tty"}]}}"#;
    let SidecarLine::Event(NetmonEvent::DeviceDiscovery(discovery)) =
        SidecarLine::parse(line).unwrap()
    else {
        panic!("expected device_discovery");
    };
    assert_eq!(discovery.devices[0].path, "/dev/ttyUSB0");
}

#[test]
fn dhcp_update_event_parses() {
    let line = r#"{"type":"dhcp_update","data":{"container_name":"plc-a","vnic_name":"eth0","mac_address":"02:aa:bb:cc:dd:01","ip":"10.0.0.77","mask":"255.255.255.0","prefix":24,"gateway":"10.0.0.1","dns":"10.0.0.1","lease_time":3600,"timestamp":"t"}}"#;
    let SidecarLine::Event(NetmonEvent::DhcpUpdate(lease)) = SidecarLine::parse(line).unwrap()
    else {
        panic!("expected dhcp_update");
    };
    assert_eq!(lease.container_name, "plc-a");
    assert_eq!(lease.ip.as_deref(), Some("10.0.0.77"));
}

#[test]
fn reply_lines_have_no_type_field() {
    let parsed = SidecarLine::parse(r#"{"success":true,"message":"DHCP client started"}"#).unwrap();
    let SidecarLine::Reply(reply) = parsed else {
        panic!("expected reply");
    };
    assert!(reply.success);
    assert_eq!(reply.message.as_deref(), Some("DHCP client started"));

    let parsed = SidecarLine::parse(r#"{"success":false,"error":"Missing container_name"}"#).unwrap();
    assert!(matches!(parsed, SidecarLine::Reply(r) if !r.success));
}

#[test]
fn commands_serialize_flat() {
    let cmd = NetmonCommand::StartDhcp {
        container_name: "plc-a".into(),
        vnic_name: "eth0".into(),
        mac_address: "02:aa:bb:cc:dd:01".into(),
        container_pid: 4242,
    };
    let json = serde_json::to_value(&cmd).unwrap();
    assert_eq!(json["command"], "start_dhcp");
    assert_eq!(json["container_pid"], 4242);

    let json = serde_json::to_value(NetmonCommand::GetDhcpStatus).unwrap();
    assert_eq!(json, serde_json::json!({"command": "get_dhcp_status"}));
}

#[test]
fn device_change_round_trip() {
    let event = NetmonEvent::DeviceChange(DeviceChange {
        action: DeviceAction::Add,
        device: orc_core::SerialDevice {
            path: "/dev/ttyACM0".into(),
            subsystem: "tty".into(),
            ..Default::default()
        },
    });
    let line = serde_json::to_string(&event).unwrap();
    assert!(line.contains(r#""type":"device_change""#));
    assert_eq!(SidecarLine::parse(&line).unwrap(), SidecarLine::Event(event));
}

#[test]
fn malformed_lines_error() {
    assert!(SidecarLine::parse("garbage").is_err());
    assert!(SidecarLine::parse(r#"{"type":"no_such_event","data":{}}"#).is_err());
}
