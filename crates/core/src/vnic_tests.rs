// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn minimal(json: serde_json::Value) -> VnicConfig {
    serde_json::from_value(json).unwrap()
}

#[test]
fn parses_wire_form_with_mac_alias() {
    let vnic = minimal(serde_json::json!({
        "name": "eth0",
        "parent_interface": "eno1",
        "network_mode": "static",
        "ip": "10.0.0.50/24",
        "subnet": "10.0.0.0/24",
        "gateway": "10.0.0.1",
        "mac": "02:AA:BB:CC:DD:01",
    }));
    assert_eq!(vnic.network_mode, NetworkMode::Static);
    assert_eq!(vnic.mac_address.as_deref(), Some("02:AA:BB:CC:DD:01"));
    assert_eq!(vnic.static_ip().as_deref(), Some("10.0.0.50"));
}

#[test]
fn network_mode_defaults_to_dhcp() {
    let vnic = minimal(serde_json::json!({
        "name": "eth0",
        "parent_interface": "eno1",
    }));
    assert_eq!(vnic.network_mode, NetworkMode::Dhcp);
    assert_eq!(vnic.static_ip(), None);
}

#[test]
fn legacy_manual_mode_maps_to_static() {
    let vnic = minimal(serde_json::json!({
        "name": "eth0",
        "parent_interface": "eno1",
        "network_mode": "manual",
        "ip": "192.168.1.9",
    }));
    assert!(vnic.network_mode.is_static());
    assert_eq!(vnic.static_ip().as_deref(), Some("192.168.1.9"));
}

#[test]
fn static_ip_none_in_dhcp_mode_even_with_ip_set() {
    let vnic = minimal(serde_json::json!({
        "name": "eth0",
        "parent_interface": "eno1",
        "network_mode": "dhcp",
        "ip": "10.0.0.5/24",
    }));
    assert_eq!(vnic.static_ip(), None);
}

#[test]
fn round_trip_preserves_backfilled_fields() {
    let mut vnic = minimal(serde_json::json!({
        "name": "eth1",
        "parent_interface": "eth0",
    }));
    vnic.mac_address = Some("02:11:22:33:44:55".into());
    vnic.docker_network_name = Some("macvlan_eth0_10.0.0.0_24".into());
    vnic.dhcp_ip = Some("10.0.0.77".into());

    let json = serde_json::to_value(&vnic).unwrap();
    assert_eq!(json["mac_address"], "02:11:22:33:44:55");
    let back: VnicConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back, vnic);
}

#[test]
fn optional_fields_are_omitted_when_none() {
    let vnic = minimal(serde_json::json!({
        "name": "eth0",
        "parent_interface": "eno1",
    }));
    let json = serde_json::to_value(&vnic).unwrap();
    let obj = json.as_object().unwrap();
    assert!(!obj.contains_key("ip"));
    assert!(!obj.contains_key("dhcp_ip"));
    assert!(!obj.contains_key("docker_network_name"));
}
