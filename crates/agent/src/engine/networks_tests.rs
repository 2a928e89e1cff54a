// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::FakeDriver;
use orc_core::NetworkMode;
use orc_wire::{InterfaceReport, Ipv4Info};

fn cache_with(interface: &str, subnet: &str, gateway: Option<&str>) -> InterfaceCache {
    let cache = InterfaceCache::new();
    cache.apply_change(&InterfaceReport {
        interface: interface.to_string(),
        ipv4_addresses: vec![Ipv4Info {
            address: subnet.split('/').next().unwrap_or_default().to_string(),
            prefixlen: 24,
            subnet: subnet.to_string(),
            network_address: String::new(),
        }],
        gateway: gateway.map(str::to_string),
        ..InterfaceReport::default()
    });
    cache
}

fn vnic(parent: &str, subnet: Option<&str>, gateway: Option<&str>) -> orc_core::VnicConfig {
    orc_core::VnicConfig {
        name: "eth0".into(),
        parent_interface: parent.into(),
        network_mode: NetworkMode::Dhcp,
        ip: None,
        subnet: subnet.map(str::to_string),
        gateway: gateway.map(str::to_string),
        dns: None,
        mac_address: None,
        docker_network_name: None,
        dhcp_ip: None,
        dhcp_gateway: None,
    }
}

#[tokio::test]
async fn creates_network_from_explicit_cidr() {
    let driver = FakeDriver::new();
    let cache = InterfaceCache::new();

    let network =
        get_or_create_macvlan(&driver, &cache, "eno1", Some("10.0.0.0/24"), Some("10.0.0.1"))
            .await
            .unwrap();

    assert_eq!(network.name, "macvlan_eno1_10.0.0.0_24");
    assert_eq!(network.parent.as_deref(), Some("eno1"));
    assert_eq!(network.subnets, vec!["10.0.0.0/24".to_string()]);
    assert!(driver.calls().iter().any(|c| c == "create_network:macvlan_eno1_10.0.0.0_24"));
}

#[tokio::test]
async fn netmask_form_normalizes_to_same_network() {
    let driver = FakeDriver::new();
    let cache = InterfaceCache::new();

    let first =
        get_or_create_macvlan(&driver, &cache, "eno1", Some("10.0.0.0/24"), None).await.unwrap();
    let second =
        get_or_create_macvlan(&driver, &cache, "eno1", Some("255.255.255.0"), Some("10.0.0.1"))
            .await
            .unwrap();

    assert_eq!(first.name, second.name);
    // only one creation happened
    let creates = driver.calls().iter().filter(|c| c.starts_with("create_network")).count();
    assert_eq!(creates, 1);
}

#[tokio::test]
async fn auto_detects_subnet_from_cache() {
    let driver = FakeDriver::new();
    let cache = cache_with("eno1", "192.168.1.0/24", Some("192.168.1.1"));

    let network = get_or_create_macvlan(&driver, &cache, "eno1", None, None).await.unwrap();
    assert_eq!(network.name, "macvlan_eno1_192.168.1.0_24");
    assert_eq!(network.gateway.as_deref(), Some("192.168.1.1"));
}

#[tokio::test(start_paused = true)]
async fn unknown_interface_fails_after_cache_wait() {
    let driver = FakeDriver::new();
    let cache = InterfaceCache::new();

    let err = get_or_create_macvlan(&driver, &cache, "ghost0", None, None).await.unwrap_err();
    assert!(matches!(err, NetworkError::SubnetUnknown(ref iface) if iface == "ghost0"));
    assert!(driver.calls().is_empty(), "no driver calls for unknown subnet");
}

#[tokio::test]
async fn overlap_adopts_matching_network() {
    let driver = FakeDriver::new();
    let cache = InterfaceCache::new();

    // A network with the same subnet+parent but a different name exists
    driver.seed_network(crate::adapters::NetworkView {
        name: "legacy_macvlan".into(),
        driver: "macvlan".into(),
        parent: Some("eno1".into()),
        subnets: vec!["10.0.0.0/24".into()],
        gateway: None,
        containers: Vec::new(),
    });
    *driver.overlap_on_create.lock() = true;

    let network =
        get_or_create_macvlan(&driver, &cache, "eno1", Some("10.0.0.0/24"), None).await.unwrap();
    assert_eq!(network.name, "legacy_macvlan");
}

#[tokio::test]
async fn overlap_without_match_propagates() {
    let driver = FakeDriver::new();
    let cache = InterfaceCache::new();
    *driver.overlap_on_create.lock() = true;

    let err = get_or_create_macvlan(&driver, &cache, "eno1", Some("10.0.0.0/24"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::Driver(DriverError::Overlap(_))));
}

#[tokio::test]
async fn existing_network_is_reused_without_create() {
    let driver = FakeDriver::new();
    let cache = InterfaceCache::new();

    get_or_create_macvlan(&driver, &cache, "eno1", Some("10.0.0.0/24"), None).await.unwrap();
    driver.calls.lock().clear();

    get_or_create_macvlan(&driver, &cache, "eno1", Some("10.0.0.0/24"), None).await.unwrap();
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn internal_network_is_idempotent() {
    let driver = FakeDriver::new();

    let first = ensure_internal_network(&driver, "plc-a").await.unwrap();
    let second = ensure_internal_network(&driver, "plc-a").await.unwrap();
    assert_eq!(first.name, "plc-a_internal");
    assert_eq!(second.name, "plc-a_internal");
    let creates = driver.calls().iter().filter(|c| c.starts_with("create_bridge")).count();
    assert_eq!(creates, 1);
}

#[test]
fn validation_keys_collapse_equivalent_subnets() {
    let cache = InterfaceCache::new();
    let a = validation_key(&cache, &vnic("eno1", Some("10.0.0.0/24"), None)).unwrap();
    let b = validation_key(&cache, &vnic("eno1", Some("255.255.255.0"), Some("10.0.0.1"))).unwrap();
    assert_eq!(a, b);

    let c = validation_key(&cache, &vnic("eno1", Some("10.0.1.0/24"), None)).unwrap();
    assert_ne!(a, c);
}

#[test]
fn validation_key_uses_cache_then_sentinel() {
    let cache = cache_with("eno1", "192.168.9.0/24", None);
    let cached = validation_key(&cache, &vnic("eno1", None, None)).unwrap();
    assert_eq!(cached, "eno1/192.168.9.0/24");

    let cold = InterfaceCache::new();
    let a = validation_key(&cold, &vnic("eno1", None, None)).unwrap();
    let b = validation_key(&cold, &vnic("eno1", None, None)).unwrap();
    assert_eq!(a, b, "two auto vNICs on one parent must collide");
    assert_eq!(a, "eno1/auto");
}

#[test]
fn invalid_subnet_is_rejected_at_validation() {
    let cache = InterfaceCache::new();
    let err = validation_key(&cache, &vnic("eno1", Some("not-a-subnet"), None)).unwrap_err();
    assert!(matches!(err, NetworkError::Subnet(_)));
}
