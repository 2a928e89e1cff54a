// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::ContainerDriver;
use crate::context::test_support::test_context;
use orc_core::{NetworkMode, VnicConfig};
use orc_wire::Ipv4Info;

fn vnic(container_net: &str, mode: NetworkMode) -> VnicConfig {
    VnicConfig {
        name: "eth0".into(),
        parent_interface: "eno1".into(),
        network_mode: mode,
        ip: if mode.is_static() { Some("192.168.1.50/24".into()) } else { None },
        subnet: Some("192.168.1.0/24".into()),
        gateway: Some("192.168.1.1".into()),
        dns: None,
        mac_address: Some("02:aa:bb:cc:dd:01".into()),
        docker_network_name: Some(container_net.into()),
        dhcp_ip: None,
        dhcp_gateway: None,
    }
}

fn report(interface: &str, subnet: &str, gateway: &str) -> InterfaceReport {
    InterfaceReport {
        interface: interface.to_string(),
        ipv4_addresses: vec![Ipv4Info {
            address: subnet.split('/').next().unwrap_or_default().to_string(),
            prefixlen: 24,
            subnet: subnet.to_string(),
            network_address: String::new(),
        }],
        gateway: Some(gateway.to_string()),
        ..InterfaceReport::default()
    }
}

/// A runtime attached to the old network for eno1, with persisted intent.
async fn seed_runtime(t: &crate::context::test_support::TestContext, mode: NetworkMode) {
    let old_net = "macvlan_eno1_192.168.1.0_24";
    t.driver
        .create_macvlan_network(old_net, "eno1", "192.168.1.0/24", Some("192.168.1.1"))
        .await
        .unwrap();
    t.driver.seed_container(crate::adapters::ContainerView {
        name: "plc-a".into(),
        running: true,
        pid: 4242,
        ..Default::default()
    });
    t.driver
        .connect_network(
            old_net,
            "plc-a",
            crate::adapters::EndpointRequest {
                ipv4_address: None,
                mac_address: Some("02:aa:bb:cc:dd:01".into()),
            },
        )
        .await
        .unwrap();
    t.ctx.store.save_vnics("plc-a", vec![vnic(old_net, mode)]).unwrap();
    t.driver.calls.lock().clear();
}

#[tokio::test]
async fn host_change_moves_container_to_new_network_with_same_mac() {
    let t = test_context();
    seed_runtime(&t, NetworkMode::Dhcp).await;
    let reconciler = Reconciler::new(t.ctx.clone());

    reconciler
        .reconnect_containers("eno1", "192.168.2.0/24", Some("192.168.2.1"))
        .await;

    let view = t.driver.inspect_container("plc-a").await.unwrap().unwrap();
    assert!(!view.networks.contains_key("macvlan_eno1_192.168.1.0_24"));
    let endpoint = view.networks.get("macvlan_eno1_192.168.2.0_24").expect("new attachment");
    assert_eq!(endpoint.mac_address.as_deref(), Some("02:aa:bb:cc:dd:01"));

    // persisted intent untouched except for nothing at all
    let persisted = t.ctx.store.load_vnics("plc-a");
    assert_eq!(persisted[0].subnet.as_deref(), Some("192.168.1.0/24"));
    assert_eq!(persisted[0].mac_address.as_deref(), Some("02:aa:bb:cc:dd:01"));
}

#[tokio::test]
async fn static_vnic_reconnects_with_persisted_ip_stripped_of_cidr() {
    let t = test_context();
    seed_runtime(&t, NetworkMode::Static).await;
    let reconciler = Reconciler::new(t.ctx.clone());

    reconciler
        .reconnect_containers("eno1", "192.168.2.0/24", Some("192.168.2.1"))
        .await;

    let calls = t.driver.calls();
    assert!(
        calls.iter().any(|c| c
            == "connect:macvlan_eno1_192.168.2.0_24:plc-a:mac=02:aa:bb:cc:dd:01:ip=192.168.1.50"),
        "reconnect with persisted MAC and bare IP, got {calls:?}"
    );
}

#[tokio::test]
async fn all_old_parent_networks_are_disconnected() {
    let t = test_context();
    seed_runtime(&t, NetworkMode::Dhcp).await;
    // stale second network for the same parent, different CIDR
    t.driver
        .create_macvlan_network("macvlan_eno1_10.9.0.0_24", "eno1", "10.9.0.0/24", None)
        .await
        .unwrap();
    t.driver
        .connect_network("macvlan_eno1_10.9.0.0_24", "plc-a", Default::default())
        .await
        .unwrap();
    // an unrelated parent's network stays
    t.driver
        .create_macvlan_network("macvlan_eth7_10.8.0.0_24", "eth7", "10.8.0.0/24", None)
        .await
        .unwrap();
    t.driver
        .connect_network("macvlan_eth7_10.8.0.0_24", "plc-a", Default::default())
        .await
        .unwrap();

    let reconciler = Reconciler::new(t.ctx.clone());
    reconciler.reconnect_containers("eno1", "192.168.2.0/24", None).await;

    let view = t.driver.inspect_container("plc-a").await.unwrap().unwrap();
    assert!(!view.networks.contains_key("macvlan_eno1_192.168.1.0_24"));
    assert!(!view.networks.contains_key("macvlan_eno1_10.9.0.0_24"));
    assert!(view.networks.contains_key("macvlan_eth7_10.8.0.0_24"), "other parent untouched");
}

#[tokio::test]
async fn reconciliation_is_idempotent() {
    let t = test_context();
    seed_runtime(&t, NetworkMode::Dhcp).await;
    let reconciler = Reconciler::new(t.ctx.clone());

    reconciler.reconnect_containers("eno1", "192.168.2.0/24", Some("192.168.2.1")).await;
    let after_first = t.driver.inspect_container("plc-a").await.unwrap().unwrap().networks;

    reconciler.reconnect_containers("eno1", "192.168.2.0/24", Some("192.168.2.1")).await;
    let after_second = t.driver.inspect_container("plc-a").await.unwrap().unwrap().networks;

    assert_eq!(after_first.keys().collect::<Vec<_>>(), after_second.keys().collect::<Vec<_>>());
    assert_eq!(
        after_second["macvlan_eno1_192.168.2.0_24"].mac_address.as_deref(),
        Some("02:aa:bb:cc:dd:01")
    );
}

#[tokio::test]
async fn interfaces_without_matching_vnics_are_ignored() {
    let t = test_context();
    seed_runtime(&t, NetworkMode::Dhcp).await;
    let reconciler = Reconciler::new(t.ctx.clone());

    reconciler.reconnect_containers("wlan0", "10.1.0.0/24", None).await;
    assert!(t.driver.calls().is_empty(), "no work for unrelated interface");
}

#[tokio::test(start_paused = true)]
async fn debounce_collapses_bursts_into_one_pass() {
    let t = test_context();
    seed_runtime(&t, NetworkMode::Dhcp).await;
    let reconciler = Arc::new(Reconciler::new(t.ctx.clone()));

    // burst: three events 1 s apart, each restarting the window
    reconciler.clone().observe_change(report("eno1", "192.168.2.0/24", "192.168.2.1"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    reconciler.clone().observe_change(report("eno1", "192.168.2.0/24", "192.168.2.1"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    reconciler.clone().observe_change(report("eno1", "192.168.3.0/24", "192.168.3.1"));

    // 2 s after the last event: still quiet, nothing processed
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(
        !t.driver.calls().iter().any(|c| c.starts_with("connect:")),
        "no pass inside the debounce window"
    );

    // past the window: exactly one pass, using the latest report
    tokio::time::sleep(Duration::from_secs(2)).await;
    let connects =
        t.driver.calls().iter().filter(|c| c.starts_with("connect:macvlan_eno1_")).count();
    assert_eq!(connects, 1, "calls: {:?}", t.driver.calls());
    let view = t.driver.inspect_container("plc-a").await.unwrap().unwrap();
    assert!(view.networks.contains_key("macvlan_eno1_192.168.3.0_24"));
}
