// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapters::ContainerDriver;
use crate::context::test_support::test_context;
use serde_json::json;

async fn dispatch(
    registry: &TopicRegistry,
    ctx: &Arc<AgentContext>,
    topic: &str,
    payload: Value,
) -> Option<Value> {
    registry
        .dispatch(ctx.clone(), Envelope { topic: topic.to_string(), payload })
        .await
        .map(|envelope| {
            assert_eq!(envelope.topic, topic, "reply rides on the request topic");
            envelope.payload
        })
}

fn static_vnic_payload() -> Value {
    json!([{
        "name": "eth0",
        "parent_interface": "eno1",
        "network_mode": "static",
        "ip": "10.0.0.50/24",
        "subnet": "10.0.0.0/24",
        "gateway": "10.0.0.1",
        "mac": "02:aa:bb:cc:dd:01",
    }])
}

#[test]
fn register_all_covers_the_full_topic_set() {
    let registry = TopicRegistry::register_all();
    let mut topics = registry.topics();
    topics.sort_unstable();
    assert_eq!(
        topics,
        vec![
            "connect",
            "connection_info",
            "create_new_runtime",
            "delete_device",
            "delete_orchestrator",
            "disconnect",
            "get_consumption_device",
            "get_consumption_orchestrator",
            "get_device_status",
            "get_host_interfaces",
            "get_serial_devices",
            "restart_device",
            "run_command",
            "start_device",
            "stop_device",
        ]
    );
}

#[tokio::test]
async fn unknown_topic_is_dropped_with_no_reply() {
    let t = test_context();
    let registry = TopicRegistry::register_all();
    let reply = dispatch(&registry, &t.ctx, "no_such_topic", json!({"correlation_id": 1})).await;
    assert!(reply.is_none());
}

#[tokio::test]
async fn create_acknowledges_then_runs_in_background() {
    let t = test_context();
    let registry = TopicRegistry::register_all();

    let reply = dispatch(
        &registry,
        &t.ctx,
        "create_new_runtime",
        json!({
            "correlation_id": 1,
            "container_name": "plc-a",
            "vnic_configs": static_vnic_payload(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(reply["status"], "creating");
    assert_eq!(reply["container_id"], "plc-a");
    assert_eq!(reply["correlation_id"], 1);
    assert_eq!(reply["action"], "create_new_runtime");

    // wait for the spawned pipeline to clear the operation
    for _ in 0..100 {
        if t.ctx.ops.get("plc-a").is_none() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(t.ctx.ops.get("plc-a").is_none(), "pipeline did not finish");

    // and the status topic now reports the running container with the MAC
    let status = dispatch(
        &registry,
        &t.ctx,
        "get_device_status",
        json!({"correlation_id": 2, "device_id": "plc-a"}),
    )
    .await
    .unwrap();
    assert_eq!(status["status"], "success");
    assert_eq!(status["container_status"], "running");
    let networks = status["networks"].as_object().unwrap();
    let endpoint = &networks["macvlan_eno1_10.0.0.0_24"];
    assert_eq!(endpoint["mac_address"], "02:aa:bb:cc:dd:01");
    assert_eq!(endpoint["ip_address"], "10.0.0.50");
}

#[tokio::test]
async fn duplicate_l2_network_is_rejected_synchronously() {
    let t = test_context();
    let registry = TopicRegistry::register_all();

    let mut vnics = static_vnic_payload();
    let mut second = vnics[0].clone();
    second["name"] = json!("b");
    second["mac"] = json!("02:aa:bb:cc:dd:02");
    second["ip"] = json!("10.0.0.51/24");
    vnics.as_array_mut().unwrap().push(second);

    let reply = dispatch(
        &registry,
        &t.ctx,
        "create_new_runtime",
        json!({"correlation_id": 9, "container_name": "plc-a", "vnic_configs": vnics}),
    )
    .await
    .unwrap();

    assert_eq!(reply["status"], "error");
    assert!(reply["error"].as_str().unwrap().contains("same MACVLAN network"));
    assert_eq!(reply["correlation_id"], 9);
    assert!(t.driver.calls().is_empty(), "no driver calls");
    assert!(t.ctx.store.load_all_vnics().is_empty(), "no persistence mutation");
    assert!(t.ctx.ops.get("plc-a").is_none());
}

#[tokio::test]
async fn mac_conflict_is_rejected_with_owner_name() {
    let t = test_context();
    let registry = TopicRegistry::register_all();
    t.ctx
        .store
        .save_vnics(
            "plc-old",
            vec![serde_json::from_value(json!({
                "name": "eth0",
                "parent_interface": "eno1",
                "mac_address": "02:11:22:33:44:55",
            }))
            .unwrap()],
        )
        .unwrap();

    let mut vnics = static_vnic_payload();
    vnics[0]["mac"] = json!("02:11:22:33:44:55");
    let reply = dispatch(
        &registry,
        &t.ctx,
        "create_new_runtime",
        json!({"correlation_id": 3, "container_name": "plc-a", "vnic_configs": vnics}),
    )
    .await
    .unwrap();

    assert_eq!(reply["status"], "error");
    let error = reply["error"].as_str().unwrap();
    assert!(error.contains("already in use"), "got: {error}");
    assert!(error.contains("plc-old"));
}

#[tokio::test]
async fn concurrent_operation_is_rejected_naming_the_operation() {
    let t = test_context();
    let registry = TopicRegistry::register_all();
    assert!(t.ctx.ops.set_creating("plc-a"));

    let reply = dispatch(
        &registry,
        &t.ctx,
        "delete_device",
        json!({"correlation_id": 4, "device_id": "plc-a"}),
    )
    .await
    .unwrap();

    assert_eq!(reply["status"], "error");
    assert!(reply["error"].as_str().unwrap().contains("create operation in progress"));
}

#[tokio::test]
async fn contract_violation_names_the_field() {
    let t = test_context();
    let registry = TopicRegistry::register_all();

    let reply = dispatch(
        &registry,
        &t.ctx,
        "delete_device",
        json!({"correlation_id": 5}),
    )
    .await
    .unwrap();

    assert_eq!(reply["status"], "error");
    assert!(reply["error"].as_str().unwrap().contains("device_id"));
    assert_eq!(reply["correlation_id"], 5, "correlation echoed even on validation failure");
}

#[tokio::test]
async fn device_status_for_unknown_name_is_not_found() {
    let t = test_context();
    let registry = TopicRegistry::register_all();

    let reply = dispatch(
        &registry,
        &t.ctx,
        "get_device_status",
        json!({"correlation_id": 6, "device_id": "ghost"}),
    )
    .await
    .unwrap();

    assert_eq!(reply["status"], "not_found");
    assert!(reply["message"].as_str().unwrap().contains("does not exist"));
}

#[tokio::test]
async fn passthrough_topics_ack_with_correlation() {
    let t = test_context();
    let registry = TopicRegistry::register_all();

    for topic in ["start_device", "stop_device", "restart_device"] {
        let reply = dispatch(
            &registry,
            &t.ctx,
            topic,
            json!({"correlation_id": 11, "device_id": "plc-a"}),
        )
        .await
        .unwrap();
        assert_eq!(reply["action"], topic);
        assert_eq!(reply["success"], true);
        assert_eq!(reply["correlation_id"], 11);
    }
}

#[tokio::test]
async fn serial_devices_come_from_the_device_cache() {
    let t = test_context();
    let registry = TopicRegistry::register_all();
    t.ctx.devices.apply_change(
        &t.ctx.store,
        &orc_wire::DeviceChange {
            action: orc_wire::DeviceAction::Add,
            device: orc_core::SerialDevice {
                path: "/dev/ttyUSB0".into(),
                by_id: Some("/dev/serial/by-id/usb-FTDI_ABC-if00-port0".into()),
                vendor_id: Some("0403".into()),
                subsystem: "tty".into(),
                ..Default::default()
            },
        },
    );

    let reply = dispatch(
        &registry,
        &t.ctx,
        "get_serial_devices",
        json!({"correlation_id": 12}),
    )
    .await
    .unwrap();

    assert_eq!(reply["count"], 1);
    assert_eq!(reply["devices"][0]["path"], "/dev/ttyUSB0");
    assert_eq!(
        reply["devices"][0]["device_id"],
        "/dev/serial/by-id/usb-FTDI_ABC-if00-port0"
    );
}

#[tokio::test]
async fn consumption_device_requires_known_device() {
    let t = test_context();
    let registry = TopicRegistry::register_all();

    let reply = dispatch(
        &registry,
        &t.ctx,
        "get_consumption_device",
        json!({"correlation_id": 13, "device_id": "ghost", "cpuPeriod": "1h", "memoryPeriod": "1h"}),
    )
    .await
    .unwrap();
    assert_eq!(reply["status"], "error");
    assert!(reply["error"].as_str().unwrap().contains("not found"));

    // known device returns buffered samples
    t.ctx.store.add_client("plc-a", "172.30.0.2").unwrap();
    t.ctx.usage.devices.add_device("plc-a");
    let now = t.ctx.clock.epoch_secs();
    t.ctx.usage.devices.add_sample("plc-a", 25.0, 128.0, now);

    let reply = dispatch(
        &registry,
        &t.ctx,
        "get_consumption_device",
        json!({"correlation_id": 14, "device_id": "plc-a", "cpuPeriod": "1h", "memoryPeriod": "1h"}),
    )
    .await
    .unwrap();
    assert_eq!(reply["device_id"], "plc-a");
    assert_eq!(reply["cpu_usage"][0]["cpu"], 25);
    assert_eq!(reply["memory_usage"][0]["memory"], 128);
}

#[tokio::test]
async fn notification_topics_produce_no_reply() {
    let t = test_context();
    let registry = TopicRegistry::register_all();

    assert!(dispatch(&registry, &t.ctx, "connect", json!({})).await.is_none());
    assert!(dispatch(&registry, &t.ctx, "disconnect", json!({})).await.is_none());
    assert!(dispatch(
        &registry,
        &t.ctx,
        "connection_info",
        json!({"event": "connection.established", "connected_at": "2026-01-05T10:00:00Z"})
    )
    .await
    .is_none());
}

#[tokio::test]
async fn delete_orchestrator_acks_before_teardown() {
    let t = test_context();
    let registry = TopicRegistry::register_all();
    *t.driver.labelled_container.lock() = Some("orchestrator-agent".into());
    t.driver.seed_container(crate::adapters::ContainerView {
        name: "orchestrator-agent".into(),
        running: true,
        ..Default::default()
    });

    let reply = dispatch(
        &registry,
        &t.ctx,
        "delete_orchestrator",
        json!({"correlation_id": 15}),
    )
    .await
    .unwrap();
    assert_eq!(reply["status"], "success");
    assert_eq!(reply["correlation_id"], 15);

    // own container still present immediately after the ack
    assert!(t.driver.inspect_container("orchestrator-agent").await.unwrap().is_some());

    // and gone after the 500 ms grace
    for _ in 0..100 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if t.driver.inspect_container("orchestrator-agent").await.unwrap().is_none() {
            return;
        }
    }
    panic!("self-teardown did not run");
}
