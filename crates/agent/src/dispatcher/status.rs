// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only status topics: device status, host interfaces, serial devices.

use crate::context::AgentContext;
use crate::dispatcher::{correlation_of, parse_payload, reply};
use crate::engine::status::device_status;
use orc_wire::{
    GetDeviceStatusRequest, GetHostInterfacesRequest, GetSerialDevicesRequest, HostInterface,
    HostInterfacesReply, SerialDeviceEntry, SerialDevicesReply,
};
use serde_json::Value;
use std::sync::Arc;
use sysinfo::Networks;
use tracing::{debug, info};

/// Interface-name prefixes treated as virtual and filtered out unless the
/// caller asks for them.
const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "docker", "br-", "veth", "virbr", "tailscale", "zt", "cni", "flannel", "kube-ipvs",
    "wg", "cilium", "macvtap",
];

pub async fn get_device_status(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let request: GetDeviceStatusRequest = match parse_payload("get_device_status", &payload) {
        Ok(request) => request,
        Err(e) => return reply(*e),
    };
    let correlation_id = correlation_of(&payload);
    if request.device_id.trim().is_empty() {
        return reply(orc_wire::ErrorReply::new(
            "get_device_status",
            correlation_id,
            "Device ID must be a non-empty string",
        ));
    }
    debug!(device = %request.device_id, "retrieving device status");
    reply(device_status(&ctx, correlation_id, &request.device_id).await)
}

fn include_interface(name: &str, include_virtual: bool) -> bool {
    if include_virtual {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    !VIRTUAL_INTERFACE_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

pub async fn get_host_interfaces(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let request: GetHostInterfacesRequest = match parse_payload("get_host_interfaces", &payload) {
        Ok(request) => request,
        Err(e) => return reply(*e),
    };
    debug!(
        include_virtual = request.include_virtual,
        detailed = request.detailed,
        "retrieving host network interfaces"
    );

    let networks = Networks::new_with_refreshed_list();
    let mut interfaces = Vec::new();
    for (name, data) in networks.iter() {
        if !include_interface(name, request.include_virtual) {
            debug!(interface = %name, "filtering out virtual interface");
            continue;
        }

        let ipv4_addresses: Vec<String> = data
            .ip_networks()
            .iter()
            .filter(|net| net.addr.is_ipv4() && !net.addr.is_loopback())
            .map(|net| net.addr.to_string())
            .collect();
        if ipv4_addresses.is_empty() && !request.include_virtual {
            continue;
        }

        let mut interface = HostInterface {
            name: name.clone(),
            ip_address: ipv4_addresses.first().cloned(),
            ipv4_addresses,
            mac_address: Some(data.mac_address().to_string()).filter(|m| m != "00:00:00:00:00:00"),
            subnet: None,
            gateway: None,
        };
        if request.detailed {
            if let Some(entry) = ctx.interfaces.get(name) {
                interface.subnet = entry.subnet;
                interface.gateway = entry.gateway;
            }
        }
        interfaces.push(interface);
    }
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    info!(count = interfaces.len(), "retrieved host network interfaces");

    reply(HostInterfacesReply {
        action: "get_host_interfaces",
        correlation_id: correlation_of(&payload),
        status: "success",
        interfaces,
    })
}

pub async fn get_serial_devices(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let _request: GetSerialDevicesRequest = match parse_payload("get_serial_devices", &payload) {
        Ok(request) => request,
        Err(e) => return reply(*e),
    };
    info!("retrieving list of available serial devices");

    let devices: Vec<SerialDeviceEntry> = ctx
        .devices
        .snapshot()
        .into_iter()
        .map(|device| SerialDeviceEntry {
            path: device.path,
            device_id: device.by_id,
            vendor_id: device.vendor_id,
            product_id: device.product_id,
            serial: device.serial,
            manufacturer: device.manufacturer,
            product: device.product,
        })
        .collect();
    debug!(count = devices.len(), "serial devices found");

    let count = devices.len();
    reply(SerialDevicesReply {
        action: "get_serial_devices",
        correlation_id: correlation_of(&payload),
        status: "success",
        devices,
        count,
    })
}
