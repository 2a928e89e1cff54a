// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device status assembly for `get_device_status` and the per-device
//! consumption topic.
//!
//! Precedence: a tracked create/delete/error operation wins over the live
//! container state; a missing container is `not_found` (not an error).
//! DHCP-learned addresses override what the daemon reports for an
//! endpoint, and `*_internal` networks are hidden from the caller.

use crate::context::AgentContext;
use chrono::{DateTime, Utc};
use orc_wire::{DeviceStatusReply, NetworkStatus, SerialPortStatusEntry};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Build the full `get_device_status` reply for one runtime name.
pub async fn device_status(
    ctx: &AgentContext,
    correlation_id: Value,
    device_id: &str,
) -> DeviceStatusReply {
    if let Some(record) = ctx.ops.get(device_id) {
        debug!(device = device_id, status = ?record.status, "returning tracked operation status");
        let status = match serde_json::to_value(record.status) {
            Ok(Value::String(s)) => s,
            _ => "error".to_string(),
        };
        let mut reply = DeviceStatusReply::bare(correlation_id, status, device_id);
        reply.operation = Some(record.operation.to_string());
        reply.step = record.step;
        reply.started_at = Some(record.started_at);
        reply.updated_at = Some(record.updated_at);
        reply.message = match (&record.error, record.status) {
            (Some(error), _) => Some(format!("Operation failed: {error}")),
            (None, orc_core::OperationStatus::Creating) => {
                Some(format!("Container {device_id} is being created"))
            }
            (None, orc_core::OperationStatus::Deleting) => {
                Some(format!("Container {device_id} is being deleted"))
            }
            (None, orc_core::OperationStatus::Error) => None,
        };
        reply.error = record.error;
        return reply;
    }

    let view = match ctx.driver.inspect_container(device_id).await {
        Ok(Some(view)) => view,
        Ok(None) => {
            info!(device = device_id, "container not found");
            let mut reply = DeviceStatusReply::bare(correlation_id, "not_found", device_id);
            reply.message = Some(format!("Container {device_id} does not exist"));
            return reply;
        }
        Err(e) => {
            warn!(device = device_id, error = %e, "error retrieving container status");
            let mut reply = DeviceStatusReply::bare(correlation_id, "error", device_id);
            reply.error = Some(format!("Failed to retrieve container status: {e}"));
            return reply;
        }
    };

    // DHCP-learned addresses, keyed by network name and by parent prefix
    let vnics = ctx.store.load_vnics(device_id);
    let mut dhcp_by_network: BTreeMap<String, (String, Option<String>)> = BTreeMap::new();
    let mut dhcp_by_parent: BTreeMap<String, (String, Option<String>)> = BTreeMap::new();
    for vnic in &vnics {
        let Some(ip) = &vnic.dhcp_ip else { continue };
        let lease = (ip.clone(), vnic.dhcp_gateway.clone());
        if let Some(network) = &vnic.docker_network_name {
            dhcp_by_network.insert(network.clone(), lease.clone());
        }
        dhcp_by_parent.insert(vnic.parent_interface.clone(), lease);
    }

    let mut networks = BTreeMap::new();
    for (network_name, endpoint) in &view.networks {
        if network_name.ends_with("_internal") {
            debug!(network = %network_name, "hiding internal network from device status");
            continue;
        }
        let mut ip_address = endpoint.ip_address.clone();
        let mut gateway = endpoint.gateway.clone();
        let lease = dhcp_by_network.get(network_name).or_else(|| {
            dhcp_by_parent.iter().find_map(|(parent, lease)| {
                network_name.starts_with(&format!("macvlan_{parent}")).then_some(lease)
            })
        });
        if let Some((lease_ip, lease_gateway)) = lease {
            ip_address = Some(lease_ip.clone());
            if lease_gateway.is_some() {
                gateway = lease_gateway.clone();
            }
            debug!(network = %network_name, ip = %lease_ip, "using DHCP-learned address");
        }
        networks.insert(
            network_name.clone(),
            NetworkStatus { ip_address, mac_address: endpoint.mac_address.clone(), gateway },
        );
    }

    let mut reply = DeviceStatusReply::bare(correlation_id, "success", device_id);
    reply.container_status = Some(view.status.clone());
    reply.is_running = Some(view.running);
    reply.networks = Some(networks);
    reply.restart_count = Some(view.restart_count);
    reply.internal_ip = ctx.store.client_ip(device_id);
    reply.uptime_seconds = if view.running {
        view.started_at.as_deref().and_then(uptime_seconds_since)
    } else {
        None
    };
    reply.exit_code = view.exit_code;
    reply.health_status = view.health_status;

    let serial_ports = serial_port_entries(ctx, device_id);
    if !serial_ports.is_empty() {
        debug!(device = device_id, ports = serial_ports.len(), "including serial port status");
        reply.serial_ports = Some(serial_ports);
    }
    reply
}

/// Container resource limits formatted for the consumption topic:
/// `(cpu, memory)`, e.g. `("1.5 vCPU", "512 MB")` or `"unlimited"`.
pub async fn device_limits(ctx: &AgentContext, device_id: &str) -> (String, String) {
    let view = match ctx.driver.inspect_container(device_id).await {
        Ok(Some(view)) => view,
        Ok(None) => {
            warn!(device = device_id, "container not found when reading limits");
            return ("N/A".to_string(), "N/A".to_string());
        }
        Err(e) => {
            warn!(device = device_id, error = %e, "error reading container limits");
            return ("N/A".to_string(), "N/A".to_string());
        }
    };

    let cpu = match (view.nano_cpus, view.cpu_quota) {
        (Some(nano), _) if nano > 0 => format!("{:.1} vCPU", nano as f64 / 1e9),
        (_, Some(quota)) if quota > 0 => {
            let period = view.cpu_period.filter(|p| *p > 0).unwrap_or(100_000);
            format!("{:.1} vCPU", quota as f64 / period as f64)
        }
        _ => "unlimited".to_string(),
    };
    let memory = match view.memory_limit {
        Some(limit) if limit > 0 => format!("{} MB", limit / (1024 * 1024)),
        _ => "unlimited".to_string(),
    };
    (cpu, memory)
}

fn serial_port_entries(ctx: &AgentContext, device_id: &str) -> Vec<SerialPortStatusEntry> {
    ctx.store
        .load_serials(device_id)
        .serial_ports
        .into_iter()
        .map(|port| SerialPortStatusEntry {
            name: port.name,
            device_id: port.device_id,
            container_path: port.container_path,
            status: match serde_json::to_value(port.status) {
                Ok(Value::String(s)) => s,
                _ => "unknown".to_string(),
            },
            current_host_path: port.current_host_path,
            baud_rate: port.baud_rate,
        })
        .collect()
}

fn uptime_seconds_since(started_at: &str) -> Option<i64> {
    let started: DateTime<Utc> = started_at.parse().ok()?;
    let uptime = Utc::now().signed_duration_since(started).num_seconds();
    Some(uptime.max(0))
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
