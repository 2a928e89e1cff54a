// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-topic response payloads.
//!
//! Every reply echoes the request topic as `action` and the request's
//! `correlation_id` verbatim. Optional fields are omitted rather than sent
//! as null, matching what the cloud controller expects.

use orc_core::usage::{CpuPoint, MemoryPoint};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Validation/conflict/driver failure reply, any topic.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReply {
    pub action: String,
    pub correlation_id: Value,
    pub status: &'static str,
    pub error: String,
}

impl ErrorReply {
    pub fn new(action: impl Into<String>, correlation_id: Value, error: impl Into<String>) -> Self {
        Self { action: action.into(), correlation_id, status: "error", error: error.into() }
    }
}

/// Immediate `create_new_runtime` acknowledgement; the pipeline continues
/// in the background.
#[derive(Debug, Clone, Serialize)]
pub struct CreatingReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub status: &'static str,
    pub container_id: String,
    pub message: String,
}

impl CreatingReply {
    pub fn new(correlation_id: Value, container_name: &str) -> Self {
        Self {
            action: "create_new_runtime",
            correlation_id,
            status: "creating",
            container_id: container_name.to_string(),
            message: format!("Container creation started for {container_name}"),
        }
    }
}

/// Immediate `delete_device` acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct DeletingReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub status: &'static str,
    pub device_id: String,
    pub message: String,
}

impl DeletingReply {
    pub fn new(correlation_id: Value, device_id: &str) -> Self {
        Self {
            action: "delete_device",
            correlation_id,
            status: "deleting",
            device_id: device_id.to_string(),
            message: format!("Container deletion started for {device_id}"),
        }
    }
}

/// `delete_orchestrator` and similar bare-status replies.
#[derive(Debug, Clone, Serialize)]
pub struct SimpleStatusReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub status: &'static str,
}

/// One non-internal network of a runtime in a status reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStatus {
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerialPortStatusEntry {
    pub name: String,
    pub device_id: String,
    pub container_path: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_host_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baud_rate: Option<u32>,
}

/// `get_device_status` reply. Which fields are present depends on whether
/// the name has a tracked operation, a live container, or neither.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatusReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub status: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    // Tracked-operation fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    // Live-container fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networks: Option<BTreeMap<String, NetworkStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_ports: Option<Vec<SerialPortStatusEntry>>,
}

impl DeviceStatusReply {
    pub fn bare(correlation_id: Value, status: impl Into<String>, device_id: &str) -> Self {
        Self {
            action: "get_device_status",
            correlation_id,
            status: status.into(),
            device_id: device_id.to_string(),
            message: None,
            error: None,
            operation: None,
            step: None,
            started_at: None,
            updated_at: None,
            container_status: None,
            is_running: None,
            networks: None,
            restart_count: None,
            internal_ip: None,
            uptime_seconds: None,
            exit_code: None,
            health_status: None,
            serial_ports: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostInterface {
    pub name: String,
    pub ip_address: Option<String>,
    pub ipv4_addresses: Vec<String>,
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostInterfacesReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub status: &'static str,
    pub interfaces: Vec<HostInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SerialDeviceEntry {
    pub path: String,
    /// The stable by-id identifier, to be used as `device_id` in
    /// `create_new_runtime` serial configs.
    pub device_id: Option<String>,
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    pub serial: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SerialDevicesReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub status: &'static str,
    pub devices: Vec<SerialDeviceEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionOrchestratorReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub ip_addresses: Vec<String>,
    pub memory: String,
    pub cpu: String,
    pub os: String,
    pub kernel: String,
    pub disk: String,
    pub cpu_usage: Vec<CpuPoint>,
    pub memory_usage: Vec<MemoryPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionDeviceReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub device_id: String,
    pub memory: String,
    pub cpu: String,
    pub cpu_usage: Vec<CpuPoint>,
    pub memory_usage: Vec<MemoryPoint>,
}

/// Full HTTP response forwarded back from a runtime.
#[derive(Debug, Clone, Serialize)]
pub struct HttpResponsePayload {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub ok: bool,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunCommandReply {
    pub action: &'static str,
    pub correlation_id: Value,
    pub status: &'static str,
    pub http_response: HttpResponsePayload,
}

/// `start_device`/`stop_device`/`restart_device` passthrough ack.
#[derive(Debug, Clone, Serialize)]
pub struct AckReply {
    pub action: &'static str,
    pub success: bool,
    pub correlation_id: Value,
}

/// Periodic heartbeat payload, emitted every 5 seconds.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub timestamp: String,
}
