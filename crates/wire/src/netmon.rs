// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Netmon sidecar protocol: LF-delimited JSON over a Unix stream socket.
//!
//! The sidecar pushes events as `{"type": ..., "data": {...}}`; the agent
//! sends flat `{"command": ...}` objects and receives `{"success": ...}`
//! replies on the same stream, interleaved with events. A line without a
//! `type` field is a reply and resolves the oldest pending command.

use orc_core::SerialDevice;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-initiated event, sidecar → agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NetmonEvent {
    /// Sent once per connect, before anything else.
    NetworkDiscovery(NetworkDiscovery),
    /// Sent once per connect, right after the network discovery.
    DeviceDiscovery(DeviceDiscovery),
    /// Debounced interface change.
    NetworkChange(InterfaceReport),
    DeviceChange(DeviceChange),
    DhcpUpdate(DhcpLease),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDiscovery {
    #[serde(default)]
    pub interfaces: Vec<InterfaceReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDiscovery {
    #[serde(default)]
    pub devices: Vec<SerialDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceReport {
    pub interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operstate: Option<String>,
    #[serde(default)]
    pub ipv4_addresses: Vec<Ipv4Info>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl InterfaceReport {
    /// First address's subnet, the CIDR the interface cache keys on.
    pub fn primary_subnet(&self) -> Option<&str> {
        self.ipv4_addresses.first().map(|a| a.subnet.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ipv4Info {
    pub address: String,
    pub prefixlen: u8,
    pub subnet: String,
    pub network_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceChange {
    pub action: DeviceAction,
    pub device: SerialDevice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpLease {
    pub container_name: String,
    pub vnic_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Client command, agent → sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum NetmonCommand {
    StartDhcp {
        container_name: String,
        vnic_name: String,
        mac_address: String,
        container_pid: i64,
    },
    StopDhcp {
        container_name: String,
        vnic_name: String,
    },
    GetDhcpStatus,
    GetDeviceStatus,
    DiscoverDevices,
}

/// Command reply, sidecar → agent. One reply per command, FIFO.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetmonReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<SerialDevice>>,
}

impl NetmonReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: Some(message.into()), ..Self::default() }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Self::default() }
    }
}

/// One parsed line from the sidecar stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SidecarLine {
    Event(NetmonEvent),
    Reply(NetmonReply),
}

impl SidecarLine {
    /// Events carry a `type` field; anything else is a command reply.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        if value.get("type").is_some() {
            serde_json::from_value(value).map(SidecarLine::Event)
        } else {
            serde_json::from_value(value).map(SidecarLine::Reply)
        }
    }
}

#[cfg(test)]
#[path = "netmon_tests.rs"]
mod tests;
