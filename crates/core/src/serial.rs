// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serial-port intents and host serial device descriptions.
//!
//! A port intent binds a stable `/dev/serial/by-id` identifier to a path
//! inside the runtime container. Runtime state (status, current host path,
//! major/minor) starts disconnected and is updated from sidecar hotplug
//! events.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialPortStatus {
    Connected,
    #[default]
    Disconnected,
    Error,
}

/// Declared serial passthrough for one runtime container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialPortConfig {
    pub name: String,
    /// Stable identifier from `/dev/serial/by-id/`.
    pub device_id: String,
    /// Path inside the container, e.g. `/dev/modbus0`.
    pub container_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baud_rate: Option<u32>,

    // Runtime state, maintained by the agent from device events.
    #[serde(default)]
    pub status: SerialPortStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_host_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<u32>,
}

impl SerialPortConfig {
    /// Reset runtime state to the just-persisted defaults.
    pub fn with_initial_state(mut self) -> Self {
        self.status = SerialPortStatus::Disconnected;
        self.current_host_path = None;
        self.major = None;
        self.minor = None;
        self
    }
}

/// Persisted wrapper: `{ "serial_ports": [...] }` per runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerialPorts {
    #[serde(default)]
    pub serial_ports: Vec<SerialPortConfig>,
}

/// One serial device as observed on the host by the sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerialDevice {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default)]
    pub subsystem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

#[cfg(test)]
#[path = "serial_tests.rs"]
mod tests;
