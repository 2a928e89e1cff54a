// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-topic request payload contracts.
//!
//! Each topic's payload deserializes into one of these structs; a serde
//! failure is the contract violation and its message (naming the offending
//! field) goes straight into the error reply. Unknown extra fields are
//! tolerated; the cloud adds bookkeeping fields freely.

use orc_core::{SerialPortConfig, VnicConfig};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRuntimeRequest {
    pub correlation_id: i64,
    pub container_name: String,
    #[serde(default)]
    pub vnic_configs: Vec<VnicConfig>,
    #[serde(default)]
    pub serial_configs: Vec<SerialPortConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteDeviceRequest {
    pub correlation_id: i64,
    pub device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetDeviceStatusRequest {
    pub correlation_id: i64,
    pub device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetHostInterfacesRequest {
    pub correlation_id: i64,
    #[serde(default)]
    pub include_virtual: bool,
    #[serde(default = "default_true")]
    pub detailed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetSerialDevicesRequest {
    pub correlation_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionOrchestratorRequest {
    pub correlation_id: i64,
    #[serde(rename = "cpuPeriod", default = "default_period")]
    pub cpu_period: String,
    #[serde(rename = "memoryPeriod", default = "default_period")]
    pub memory_period: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionDeviceRequest {
    pub correlation_id: i64,
    pub device_id: String,
    #[serde(rename = "cpuPeriod", default = "default_period")]
    pub cpu_period: String,
    #[serde(rename = "memoryPeriod", default = "default_period")]
    pub memory_period: String,
}

/// Transparent HTTP proxy request toward a runtime container.
#[derive(Debug, Clone, Deserialize)]
pub struct RunCommandRequest {
    pub correlation_id: i64,
    pub device_id: String,
    pub method: String,
    pub api: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub params: Option<HashMap<String, String>>,
    #[serde(default)]
    pub files: Option<HashMap<String, FileUpload>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileUpload {
    pub content_base64: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// `start_device` / `stop_device` / `restart_device` passthroughs.
#[derive(Debug, Clone, Deserialize)]
pub struct DevicePassthroughRequest {
    pub correlation_id: i64,
    pub device_id: String,
}

fn default_true() -> bool {
    true
}

fn default_period() -> String {
    "1h".to_string()
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
