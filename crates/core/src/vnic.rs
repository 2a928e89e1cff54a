// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vNIC intent: one desired network endpoint of a runtime container on a
//! named host interface.
//!
//! The persisted intent is the source of truth for reconciliation. Only two
//! field families are ever written back after create: the observed
//! `docker_network_name`/`mac_address` pair, and the DHCP lease fields.

use serde::{Deserialize, Serialize};

/// Addressing mode of a vNIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Dhcp,
    // "manual" is the legacy wire spelling still emitted by older backends
    #[serde(alias = "manual")]
    Static,
}

impl NetworkMode {
    pub fn is_static(self) -> bool {
        matches!(self, NetworkMode::Static)
    }
}

/// Declarative vNIC configuration, as received from the cloud and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VnicConfig {
    pub name: String,
    pub parent_interface: String,
    #[serde(default)]
    pub network_mode: NetworkMode,

    /// Desired IP for static mode; may carry a CIDR suffix on input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Dotted netmask or CIDR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,

    /// Pinned endpoint MAC. Accepted as `mac` on the wire; once chosen
    /// (user-supplied or generated) it stays for the life of the vNIC.
    #[serde(default, alias = "mac", skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    /// Backfilled after attach; preferred endpoint lookup key from then on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_network_name: Option<String>,

    /// Learned from the sidecar's dhcp_update events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_gateway: Option<String>,
}

impl VnicConfig {
    /// The static IP with any CIDR suffix stripped, when in static mode.
    pub fn static_ip(&self) -> Option<String> {
        if !self.network_mode.is_static() {
            return None;
        }
        self.ip
            .as_deref()
            .map(|ip| ip.trim().split('/').next().unwrap_or_default().to_string())
            .filter(|ip| !ip.is_empty())
    }
}

#[cfg(test)]
#[path = "vnic_tests.rs"]
mod tests;
