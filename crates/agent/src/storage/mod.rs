// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed persistence for runtime intent.
//!
//! Three keyed JSON files: vNIC intents, serial-port intents, and the
//! client registry. Every operation serializes through one process-wide
//! mutex; writers read-modify-write the whole file under it. A file that
//! fails to parse is treated as empty (and logged) rather than fatal; the
//! store must never take the agent down.

use orc_core::{normalize_mac, SerialPortConfig, SerialPortStatus, SerialPorts, VnicConfig};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Registry entry for a running runtime: its internal-network IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEntry {
    pub ip: String,
    pub name: String,
}

/// A persisted MAC already in use, and by which runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacConflict {
    pub mac: String,
    pub container: String,
}

pub struct Store {
    lock: Mutex<()>,
    vnics_path: PathBuf,
    serial_path: PathBuf,
    clients_path: PathBuf,
}

impl Store {
    pub fn new(
        vnics_path: impl Into<PathBuf>,
        serial_path: impl Into<PathBuf>,
        clients_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            lock: Mutex::new(()),
            vnics_path: vnics_path.into(),
            serial_path: serial_path.into(),
            clients_path: clients_path.into(),
        }
    }

    /// Store rooted in one directory; used by tests.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(
            dir.join("runtime_vnics.json"),
            dir.join("serial_configs.json"),
            dir.join("clients.json"),
        )
    }

    // --- vNIC intents ---

    pub fn load_vnics(&self, container_name: &str) -> Vec<VnicConfig> {
        let _guard = self.lock.lock();
        read_keyed::<Vec<VnicConfig>>(&self.vnics_path)
            .remove(container_name)
            .unwrap_or_default()
    }

    pub fn load_all_vnics(&self) -> BTreeMap<String, Vec<VnicConfig>> {
        let _guard = self.lock.lock();
        read_keyed(&self.vnics_path)
    }

    pub fn save_vnics(
        &self,
        container_name: &str,
        vnics: Vec<VnicConfig>,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut all = read_keyed::<Vec<VnicConfig>>(&self.vnics_path);
        all.insert(container_name.to_string(), vnics);
        write_keyed(&self.vnics_path, &all)?;
        debug!(container = container_name, "saved vNIC configurations");
        Ok(())
    }

    pub fn delete_vnics(&self, container_name: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut all = read_keyed::<Vec<VnicConfig>>(&self.vnics_path);
        if all.remove(container_name).is_some() {
            write_keyed(&self.vnics_path, &all)?;
            debug!(container = container_name, "deleted vNIC configurations");
        }
        Ok(())
    }

    /// Read-modify-write one runtime's vNIC list under the store lock.
    /// The closure returns true when the list changed and should be saved.
    pub fn update_vnics<F>(&self, container_name: &str, mutate: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Vec<VnicConfig>) -> bool,
    {
        let _guard = self.lock.lock();
        let mut all = read_keyed::<Vec<VnicConfig>>(&self.vnics_path);
        let Some(vnics) = all.get_mut(container_name) else {
            return Ok(false);
        };
        if !mutate(vnics) {
            return Ok(false);
        }
        write_keyed(&self.vnics_path, &all)?;
        Ok(true)
    }

    /// First requested MAC that collides with any persisted vNIC's MAC,
    /// case-insensitive, across the whole fleet.
    pub fn find_mac_conflict(&self, requested: &[VnicConfig]) -> Option<MacConflict> {
        let _guard = self.lock.lock();
        let all = read_keyed::<Vec<VnicConfig>>(&self.vnics_path);
        let mut in_use = BTreeMap::new();
        for (container, vnics) in &all {
            for vnic in vnics {
                if let Some(mac) = &vnic.mac_address {
                    in_use.insert(normalize_mac(mac), container.clone());
                }
            }
        }
        for vnic in requested {
            if let Some(mac) = &vnic.mac_address {
                if let Some(container) = in_use.get(&normalize_mac(mac)) {
                    return Some(MacConflict { mac: mac.clone(), container: container.clone() });
                }
            }
        }
        None
    }

    /// All persisted MACs, lowercased. Checked when generating fresh ones.
    pub fn all_macs(&self) -> Vec<String> {
        let _guard = self.lock.lock();
        read_keyed::<Vec<VnicConfig>>(&self.vnics_path)
            .values()
            .flatten()
            .filter_map(|v| v.mac_address.as_deref().map(normalize_mac))
            .collect()
    }

    /// Record a DHCP lease against the matching vNIC intent. Returns true
    /// when a vNIC matched and was updated.
    pub fn record_dhcp_lease(
        &self,
        container_name: &str,
        vnic_name: &str,
        ip: &str,
        gateway: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.update_vnics(container_name, |vnics| {
            for vnic in vnics {
                if vnic.name == vnic_name {
                    vnic.dhcp_ip = Some(ip.to_string());
                    vnic.dhcp_gateway = gateway.map(str::to_string);
                    return true;
                }
            }
            false
        })
    }

    // --- serial-port intents ---

    pub fn load_serials(&self, container_name: &str) -> SerialPorts {
        let _guard = self.lock.lock();
        read_keyed::<SerialPorts>(&self.serial_path)
            .remove(container_name)
            .unwrap_or_default()
    }

    pub fn load_all_serials(&self) -> BTreeMap<String, SerialPorts> {
        let _guard = self.lock.lock();
        read_keyed(&self.serial_path)
    }

    /// Persist declared serial ports, resetting runtime state to the
    /// disconnected defaults; hotplug events fill it in later.
    pub fn save_serials(
        &self,
        container_name: &str,
        ports: Vec<SerialPortConfig>,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut all = read_keyed::<SerialPorts>(&self.serial_path);
        all.insert(
            container_name.to_string(),
            SerialPorts {
                serial_ports: ports.into_iter().map(SerialPortConfig::with_initial_state).collect(),
            },
        );
        write_keyed(&self.serial_path, &all)?;
        Ok(())
    }

    pub fn delete_serials(&self, container_name: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut all = read_keyed::<SerialPorts>(&self.serial_path);
        if all.remove(container_name).is_some() {
            write_keyed(&self.serial_path, &all)?;
        }
        Ok(())
    }

    /// Update runtime state of every port whose `device_id` matches the
    /// given stable identifier, across all runtimes.
    pub fn update_serial_status(
        &self,
        device_id: &str,
        status: SerialPortStatus,
        host_path: Option<&str>,
        major: Option<u32>,
        minor: Option<u32>,
    ) -> Result<usize, StoreError> {
        let _guard = self.lock.lock();
        let mut all = read_keyed::<SerialPorts>(&self.serial_path);
        let mut updated = 0;
        for ports in all.values_mut() {
            for port in &mut ports.serial_ports {
                if port_matches(&port.device_id, device_id) {
                    port.status = status;
                    port.current_host_path = host_path.map(str::to_string);
                    port.major = major;
                    port.minor = minor;
                    updated += 1;
                }
            }
        }
        if updated > 0 {
            write_keyed(&self.serial_path, &all)?;
        }
        Ok(updated)
    }

    // --- client registry ---

    pub fn load_clients(&self) -> BTreeMap<String, ClientEntry> {
        let _guard = self.lock.lock();
        read_keyed(&self.clients_path)
    }

    pub fn client_ip(&self, container_name: &str) -> Option<String> {
        let _guard = self.lock.lock();
        read_keyed::<ClientEntry>(&self.clients_path)
            .remove(container_name)
            .map(|entry| entry.ip)
    }

    pub fn add_client(&self, container_name: &str, ip: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut all = read_keyed::<ClientEntry>(&self.clients_path);
        all.insert(
            container_name.to_string(),
            ClientEntry { ip: ip.to_string(), name: container_name.to_string() },
        );
        write_keyed(&self.clients_path, &all)
    }

    pub fn remove_client(&self, container_name: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut all = read_keyed::<ClientEntry>(&self.clients_path);
        if all.remove(container_name).is_some() {
            write_keyed(&self.clients_path, &all)?;
        }
        Ok(())
    }
}

/// A declared device id matches either the full by-id path or its basename.
fn port_matches(declared: &str, observed_by_id: &str) -> bool {
    if declared == observed_by_id {
        return true;
    }
    observed_by_id.rsplit('/').next() == Some(declared)
}

fn read_keyed<T: DeserializeOwned>(path: &Path) -> BTreeMap<String, T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read store file, treating as empty");
            return BTreeMap::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(map) => map,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse store file, treating as empty");
            BTreeMap::new()
        }
    }
}

fn write_keyed<T: Serialize>(path: &Path, map: &BTreeMap<String, T>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
    }
    let mut bytes = serde_json::to_vec_pretty(map)?;
    bytes.push(b'\n');
    std::fs::write(path, bytes)
        .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
