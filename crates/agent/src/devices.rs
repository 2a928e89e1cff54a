// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host serial device cache, fed by the sidecar's device discovery and
//! hotplug events, plus the bridge into persisted serial-port intents:
//! a plugged device flips every matching intent to connected (with its
//! current host path and device numbers), an unplug flips them back.

use crate::storage::Store;
use orc_core::{SerialDevice, SerialPortStatus};
use orc_wire::{DeviceAction, DeviceChange};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct DeviceCache {
    // keyed by by_id; devices without one key on their path
    devices: Mutex<BTreeMap<String, SerialDevice>>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_of(device: &SerialDevice) -> String {
        device.by_id.clone().unwrap_or_else(|| device.path.clone())
    }

    /// Replace the whole cache from a discovery event and sync intent
    /// statuses: everything present connects, everything else disconnects.
    pub fn apply_discovery(&self, store: &Store, devices: &[SerialDevice]) {
        {
            let mut cache = self.devices.lock();
            cache.clear();
            for device in devices {
                cache.insert(Self::key_of(device), device.clone());
            }
        }

        let present: Vec<String> = devices.iter().filter_map(|d| d.by_id.clone()).collect();
        for (container, ports) in store.load_all_serials() {
            for port in ports.serial_ports {
                let connected = present.iter().any(|by_id| {
                    by_id == &port.device_id
                        || by_id.rsplit('/').next() == Some(port.device_id.as_str())
                });
                if connected {
                    continue; // the per-device update below fills in details
                }
                if port.status != SerialPortStatus::Disconnected {
                    debug!(container = %container, port = %port.name, "marking serial port disconnected");
                    let _ = store.update_serial_status(
                        &port.device_id,
                        SerialPortStatus::Disconnected,
                        None,
                        None,
                        None,
                    );
                }
            }
        }
        for device in devices {
            if let Some(by_id) = &device.by_id {
                let _ = store.update_serial_status(
                    by_id,
                    SerialPortStatus::Connected,
                    Some(&device.path),
                    device.major,
                    device.minor,
                );
            }
        }
    }

    /// Apply one hotplug event to the cache and to matching intents.
    pub fn apply_change(&self, store: &Store, change: &DeviceChange) {
        match change.action {
            DeviceAction::Add => {
                info!(path = %change.device.path, by_id = ?change.device.by_id, "serial device added");
                self.devices
                    .lock()
                    .insert(Self::key_of(&change.device), change.device.clone());
                if let Some(by_id) = &change.device.by_id {
                    match store.update_serial_status(
                        by_id,
                        SerialPortStatus::Connected,
                        Some(&change.device.path),
                        change.device.major,
                        change.device.minor,
                    ) {
                        Ok(n) if n > 0 => {
                            info!(by_id = %by_id, ports = n, "serial intents marked connected")
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "failed to update serial intent status"),
                    }
                }
            }
            DeviceAction::Remove => {
                info!(path = %change.device.path, "serial device removed");
                let mut cache = self.devices.lock();
                let removed_key = cache
                    .iter()
                    .find(|(_, device)| device.path == change.device.path)
                    .map(|(key, _)| key.clone());
                let removed = removed_key.and_then(|key| cache.remove(&key));
                drop(cache);

                let by_id = removed
                    .as_ref()
                    .and_then(|d| d.by_id.clone())
                    .or_else(|| change.device.by_id.clone());
                if let Some(by_id) = by_id {
                    if let Err(e) = store.update_serial_status(
                        &by_id,
                        SerialPortStatus::Disconnected,
                        None,
                        None,
                        None,
                    ) {
                        warn!(error = %e, "failed to update serial intent status");
                    }
                }
            }
        }
    }

    pub fn snapshot(&self) -> Vec<SerialDevice> {
        self.devices.lock().values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "devices_tests.rs"]
mod tests;
