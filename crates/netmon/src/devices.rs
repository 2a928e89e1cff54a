// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serial device enumeration and hotplug monitoring.
//!
//! Watches the `tty` subsystem via udev, keeping only real serial ports:
//! `ttyUSB*`, `ttyACM*`, and `ttyS*` with minor ≥ 64 (lower minors are
//! virtual consoles). Each device gets its stable `/dev/serial/by-id`
//! identity, resolved through the symlink farm with an `ID_SERIAL`
//! fallback. udev handles are not `Send`, so the monitor runs on a plain
//! thread and publishes plain structs.

use orc_wire::{DeviceAction, DeviceChange, NetmonEvent};
use orc_core::SerialDevice;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const BY_ID_DIR: &str = "/dev/serial/by-id";

pub struct DeviceMonitor {
    cache: Mutex<HashMap<String, SerialDevice>>,
    events: broadcast::Sender<NetmonEvent>,
    running: AtomicBool,
}

impl DeviceMonitor {
    pub fn new(events: broadcast::Sender<NetmonEvent>) -> Self {
        Self { cache: Mutex::new(HashMap::new()), events, running: AtomicBool::new(false) }
    }

    /// Enumerate all currently connected serial devices, refreshing the
    /// cache. Used for the per-connect discovery and `discover_devices`.
    pub fn current_devices(&self) -> Vec<SerialDevice> {
        let devices = enumerate_serial_devices();
        let mut cache = self.cache.lock();
        cache.clear();
        for device in &devices {
            cache.insert(cache_key(device), device.clone());
        }
        devices
    }

    pub fn cached_devices(&self) -> Vec<SerialDevice> {
        self.cache.lock().values().cloned().collect()
    }

    /// Status block for the `get_device_status` command.
    pub fn status(&self) -> serde_json::Value {
        let cache = self.cache.lock();
        serde_json::json!({
            "running": self.running.load(Ordering::Relaxed),
            "cached_devices": cache.len(),
            "devices": cache.values().cloned().collect::<Vec<_>>(),
        })
    }

    /// Start the udev monitor thread.
    pub fn start(self: &Arc<Self>) {
        self.running.store(true, Ordering::Relaxed);
        let monitor = Arc::clone(self);
        std::thread::Builder::new()
            .name("udev-monitor".to_string())
            .spawn(move || monitor.monitor_loop())
            .map(|_| info!("serial device monitor started"))
            .unwrap_or_else(|e| error!(error = %e, "failed to start device monitor thread"));
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn monitor_loop(self: Arc<Self>) {
        let socket = udev::MonitorBuilder::new()
            .and_then(|builder| builder.match_subsystem("tty"))
            .and_then(|builder| builder.listen());
        let socket = match socket {
            Ok(socket) => socket,
            Err(e) => {
                error!(error = %e, "failed to open udev monitor, serial hotplug disabled");
                return;
            }
        };
        info!("udev monitor thread started");

        while self.running.load(Ordering::Relaxed) {
            match socket.iter().next() {
                Some(event) => self.handle_udev_event(&event),
                None => std::thread::sleep(std::time::Duration::from_millis(100)),
            }
        }
        info!("udev monitor thread stopped");
    }

    fn handle_udev_event(&self, event: &udev::Event) {
        match event.event_type() {
            udev::EventType::Add => {
                if let Some(device) = build_device_info(event.device()) {
                    self.handle_add(device);
                }
            }
            udev::EventType::Remove => {
                let Some(path) = event.device().devnode().map(|p| p.display().to_string()) else {
                    return;
                };
                self.handle_remove(&path);
            }
            _ => {}
        }
    }

    pub(crate) fn handle_add(&self, device: SerialDevice) {
        info!(path = %device.path, by_id = ?device.by_id, "serial device added");
        self.cache.lock().insert(cache_key(&device), device.clone());
        let _ = self
            .events
            .send(NetmonEvent::DeviceChange(DeviceChange { action: DeviceAction::Add, device }));
    }

    pub(crate) fn handle_remove(&self, path: &str) {
        let removed = {
            let mut cache = self.cache.lock();
            let key = cache
                .iter()
                .find(|(_, device)| device.path == path)
                .map(|(key, _)| key.clone());
            key.and_then(|key| cache.remove(&key))
        };

        let device = match removed {
            Some(device) => {
                info!(path, by_id = ?device.by_id, "serial device removed");
                device
            }
            None => {
                // not cached; still report what we know, if it is a serial port
                let basename = path.rsplit('/').next().unwrap_or(path);
                if !is_serial_basename(basename, None) {
                    return;
                }
                info!(path, "serial device removed (not cached)");
                SerialDevice { path: path.to_string(), subsystem: "tty".to_string(), ..Default::default() }
            }
        };
        let _ = self
            .events
            .send(NetmonEvent::DeviceChange(DeviceChange { action: DeviceAction::Remove, device }));
    }
}

fn cache_key(device: &SerialDevice) -> String {
    device.by_id.clone().unwrap_or_else(|| device.path.clone())
}

/// Accept only real serial ports. For `ttyS*` a minor below 64 is a
/// virtual console, not a port; when the minor is unknown the name alone
/// decides.
pub fn is_serial_basename(basename: &str, minor: Option<u32>) -> bool {
    if basename.starts_with("ttyUSB") || basename.starts_with("ttyACM") {
        return true;
    }
    if let Some(rest) = basename.strip_prefix("ttyS") {
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        return minor.map_or(true, |minor| minor >= 64);
    }
    false
}

/// Stable identity: the `/dev/serial/by-id` symlink pointing at this node,
/// or a path synthesized from `ID_SERIAL` when the farm has no entry yet.
pub fn resolve_by_id(by_id_dir: &Path, devnode: &Path, id_serial: Option<&str>) -> Option<String> {
    if let Ok(entries) = std::fs::read_dir(by_id_dir) {
        let target = std::fs::canonicalize(devnode).ok();
        for entry in entries.flatten() {
            let link = entry.path();
            if std::fs::canonicalize(&link).ok() == target && target.is_some() {
                return Some(link.display().to_string());
            }
        }
    }
    let id_serial = id_serial?;
    let synthesized = by_id_dir.join(id_serial);
    synthesized.exists().then(|| synthesized.display().to_string())
}

fn enumerate_serial_devices() -> Vec<SerialDevice> {
    let mut enumerator = match udev::Enumerator::new() {
        Ok(enumerator) => enumerator,
        Err(e) => {
            error!(error = %e, "failed to create udev enumerator");
            return Vec::new();
        }
    };
    if let Err(e) = enumerator.match_subsystem("tty") {
        warn!(error = %e, "failed to filter udev enumerator");
    }
    let devices = match enumerator.scan_devices() {
        Ok(devices) => devices,
        Err(e) => {
            error!(error = %e, "failed to scan tty devices");
            return Vec::new();
        }
    };
    devices.filter_map(|device| build_device_info(device)).collect()
}

fn property(device: &udev::Device, name: &str) -> Option<String> {
    device.property_value(name).and_then(|v| v.to_str()).map(str::to_string)
}

fn build_device_info(device: udev::Device) -> Option<SerialDevice> {
    let devnode = device.devnode()?.to_path_buf();
    let basename = devnode.file_name()?.to_str()?.to_string();

    let (major, minor) = match std::fs::metadata(&devnode) {
        Ok(metadata) => {
            use std::os::unix::fs::MetadataExt;
            let rdev = metadata.rdev();
            (Some(dev_major(rdev)), Some(dev_minor(rdev)))
        }
        // device may already be gone again
        Err(_) => return None,
    };
    if !is_serial_basename(&basename, minor) {
        return None;
    }

    let id_serial = property(&device, "ID_SERIAL");
    let by_id = resolve_by_id(Path::new(BY_ID_DIR), &devnode, id_serial.as_deref());

    let info = SerialDevice {
        path: devnode.display().to_string(),
        by_id,
        major,
        minor,
        vendor_id: property(&device, "ID_VENDOR_ID"),
        product_id: property(&device, "ID_MODEL_ID"),
        serial: property(&device, "ID_SERIAL_SHORT"),
        subsystem: "tty".to_string(),
        manufacturer: property(&device, "ID_VENDOR")
            .or_else(|| property(&device, "ID_VENDOR_FROM_DATABASE")),
        product: property(&device, "ID_MODEL")
            .or_else(|| property(&device, "ID_MODEL_FROM_DATABASE")),
    };
    debug!(path = %info.path, by_id = ?info.by_id, "enumerated serial device");
    Some(info)
}

// glibc encoding of dev_t
fn dev_major(dev: u64) -> u32 {
    (((dev >> 32) & 0xffff_f000) | ((dev >> 8) & 0xfff)) as u32
}

fn dev_minor(dev: u64) -> u32 {
    (((dev >> 12) & 0xffff_ff00) | (dev & 0xff)) as u32
}

#[cfg(test)]
#[path = "devices_tests.rs"]
mod tests;
