// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DHCP client supervision for runtime containers.
//!
//! One `udhcpc` per `(container, vNIC)`, spawned inside the container's
//! network namespace via `nsenter`. The interface is located by matching
//! the endpoint MAC against the netns link list, with retries to cover
//! kernel propagation after an attach. A 2-second watcher reads the lease
//! files the client's hook script writes, emits `dhcp_update` on IP change,
//! and restarts clients whose process died.

use orc_wire::{DhcpLease, NetmonEvent, NetmonReply};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const FIND_IFACE_RETRIES: u32 = 10;
const FIND_IFACE_DELAY: Duration = Duration::from_millis(300);
const STOP_GRACE: Duration = Duration::from_secs(5);
const LEASE_POLL: Duration = Duration::from_secs(2);

#[derive(Clone)]
struct LeaseState {
    container_name: String,
    vnic_name: String,
    mac_address: String,
    interface: String,
    lease_file: PathBuf,
    container_pid: i64,
    last_ip: Option<String>,
}

struct DhcpClient {
    child: Child,
    state: LeaseState,
}

/// Shape of the lease file written by the udhcpc hook script.
#[derive(Debug, Deserialize)]
struct LeaseFile {
    ip: Option<String>,
    mask: Option<String>,
    prefix: Option<u8>,
    router: Option<String>,
    dns: Option<String>,
    lease: Option<u64>,
    timestamp: Option<String>,
}

pub struct DhcpManager {
    clients: Mutex<HashMap<String, DhcpClient>>,
    events: broadcast::Sender<NetmonEvent>,
    lease_dir: PathBuf,
}

impl DhcpManager {
    pub fn new(events: broadcast::Sender<NetmonEvent>, lease_dir: impl Into<PathBuf>) -> Self {
        Self { clients: Mutex::new(HashMap::new()), events, lease_dir: lease_dir.into() }
    }

    /// Start a DHCP client for one vNIC. Idempotent while the previous
    /// client is still alive.
    pub async fn start_dhcp(
        &self,
        container_name: &str,
        vnic_name: &str,
        mac_address: &str,
        container_pid: i64,
    ) -> NetmonReply {
        let key = client_key(container_name, vnic_name);

        {
            let mut clients = self.clients.lock();
            if let Some(existing) = clients.get_mut(&key) {
                if existing.child.try_wait().ok().flatten().is_none() {
                    info!(key = %key, "DHCP client already running");
                    return NetmonReply::ok("DHCP client already running");
                }
            }
        }

        if container_pid <= 0 {
            error!(container_pid, "invalid container PID");
            return NetmonReply::err(format!("Invalid container PID: {container_pid}"));
        }
        let netns_path = format!("/proc/{container_pid}/ns/net");
        if let Err(e) = std::fs::metadata(&netns_path) {
            error!(path = %netns_path, error = %e, "network namespace not accessible");
            return NetmonReply::err(format!(
                "Container PID {container_pid} network namespace not found: {e}"
            ));
        }

        info!(mac = mac_address, pid = container_pid, "looking for interface in container netns");
        let Some(interface) = find_interface_by_mac(container_pid, mac_address).await else {
            error!(mac = mac_address, pid = container_pid, "interface not found after retries");
            return NetmonReply::err(format!(
                "Interface with MAC {mac_address} not found in container after \
                 {FIND_IFACE_RETRIES} retries"
            ));
        };

        let lease_key = key.replace(':', "_");
        let lease_file = self.lease_dir.join(format!("{lease_key}.lease"));
        info!(key = %key, interface = %interface, "starting DHCP client");

        let spawned = Command::new("nsenter")
            .args(["-t", &container_pid.to_string(), "-n"])
            .args(["udhcpc", "-f", "-i", &interface])
            .args(["-s", "/usr/share/udhcpc/default.script"])
            .args(["-t", "5", "-T", "3"])
            .env("ORCH_DHCP_KEY", &lease_key)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!(key = %key, error = %e, "failed to start DHCP client");
                return NetmonReply::err(e.to_string());
            }
        };
        info!(key = %key, pid = ?child.id(), "DHCP client started");

        self.clients.lock().insert(
            key,
            DhcpClient {
                child,
                state: LeaseState {
                    container_name: container_name.to_string(),
                    vnic_name: vnic_name.to_string(),
                    mac_address: mac_address.to_string(),
                    interface: interface.clone(),
                    lease_file,
                    container_pid,
                    last_ip: None,
                },
            },
        );
        NetmonReply::ok(format!("DHCP client started for {interface}"))
    }

    /// Stop one client: SIGTERM, 5 s grace, then SIGKILL. Drops all state.
    pub async fn stop_dhcp(&self, container_name: &str, vnic_name: &str) -> NetmonReply {
        let key = client_key(container_name, vnic_name);
        let Some(client) = self.clients.lock().remove(&key) else {
            return NetmonReply::err(format!("No DHCP client found for {key}"));
        };
        terminate(client.child).await;
        info!(key = %key, "DHCP client stopped");
        NetmonReply::ok(format!("DHCP client stopped for {key}"))
    }

    /// Status of all supervised clients for `get_dhcp_status`.
    pub fn status(&self) -> serde_json::Value {
        let mut clients = self.clients.lock();
        let mut status = serde_json::Map::new();
        for (key, client) in clients.iter_mut() {
            let running = client.child.try_wait().ok().flatten().is_none();
            status.insert(
                key.clone(),
                serde_json::json!({
                    "running": running,
                    "pid": client.child.id(),
                    "last_ip": client.state.last_ip,
                    "interface": client.state.interface,
                }),
            );
        }
        serde_json::Value::Object(status)
    }

    pub async fn stop_all(&self) {
        let drained: Vec<DhcpClient> = {
            let mut clients = self.clients.lock();
            clients.drain().map(|(_, client)| client).collect()
        };
        for client in drained {
            terminate(client.child).await;
        }
    }

    /// Run the lease watcher until the process exits.
    pub async fn run_monitor(&self) {
        loop {
            tokio::time::sleep(LEASE_POLL).await;
            self.monitor_pass().await;
        }
    }

    /// One watcher pass: emit lease changes, restart dead clients.
    pub async fn monitor_pass(&self) {
        // Lease files
        let snapshot: Vec<(String, LeaseState)> = self
            .clients
            .lock()
            .iter()
            .map(|(key, client)| (key.clone(), client.state.clone()))
            .collect();
        for (key, state) in snapshot {
            let Ok(bytes) = std::fs::read(&state.lease_file) else { continue };
            let lease: LeaseFile = match serde_json::from_slice(&bytes) {
                Ok(lease) => lease,
                // lease file mid-write; pick it up next pass
                Err(_) => continue,
            };
            let Some(ip) = lease.ip.clone() else { continue };
            if state.last_ip.as_deref() == Some(ip.as_str()) {
                continue;
            }

            if let Some(client) = self.clients.lock().get_mut(&key) {
                client.state.last_ip = Some(ip.clone());
            }
            info!(key = %key, ip = %ip, "DHCP lease update");
            let _ = self.events.send(NetmonEvent::DhcpUpdate(DhcpLease {
                container_name: state.container_name.clone(),
                vnic_name: state.vnic_name.clone(),
                mac_address: Some(state.mac_address.clone()),
                ip: Some(ip),
                mask: lease.mask,
                prefix: lease.prefix,
                gateway: lease.router,
                dns: lease.dns,
                lease_time: lease.lease,
                timestamp: lease.timestamp,
            }));
        }

        // Dead clients
        let dead: Vec<LeaseState> = {
            let mut clients = self.clients.lock();
            let mut dead_keys: Vec<String> = Vec::new();
            for (key, client) in clients.iter_mut() {
                if client.child.try_wait().ok().flatten().is_some() {
                    dead_keys.push(key.clone());
                }
            }
            dead_keys
                .into_iter()
                .filter_map(|key| clients.remove(&key).map(|client| client.state))
                .collect()
        };
        for state in dead {
            warn!(
                container = %state.container_name,
                vnic = %state.vnic_name,
                "DHCP client died, restarting"
            );
            if state.container_pid <= 0 {
                error!(
                    container = %state.container_name,
                    vnic = %state.vnic_name,
                    "cannot restart DHCP client: missing PID"
                );
                continue;
            }
            let reply = self
                .start_dhcp(
                    &state.container_name,
                    &state.vnic_name,
                    &state.mac_address,
                    state.container_pid,
                )
                .await;
            if !reply.success {
                error!(
                    container = %state.container_name,
                    vnic = %state.vnic_name,
                    error = ?reply.error,
                    "DHCP client restart failed"
                );
            }
        }
    }
}

fn client_key(container_name: &str, vnic_name: &str) -> String {
    format!("{container_name}:{vnic_name}")
}

async fn terminate(mut child: Child) {
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
        if tokio::time::timeout(STOP_GRACE, child.wait()).await.is_err() {
            warn!(pid, "DHCP client ignored SIGTERM, killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

/// Find the interface inside the container netns whose MAC matches,
/// retrying to cover the gap between a network attach and the link
/// becoming visible.
async fn find_interface_by_mac(container_pid: i64, mac_address: &str) -> Option<String> {
    for attempt in 0..FIND_IFACE_RETRIES {
        if let Some(interface) = query_netns_links(container_pid, mac_address).await {
            if attempt > 0 {
                info!(interface = %interface, attempts = attempt + 1, "found interface after retries");
            }
            return Some(interface);
        }
        if attempt + 1 < FIND_IFACE_RETRIES {
            debug!(mac = mac_address, attempt = attempt + 1, "interface not found yet, retrying");
            tokio::time::sleep(FIND_IFACE_DELAY).await;
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct LinkJson {
    ifname: String,
    #[serde(default)]
    address: Option<String>,
}

async fn query_netns_links(container_pid: i64, mac_address: &str) -> Option<String> {
    let output = Command::new("nsenter")
        .args(["-t", &container_pid.to_string(), "-n", "ip", "-j", "link", "show"])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let links: Vec<LinkJson> = serde_json::from_slice(&output.stdout).ok()?;
    links
        .into_iter()
        .find(|link| {
            link.address
                .as_deref()
                .is_some_and(|address| address.eq_ignore_ascii_case(mac_address))
        })
        .map(|link| link.ifname)
}

#[cfg(test)]
#[path = "dhcp_tests.rs"]
mod tests;
