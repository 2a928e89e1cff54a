// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket server for the agent.
//!
//! Every connection first receives the network and device discovery
//! events, then a live mix of broadcast events and replies to its own
//! commands, all LF-delimited JSON on one stream.

use crate::devices::DeviceMonitor;
use crate::dhcp::DhcpManager;
use chrono::{SecondsFormat, Utc};
use orc_wire::{
    write_json_line, DeviceDiscovery, NetmonCommand, NetmonEvent, NetmonReply, NetworkDiscovery,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Everything a client connection can reach.
pub struct Sidecar {
    pub dhcp: DhcpManager,
    pub devices: Arc<DeviceMonitor>,
    netlink: Option<rtnetlink::Handle>,
}

impl Sidecar {
    pub fn new(
        dhcp: DhcpManager,
        devices: Arc<DeviceMonitor>,
        netlink: Option<rtnetlink::Handle>,
    ) -> Self {
        Self { dhcp, devices, netlink }
    }

    /// The two per-connect discovery events, in protocol order.
    pub async fn discovery_events(&self) -> (NetmonEvent, NetmonEvent) {
        let interfaces = match &self.netlink {
            Some(handle) => crate::netlink::discover_interfaces(handle).await,
            None => Vec::new(),
        };
        let timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        let network = NetmonEvent::NetworkDiscovery(NetworkDiscovery {
            interfaces,
            timestamp: timestamp.clone(),
        });
        let devices = NetmonEvent::DeviceDiscovery(DeviceDiscovery {
            devices: self.devices.current_devices(),
            timestamp,
        });
        (network, devices)
    }

    pub async fn handle_command(&self, command: NetmonCommand) -> NetmonReply {
        match command {
            NetmonCommand::StartDhcp { container_name, vnic_name, mac_address, container_pid } => {
                info!(
                    container = %container_name,
                    vnic = %vnic_name,
                    mac = %mac_address,
                    pid = container_pid,
                    "start_dhcp"
                );
                self.dhcp.start_dhcp(&container_name, &vnic_name, &mac_address, container_pid).await
            }
            NetmonCommand::StopDhcp { container_name, vnic_name } => {
                info!(container = %container_name, vnic = %vnic_name, "stop_dhcp");
                self.dhcp.stop_dhcp(&container_name, &vnic_name).await
            }
            NetmonCommand::GetDhcpStatus => NetmonReply {
                success: true,
                status: Some(self.dhcp.status()),
                ..NetmonReply::default()
            },
            NetmonCommand::GetDeviceStatus => NetmonReply {
                success: true,
                status: Some(self.devices.status()),
                ..NetmonReply::default()
            },
            NetmonCommand::DiscoverDevices => NetmonReply {
                success: true,
                devices: Some(self.devices.current_devices()),
                ..NetmonReply::default()
            },
        }
    }
}

/// Bind the socket (world-writable, replacing any stale file) and accept
/// clients until the process exits.
pub async fn run(
    sidecar: Arc<Sidecar>,
    events: broadcast::Sender<NetmonEvent>,
    socket_path: PathBuf,
) -> anyhow::Result<()> {
    let listener = bind_socket(&socket_path)?;
    info!(path = %socket_path.display(), "unix socket created");

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                info!("new client connected");
                let sidecar = Arc::clone(&sidecar);
                let events = events.subscribe();
                tokio::spawn(async move {
                    handle_client(sidecar, events, stream).await;
                    info!("client disconnected");
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}

pub fn bind_socket(socket_path: &Path) -> anyhow::Result<UnixListener> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    // the agent runs unprivileged inside its container
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o666))?;
    Ok(listener)
}

async fn handle_client(
    sidecar: Arc<Sidecar>,
    mut events: broadcast::Receiver<NetmonEvent>,
    stream: UnixStream,
) {
    let (read_half, mut write_half) = stream.into_split();
    // Lines keeps its buffer across polls, so losing a select race never
    // drops a partial command
    let mut lines = BufReader::new(read_half).lines();

    let (network_discovery, device_discovery) = sidecar.discovery_events().await;
    if write_json_line(&mut write_half, &network_discovery).await.is_err() {
        return;
    }
    if write_json_line(&mut write_half, &device_discovery).await.is_err() {
        return;
    }
    debug!("sent discovery events to new client");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if write_json_line(&mut write_half, &event).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "client event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "client read error");
                        return;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = match serde_json::from_str::<NetmonCommand>(&line) {
                    Ok(command) => sidecar.handle_command(command).await,
                    Err(e) => {
                        warn!(error = %e, "invalid command from client");
                        NetmonReply::err("Invalid JSON")
                    }
                };
                if write_json_line(&mut write_half, &reply).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
