// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Netmon sidecar client.
//!
//! One connection task owns the Unix socket: events fan out into the
//! interface/device caches, DHCP leases land in the vNIC store, network
//! changes feed the reconciler. Commands are queued through [`NetmonHandle`]
//! and correlated with replies FIFO; replies are the stream lines without
//! a `type` field. On socket loss everything pending fails fast and the
//! client retries every 5 seconds; each new connection re-primes the caches
//! from the discovery events.

use crate::context::AgentContext;
use crate::engine::reconcile::Reconciler;
use orc_wire::{write_json_line, NetmonCommand, NetmonEvent, NetmonReply, SidecarLine};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum NetmonError {
    #[error("netmon sidecar is not connected")]
    Disconnected,
}

pub struct PendingCommand {
    command: NetmonCommand,
    reply: oneshot::Sender<Result<NetmonReply, NetmonError>>,
}

/// Cloneable command-side handle to the sidecar connection task.
#[derive(Clone)]
pub struct NetmonHandle {
    tx: mpsc::Sender<PendingCommand>,
}

impl NetmonHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PendingCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn request(&self, command: NetmonCommand) -> Result<NetmonReply, NetmonError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingCommand { command, reply: reply_tx })
            .await
            .map_err(|_| NetmonError::Disconnected)?;
        reply_rx.await.map_err(|_| NetmonError::Disconnected)?
    }

    pub async fn start_dhcp(
        &self,
        container_name: &str,
        vnic_name: &str,
        mac_address: &str,
        container_pid: i64,
    ) -> Result<NetmonReply, NetmonError> {
        self.request(NetmonCommand::StartDhcp {
            container_name: container_name.to_string(),
            vnic_name: vnic_name.to_string(),
            mac_address: mac_address.to_string(),
            container_pid,
        })
        .await
    }

    pub async fn stop_dhcp(
        &self,
        container_name: &str,
        vnic_name: &str,
    ) -> Result<NetmonReply, NetmonError> {
        self.request(NetmonCommand::StopDhcp {
            container_name: container_name.to_string(),
            vnic_name: vnic_name.to_string(),
        })
        .await
    }

    /// Handle whose sidecar answers every command with success, recording
    /// what was sent. For tests.
    #[cfg(test)]
    pub fn stub() -> (Self, Arc<parking_lot::Mutex<Vec<NetmonCommand>>>) {
        let (handle, mut rx) = Self::channel(32);
        let commands = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorded = Arc::clone(&commands);
        tokio::spawn(async move {
            while let Some(pending) = rx.recv().await {
                recorded.lock().push(pending.command);
                let _ = pending.reply.send(Ok(NetmonReply::ok("stubbed")));
            }
        });
        (handle, commands)
    }
}

/// Run the sidecar connection loop until the process exits.
pub async fn run(
    ctx: Arc<AgentContext>,
    reconciler: Arc<Reconciler>,
    mut command_rx: mpsc::Receiver<PendingCommand>,
) {
    loop {
        let socket_path = crate::env::netmon_socket();
        let stream = match UnixStream::connect(&socket_path).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(path = %socket_path.display(), error = %e, "netmon socket unavailable, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        info!(path = %socket_path.display(), "connected to network monitor");

        run_connection(&ctx, &reconciler, &mut command_rx, stream).await;

        warn!("network monitor connection lost, retrying in 5s");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn run_connection(
    ctx: &Arc<AgentContext>,
    reconciler: &Arc<Reconciler>,
    command_rx: &mut mpsc::Receiver<PendingCommand>,
    stream: UnixStream,
) {
    let (read_half, mut write_half) = stream.into_split();
    // Lines keeps its buffer across polls, so losing a select race never
    // drops a partial frame
    let mut lines = BufReader::new(read_half).lines();
    let mut pending: VecDeque<oneshot::Sender<Result<NetmonReply, NetmonError>>> = VecDeque::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "error reading from network monitor");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match SidecarLine::parse(&line) {
                    Ok(SidecarLine::Event(event)) => handle_event(ctx, reconciler, event),
                    Ok(SidecarLine::Reply(reply)) => {
                        match pending.pop_front() {
                            Some(waiter) => {
                                let _ = waiter.send(Ok(reply));
                            }
                            None => warn!("unsolicited reply from network monitor"),
                        }
                    }
                    Err(e) => error!(error = %e, line = %line, "failed to parse network monitor line"),
                }
            }
            command = command_rx.recv() => {
                let Some(PendingCommand { command, reply }) = command else { break };
                match write_json_line(&mut write_half, &command).await {
                    Ok(()) => pending.push_back(reply),
                    Err(e) => {
                        error!(error = %e, "failed to send command to network monitor");
                        let _ = reply.send(Err(NetmonError::Disconnected));
                        break;
                    }
                }
            }
        }
    }

    for waiter in pending {
        let _ = waiter.send(Err(NetmonError::Disconnected));
    }
}

fn handle_event(ctx: &Arc<AgentContext>, reconciler: &Arc<Reconciler>, event: NetmonEvent) {
    match event {
        NetmonEvent::NetworkDiscovery(discovery) => {
            info!(interfaces = discovery.interfaces.len(), "received network discovery");
            ctx.interfaces.apply_discovery(&discovery.interfaces);
        }
        NetmonEvent::DeviceDiscovery(discovery) => {
            info!(devices = discovery.devices.len(), "received device discovery");
            ctx.devices.apply_discovery(&ctx.store, &discovery.devices);
        }
        NetmonEvent::NetworkChange(report) => {
            info!(
                interface = %report.interface,
                addresses = report.ipv4_addresses.len(),
                gateway = ?report.gateway,
                "network change detected"
            );
            ctx.interfaces.apply_change(&report);
            if !report.ipv4_addresses.is_empty() {
                Arc::clone(reconciler).observe_change(report);
            }
        }
        NetmonEvent::DeviceChange(change) => {
            ctx.devices.apply_change(&ctx.store, &change);
        }
        NetmonEvent::DhcpUpdate(lease) => {
            let Some(ip) = lease.ip.as_deref() else { return };
            info!(
                container = %lease.container_name,
                vnic = %lease.vnic_name,
                ip,
                "DHCP lease update"
            );
            match ctx.store.record_dhcp_lease(
                &lease.container_name,
                &lease.vnic_name,
                ip,
                lease.gateway.as_deref(),
            ) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(container = %lease.container_name, vnic = %lease.vnic_name, "lease for unknown vNIC")
                }
                Err(e) => warn!(error = %e, "failed to persist DHCP lease"),
            }
        }
    }
}
