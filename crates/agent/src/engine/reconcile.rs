// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network reconciliation after host interface changes.
//!
//! The sidecar debounces netlink bursts; the agent debounces again per
//! interface (3 s, restarted by every new event) so a flapping link costs
//! one pass. A pass never touches persisted intent: the intent is the
//! invariant, the daemon's attachment state is driven back toward it:
//! disconnect every `macvlan_{iface}_*` endpoint, resolve the L2 network
//! for the new subnet, reconnect with the persisted MAC (and persisted IP
//! for static vNICs).

use crate::adapters::EndpointRequest;
use crate::context::AgentContext;
use crate::engine::networks::get_or_create_macvlan;
use orc_wire::InterfaceReport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEBOUNCE: Duration = Duration::from_secs(3);

struct PendingChange {
    report: InterfaceReport,
    last_event: tokio::time::Instant,
}

pub struct Reconciler {
    ctx: Arc<AgentContext>,
    pending: Mutex<HashMap<String, PendingChange>>,
}

impl Reconciler {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx, pending: Mutex::new(HashMap::new()) }
    }

    /// Record a debounced change for an interface and arm the timer. A
    /// change arriving inside the window restarts it; exactly one
    /// processing pass runs per quiet period.
    pub fn observe_change(self: Arc<Self>, report: InterfaceReport) {
        let interface = report.interface.clone();
        self.pending.lock().insert(
            interface.clone(),
            PendingChange { report, last_event: tokio::time::Instant::now() },
        );

        tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE).await;
            self.process_if_quiet(&interface).await;
        });
    }

    async fn process_if_quiet(&self, interface: &str) {
        let report = {
            let mut pending = self.pending.lock();
            let still_fresh =
                pending.get(interface).map(|change| change.last_event.elapsed() < DEBOUNCE);
            match still_fresh {
                // a newer event re-armed the timer; its task will run
                Some(true) => return,
                Some(false) => match pending.remove(interface) {
                    Some(change) => change.report,
                    None => return,
                },
                None => return,
            }
        };

        info!(interface, "processing network change");
        let Some(subnet) = report.primary_subnet().map(str::to_string) else {
            warn!(interface, "no subnet in change report, skipping reconcile");
            return;
        };
        self.reconnect_containers(interface, &subnet, report.gateway.as_deref()).await;
    }

    /// Reattach every runtime with a vNIC on `interface` to the L2 network
    /// for the new subnet. Public so tests can drive it without timers.
    pub async fn reconnect_containers(
        &self,
        interface: &str,
        new_subnet: &str,
        new_gateway: Option<&str>,
    ) {
        let ctx = &self.ctx;
        let all_vnics = ctx.store.load_all_vnics();
        if all_vnics.is_empty() {
            debug!("no runtimes with vNIC configurations");
            return;
        }
        info!(interface, subnet = new_subnet, "reconnecting runtimes to new network");

        let old_prefix = format!("macvlan_{interface}_");
        for (container_name, vnics) in &all_vnics {
            for vnic in vnics {
                if vnic.parent_interface != *interface {
                    continue;
                }
                info!(container = %container_name, vnic = %vnic.name, "reattaching vNIC");
                if let Err(e) = self
                    .reattach(container_name, vnic, &old_prefix, interface, new_subnet, new_gateway)
                    .await
                {
                    error!(container = %container_name, error = %e, "failed to reconnect runtime");
                }
            }
        }
    }

    async fn reattach(
        &self,
        container_name: &str,
        vnic: &orc_core::VnicConfig,
        old_prefix: &str,
        interface: &str,
        new_subnet: &str,
        new_gateway: Option<&str>,
    ) -> Result<(), crate::engine::networks::NetworkError> {
        let ctx = &self.ctx;

        // Disconnect every endpoint on this parent, whatever CIDR it was for
        if let Some(view) = ctx.driver.inspect_container(container_name).await? {
            for network in view.networks.keys().filter(|n| n.starts_with(old_prefix)) {
                match ctx.driver.disconnect_network(network, container_name).await {
                    Ok(()) => info!(container = %container_name, network = %network, "disconnected from old network"),
                    Err(e) => debug!(network = %network, error = %e, "could not disconnect from old network"),
                }
            }
        }

        let network = get_or_create_macvlan(
            ctx.driver.as_ref(),
            &ctx.interfaces,
            interface,
            Some(new_subnet),
            new_gateway,
        )
        .await?;

        let endpoint = EndpointRequest {
            ipv4_address: vnic.static_ip(),
            mac_address: vnic.mac_address.clone(),
        };
        ctx.driver.connect_network(&network.name, container_name, endpoint).await?;
        info!(container = %container_name, network = %network.name, "reconnected to new network");
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
