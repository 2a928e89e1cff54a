// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MAC enforcement on container start.
//!
//! The daemon may hand a MACVLAN endpoint a fresh random MAC when a
//! container restarts. Every `start` event is checked against the persisted
//! intent: a mismatched endpoint is detached and reattached with the pinned
//! MAC (and the persisted IP for static vNICs). Endpoint lookup prefers the
//! backfilled `docker_network_name` and falls back to the
//! `macvlan_{parent}` prefix, backfilling the name for next time.

use crate::adapters::EndpointRequest;
use crate::context::AgentContext;
use orc_core::normalize_mac;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Consume container start events until the process exits.
pub async fn run(ctx: Arc<AgentContext>, mut starts: broadcast::Receiver<String>) {
    loop {
        match starts.recv().await {
            Ok(container_name) => {
                debug!(container = %container_name, "container start event");
                enforce_container(&ctx, &container_name).await;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "start-event subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Check one container's endpoints against its persisted vNIC intents and
/// repair any MAC divergence.
pub async fn enforce_container(ctx: &AgentContext, container_name: &str) {
    let mut vnics = ctx.store.load_vnics(container_name);
    if vnics.is_empty() {
        debug!(container = %container_name, "no vNIC intents, skipping MAC enforcement");
        return;
    }

    let view = match ctx.driver.inspect_container(container_name).await {
        Ok(Some(view)) => view,
        Ok(None) => {
            debug!(container = %container_name, "container not found, skipping MAC enforcement");
            return;
        }
        Err(e) => {
            error!(container = %container_name, error = %e, "inspect failed during MAC enforcement");
            return;
        }
    };
    if !view.running {
        debug!(container = %container_name, "container not running, skipping MAC enforcement");
        return;
    }

    let mut backfilled = false;
    for vnic in &mut vnics {
        let Some(persisted_mac) = vnic.mac_address.clone() else {
            debug!(vnic = %vnic.name, "no persisted MAC, skipping");
            continue;
        };

        // Find the endpoint: exact network name first, parent prefix second
        let mut network_name = vnic
            .docker_network_name
            .as_ref()
            .filter(|name| view.networks.contains_key(*name))
            .cloned();
        if network_name.is_none() {
            let prefix = format!("macvlan_{}", vnic.parent_interface);
            network_name = view.networks.keys().find(|n| n.starts_with(&prefix)).cloned();
            if let Some(found) = &network_name {
                if vnic.docker_network_name.as_ref() != Some(found) {
                    vnic.docker_network_name = Some(found.clone());
                    backfilled = true;
                }
            }
        }
        let Some(network_name) = network_name else {
            debug!(
                container = %container_name,
                vnic = %vnic.name,
                "no MACVLAN endpoint found, skipping enforcement"
            );
            continue;
        };
        let Some(observed_mac) =
            view.networks.get(&network_name).and_then(|e| e.mac_address.clone())
        else {
            continue;
        };

        if normalize_mac(&observed_mac) == normalize_mac(&persisted_mac) {
            debug!(vnic = %vnic.name, mac = %observed_mac, "MAC address is correct");
            continue;
        }

        warn!(
            container = %container_name,
            vnic = %vnic.name,
            persisted = %persisted_mac,
            observed = %observed_mac,
            "MAC mismatch, enforcing persisted MAC"
        );
        if let Err(e) =
            reattach_with_mac(ctx, container_name, &network_name, vnic, &persisted_mac).await
        {
            error!(
                container = %container_name,
                vnic = %vnic.name,
                error = %e,
                "failed to enforce MAC"
            );
        } else {
            info!(container = %container_name, vnic = %vnic.name, mac = %persisted_mac, "MAC enforced");
        }
    }

    if backfilled {
        if let Err(e) = ctx.store.save_vnics(container_name, vnics) {
            warn!(error = %e, "failed to save backfilled network names");
        }
    }
}

async fn reattach_with_mac(
    ctx: &AgentContext,
    container_name: &str,
    network_name: &str,
    vnic: &orc_core::VnicConfig,
    persisted_mac: &str,
) -> Result<(), crate::adapters::DriverError> {
    ctx.driver.disconnect_network(network_name, container_name).await?;
    debug!(container = %container_name, network = %network_name, "disconnected for MAC enforcement");

    let endpoint = EndpointRequest {
        ipv4_address: vnic.static_ip(),
        mac_address: Some(persisted_mac.to_string()),
    };
    ctx.driver.connect_network(network_name, container_name, endpoint).await?;

    // Verify the daemon actually applied it
    let reported = ctx
        .driver
        .inspect_container(container_name)
        .await?
        .and_then(|view| view.networks.get(network_name).and_then(|e| e.mac_address.clone()));
    match reported {
        Some(mac) if normalize_mac(&mac) == normalize_mac(persisted_mac) => {}
        other => warn!(
            expected = %persisted_mac,
            reported = ?other,
            "MAC enforcement may not have taken effect"
        ),
    }
    Ok(())
}

#[cfg(test)]
#[path = "enforce_tests.rs"]
mod tests;
