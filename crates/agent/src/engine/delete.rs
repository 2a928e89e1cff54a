// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime container deletion.
//!
//! Stops and removes the container, retires its DHCP clients, drops the
//! persisted intents and registry entries, and removes the internal bridge
//! after detaching the agent. Shared MACVLAN networks are left
//! alone, since other runtimes may still use them.

use crate::adapters::DriverError;
use crate::context::AgentContext;
use crate::engine::networks::internal_network_name;
use crate::engine::self_id::resolve_self_container;
use orc_core::OperationKind;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Full delete flow, run on its own task after the request was acknowledged.
pub async fn delete_runtime(ctx: Arc<AgentContext>, container_name: String) {
    match run_pipeline(&ctx, &container_name).await {
        Ok(()) => {
            ctx.ops.clear(&container_name);
            info!(container = %container_name, "runtime container and resources deleted");
        }
        Err(e) => {
            error!(container = %container_name, error = %e, "failed to delete runtime container");
            ctx.ops.set_error(&container_name, &e.to_string(), OperationKind::Delete);
        }
    }
}

async fn run_pipeline(ctx: &AgentContext, container_name: &str) -> Result<(), DeleteError> {
    let driver = ctx.driver.as_ref();

    ctx.ops.set_step(container_name, "stopping_container");
    match driver.stop_container(container_name, 10).await {
        Ok(()) => info!(container = %container_name, "container stopped"),
        Err(e) if e.is_not_found() => {
            warn!(container = %container_name, "container not found, may have been already deleted")
        }
        Err(e) => return Err(e.into()),
    }

    ctx.ops.set_step(container_name, "removing_container");
    match driver.remove_container(container_name).await {
        Ok(()) => info!(container = %container_name, "container removed"),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    // Retire DHCP clients before the intent disappears
    for vnic in ctx.store.load_vnics(container_name) {
        if vnic.network_mode.is_static() {
            continue;
        }
        if let Err(e) = ctx.netmon.stop_dhcp(container_name, &vnic.name).await {
            debug!(vnic = %vnic.name, error = %e, "could not stop DHCP client");
        }
    }

    if let Err(e) = ctx.store.remove_client(container_name) {
        warn!(error = %e, "error removing runtime from client registry");
    }
    if let Err(e) = ctx.store.delete_vnics(container_name) {
        warn!(error = %e, "error deleting vNIC configurations");
    }
    if let Err(e) = ctx.store.delete_serials(container_name) {
        warn!(error = %e, "error deleting serial configurations");
    }
    ctx.usage.devices.remove_device(container_name);

    ctx.ops.set_step(container_name, "removing_networks");
    let internal = internal_network_name(container_name);
    match driver.network(&internal).await {
        Ok(Some(view)) => {
            if !view.containers.is_empty() {
                debug!(
                    network = %internal,
                    connected = view.containers.len(),
                    "internal network still has endpoints, detaching agent"
                );
                if let Some(self_name) = resolve_self_container(driver, &ctx.identity).await {
                    if view.containers.contains(&self_name) {
                        if let Err(e) = driver.disconnect_network(&internal, &self_name).await {
                            warn!(error = %e, "error disconnecting agent from internal network");
                        }
                    }
                }
            }
            match driver.remove_network(&internal).await {
                Ok(()) => info!(network = %internal, "internal network removed"),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(network = %internal, error = %e, "error removing internal network"),
            }
        }
        Ok(None) => debug!(network = %internal, "internal network not found, may be already gone"),
        Err(e) => warn!(network = %internal, error = %e, "error inspecting internal network"),
    }

    Ok(())
}

#[cfg(test)]
#[path = "delete_tests.rs"]
mod tests;
