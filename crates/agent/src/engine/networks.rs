// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! L2 network resolution: one MACVLAN network per (parent interface,
//! subnet), lazily created, shared across runtimes, never deleted by the
//! agent; plus the per-runtime isolated internal bridge.

use crate::adapters::{ContainerDriver, DriverError, NetworkView};
use crate::interfaces::InterfaceCache;
use orc_core::{NetworkKey, SubnetError, SubnetSpec, VnicConfig};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Subnet(#[from] SubnetError),

    #[error("Could not detect subnet for interface {0}. The interface may not exist or netmon may not be running.")]
    SubnetUnknown(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub fn internal_network_name(container_name: &str) -> String {
    format!("{container_name}_internal")
}

/// Resolve the L2 network key for a vNIC, auto-detecting the subnet and
/// gateway from the interface cache when the request omits them (waiting
/// up to 3 s for the cache to warm up).
pub async fn resolve_network_key(
    interfaces: &InterfaceCache,
    parent: &str,
    subnet: Option<&str>,
    gateway: Option<&str>,
) -> Result<(NetworkKey, Option<String>), NetworkError> {
    match subnet {
        Some(subnet) => {
            let spec = SubnetSpec::parse(subnet, gateway)?;
            Ok((NetworkKey::new(parent, spec), gateway.map(str::to_string)))
        }
        None => {
            let (detected_subnet, detected_gateway) = interfaces
                .wait_for_network(parent)
                .await
                .ok_or_else(|| NetworkError::SubnetUnknown(parent.to_string()))?;
            info!(
                interface = parent,
                subnet = %detected_subnet,
                gateway = ?detected_gateway,
                "detected network for interface"
            );
            let spec = SubnetSpec::from_cidr(&detected_subnet)?;
            Ok((NetworkKey::new(parent, spec), detected_gateway))
        }
    }
}

/// The L2 key a vNIC would resolve to, for duplicate detection before any
/// driver call. Uses a non-blocking cache snapshot; when neither the
/// request nor the cache knows the subnet, both such vNICs on one parent
/// collapse onto a per-parent sentinel (they would auto-detect the same
/// network anyway).
pub fn validation_key(
    interfaces: &InterfaceCache,
    vnic: &VnicConfig,
) -> Result<String, NetworkError> {
    if let Some(subnet) = vnic.subnet.as_deref() {
        let spec = SubnetSpec::parse(subnet, vnic.gateway.as_deref())?;
        return Ok(NetworkKey::new(vnic.parent_interface.as_str(), spec).to_string());
    }
    match interfaces.network_of(&vnic.parent_interface) {
        Some((subnet, _)) => {
            let spec = SubnetSpec::from_cidr(&subnet)?;
            Ok(NetworkKey::new(vnic.parent_interface.as_str(), spec).to_string())
        }
        None => Ok(format!("{}/auto", vnic.parent_interface)),
    }
}

/// Get the MACVLAN network for `(parent, subnet)` or create it. A creation
/// rejected for address overlap adopts the existing network with the same
/// subnet and parent when one exists.
pub async fn get_or_create_macvlan(
    driver: &dyn ContainerDriver,
    interfaces: &InterfaceCache,
    parent: &str,
    subnet: Option<&str>,
    gateway: Option<&str>,
) -> Result<NetworkView, NetworkError> {
    let (key, gateway) = resolve_network_key(interfaces, parent, subnet, gateway).await?;
    let name = key.network_name();

    if let Some(existing) = driver.network(&name).await? {
        debug!(network = %name, "MACVLAN network already exists, reusing it");
        return Ok(existing);
    }

    info!(
        network = %name,
        parent,
        subnet = %key.subnet,
        gateway = ?gateway,
        "creating MACVLAN network"
    );
    match driver
        .create_macvlan_network(&name, parent, key.subnet.cidr(), gateway.as_deref())
        .await
    {
        Ok(view) => Ok(view),
        Err(DriverError::Overlap(message)) => {
            warn!(
                subnet = %key.subnet,
                "network overlap detected, searching for existing MACVLAN network to reuse"
            );
            for network in driver.macvlan_networks().await? {
                if network.parent.as_deref() == Some(parent)
                    && network.subnets.iter().any(|s| s == key.subnet.cidr())
                {
                    info!(network = %network.name, "adopting existing MACVLAN network");
                    return Ok(network);
                }
            }
            Err(DriverError::Overlap(message).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Get or create the per-runtime isolated bridge.
pub async fn ensure_internal_network(
    driver: &dyn ContainerDriver,
    container_name: &str,
) -> Result<NetworkView, NetworkError> {
    let name = internal_network_name(container_name);
    if let Some(existing) = driver.network(&name).await? {
        debug!(network = %name, "internal network already exists");
        return Ok(existing);
    }
    info!(network = %name, "creating internal network");
    Ok(driver.create_bridge_network(&name).await?)
}

#[cfg(test)]
#[path = "networks_tests.rs"]
mod tests;
