// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime container creation.
//!
//! Validation happens synchronously on the request path and rejects before
//! any driver call; the pipeline itself runs on a spawned task, writing
//! each step into the operations tracker. On failure the partially
//! persisted intent is kept; the operator deletes and re-creates.

use crate::adapters::{ContainerSpec, DriverError, EndpointRequest, NetworkView};
use crate::context::AgentContext;
use crate::engine::networks::{
    ensure_internal_network, get_or_create_macvlan, validation_key, NetworkError,
};
use crate::engine::self_id::resolve_self_container;
use crate::storage::StoreError;
use orc_core::{generate_mac, normalize_mac, OperationKind, SerialPortConfig, VnicConfig};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A vNIC that needs a DHCP client once the container is up.
#[derive(Debug, Clone, PartialEq)]
pub struct DhcpTarget {
    pub vnic_name: String,
    pub mac_address: String,
    pub container_pid: i64,
}

/// Synchronous request validation, in contract order: name, vNIC presence,
/// fleet-wide MAC uniqueness, duplicate L2 keys, operation exclusivity.
/// Nothing here touches the container daemon.
pub fn validate_request(
    ctx: &AgentContext,
    container_name: &str,
    vnic_configs: &[VnicConfig],
) -> Result<(), CreateError> {
    if container_name.trim().is_empty() {
        return Err(CreateError::Validation(
            "Container name must be a non-empty string".to_string(),
        ));
    }
    if vnic_configs.is_empty() {
        return Err(CreateError::Validation(
            "At least one vNIC configuration is required".to_string(),
        ));
    }

    if let Some(conflict) = ctx.store.find_mac_conflict(vnic_configs) {
        return Err(CreateError::Validation(format!(
            "MAC address {} is already in use by container {}",
            conflict.mac, conflict.container
        )));
    }

    let mut seen: HashMap<String, &str> = HashMap::new();
    for vnic in vnic_configs {
        let key = validation_key(&ctx.interfaces, vnic)
            .map_err(|e| CreateError::Validation(e.to_string()))?;
        if let Some(previous) = seen.insert(key.clone(), &vnic.name) {
            return Err(CreateError::Validation(format!(
                "Invalid vNIC configuration: vNICs '{previous}' and '{}' would connect to the \
                 same MACVLAN network ({key}). Only one endpoint per container per network is \
                 possible; use different subnets or a single vNIC.",
                vnic.name
            )));
        }
    }

    if let Some(operation) = ctx.ops.in_progress(container_name) {
        return Err(CreateError::Validation(format!(
            "Container {container_name} already has a {operation} operation in progress"
        )));
    }
    Ok(())
}

/// Full create flow, run on its own task after the request was
/// acknowledged: pipeline, then DHCP fan-out, then operation clear.
pub async fn create_runtime(
    ctx: Arc<AgentContext>,
    container_name: String,
    vnic_configs: Vec<VnicConfig>,
    serial_configs: Vec<SerialPortConfig>,
) {
    match run_pipeline(&ctx, &container_name, vnic_configs, serial_configs).await {
        Ok(dhcp_targets) => {
            if !dhcp_targets.is_empty() {
                ctx.ops.set_step(&container_name, "starting_dhcp");
            }
            for target in dhcp_targets {
                match ctx
                    .netmon
                    .start_dhcp(
                        &container_name,
                        &target.vnic_name,
                        &target.mac_address,
                        target.container_pid,
                    )
                    .await
                {
                    Ok(reply) if reply.success => {
                        info!(vnic = %target.vnic_name, "requested DHCP client")
                    }
                    Ok(reply) => warn!(
                        vnic = %target.vnic_name,
                        error = ?reply.error,
                        "sidecar rejected DHCP request"
                    ),
                    Err(e) => warn!(vnic = %target.vnic_name, error = %e, "failed to request DHCP"),
                }
            }
            ctx.ops.clear(&container_name);
            info!(container = %container_name, "runtime container created successfully");
        }
        Err(e) => {
            error!(container = %container_name, error = %e, "failed to create runtime container");
            ctx.ops.set_error(&container_name, &e.to_string(), OperationKind::Create);
        }
    }
}

async fn run_pipeline(
    ctx: &AgentContext,
    container_name: &str,
    mut vnic_configs: Vec<VnicConfig>,
    serial_configs: Vec<SerialPortConfig>,
) -> Result<Vec<DhcpTarget>, CreateError> {
    let driver = ctx.driver.as_ref();

    ctx.ops.set_step(container_name, "pulling_image");
    info!(image = %ctx.runtime_image, "pulling runtime image");
    if let Err(e) = driver.pull_image(&ctx.runtime_image).await {
        warn!(error = %e, "failed to pull image, will try to use local image");
    }

    ctx.ops.set_step(container_name, "creating_networks");
    let internal = ensure_internal_network(driver, container_name).await?;

    let mut attachments: Vec<(NetworkView, usize)> = Vec::new();
    let mut dns_servers: Vec<String> = Vec::new();
    for (idx, vnic) in vnic_configs.iter().enumerate() {
        debug!(vnic = %vnic.name, parent = %vnic.parent_interface, "resolving vNIC network");
        let network = get_or_create_macvlan(
            driver,
            &ctx.interfaces,
            &vnic.parent_interface,
            vnic.subnet.as_deref(),
            vnic.gateway.as_deref(),
        )
        .await?;
        attachments.push((network, idx));
        if let Some(servers) = &vnic.dns {
            for server in servers {
                if !dns_servers.contains(server) {
                    dns_servers.push(server.clone());
                }
            }
        }
    }

    ctx.ops.set_step(container_name, "creating_container");
    info!(container = %container_name, "creating container");

    let mut endpoints: BTreeMap<String, EndpointRequest> = BTreeMap::new();
    {
        let mut used: BTreeSet<String> = ctx.store.all_macs().into_iter().collect();
        let mut rng = rand::thread_rng();
        for (network, idx) in &attachments {
            let vnic = &mut vnic_configs[*idx];
            let mac = match &vnic.mac_address {
                Some(mac) => {
                    debug!(vnic = %vnic.name, mac = %mac, "using user-provided MAC address");
                    mac.clone()
                }
                None => {
                    let mut mac = generate_mac(&mut rng);
                    while used.contains(&normalize_mac(&mac)) {
                        mac = generate_mac(&mut rng);
                    }
                    info!(vnic = %vnic.name, mac = %mac, "generated MAC address");
                    mac
                }
            };
            used.insert(normalize_mac(&mac));
            vnic.mac_address = Some(mac.clone());
            endpoints.insert(
                network.name.clone(),
                EndpointRequest { ipv4_address: vnic.static_ip(), mac_address: Some(mac) },
            );
        }
    }
    // The internal endpoint rides along in the same create call
    endpoints.insert(internal.name.clone(), EndpointRequest::default());

    driver
        .create_container(ContainerSpec {
            name: container_name.to_string(),
            image: ctx.runtime_image.clone(),
            endpoints,
            primary_network: internal.name.clone(),
            dns: dns_servers,
        })
        .await?;
    driver.start_container(container_name).await?;
    info!(container = %container_name, "container created and started");

    match resolve_self_container(driver, &ctx.identity).await {
        Some(self_name) => {
            match driver.connect_network(&internal.name, &self_name, EndpointRequest::default()).await
            {
                Ok(()) => debug!(network = %internal.name, "connected agent to internal network"),
                Err(DriverError::AlreadyConnected(_)) => {
                    debug!(network = %internal.name, "agent already on internal network")
                }
                Err(e) => warn!(error = %e, "could not connect agent to internal network"),
            }
        }
        None => warn!("could not detect own container, skipping internal network connection"),
    }

    let view = driver
        .inspect_container(container_name)
        .await?
        .ok_or_else(|| DriverError::NotFound(container_name.to_string()))?;

    match view.networks.get(&internal.name).and_then(|e| e.ip_address.clone()) {
        Some(internal_ip) => {
            ctx.store.add_client(container_name, &internal_ip)?;
            info!(container = %container_name, ip = %internal_ip, "runtime registered with internal IP");
        }
        None => warn!(container = %container_name, "could not read internal IP"),
    }

    for (network, idx) in &attachments {
        let vnic = &mut vnic_configs[*idx];
        if let Some(endpoint) = view.networks.get(&network.name) {
            if let Some(mac) = &endpoint.mac_address {
                vnic.mac_address = Some(mac.clone());
            }
            vnic.docker_network_name = Some(network.name.clone());
            info!(
                vnic = %vnic.name,
                parent = %vnic.parent_interface,
                ip = ?endpoint.ip_address,
                mac = ?endpoint.mac_address,
                "vNIC attached"
            );
        }
    }

    ctx.store.save_vnics(container_name, vnic_configs.clone())?;
    if !serial_configs.is_empty() {
        info!(count = serial_configs.len(), "saving serial port configurations");
        ctx.store.save_serials(container_name, serial_configs)?;
    }

    ctx.usage.devices.add_device(container_name);
    debug!(container = %container_name, "registered for usage data collection");

    let container_pid = view.pid;
    debug!(container = %container_name, pid = container_pid, "container PID");
    let mut dhcp_targets = Vec::new();
    for (network, idx) in &attachments {
        let vnic = &vnic_configs[*idx];
        if vnic.network_mode.is_static() {
            continue;
        }
        let mac = view.networks.get(&network.name).and_then(|e| e.mac_address.clone());
        if let Some(mac) = mac {
            if container_pid > 0 {
                dhcp_targets.push(DhcpTarget {
                    vnic_name: vnic.name.clone(),
                    mac_address: mac,
                    container_pid,
                });
            }
        }
    }
    Ok(dhcp_targets)
}

#[cfg(test)]
#[path = "create_tests.rs"]
mod tests;
