// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Netlink discovery and change monitoring.
//!
//! Discovery walks links, IPv4 addresses, and default routes into
//! [`InterfaceReport`]s. The monitor joins the link/address/route multicast
//! groups, marks touched interfaces, and after a 3-second quiet period
//! emits one debounced `network_change` per interface that still has IPv4
//! addresses.

use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt;
use futures_util::TryStreamExt;
use netlink_packet_core::{NetlinkMessage, NetlinkPayload};
use netlink_packet_route::address::{AddressAttribute, AddressMessage};
use netlink_packet_route::link::{LinkAttribute, State};
use netlink_packet_route::route::{RouteAddress, RouteAttribute};
use netlink_packet_route::RouteNetlinkMessage;
use netlink_sys::{AsyncSocket, SocketAddr};
use orc_core::SubnetSpec;
use orc_wire::{InterfaceReport, Ipv4Info, NetmonEvent};
use rtnetlink::constants::{RTMGRP_IPV4_IFADDR, RTMGRP_IPV4_ROUTE, RTMGRP_LINK};
use rtnetlink::{Handle, IpVersion};
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const DEBOUNCE: Duration = Duration::from_secs(3);
const MONITOR_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum NetlinkError {
    #[error("netlink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interfaces that never concern the orchestrator.
fn monitored_interface(name: &str) -> bool {
    name != "lo" && name != "docker0" && !name.starts_with("veth")
}

/// Open a plain request connection (no multicast membership).
pub fn connect() -> Result<Handle, NetlinkError> {
    let (connection, handle, _) = rtnetlink::new_connection()?;
    tokio::spawn(connection);
    Ok(handle)
}

/// All UP, monitored interfaces that carry at least one IPv4 address.
pub async fn discover_interfaces(handle: &Handle) -> Vec<InterfaceReport> {
    let mut reports = Vec::new();
    let mut links = handle.link().get().execute();
    loop {
        let link = match links.try_next().await {
            Ok(Some(link)) => link,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "failed to list links");
                break;
            }
        };

        let index = link.header.index;
        let mut name = None;
        let mut up = false;
        for attr in &link.attributes {
            match attr {
                LinkAttribute::IfName(ifname) => name = Some(ifname.clone()),
                LinkAttribute::OperState(state) => up = *state == State::Up,
                _ => {}
            }
        }
        let Some(name) = name else { continue };
        if !up || !monitored_interface(&name) {
            continue;
        }
        if let Some(report) = interface_report(handle, index, &name).await {
            info!(
                interface = %report.interface,
                addresses = report.ipv4_addresses.len(),
                "discovered interface"
            );
            reports.push(report);
        }
    }
    reports
}

/// Report one interface, or None when it has no IPv4 addresses.
pub async fn interface_report(handle: &Handle, index: u32, name: &str) -> Option<InterfaceReport> {
    let mut ipv4_addresses = Vec::new();
    let mut addresses = handle.address().get().set_link_index_filter(index).execute();
    loop {
        let message: AddressMessage = match addresses.try_next().await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                error!(interface = name, error = %e, "failed to list addresses");
                break;
            }
        };
        let prefixlen = message.header.prefix_len;
        for attr in &message.attributes {
            let AddressAttribute::Address(IpAddr::V4(address)) = attr else { continue };
            let Ok(spec) = SubnetSpec::from_cidr(&format!("{address}/{prefixlen}")) else {
                warn!(interface = name, %address, prefixlen, "failed to derive subnet");
                continue;
            };
            let network_address =
                spec.cidr().split('/').next().unwrap_or_default().to_string();
            ipv4_addresses.push(Ipv4Info {
                address: address.to_string(),
                prefixlen,
                subnet: spec.cidr().to_string(),
                network_address,
            });
        }
    }
    if ipv4_addresses.is_empty() {
        return None;
    }

    Some(InterfaceReport {
        interface: name.to_string(),
        index: Some(index),
        operstate: Some("UP".to_string()),
        ipv4_addresses,
        gateway: default_gateway(handle, index).await,
        timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    })
}

/// Default-route gateway leaving through the given interface.
pub async fn default_gateway(handle: &Handle, index: u32) -> Option<String> {
    let mut routes = handle.route().get(IpVersion::V4).execute();
    loop {
        let route = match routes.try_next().await {
            Ok(Some(route)) => route,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "failed to list routes");
                return None;
            }
        };
        if route.header.destination_prefix_length != 0 {
            continue;
        }
        let mut oif = None;
        let mut gateway = None;
        for attr in &route.attributes {
            match attr {
                RouteAttribute::Oif(i) => oif = Some(*i),
                RouteAttribute::Gateway(RouteAddress::Inet(address)) => {
                    gateway = Some(address.to_string())
                }
                _ => {}
            }
        }
        if oif == Some(index) {
            if let Some(gateway) = gateway {
                return Some(gateway);
            }
        }
    }
}

/// Join the address/route/link multicast groups and emit debounced
/// `network_change` events until the process exits.
pub fn spawn_monitor(
    handle: Handle,
    events: broadcast::Sender<NetmonEvent>,
) -> Result<(), NetlinkError> {
    let (mut connection, _monitor_handle, mut messages) = rtnetlink::new_connection()?;
    let groups = RTMGRP_LINK | RTMGRP_IPV4_IFADDR | RTMGRP_IPV4_ROUTE;
    let addr = SocketAddr::new(0, groups);
    connection.socket_mut().socket_mut().bind(&addr)?;
    tokio::spawn(connection);

    tokio::spawn(async move {
        let mut pending: HashSet<u32> = HashSet::new();
        let mut last_event = tokio::time::Instant::now();
        let mut tick = tokio::time::interval(MONITOR_TICK);
        info!("netlink monitor started");

        loop {
            tokio::select! {
                message = messages.next() => {
                    let Some((message, _addr)) = message else {
                        warn!("netlink monitor socket closed");
                        return;
                    };
                    if let Some(index) = touched_interface(&message) {
                        debug!(index, "netlink event");
                        pending.insert(index);
                        last_event = tokio::time::Instant::now();
                    }
                }
                _ = tick.tick() => {
                    if pending.is_empty() || last_event.elapsed() < DEBOUNCE {
                        continue;
                    }
                    let indices: Vec<u32> = pending.drain().collect();
                    info!(interfaces = indices.len(), "processing debounced network changes");
                    for index in indices {
                        process_change(&handle, index, &events).await;
                    }
                }
            }
        }
    });
    Ok(())
}

/// The interface index an RTM message concerns, if it is one we care about.
fn touched_interface(message: &NetlinkMessage<RouteNetlinkMessage>) -> Option<u32> {
    let NetlinkPayload::InnerMessage(inner) = &message.payload else {
        return None;
    };
    match inner {
        RouteNetlinkMessage::NewAddress(m) | RouteNetlinkMessage::DelAddress(m) => {
            Some(m.header.index)
        }
        RouteNetlinkMessage::NewRoute(m) | RouteNetlinkMessage::DelRoute(m) => {
            m.attributes.iter().find_map(|attr| match attr {
                RouteAttribute::Oif(index) => Some(*index),
                _ => None,
            })
        }
        RouteNetlinkMessage::NewLink(m) | RouteNetlinkMessage::DelLink(m) => {
            Some(m.header.index)
        }
        _ => None,
    }
}

async fn process_change(handle: &Handle, index: u32, events: &broadcast::Sender<NetmonEvent>) {
    let mut links = handle.link().get().match_index(index).execute();
    let link = match links.try_next().await {
        Ok(Some(link)) => link,
        Ok(None) => {
            debug!(index, "interface disappeared before processing");
            return;
        }
        Err(e) => {
            debug!(index, error = %e, "interface lookup failed (ENODEV?)");
            return;
        }
    };
    let name = link.attributes.iter().find_map(|attr| match attr {
        LinkAttribute::IfName(name) => Some(name.clone()),
        _ => None,
    });
    let Some(name) = name else { return };
    if !monitored_interface(&name) {
        return;
    }

    match interface_report(handle, index, &name).await {
        Some(report) => {
            info!(interface = %name, "sending network change event");
            let _ = events.send(NetmonEvent::NetworkChange(report));
        }
        None => debug!(interface = %name, "no IPv4 addresses after change, not reporting"),
    }
}
