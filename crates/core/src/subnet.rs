// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subnet normalization and MACVLAN network keys.
//!
//! Requests may describe a subnet either as CIDR (`192.168.1.0/24`) or as a
//! dotted netmask paired with a gateway (`255.255.255.0` + `192.168.1.1`).
//! Both forms normalize to a canonical CIDR (the network address is the
//! gateway or given address masked down, for any prefix length) and the
//! canonical CIDR is the L2 network key alongside the parent interface.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubnetError {
    #[error("invalid IPv4 address '{0}'")]
    InvalidAddress(String),

    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),

    #[error("invalid netmask '{0}'")]
    InvalidNetmask(String),

    #[error("netmask '{0}' requires a gateway to derive the network address")]
    MissingGateway(String),
}

/// A normalized IPv4 subnet in CIDR form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubnetSpec {
    cidr: String,
}

impl SubnetSpec {
    /// Parse either CIDR or netmask form. Netmask form needs a gateway (or
    /// any address inside the subnet) to derive the network address.
    pub fn parse(subnet: &str, gateway: Option<&str>) -> Result<Self, SubnetError> {
        let subnet = subnet.trim();
        if subnet.contains('/') {
            Self::from_cidr(subnet)
        } else {
            let mask = parse_netmask(subnet)?;
            let gateway = gateway.ok_or_else(|| SubnetError::MissingGateway(subnet.to_string()))?;
            let gateway_addr = parse_addr(gateway)?;
            Ok(Self::from_parts(gateway_addr, mask.prefix, mask.addr))
        }
    }

    /// Parse a strict CIDR string, canonicalizing the network address.
    pub fn from_cidr(cidr: &str) -> Result<Self, SubnetError> {
        let (addr, prefix) = cidr
            .split_once('/')
            .ok_or_else(|| SubnetError::InvalidCidr(cidr.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| SubnetError::InvalidCidr(cidr.to_string()))?;
        if prefix > 32 {
            return Err(SubnetError::InvalidCidr(cidr.to_string()));
        }
        let addr = parse_addr(addr)?;
        Ok(Self::from_parts(addr, prefix, prefix_to_mask(prefix)))
    }

    fn from_parts(addr: Ipv4Addr, prefix: u8, mask: Ipv4Addr) -> Self {
        let base = Ipv4Addr::from(u32::from(addr) & u32::from(mask));
        Self { cidr: format!("{base}/{prefix}") }
    }

    pub fn cidr(&self) -> &str {
        &self.cidr
    }
}

impl fmt::Display for SubnetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cidr)
    }
}

/// Key identifying one L2 network: at most one MACVLAN network exists per
/// `(parent_interface, subnet)` pair, shared across runtimes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkKey {
    pub parent_interface: String,
    pub subnet: SubnetSpec,
}

impl NetworkKey {
    pub fn new(parent_interface: impl Into<String>, subnet: SubnetSpec) -> Self {
        Self { parent_interface: parent_interface.into(), subnet }
    }

    /// The Docker network name for this key.
    pub fn network_name(&self) -> String {
        macvlan_network_name(&self.parent_interface, self.subnet.cidr())
    }
}

impl fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent_interface, self.subnet)
    }
}

/// Name of the MACVLAN network for a parent interface and CIDR,
/// `macvlan_{iface}_{cidr}` with the slash made filesystem/Docker safe.
pub fn macvlan_network_name(parent_interface: &str, cidr: &str) -> String {
    format!("macvlan_{}_{}", parent_interface, cidr.replace('/', "_"))
}

struct Netmask {
    addr: Ipv4Addr,
    prefix: u8,
}

fn parse_addr(s: &str) -> Result<Ipv4Addr, SubnetError> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| SubnetError::InvalidAddress(s.to_string()))
}

/// Parse a dotted netmask, rejecting non-contiguous masks.
fn parse_netmask(s: &str) -> Result<Netmask, SubnetError> {
    let addr = s
        .parse::<Ipv4Addr>()
        .map_err(|_| SubnetError::InvalidNetmask(s.to_string()))?;
    let bits = u32::from(addr);
    let prefix = bits.count_ones() as u8;
    if bits != prefix_bits(prefix) {
        return Err(SubnetError::InvalidNetmask(s.to_string()));
    }
    Ok(Netmask { addr, prefix })
}

fn prefix_bits(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix as u32)
    }
}

fn prefix_to_mask(prefix: u8) -> Ipv4Addr {
    Ipv4Addr::from(prefix_bits(prefix))
}

#[cfg(test)]
#[path = "subnet_tests.rs"]
mod tests;
