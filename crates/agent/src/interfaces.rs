// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface cache: host interface name → latest subnet/gateway/addresses,
//! fed by the netmon sidecar's discovery and change events.

use orc_wire::{InterfaceReport, Ipv4Info};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceEntry {
    pub subnet: Option<String>,
    pub gateway: Option<String>,
    pub addresses: Vec<Ipv4Info>,
}

#[derive(Default)]
pub struct InterfaceCache {
    entries: Mutex<BTreeMap<String, InterfaceEntry>>,
}

impl InterfaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a full discovery: upsert every reported interface, dropping
    /// any that report no IPv4 addresses.
    pub fn apply_discovery(&self, interfaces: &[InterfaceReport]) {
        for report in interfaces {
            self.apply_change(report);
        }
    }

    /// Upsert one interface; an empty IPv4 list removes it.
    pub fn apply_change(&self, report: &InterfaceReport) {
        let mut entries = self.entries.lock();
        if report.ipv4_addresses.is_empty() {
            if entries.remove(&report.interface).is_some() {
                debug!(interface = %report.interface, "removed interface from cache (no addresses)");
            }
            return;
        }
        entries.insert(
            report.interface.clone(),
            InterfaceEntry {
                subnet: report.primary_subnet().map(str::to_string),
                gateway: report.gateway.clone(),
                addresses: report.ipv4_addresses.clone(),
            },
        );
    }

    /// Non-blocking snapshot of one interface.
    pub fn get(&self, interface: &str) -> Option<InterfaceEntry> {
        self.entries.lock().get(interface).cloned()
    }

    /// `(subnet, gateway)` for an interface, when cached.
    pub fn network_of(&self, interface: &str) -> Option<(String, Option<String>)> {
        let entries = self.entries.lock();
        let entry = entries.get(interface)?;
        entry.subnet.clone().map(|subnet| (subnet, entry.gateway.clone()))
    }

    pub fn snapshot(&self) -> BTreeMap<String, InterfaceEntry> {
        self.entries.lock().clone()
    }

    /// Slow-path lookup for create: the interface may not have been
    /// discovered yet right after startup, so poll the cache for up to 3
    /// seconds (500 ms steps) before giving up.
    pub async fn wait_for_network(&self, interface: &str) -> Option<(String, Option<String>)> {
        const MAX_WAIT: Duration = Duration::from_secs(3);
        const POLL: Duration = Duration::from_millis(500);

        let started = tokio::time::Instant::now();
        loop {
            if let Some(found) = self.network_of(interface) {
                return Some(found);
            }
            if started.elapsed() >= MAX_WAIT {
                return None;
            }
            debug!(interface, "interface not yet in netmon cache, waiting for discovery");
            tokio::time::sleep(POLL).await;
        }
    }
}

#[cfg(test)]
#[path = "interfaces_tests.rs"]
mod tests;
