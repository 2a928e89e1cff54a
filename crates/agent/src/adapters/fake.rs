// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory container driver for tests.
//!
//! Models just enough daemon behavior for the engine: networks with
//! parent/subnet identity, containers with endpoint views, connect /
//! disconnect bookkeeping, and a recorded call log tests assert on. MACs
//! the caller does not pin are assigned sequentially the way the daemon
//! would assign random ones.

use super::{
    ContainerDriver, ContainerSpec, ContainerUsage, ContainerView, DriverError, EndpointRequest,
    EndpointView, NetworkView,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

pub struct FakeDriver {
    pub networks: Mutex<BTreeMap<String, NetworkView>>,
    pub containers: Mutex<BTreeMap<String, ContainerView>>,
    pub usage: Mutex<BTreeMap<String, ContainerUsage>>,
    /// Call log, e.g. `connect:macvlan_eno1_10.0.0.0_24:plc-a`.
    pub calls: Mutex<Vec<String>>,
    /// When set, the next macvlan create fails with an overlap error.
    pub overlap_on_create: Mutex<bool>,
    /// Label-lookup answer for `find_container_by_label`.
    pub labelled_container: Mutex<Option<String>>,
    daemon_mac_counter: Mutex<u8>,
    start_tx: broadcast::Sender<String>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        let (start_tx, _) = broadcast::channel(16);
        Self {
            networks: Mutex::new(BTreeMap::new()),
            containers: Mutex::new(BTreeMap::new()),
            usage: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            overlap_on_create: Mutex::new(false),
            labelled_container: Mutex::new(None),
            daemon_mac_counter: Mutex::new(0),
            start_tx,
        }
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Simulate the daemon emitting a container `start` event.
    pub fn emit_start(&self, container: &str) {
        let _ = self.start_tx.send(container.to_string());
    }

    /// Pre-seed a network, as if another runtime had created it.
    pub fn seed_network(&self, view: NetworkView) {
        self.networks.lock().insert(view.name.clone(), view);
    }

    /// Pre-seed a container view directly.
    pub fn seed_container(&self, view: ContainerView) {
        self.containers.lock().insert(view.name.clone(), view);
    }

    /// Overwrite the observed MAC on one endpoint, as a restart would.
    pub fn set_endpoint_mac(&self, container: &str, network: &str, mac: &str) {
        let mut containers = self.containers.lock();
        if let Some(view) = containers.get_mut(container) {
            if let Some(endpoint) = view.networks.get_mut(network) {
                endpoint.mac_address = Some(mac.to_string());
            }
        }
    }

    fn daemon_mac(&self) -> String {
        let mut counter = self.daemon_mac_counter.lock();
        *counter += 1;
        format!("9a:00:00:00:00:{:02x}", *counter)
    }

    fn synth_endpoint(&self, network: &str, endpoint: &EndpointRequest) -> EndpointView {
        let ip = endpoint.ipv4_address.clone().or_else(|| {
            let n = self.containers.lock().len() + 2;
            Some(if network.ends_with("_internal") {
                format!("172.30.0.{n}")
            } else {
                format!("10.200.0.{n}")
            })
        });
        EndpointView {
            ip_address: ip,
            mac_address: endpoint.mac_address.clone().or_else(|| Some(self.daemon_mac())),
            gateway: None,
        }
    }
}

#[async_trait]
impl ContainerDriver for FakeDriver {
    async fn pull_image(&self, image: &str) -> Result<(), DriverError> {
        self.record(format!("pull:{image}"));
        Ok(())
    }

    async fn network(&self, name: &str) -> Result<Option<NetworkView>, DriverError> {
        Ok(self.networks.lock().get(name).cloned())
    }

    async fn create_macvlan_network(
        &self,
        name: &str,
        parent: &str,
        subnet: &str,
        gateway: Option<&str>,
    ) -> Result<NetworkView, DriverError> {
        if *self.overlap_on_create.lock() {
            return Err(DriverError::Overlap(format!("Pool overlaps with other one: {subnet}")));
        }
        self.record(format!("create_network:{name}"));
        let view = NetworkView {
            name: name.to_string(),
            driver: "macvlan".to_string(),
            parent: Some(parent.to_string()),
            subnets: vec![subnet.to_string()],
            gateway: gateway.map(str::to_string),
            containers: Vec::new(),
        };
        self.networks.lock().insert(name.to_string(), view.clone());
        Ok(view)
    }

    async fn create_bridge_network(&self, name: &str) -> Result<NetworkView, DriverError> {
        self.record(format!("create_bridge:{name}"));
        let view = NetworkView {
            name: name.to_string(),
            driver: "bridge".to_string(),
            ..NetworkView::default()
        };
        self.networks.lock().insert(name.to_string(), view.clone());
        Ok(view)
    }

    async fn macvlan_networks(&self) -> Result<Vec<NetworkView>, DriverError> {
        Ok(self
            .networks
            .lock()
            .values()
            .filter(|n| n.driver == "macvlan")
            .cloned()
            .collect())
    }

    async fn remove_network(&self, name: &str) -> Result<(), DriverError> {
        self.record(format!("remove_network:{name}"));
        self.networks
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DriverError::NotFound(name.to_string()))
    }

    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        endpoint: EndpointRequest,
    ) -> Result<(), DriverError> {
        self.record(format!(
            "connect:{network}:{container}:mac={}:ip={}",
            endpoint.mac_address.as_deref().unwrap_or("-"),
            endpoint.ipv4_address.as_deref().unwrap_or("-"),
        ));
        let view = self.synth_endpoint(network, &endpoint);
        {
            let mut networks = self.networks.lock();
            if let Some(net) = networks.get_mut(network) {
                if net.containers.iter().any(|c| c == container) {
                    return Err(DriverError::AlreadyConnected(format!("{container} on {network}")));
                }
                net.containers.push(container.to_string());
            }
        }
        let mut containers = self.containers.lock();
        if let Some(c) = containers.get_mut(container) {
            c.networks.insert(network.to_string(), view);
        }
        Ok(())
    }

    async fn disconnect_network(
        &self,
        network: &str,
        container: &str,
    ) -> Result<(), DriverError> {
        self.record(format!("disconnect:{network}:{container}"));
        {
            let mut networks = self.networks.lock();
            if let Some(net) = networks.get_mut(network) {
                net.containers.retain(|c| c != container);
            } else {
                return Err(DriverError::NotFound(network.to_string()));
            }
        }
        if let Some(c) = self.containers.lock().get_mut(container) {
            c.networks.remove(network);
        }
        Ok(())
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<(), DriverError> {
        self.record(format!("create_container:{}", spec.name));
        let mut networks = BTreeMap::new();
        for (network, endpoint) in &spec.endpoints {
            networks.insert(network.clone(), self.synth_endpoint(network, endpoint));
            if let Some(net) = self.networks.lock().get_mut(network) {
                net.containers.push(spec.name.clone());
            }
        }
        let view = ContainerView {
            name: spec.name.clone(),
            status: "created".to_string(),
            running: false,
            pid: 0,
            networks,
            ..ContainerView::default()
        };
        self.containers.lock().insert(spec.name, view);
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<(), DriverError> {
        self.record(format!("start:{name}"));
        let mut containers = self.containers.lock();
        let view = containers
            .get_mut(name)
            .ok_or_else(|| DriverError::NotFound(name.to_string()))?;
        view.status = "running".to_string();
        view.running = true;
        view.pid = 4242;
        view.started_at = Some("2026-01-05T10:00:00Z".to_string());
        Ok(())
    }

    async fn stop_container(&self, name: &str, _timeout_secs: i64) -> Result<(), DriverError> {
        self.record(format!("stop:{name}"));
        let mut containers = self.containers.lock();
        let view = containers
            .get_mut(name)
            .ok_or_else(|| DriverError::NotFound(name.to_string()))?;
        view.status = "exited".to_string();
        view.running = false;
        view.pid = 0;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), DriverError> {
        self.record(format!("remove:{name}"));
        self.containers
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DriverError::NotFound(name.to_string()))
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerView>, DriverError> {
        Ok(self.containers.lock().get(name).cloned())
    }

    async fn container_usage(&self, name: &str) -> Result<Option<ContainerUsage>, DriverError> {
        Ok(self.usage.lock().get(name).copied())
    }

    async fn find_container_by_label(&self, label: &str) -> Result<Option<String>, DriverError> {
        self.record(format!("find_by_label:{label}"));
        Ok(self.labelled_container.lock().clone())
    }

    fn subscribe_starts(&self) -> broadcast::Receiver<String> {
        self.start_tx.subscribe()
    }
}
