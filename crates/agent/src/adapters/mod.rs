// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container driver abstraction.
//!
//! The engine speaks [`ContainerDriver`], a typed, domain-shaped view of a
//! container daemon. [`docker::DockerDriver`] maps it onto the Docker API;
//! [`FakeDriver`] is the in-memory double the engine and dispatcher tests
//! run against.

pub mod docker;
#[cfg(test)]
mod fake;

#[cfg(test)]
pub use fake::FakeDriver;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("network overlap: {0}")]
    Overlap(String),

    #[error("endpoint already connected: {0}")]
    AlreadyConnected(String),

    #[error("container daemon unavailable: {0}")]
    Unavailable(String),

    #[error("container daemon error: {0}")]
    Api(String),
}

impl DriverError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound(_))
    }
}

/// One network as seen by the daemon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkView {
    pub name: String,
    pub driver: String,
    /// `parent` option for macvlan networks.
    pub parent: Option<String>,
    pub subnets: Vec<String>,
    pub gateway: Option<String>,
    /// Names of containers currently attached.
    pub containers: Vec<String>,
}

/// One endpoint of a container on a network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointView {
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub gateway: Option<String>,
}

/// Inspect result reduced to what the engine needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerView {
    pub name: String,
    pub status: String,
    pub running: bool,
    pub pid: i64,
    pub restart_count: i64,
    pub exit_code: Option<i64>,
    pub started_at: Option<String>,
    pub health_status: Option<String>,
    pub networks: BTreeMap<String, EndpointView>,
    pub nano_cpus: Option<i64>,
    pub cpu_quota: Option<i64>,
    pub cpu_period: Option<i64>,
    pub memory_limit: Option<i64>,
}

/// Desired endpoint settings when attaching to a network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointRequest {
    pub ipv4_address: Option<String>,
    pub mac_address: Option<String>,
}

/// Everything needed to create and start one runtime container. The
/// capability/ulimit/cgroup fixture is fixed and applied by the driver.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Endpoints pre-attached at create time, keyed by network name.
    pub endpoints: BTreeMap<String, EndpointRequest>,
    /// The network the container is primarily created on (the internal bridge).
    pub primary_network: String,
    pub dns: Vec<String>,
}

/// One CPU/memory usage reading for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContainerUsage {
    pub cpu_pct: f64,
    pub memory_mb: f64,
}

#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Best-effort image pull; callers warn and continue on failure.
    async fn pull_image(&self, image: &str) -> Result<(), DriverError>;

    async fn network(&self, name: &str) -> Result<Option<NetworkView>, DriverError>;

    async fn create_macvlan_network(
        &self,
        name: &str,
        parent: &str,
        subnet: &str,
        gateway: Option<&str>,
    ) -> Result<NetworkView, DriverError>;

    /// Isolated bridge for agent↔runtime traffic.
    async fn create_bridge_network(&self, name: &str) -> Result<NetworkView, DriverError>;

    async fn macvlan_networks(&self) -> Result<Vec<NetworkView>, DriverError>;

    async fn remove_network(&self, name: &str) -> Result<(), DriverError>;

    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        endpoint: EndpointRequest,
    ) -> Result<(), DriverError>;

    /// Force-disconnect; tolerating `NotFound` is the caller's decision.
    async fn disconnect_network(&self, network: &str, container: &str)
        -> Result<(), DriverError>;

    async fn create_container(&self, spec: ContainerSpec) -> Result<(), DriverError>;

    async fn start_container(&self, name: &str) -> Result<(), DriverError>;

    async fn stop_container(&self, name: &str, timeout_secs: i64) -> Result<(), DriverError>;

    /// Force remove.
    async fn remove_container(&self, name: &str) -> Result<(), DriverError>;

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerView>, DriverError>;

    async fn container_usage(&self, name: &str) -> Result<Option<ContainerUsage>, DriverError>;

    async fn find_container_by_label(&self, label: &str) -> Result<Option<String>, DriverError>;

    /// Names of containers as they emit `start` events.
    fn subscribe_starts(&self) -> broadcast::Receiver<String>;
}
