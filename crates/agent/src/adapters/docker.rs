// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker implementation of [`ContainerDriver`] over the daemon's Unix
//! socket API.
//!
//! Runtime containers get a fixed fixture: `restart=always`, capabilities
//! `SYS_NICE` (SCHED_FIFO for the PLC core) and `MKNOD` (device nodes for
//! serial hotplug), ulimits `rtprio=99`/`memlock=-1`, and device cgroup
//! rules for ttyUSB/ttyACM/ttyS so hot-plugged serial ports work without a
//! container restart.

use super::{
    ContainerDriver, ContainerSpec, ContainerUsage, ContainerView, DriverError, EndpointRequest,
    EndpointView, NetworkView,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, NetworkingConfig,
    RemoveContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{
    EndpointIpamConfig, EndpointSettings, HostConfig, Ipam, IpamConfig, Network, RestartPolicy,
    RestartPolicyNameEnum, ResourcesUlimits,
};
use bollard::network::{
    ConnectNetworkOptions, CreateNetworkOptions, DisconnectNetworkOptions, ListNetworksOptions,
};
use bollard::system::EventsOptions;
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub struct DockerDriver {
    docker: Docker,
    start_tx: broadcast::Sender<String>,
}

impl DockerDriver {
    /// Connect with the daemon defaults and start the container-event pump.
    pub fn connect() -> Result<Self, DriverError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;
        let (start_tx, _) = broadcast::channel(64);
        let driver = Self { docker: docker.clone(), start_tx: start_tx.clone() };
        tokio::spawn(pump_container_events(docker, start_tx));
        Ok(driver)
    }
}

/// Consume the daemon's event stream on a dedicated task, forwarding
/// container start events. The stream is re-opened after any failure.
async fn pump_container_events(docker: Docker, start_tx: broadcast::Sender<String>) {
    loop {
        let mut filters = HashMap::new();
        filters.insert("type".to_string(), vec!["container".to_string()]);
        let mut events =
            docker.events(Some(EventsOptions::<String> { filters, ..Default::default() }));

        while let Some(event) = events.next().await {
            match event {
                Ok(message) => {
                    if message.action.as_deref() != Some("start") {
                        continue;
                    }
                    let name = message
                        .actor
                        .as_ref()
                        .and_then(|actor| actor.attributes.as_ref())
                        .and_then(|attrs| attrs.get("name"))
                        .cloned()
                        .or_else(|| message.actor.and_then(|actor| actor.id));
                    if let Some(name) = name {
                        debug!(container = %name, "container start event");
                        let _ = start_tx.send(name);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "container event stream error");
                    break;
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

fn map_err(e: bollard::errors::Error) -> DriverError {
    match e {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, message } => {
            DriverError::NotFound(message)
        }
        bollard::errors::Error::DockerResponseServerError { message, .. } => {
            let lower = message.to_ascii_lowercase();
            if lower.contains("overlap") {
                DriverError::Overlap(message)
            } else if lower.contains("already exists") || lower.contains("already attached") {
                DriverError::AlreadyConnected(message)
            } else {
                DriverError::Api(message)
            }
        }
        other => DriverError::Api(other.to_string()),
    }
}

fn network_view(network: Network) -> NetworkView {
    let (subnets, gateway) = match &network.ipam {
        Some(Ipam { config: Some(pools), .. }) => (
            pools.iter().filter_map(|p| p.subnet.clone()).collect(),
            pools.iter().find_map(|p| p.gateway.clone()),
        ),
        _ => (Vec::new(), None),
    };
    let containers = network
        .containers
        .as_ref()
        .map(|map| map.values().filter_map(|c| c.name.clone()).collect())
        .unwrap_or_default();
    NetworkView {
        name: network.name.unwrap_or_default(),
        driver: network.driver.unwrap_or_default(),
        parent: network
            .options
            .as_ref()
            .and_then(|opts| opts.get("parent"))
            .cloned(),
        subnets,
        gateway,
        containers,
    }
}

fn endpoint_settings(endpoint: &EndpointRequest) -> EndpointSettings {
    EndpointSettings {
        mac_address: endpoint.mac_address.clone(),
        ipam_config: endpoint.ipv4_address.as_ref().map(|ip| EndpointIpamConfig {
            ipv4_address: Some(ip.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn pull_image(&self, image: &str) -> Result<(), DriverError> {
        let options = CreateImageOptions { from_image: image.to_string(), ..Default::default() };
        let mut pull = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = pull.next().await {
            progress.map_err(map_err)?;
        }
        Ok(())
    }

    async fn network(&self, name: &str) -> Result<Option<NetworkView>, DriverError> {
        match self.docker.inspect_network::<String>(name, None).await {
            Ok(network) => Ok(Some(network_view(network))),
            Err(e) => match map_err(e) {
                DriverError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn create_macvlan_network(
        &self,
        name: &str,
        parent: &str,
        subnet: &str,
        gateway: Option<&str>,
    ) -> Result<NetworkView, DriverError> {
        let mut options = HashMap::new();
        options.insert("parent".to_string(), parent.to_string());
        let pool = IpamConfig {
            subnet: Some(subnet.to_string()),
            gateway: gateway.map(str::to_string),
            ..Default::default()
        };
        self.docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                driver: "macvlan".to_string(),
                options,
                ipam: Ipam { config: Some(vec![pool]), ..Default::default() },
                ..Default::default()
            })
            .await
            .map_err(map_err)?;
        Ok(NetworkView {
            name: name.to_string(),
            driver: "macvlan".to_string(),
            parent: Some(parent.to_string()),
            subnets: vec![subnet.to_string()],
            gateway: gateway.map(str::to_string),
            containers: Vec::new(),
        })
    }

    async fn create_bridge_network(&self, name: &str) -> Result<NetworkView, DriverError> {
        self.docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                driver: "bridge".to_string(),
                internal: true,
                ..Default::default()
            })
            .await
            .map_err(map_err)?;
        Ok(NetworkView {
            name: name.to_string(),
            driver: "bridge".to_string(),
            ..NetworkView::default()
        })
    }

    async fn macvlan_networks(&self) -> Result<Vec<NetworkView>, DriverError> {
        let mut filters = HashMap::new();
        filters.insert("driver".to_string(), vec!["macvlan".to_string()]);
        let networks = self
            .docker
            .list_networks(Some(ListNetworksOptions { filters }))
            .await
            .map_err(map_err)?;
        Ok(networks.into_iter().map(network_view).collect())
    }

    async fn remove_network(&self, name: &str) -> Result<(), DriverError> {
        self.docker.remove_network(name).await.map_err(map_err)
    }

    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        endpoint: EndpointRequest,
    ) -> Result<(), DriverError> {
        self.docker
            .connect_network(
                network,
                ConnectNetworkOptions {
                    container: container.to_string(),
                    endpoint_config: endpoint_settings(&endpoint),
                },
            )
            .await
            .map_err(map_err)
    }

    async fn disconnect_network(
        &self,
        network: &str,
        container: &str,
    ) -> Result<(), DriverError> {
        self.docker
            .disconnect_network(
                network,
                DisconnectNetworkOptions { container: container.to_string(), force: true },
            )
            .await
            .map_err(map_err)
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<(), DriverError> {
        let endpoints_config: HashMap<String, EndpointSettings> = spec
            .endpoints
            .iter()
            .map(|(network, endpoint)| (network.clone(), endpoint_settings(endpoint)))
            .collect();

        let host_config = HostConfig {
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::ALWAYS),
                maximum_retry_count: None,
            }),
            cap_add: Some(vec!["SYS_NICE".to_string(), "MKNOD".to_string()]),
            ulimits: Some(vec![
                ResourcesUlimits {
                    name: Some("rtprio".to_string()),
                    soft: Some(99),
                    hard: Some(99),
                },
                ResourcesUlimits {
                    name: Some("memlock".to_string()),
                    soft: Some(-1),
                    hard: Some(-1),
                },
            ]),
            device_cgroup_rules: Some(vec![
                "c 188:* rmw".to_string(),  // USB-to-serial (ttyUSB*)
                "c 166:* rmw".to_string(),  // ACM modems (ttyACM*)
                "c 4:64-255 rmw".to_string(), // native serial ports
            ]),
            dns: if spec.dns.is_empty() { None } else { Some(spec.dns.clone()) },
            ..Default::default()
        };

        self.docker
            .create_container(
                Some(CreateContainerOptions { name: spec.name.clone(), platform: None }),
                Config {
                    image: Some(spec.image),
                    host_config: Some(host_config),
                    networking_config: Some(NetworkingConfig { endpoints_config }),
                    ..Default::default()
                },
            )
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<(), DriverError> {
        self.docker
            .start_container::<String>(name, None)
            .await
            .map_err(map_err)
    }

    async fn stop_container(&self, name: &str, timeout_secs: i64) -> Result<(), DriverError> {
        self.docker
            .stop_container(name, Some(StopContainerOptions { t: timeout_secs }))
            .await
            .map_err(map_err)
    }

    async fn remove_container(&self, name: &str) -> Result<(), DriverError> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions { force: true, ..Default::default() }),
            )
            .await
            .map_err(map_err)
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerView>, DriverError> {
        let inspect = match self.docker.inspect_container(name, None).await {
            Ok(inspect) => inspect,
            Err(e) => {
                return match map_err(e) {
                    DriverError::NotFound(_) => Ok(None),
                    other => Err(other),
                }
            }
        };

        let state = inspect.state.unwrap_or_default();
        let running = state.running.unwrap_or(false);
        let networks: BTreeMap<String, EndpointView> = inspect
            .network_settings
            .and_then(|settings| settings.networks)
            .map(|networks| {
                networks
                    .into_iter()
                    .map(|(network, endpoint)| {
                        (
                            network,
                            EndpointView {
                                ip_address: endpoint.ip_address,
                                mac_address: endpoint.mac_address,
                                gateway: endpoint.gateway,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        let host_config = inspect.host_config.unwrap_or_default();

        Ok(Some(ContainerView {
            name: inspect
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| name.to_string()),
            status: state.status.map(|s| s.to_string()).unwrap_or_default(),
            running,
            pid: state.pid.unwrap_or(0),
            restart_count: inspect.restart_count.unwrap_or(0),
            exit_code: if running { None } else { state.exit_code },
            started_at: state.started_at,
            health_status: state.health.and_then(|h| h.status).map(|s| s.to_string()),
            networks,
            nano_cpus: host_config.nano_cpus,
            cpu_quota: host_config.cpu_quota,
            cpu_period: host_config.cpu_period,
            memory_limit: host_config.memory,
        }))
    }

    async fn container_usage(&self, name: &str) -> Result<Option<ContainerUsage>, DriverError> {
        let mut stats = self
            .docker
            .stats(name, Some(StatsOptions { stream: false, one_shot: false }));
        let Some(sample) = stats.next().await else {
            return Ok(None);
        };
        let sample = match sample {
            Ok(sample) => sample,
            Err(e) => {
                return match map_err(e) {
                    DriverError::NotFound(_) => Ok(None),
                    other => Err(other),
                }
            }
        };

        let cpu_delta = sample.cpu_stats.cpu_usage.total_usage as f64
            - sample.precpu_stats.cpu_usage.total_usage as f64;
        let system_delta = sample.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
            - sample.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
        let online_cpus = sample.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;
        let cpu_pct = if system_delta > 0.0 && cpu_delta >= 0.0 {
            cpu_delta / system_delta * online_cpus * 100.0
        } else {
            0.0
        };
        let memory_mb = sample.memory_stats.usage.unwrap_or(0) as f64 / (1024.0 * 1024.0);
        Ok(Some(ContainerUsage { cpu_pct, memory_mb }))
    }

    async fn find_container_by_label(&self, label: &str) -> Result<Option<String>, DriverError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label.to_string()]);
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions { filters, ..Default::default() }))
            .await
            .map_err(map_err)?;
        Ok(containers.into_iter().find_map(|c| {
            c.names
                .and_then(|names| names.into_iter().next())
                .map(|n| n.trim_start_matches('/').to_string())
        }))
    }

    fn subscribe_starts(&self) -> broadcast::Receiver<String> {
        self.start_tx.subscribe()
    }
}
