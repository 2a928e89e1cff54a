// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable and path access for the agent.

use std::path::PathBuf;

/// Image every runtime container runs.
pub const RUNTIME_IMAGE: &str = "ghcr.io/autonomy-logic/openplc-runtime:latest";

/// Label identifying the agent's own container, for the self-detect fallback.
pub const ORCHESTRATOR_LABEL: &str = "edge.autonomy.role=orchestrator-agent";

/// Unix socket the netmon sidecar listens on. `ORC_NETMON_SOCKET` overrides.
pub fn netmon_socket() -> PathBuf {
    std::env::var("ORC_NETMON_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/orchestrator/netmon.sock"))
}

/// Persisted vNIC intents. `ORC_VNIC_FILE` overrides.
pub fn vnic_file() -> PathBuf {
    std::env::var("ORC_VNIC_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/orchestrator/runtime_vnics.json"))
}

/// Persisted serial-port intents. `ORC_SERIAL_FILE` overrides.
pub fn serial_file() -> PathBuf {
    std::env::var("ORC_SERIAL_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/orchestrator/data/serial_configs.json"))
}

/// Runtime client registry (name → internal IP). `CLIENTS_FILE` overrides.
pub fn clients_file() -> PathBuf {
    std::env::var("CLIENTS_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/orchestrator/data/clients.json"))
}

/// Agent log directory.
pub fn log_dir() -> PathBuf {
    std::env::var("ORC_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/orchestrator/logs"))
}

/// Control-channel endpoint of the cloud controller.
pub fn server_url() -> String {
    std::env::var("ORC_SERVER_URL").unwrap_or_else(|_| "wss://localhost:7676/ws".to_string())
}

/// Configured own-container name, used as the third self-detect attempt.
pub fn host_name() -> String {
    std::env::var("HOST_NAME").unwrap_or_else(|_| "orchestrator-agent-devcontainer".to_string())
}

/// Container id set by the container daemon; first self-detect attempt.
pub fn hostname_env() -> Option<String> {
    std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty())
}

/// Client certificate material for mutual TLS on the control channel.
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

/// All three of `ORC_TLS_CERT`, `ORC_TLS_KEY`, `ORC_TLS_CA` must be set;
/// otherwise the channel connects without client auth (dev setups).
pub fn tls_paths() -> Option<TlsPaths> {
    let cert = std::env::var("ORC_TLS_CERT").ok()?;
    let key = std::env::var("ORC_TLS_KEY").ok()?;
    let ca = std::env::var("ORC_TLS_CA").ok()?;
    Some(TlsPaths { cert: cert.into(), key: key.into(), ca: ca.into() })
}
