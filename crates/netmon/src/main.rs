// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network monitor sidecar.
//!
//! Host-privileged companion of the orchestrator agent: watches netlink
//! and udev, supervises per-container DHCP clients, and serves it all over
//! a Unix socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod devices;
mod dhcp;
mod netlink;
mod server;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orc-netmon", about = "Network monitor sidecar for the orchestrator agent")]
struct Args {
    /// Logging level
    #[arg(
        short = 'l',
        long = "log-level",
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    log_level: String,
}

fn socket_path() -> PathBuf {
    std::env::var("ORC_NETMON_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/orchestrator/netmon.sock"))
}

fn lease_dir() -> PathBuf {
    std::env::var("ORC_DHCP_LEASE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/orchestrator/dhcp"))
}

fn log_dir() -> PathBuf {
    std::env::var("ORC_NETMON_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/log"))
}

fn filter_for(level: &str) -> EnvFilter {
    let directive = match level {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    };
    EnvFilter::new(directive)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let file_appender = tracing_appender::rolling::never(log_dir(), "autonomy-netmon.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(filter_for(&args.log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    info!("starting network monitor");
    std::fs::create_dir_all(lease_dir())?;

    let (events, _) = broadcast::channel::<orc_wire::NetmonEvent>(128);

    let netlink_handle = match netlink::connect() {
        Ok(handle) => {
            if let Err(e) = netlink::spawn_monitor(handle.clone(), events.clone()) {
                error!(error = %e, "failed to start netlink monitor");
            }
            Some(handle)
        }
        Err(e) => {
            error!(error = %e, "netlink unavailable, network monitoring disabled");
            None
        }
    };

    let device_monitor = Arc::new(devices::DeviceMonitor::new(events.clone()));
    device_monitor.start();

    let dhcp = dhcp::DhcpManager::new(events.clone(), lease_dir());
    let sidecar = Arc::new(server::Sidecar::new(dhcp, Arc::clone(&device_monitor), netlink_handle));

    {
        let sidecar = Arc::clone(&sidecar);
        tokio::spawn(async move { sidecar.dhcp.run_monitor().await });
    }
    info!("DHCP lease monitor started");

    let socket_path = socket_path();
    let server = {
        let sidecar = Arc::clone(&sidecar);
        let events = events.clone();
        let socket_path = socket_path.clone();
        tokio::spawn(server::run(sidecar, events, socket_path))
    };

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received interrupt"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        result = server => {
            if let Ok(Err(e)) = result {
                error!(error = %e, "server failed");
            }
        }
    }

    info!("shutting down");
    sidecar.dhcp.stop_all().await;
    device_monitor.stop();
    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!(error = %e, "could not remove socket file");
    }
    info!("shutdown complete");
    Ok(())
}
