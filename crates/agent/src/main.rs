// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator agent: supervises runtime containers on an edge host and
//! bridges them to the cloud controller.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod adapters;
mod channel;
mod context;
mod devices;
mod dispatcher;
mod engine;
mod env;
mod interfaces;
mod netmon;
mod storage;
mod system;

use crate::adapters::docker::DockerDriver;
use crate::context::AgentContext;
use crate::dispatcher::TopicRegistry;
use crate::engine::reconcile::Reconciler;
use crate::engine::self_id::SelfIdentity;
use crate::storage::Store;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orc-agent", about = "Edge orchestrator agent")]
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

    let file_appender = tracing_appender::rolling::daily(env::log_dir(), "orchestrator-agent.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(filter_for(&args.log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    let driver = Arc::new(DockerDriver::connect()?);
    let store = Store::new(env::vnic_file(), env::serial_file(), env::clients_file());
    let (netmon_handle, command_rx) = netmon::NetmonHandle::channel(32);
    let ctx = Arc::new(AgentContext::new(
        driver,
        store,
        netmon_handle,
        SelfIdentity::from_env(),
    ));

    // Runtimes that existed before this process keep their usage history slots
    for name in ctx.store.load_clients().keys() {
        info!(container = %name, "re-registering existing runtime for usage collection");
        ctx.usage.devices.add_device(name);
    }

    let reconciler = Arc::new(Reconciler::new(ctx.clone()));
    tokio::spawn(netmon::run(ctx.clone(), reconciler, command_rx));
    tokio::spawn(engine::enforce::run(ctx.clone(), ctx.driver.subscribe_starts()));
    engine::sampler::spawn(ctx.clone());

    let registry = Arc::new(TopicRegistry::register_all());
    info!(topics = registry.topics().len(), "agent initialized");

    loop {
        if let Err(e) = channel::run_session(ctx.clone(), registry.clone()).await {
            error!(error = %e, "control channel error, retrying");
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
