// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background usage sampler.
//!
//! Every 5 seconds: one host sample (agent CPU/memory) into the
//! orchestrator ring buffer, one daemon stats call per registered runtime
//! into its device buffer. The heartbeat emitter reads the latest host
//! snapshot rather than sampling again.

use crate::context::AgentContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

pub fn spawn(ctx: Arc<AgentContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            sample_once(&ctx).await;
        }
    })
}

pub async fn sample_once(ctx: &AgentContext) {
    let now = ctx.clock.epoch_secs();

    let snapshot = ctx.stats.sample();
    ctx.usage.orchestrator.lock().add_sample(snapshot.cpu_pct, snapshot.memory_mb, now);

    for device_id in ctx.usage.devices.device_ids() {
        match ctx.driver.container_usage(&device_id).await {
            Ok(Some(usage)) => {
                ctx.usage.devices.add_sample(&device_id, usage.cpu_pct, usage.memory_mb, now);
            }
            Ok(None) => debug!(device = %device_id, "no stats for device"),
            Err(e) => debug!(device = %device_id, error = %e, "stats read failed"),
        }
    }
}
