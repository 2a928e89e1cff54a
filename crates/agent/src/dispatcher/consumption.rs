// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consumption topics: ring-buffer ranges for the agent itself and for a
//! single runtime, plus coarse resource descriptions.

use crate::context::AgentContext;
use crate::dispatcher::{correlation_of, parse_payload, reply};
use crate::engine::status::device_limits;
use orc_core::parse_period;
use orc_wire::{
    ConsumptionDeviceReply, ConsumptionDeviceRequest, ConsumptionOrchestratorReply,
    ConsumptionOrchestratorRequest, ErrorReply,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub async fn orchestrator(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let request: ConsumptionOrchestratorRequest =
        match parse_payload("get_consumption_orchestrator", &payload) {
            Ok(request) => request,
            Err(e) => return reply(*e),
        };
    let now = ctx.clock.epoch_secs();
    let (cpu_start, cpu_end) = parse_period(&request.cpu_period, now);
    let (mem_start, mem_end) = parse_period(&request.memory_period, now);

    let (cpu_usage, memory_usage) = {
        let buffer = ctx.usage.orchestrator.lock();
        (
            buffer.cpu_usage(Some(cpu_start), Some(cpu_end), now),
            buffer.memory_usage(Some(mem_start), Some(mem_end), now),
        )
    };
    debug!(
        cpu_samples = cpu_usage.len(),
        memory_samples = memory_usage.len(),
        "returning orchestrator consumption"
    );

    let info = ctx.stats.info().clone();
    let ip_addresses: Vec<String> = ctx
        .interfaces
        .snapshot()
        .values()
        .flat_map(|entry| entry.addresses.iter().map(|a| a.address.clone()))
        .collect();

    reply(ConsumptionOrchestratorReply {
        action: "get_consumption_orchestrator",
        correlation_id: correlation_of(&payload),
        ip_addresses,
        memory: info.memory,
        cpu: info.cpu,
        os: info.os,
        kernel: info.kernel,
        disk: info.disk,
        cpu_usage,
        memory_usage,
    })
}

pub async fn device(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let request: ConsumptionDeviceRequest = match parse_payload("get_consumption_device", &payload)
    {
        Ok(request) => request,
        Err(e) => return reply(*e),
    };
    let correlation_id = correlation_of(&payload);

    if ctx.store.client_ip(&request.device_id).is_none() {
        warn!(device = %request.device_id, "device not found in client registry");
        return reply(ErrorReply::new(
            "get_consumption_device",
            correlation_id,
            format!("Device {} not found", request.device_id),
        ));
    }

    let now = ctx.clock.epoch_secs();
    let (cpu_start, cpu_end) = parse_period(&request.cpu_period, now);
    let (mem_start, mem_end) = parse_period(&request.memory_period, now);

    let cpu_usage =
        ctx.usage.devices.cpu_usage(&request.device_id, Some(cpu_start), Some(cpu_end), now);
    let memory_usage =
        ctx.usage.devices.memory_usage(&request.device_id, Some(mem_start), Some(mem_end), now);
    let (cpu, memory) = device_limits(&ctx, &request.device_id).await;

    debug!(
        device = %request.device_id,
        cpu_samples = cpu_usage.len(),
        memory_samples = memory_usage.len(),
        "returning device consumption"
    );
    reply(ConsumptionDeviceReply {
        action: "get_consumption_device",
        correlation_id,
        device_id: request.device_id,
        memory,
        cpu,
        cpu_usage,
        memory_usage,
    })
}
