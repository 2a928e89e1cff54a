// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime lifecycle topics: create, delete, self-teardown, and the
//! start/stop/restart passthrough acks.
//!
//! Create and delete acknowledge immediately and run their pipelines on
//! spawned tasks; the operations tracker carries progress for status
//! polls.

use crate::context::AgentContext;
use crate::dispatcher::{correlation_of, parse_payload, reply};
use crate::engine::self_id::resolve_self_container;
use crate::engine::{create, delete};
use orc_wire::{
    AckReply, CreateRuntimeRequest, CreatingReply, DeleteDeviceRequest, DeletingReply,
    DevicePassthroughRequest, ErrorReply, SimpleStatusReply,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub async fn create_new_runtime(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let request: CreateRuntimeRequest = match parse_payload("create_new_runtime", &payload) {
        Ok(request) => request,
        Err(e) => return reply(*e),
    };
    let correlation_id = correlation_of(&payload);
    let name = request.container_name.clone();

    if let Err(e) = create::validate_request(&ctx, &name, &request.vnic_configs) {
        error!(container = %name, error = %e, "create request rejected");
        return reply(ErrorReply::new("create_new_runtime", correlation_id, e.to_string()));
    }
    if !ctx.ops.set_creating(&name) {
        // validation raced another request for the same name
        error!(container = %name, "failed to set creating state");
        return reply(ErrorReply::new(
            "create_new_runtime",
            correlation_id,
            format!("Failed to start creation for {name}"),
        ));
    }

    info!(container = %name, vnics = request.vnic_configs.len(), "creating runtime container");
    tokio::spawn(create::create_runtime(
        ctx,
        name.clone(),
        request.vnic_configs,
        request.serial_configs,
    ));

    reply(CreatingReply::new(correlation_id, &name))
}

pub async fn delete_device(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let request: DeleteDeviceRequest = match parse_payload("delete_device", &payload) {
        Ok(request) => request,
        Err(e) => return reply(*e),
    };
    let correlation_id = correlation_of(&payload);
    let name = request.device_id;

    if name.trim().is_empty() {
        return reply(ErrorReply::new(
            "delete_device",
            correlation_id,
            "Device ID must be a non-empty string",
        ));
    }
    if let Some(operation) = ctx.ops.in_progress(&name) {
        warn!(container = %name, %operation, "delete rejected, operation in progress");
        return reply(ErrorReply::new(
            "delete_device",
            correlation_id,
            format!("Container {name} already has a {operation} operation in progress"),
        ));
    }
    if !ctx.ops.set_deleting(&name) {
        return reply(ErrorReply::new(
            "delete_device",
            correlation_id,
            format!("Failed to start deletion for {name}"),
        ));
    }

    info!(container = %name, "deleting runtime container");
    tokio::spawn(delete::delete_runtime(ctx, name.clone()));

    reply(DeletingReply::new(correlation_id, &name))
}

pub async fn delete_orchestrator(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let correlation_id = correlation_of(&payload);
    warn!("received delete_orchestrator, scheduling self-teardown");

    // Let the response flush before the agent removes its own container
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        match resolve_self_container(ctx.driver.as_ref(), &ctx.identity).await {
            Some(self_name) => match ctx.driver.remove_container(&self_name).await {
                Ok(()) => info!(container = %self_name, "own container removed"),
                Err(e) => error!(container = %self_name, error = %e, "self-teardown failed"),
            },
            None => error!("self-teardown failed: own container not found"),
        }
    });

    reply(SimpleStatusReply {
        action: "delete_orchestrator",
        correlation_id,
        status: "success",
    })
}

async fn passthrough_ack(
    topic: &'static str,
    payload: Value,
) -> Option<Value> {
    let request: DevicePassthroughRequest = match parse_payload(topic, &payload) {
        Ok(request) => request,
        Err(e) => return reply(*e),
    };
    info!(topic, device = %request.device_id, "acknowledging device command");
    reply(AckReply { action: topic, success: true, correlation_id: correlation_of(&payload) })
}

pub async fn start_device(_ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    passthrough_ack("start_device", payload).await
}

pub async fn stop_device(_ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    passthrough_ack("stop_device", payload).await
}

pub async fn restart_device(_ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    passthrough_ack("restart_device", payload).await
}
