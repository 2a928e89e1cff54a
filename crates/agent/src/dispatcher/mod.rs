// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Correlated topic dispatch over the control channel.
//!
//! A static registration table maps topic names to handlers; incoming
//! frames are validated against the topic's typed contract, dispatched,
//! and the handler's reply, echoing `action` and `correlation_id`, is
//! written back. Unknown topics are dropped with a warning; contract
//! violations answer with a precise field message instead of closing the
//! channel.

mod command;
mod consumption;
mod runtime;
mod session;
mod status;

use crate::context::AgentContext;
use futures_util::future::BoxFuture;
use orc_wire::{Envelope, ErrorReply};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type Handler =
    Box<dyn Fn(Arc<AgentContext>, Value) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

pub struct TopicRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl TopicRegistry {
    /// Build the full topic table. Explicit and load-order free: every
    /// handler the agent speaks is listed here.
    pub fn register_all() -> Self {
        let mut registry = Self { handlers: HashMap::new() };

        registry.register("connect", session::connect);
        registry.register("disconnect", session::disconnect);
        registry.register("connection_info", session::connection_info);

        registry.register("create_new_runtime", runtime::create_new_runtime);
        registry.register("delete_device", runtime::delete_device);
        registry.register("delete_orchestrator", runtime::delete_orchestrator);
        registry.register("start_device", runtime::start_device);
        registry.register("stop_device", runtime::stop_device);
        registry.register("restart_device", runtime::restart_device);

        registry.register("get_device_status", status::get_device_status);
        registry.register("get_host_interfaces", status::get_host_interfaces);
        registry.register("get_serial_devices", status::get_serial_devices);

        registry.register("get_consumption_orchestrator", consumption::orchestrator);
        registry.register("get_consumption_device", consumption::device);

        registry.register("run_command", command::run_command);

        registry
    }

    fn register<F, Fut>(&mut self, topic: &'static str, handler: F)
    where
        F: Fn(Arc<AgentContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        info!(topic, "registered topic");
        self.handlers
            .insert(topic, Box::new(move |ctx, payload| Box::pin(handler(ctx, payload))));
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    /// Dispatch one frame. `None` means no reply goes out (unknown topic,
    /// or a notification-style topic).
    pub async fn dispatch(&self, ctx: Arc<AgentContext>, envelope: Envelope) -> Option<Envelope> {
        let Some(handler) = self.handlers.get(envelope.topic.as_str()) else {
            warn!(topic = %envelope.topic, "no topic registered with this name");
            return None;
        };
        debug!(topic = %envelope.topic, "handling topic");
        let reply = handler(ctx, envelope.payload).await?;
        Some(Envelope { topic: envelope.topic, payload: reply })
    }
}

/// Deserialize a topic payload against its contract. A failure becomes the
/// error reply for this request, echoing whatever correlation id was sent.
pub(crate) fn parse_payload<T: DeserializeOwned>(
    topic: &str,
    payload: &Value,
) -> Result<T, Box<ErrorReply>> {
    serde_json::from_value(payload.clone()).map_err(|e| {
        error!(topic, error = %e, "contract validation failed");
        Box::new(ErrorReply::new(topic, correlation_of(payload), e.to_string()))
    })
}

pub(crate) fn correlation_of(payload: &Value) -> Value {
    payload.get("correlation_id").cloned().unwrap_or(Value::Null)
}

pub(crate) fn reply<T: Serialize>(reply: T) -> Option<Value> {
    match serde_json::to_value(reply) {
        Ok(value) => Some(value),
        Err(e) => {
            error!(error = %e, "failed to serialize reply");
            None
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
