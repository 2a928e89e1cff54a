// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection-lifecycle topics. These are notifications from the cloud;
//! none of them produce a reply.

use crate::context::AgentContext;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn connect(_ctx: Arc<AgentContext>, _payload: Value) -> Option<Value> {
    info!("connection established with the server");
    None
}

pub async fn disconnect(_ctx: Arc<AgentContext>, _payload: Value) -> Option<Value> {
    info!("connection ended by the server");
    None
}

pub async fn connection_info(_ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    match payload.get("event").and_then(Value::as_str) {
        Some("connection.established") => {
            let connected_at = payload.get("connected_at").and_then(Value::as_str);
            info!(connected_at = ?connected_at, "connection established");
        }
        Some(event) => warn!(event, "unknown connection_info event"),
        None => warn!("connection_info without event field"),
    }
    None
}
