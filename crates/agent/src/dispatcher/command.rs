// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `run_command`: transparent HTTP proxy toward a runtime container.
//!
//! The cloud editor and the runtime talk as if directly connected; the
//! agent forwards method, path, headers, body, query params, and base64
//! file uploads to the runtime's internal IP and returns the full HTTP
//! response. Runtimes serve self-signed TLS on 8443, so certificate
//! verification is disabled for that hop.

use crate::context::AgentContext;
use crate::dispatcher::{correlation_of, parse_payload, reply};
use base64::Engine;
use orc_wire::{ErrorReply, HttpResponsePayload, RunCommandReply, RunCommandRequest};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_PORT: u16 = 8443;

pub async fn run_command(ctx: Arc<AgentContext>, payload: Value) -> Option<Value> {
    let request: RunCommandRequest = match parse_payload("run_command", &payload) {
        Ok(request) => request,
        Err(e) => return reply(*e),
    };
    let correlation_id = correlation_of(&payload);

    let Some(ip) = ctx.store.client_ip(&request.device_id) else {
        error!(device = %request.device_id, "device not found");
        return reply(ErrorReply::new(
            "run_command",
            correlation_id,
            format!("Device not found: {}", request.device_id),
        ));
    };

    info!(
        device = %request.device_id,
        method = %request.method,
        api = %request.api,
        "forwarding command to runtime"
    );
    match forward(&ip, &request).await {
        Ok(http_response) => {
            info!(status = http_response.status_code, "command completed");
            let status = if http_response.ok { "success" } else { "error" };
            reply(RunCommandReply { action: "run_command", correlation_id, status, http_response })
        }
        Err(e) => {
            error!(device = %request.device_id, error = %e, "command forwarding failed");
            reply(ErrorReply::new("run_command", correlation_id, e))
        }
    }
}

async fn forward(ip: &str, request: &RunCommandRequest) -> Result<HttpResponsePayload, String> {
    let port = request.port.unwrap_or(DEFAULT_PORT);
    // 8443 is the runtime's self-signed TLS port; anything else is plain HTTP
    let scheme = if port == DEFAULT_PORT { "https" } else { "http" };
    let url = format!("{scheme}://{ip}:{port}{}", request.api);

    let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method: {}", request.method))?;

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| e.to_string())?;

    let mut builder = client.request(method, &url);
    for (key, value) in &request.headers {
        builder = builder.header(key, value);
    }
    if let Some(params) = &request.params {
        builder = builder.query(params);
    }

    let content_type = request
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str())
        .unwrap_or("application/json");

    if let Some(files) = &request.files {
        let mut form = reqwest::multipart::Form::new();
        for (field, upload) in files {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&upload.content_base64)
                .map_err(|e| format!("invalid base64 in file '{field}': {e}"))?;
            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(upload.filename.clone().unwrap_or_else(|| field.clone()))
                .mime_str(upload.content_type.as_deref().unwrap_or("application/octet-stream"))
                .map_err(|e| e.to_string())?;
            form = form.part(field.clone(), part);
        }
        // extra form fields ride along with uploads
        if let Some(Value::Object(data)) = &request.data {
            for (key, value) in data {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                form = form.text(key.clone(), text);
            }
        }
        builder = builder.multipart(form);
    } else if let Some(data) = &request.data {
        if content_type.contains("json") {
            builder = builder.json(data);
        } else if let Value::Object(map) = data {
            let pairs: BTreeMap<String, String> = map
                .iter()
                .map(|(k, v)| {
                    (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                })
                .collect();
            builder = builder.form(&pairs);
        } else {
            builder = builder.body(data.to_string());
        }
    }

    let response = builder.send().await.map_err(|e| e.to_string())?;
    let status_code = response.status().as_u16();
    let ok = response.status().is_success();
    let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();
    let content_type = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.clone());

    let text = response.text().await.map_err(|e| e.to_string())?;
    let body = if content_type.as_deref().is_some_and(|c| c.contains("json")) {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    } else {
        Value::String(text)
    };

    Ok(HttpResponsePayload { status_code, headers, body, ok, content_type })
}
