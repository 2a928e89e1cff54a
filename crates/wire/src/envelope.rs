// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-channel frame: one JSON object per frame, `{topic, payload}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            topic: topic.into(),
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }

    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Correlation id of the payload, echoed leniently: present on every
    /// request contract, but error replies must echo whatever was sent.
    pub fn correlation_id(&self) -> Value {
        self.payload.get("correlation_id").cloned().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
