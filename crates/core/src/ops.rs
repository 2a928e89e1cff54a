// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-runtime operation state: creating / deleting / error.
//!
//! One record per runtime name. `set_creating`/`set_deleting` refuse to
//! replace an in-flight operation (that is the whole exclusivity rule) but
//! do replace a terminal `error` record. Background pipelines write step
//! names and errors here; `get_device_status` reads them with precedence
//! over the container's live state.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Creating,
    Deleting,
    Error,
}

impl OperationStatus {
    fn is_active(self) -> bool {
        matches!(self, OperationStatus::Creating | OperationStatus::Deleting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => f.write_str("create"),
            OperationKind::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub status: OperationStatus,
    pub operation: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: String,
    pub updated_at: String,
}

/// Mutex-guarded map of runtime name → operation record.
#[derive(Default)]
pub struct OperationsTracker {
    operations: Mutex<HashMap<String, OperationRecord>>,
}

impl OperationsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&self, name: &str, status: OperationStatus, operation: OperationKind) -> bool {
        let mut ops = self.operations.lock();
        if let Some(existing) = ops.get(name) {
            if existing.status.is_active() {
                return false;
            }
        }
        let now = iso_now();
        ops.insert(
            name.to_string(),
            OperationRecord {
                status,
                operation,
                step: None,
                error: None,
                started_at: now.clone(),
                updated_at: now,
            },
        );
        true
    }

    /// Mark a runtime as being created. Returns false when an active
    /// operation already holds the name.
    pub fn set_creating(&self, name: &str) -> bool {
        self.begin(name, OperationStatus::Creating, OperationKind::Create)
    }

    /// Mark a runtime as being deleted. Returns false when an active
    /// operation already holds the name.
    pub fn set_deleting(&self, name: &str) -> bool {
        self.begin(name, OperationStatus::Deleting, OperationKind::Delete)
    }

    /// Record the current pipeline step of an in-flight operation.
    pub fn set_step(&self, name: &str, step: &str) {
        let mut ops = self.operations.lock();
        if let Some(record) = ops.get_mut(name) {
            record.step = Some(step.to_string());
            record.updated_at = iso_now();
        }
    }

    /// Mark an operation as failed. Creates a record when none exists so a
    /// failure observed outside a tracked pipeline is still reported.
    pub fn set_error(&self, name: &str, error: &str, operation: OperationKind) {
        let mut ops = self.operations.lock();
        let now = iso_now();
        match ops.get_mut(name) {
            Some(record) => {
                record.status = OperationStatus::Error;
                record.error = Some(error.to_string());
                record.updated_at = now;
            }
            None => {
                ops.insert(
                    name.to_string(),
                    OperationRecord {
                        status: OperationStatus::Error,
                        operation,
                        step: None,
                        error: Some(error.to_string()),
                        started_at: now.clone(),
                        updated_at: now,
                    },
                );
            }
        }
    }

    /// Drop the record on successful completion.
    pub fn clear(&self, name: &str) {
        self.operations.lock().remove(name);
    }

    pub fn get(&self, name: &str) -> Option<OperationRecord> {
        self.operations.lock().get(name).cloned()
    }

    /// The kind of the active operation, if one is in flight.
    pub fn in_progress(&self, name: &str) -> Option<OperationKind> {
        let ops = self.operations.lock();
        ops.get(name)
            .filter(|record| record.status.is_active())
            .map(|record| record.operation)
    }
}

fn iso_now() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
