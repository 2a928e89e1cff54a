// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Usage ring buffers: 48 hours of CPU/memory samples at 5-second intervals.
//!
//! One buffer holds the agent's own usage; the [`DevicesUsageBuffer`]
//! manager keeps one per registered runtime. Samples live in RAM only and
//! are lost on restart. Timestamps come in from the caller's clock so range
//! queries are testable.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// 48 h / 5 s.
pub const MAX_SAMPLES: usize = 48 * 3600 / 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSample {
    pub timestamp: u64,
    pub cpu: i64,
    pub memory: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuPoint {
    pub timestamp: u64,
    pub cpu: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryPoint {
    pub timestamp: u64,
    pub memory: i64,
}

/// Fixed-capacity ring of timestamped CPU/memory samples.
#[derive(Debug)]
pub struct UsageBuffer {
    samples: VecDeque<UsageSample>,
    capacity: usize,
}

impl Default for UsageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SAMPLES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity.min(1024)), capacity }
    }

    /// Push a sample, evicting the oldest once full. Fractional inputs are
    /// truncated to integers, matching the wire shape.
    pub fn add_sample(&mut self, cpu_pct: f64, memory_mb: f64, timestamp: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(UsageSample {
            timestamp,
            cpu: cpu_pct as i64,
            memory: memory_mb as i64,
        });
    }

    /// Samples within `[start, end]`. `start = None` means from the first
    /// sample; `end = None` means up to `now`.
    pub fn samples(&self, start: Option<u64>, end: Option<u64>, now: u64) -> Vec<UsageSample> {
        let end = end.unwrap_or(now);
        self.samples
            .iter()
            .filter(|s| s.timestamp <= end && start.map_or(true, |t| s.timestamp >= t))
            .copied()
            .collect()
    }

    pub fn cpu_usage(&self, start: Option<u64>, end: Option<u64>, now: u64) -> Vec<CpuPoint> {
        self.samples(start, end, now)
            .into_iter()
            .map(|s| CpuPoint { timestamp: s.timestamp, cpu: s.cpu })
            .collect()
    }

    pub fn memory_usage(&self, start: Option<u64>, end: Option<u64>, now: u64) -> Vec<MemoryPoint> {
        self.samples(start, end, now)
            .into_iter()
            .map(|s| MemoryPoint { timestamp: s.timestamp, memory: s.memory })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One usage buffer per registered runtime, behind a manager-level mutex.
/// Registration is explicit and tied to runtime create/delete.
#[derive(Default)]
pub struct DevicesUsageBuffer {
    buffers: Mutex<HashMap<String, UsageBuffer>>,
}

impl DevicesUsageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, device_id: &str) {
        let mut buffers = self.buffers.lock();
        buffers.entry(device_id.to_string()).or_default();
    }

    pub fn remove_device(&self, device_id: &str) {
        self.buffers.lock().remove(device_id);
    }

    pub fn has_device(&self, device_id: &str) -> bool {
        self.buffers.lock().contains_key(device_id)
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.buffers.lock().keys().cloned().collect()
    }

    /// Silently ignores unregistered devices; the sampler races deletes.
    pub fn add_sample(&self, device_id: &str, cpu_pct: f64, memory_mb: f64, timestamp: u64) {
        let mut buffers = self.buffers.lock();
        if let Some(buffer) = buffers.get_mut(device_id) {
            buffer.add_sample(cpu_pct, memory_mb, timestamp);
        }
    }

    pub fn cpu_usage(
        &self,
        device_id: &str,
        start: Option<u64>,
        end: Option<u64>,
        now: u64,
    ) -> Vec<CpuPoint> {
        self.buffers
            .lock()
            .get(device_id)
            .map(|b| b.cpu_usage(start, end, now))
            .unwrap_or_default()
    }

    pub fn memory_usage(
        &self,
        device_id: &str,
        start: Option<u64>,
        end: Option<u64>,
        now: u64,
    ) -> Vec<MemoryPoint> {
        self.buffers
            .lock()
            .get(device_id)
            .map(|b| b.memory_usage(start, end, now))
            .unwrap_or_default()
    }
}

/// Parse a consumption period into `(start, end)` epoch seconds.
///
/// Accepts `"start,end"` (two unix timestamps), a duration suffix form
/// (`"24h"`, `"30m"`, `"2d"`), or a bare number of seconds. Anything
/// unparseable falls back to the last hour.
pub fn parse_period(period: &str, now: u64) -> (u64, u64) {
    fn try_parse(period: &str, now: u64) -> Option<(u64, u64)> {
        if let Some((start, end)) = period.split_once(',') {
            return Some((start.trim().parse().ok()?, end.trim().parse().ok()?));
        }
        let period = period.trim();
        let (digits, unit_secs) = match period.as_bytes().last()? {
            b'h' => (&period[..period.len() - 1], 3600),
            b'm' => (&period[..period.len() - 1], 60),
            b'd' => (&period[..period.len() - 1], 86_400),
            _ => (period, 1),
        };
        let amount: u64 = digits.parse().ok()?;
        Some((now.saturating_sub(amount * unit_secs), now))
    }

    try_parse(period, now).unwrap_or((now.saturating_sub(3600), now))
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
