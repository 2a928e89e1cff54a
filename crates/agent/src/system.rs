// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-level metrics for the heartbeat and the orchestrator consumption
//! topic. The sampler refreshes these every 5 seconds; readers get the
//! latest snapshot without touching sysinfo themselves.

use parking_lot::Mutex;
use sysinfo::{Disks, System};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeartbeatSnapshot {
    pub cpu_pct: f64,
    pub memory_mb: f64,
    pub disk_mb: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemInfo {
    pub os: String,
    pub kernel: String,
    pub cpu: String,
    pub memory: String,
    pub disk: String,
}

pub struct SystemStats {
    sys: Mutex<System>,
    latest: Mutex<HeartbeatSnapshot>,
    info: SystemInfo,
}

impl Default for SystemStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemStats {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let disks = Disks::new_with_refreshed_list();
        let disk_total_gb: f64 =
            disks.iter().map(|d| d.total_space() as f64).sum::<f64>() / 1e9;

        let info = SystemInfo {
            os: System::long_os_version().unwrap_or_else(|| "unknown".to_string()),
            kernel: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            cpu: format!("{} cores", sys.cpus().len()),
            memory: format!("{:.1} GB", sys.total_memory() as f64 / 1e9),
            disk: format!("{disk_total_gb:.1} GB"),
        };

        Self { sys: Mutex::new(sys), latest: Mutex::new(HeartbeatSnapshot::default()), info }
    }

    /// Refresh counters and store a fresh snapshot. Called by the sampler.
    pub fn sample(&self) -> HeartbeatSnapshot {
        let snapshot = {
            let mut sys = self.sys.lock();
            sys.refresh_cpu_all();
            sys.refresh_memory();
            let disks = Disks::new_with_refreshed_list();
            let disk_used: u64 =
                disks.iter().map(|d| d.total_space() - d.available_space()).sum();
            HeartbeatSnapshot {
                cpu_pct: sys.global_cpu_usage() as f64,
                memory_mb: sys.used_memory() as f64 / (1024.0 * 1024.0),
                disk_mb: disk_used as f64 / (1024.0 * 1024.0),
            }
        };
        *self.latest.lock() = snapshot;
        snapshot
    }

    /// Most recent snapshot without refreshing.
    pub fn latest(&self) -> HeartbeatSnapshot {
        *self.latest.lock()
    }

    /// Static system description, captured at startup.
    pub fn info(&self) -> &SystemInfo {
        &self.info
    }
}
