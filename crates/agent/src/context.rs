// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared agent context handed to every topic handler and engine task.
//!
//! One long-lived object with typed sub-registries; tests build a fresh
//! context per test around the fake driver and a stubbed sidecar handle.

use crate::adapters::ContainerDriver;
use crate::devices::DeviceCache;
use crate::engine::self_id::SelfIdentity;
use crate::interfaces::InterfaceCache;
use crate::netmon::NetmonHandle;
use crate::storage::Store;
use crate::system::SystemStats;
use orc_core::{Clock, DevicesUsageBuffer, OperationsTracker, SystemClock, UsageBuffer};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct UsageRegistry {
    pub orchestrator: Mutex<UsageBuffer>,
    pub devices: DevicesUsageBuffer,
}

impl Default for UsageRegistry {
    fn default() -> Self {
        Self {
            orchestrator: Mutex::new(UsageBuffer::new()),
            devices: DevicesUsageBuffer::new(),
        }
    }
}

pub struct AgentContext {
    pub driver: Arc<dyn ContainerDriver>,
    pub store: Store,
    pub ops: OperationsTracker,
    pub interfaces: InterfaceCache,
    pub devices: DeviceCache,
    pub usage: UsageRegistry,
    pub stats: SystemStats,
    pub clock: Arc<dyn Clock>,
    pub netmon: NetmonHandle,
    pub identity: SelfIdentity,
    pub runtime_image: String,
}

impl AgentContext {
    pub fn new(
        driver: Arc<dyn ContainerDriver>,
        store: Store,
        netmon: NetmonHandle,
        identity: SelfIdentity,
    ) -> Self {
        Self {
            driver,
            store,
            ops: OperationsTracker::new(),
            interfaces: InterfaceCache::new(),
            devices: DeviceCache::new(),
            usage: UsageRegistry::default(),
            stats: SystemStats::new(),
            clock: Arc::new(SystemClock),
            netmon,
            identity,
            runtime_image: crate::env::RUNTIME_IMAGE.to_string(),
        }
    }
}
