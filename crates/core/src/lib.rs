// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core domain types for the orchestrator agent.
//!
//! Everything here is transport-free: intent records for runtime containers
//! (vNICs, serial ports), subnet/MAC arithmetic shared by the agent and the
//! network-monitor sidecar, the per-runtime operations tracker, and the
//! usage ring buffers backing the consumption topics.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod mac;
pub mod ops;
pub mod serial;
pub mod subnet;
pub mod usage;
pub mod vnic;

pub use clock::{Clock, FakeClock, SystemClock};
pub use mac::{generate_mac, is_locally_administered_unicast, normalize_mac, MacError};
pub use ops::{OperationKind, OperationRecord, OperationStatus, OperationsTracker};
pub use serial::{SerialDevice, SerialPortConfig, SerialPortStatus, SerialPorts};
pub use subnet::{macvlan_network_name, NetworkKey, SubnetError, SubnetSpec};
pub use usage::{parse_period, DevicesUsageBuffer, UsageBuffer, UsageSample};
pub use vnic::{NetworkMode, VnicConfig};
