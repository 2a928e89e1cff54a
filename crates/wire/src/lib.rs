// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocols for the orchestrator agent.
//!
//! Two distinct surfaces share this crate:
//!
//! - the **control channel**: `{topic, payload}` JSON frames exchanged with
//!   the cloud controller, with typed per-topic request and response
//!   payloads (the per-topic contracts);
//! - the **netmon sidecar socket**: LF-delimited JSON on a Unix stream:
//!   server-initiated events, client commands, and command replies.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod envelope;
mod netmon;
mod request;
mod response;

pub use codec::{read_json_line, write_json_line, CodecError};
pub use envelope::Envelope;
pub use netmon::{
    DeviceAction, DeviceChange, DeviceDiscovery, DhcpLease, InterfaceReport, Ipv4Info,
    NetmonCommand, NetmonEvent, NetmonReply, NetworkDiscovery, SidecarLine,
};
pub use request::{
    ConsumptionDeviceRequest, ConsumptionOrchestratorRequest, CreateRuntimeRequest,
    DeleteDeviceRequest, DevicePassthroughRequest, FileUpload, GetDeviceStatusRequest,
    GetHostInterfacesRequest, GetSerialDevicesRequest, RunCommandRequest,
};
pub use response::{
    AckReply, ConsumptionDeviceReply, ConsumptionOrchestratorReply, CreatingReply,
    DeletingReply, DeviceStatusReply, ErrorReply, Heartbeat, HostInterface,
    HostInterfacesReply, HttpResponsePayload, NetworkStatus, RunCommandReply,
    SerialDeviceEntry, SerialDevicesReply, SerialPortStatusEntry, SimpleStatusReply,
};
