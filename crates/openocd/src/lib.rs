// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod client;
pub mod inspector;
pub mod monitor;
pub mod poller;

pub use client::{ClientError, Connection, ConnectionState, OpenOcdClient, TargetState};
pub use inspector::{InspectError, Inspector, RegisterReadout};
pub use monitor::{MonitorEvent, StatusMonitor, StatusSummary};
pub use poller::{Poller, Tick, TickOutcome};

/// Default OpenOCD telnet port.
pub const DEFAULT_PORT: u16 = 4444;
