// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The body of one status poll.

use crate::client::{ClientError, OpenOcdClient, TargetState};
use crate::inspector::{Inspector, RegisterReadout};
use crate::poller::TickOutcome;
use regscope_ir::Device;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSummary {
    Disconnected,
    Connected {
        target: String,
        state: TargetState,
        /// Only fetched while halted.
        pc: Option<u32>,
    },
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusSummary::Disconnected => f.write_str("Disconnected"),
            StatusSummary::Connected { target, state, pc } => {
                write!(f, "Connected: {} ({})", target, state)?;
                if let Some(pc) = pc {
                    write!(f, " pc=0x{:08x}", pc)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
pub enum MonitorEvent {
    /// The status summary changed.
    Status(StatusSummary),
    /// The displayed peripheral was re-read after a halt.
    Readout {
        peripheral: String,
        registers: Vec<RegisterReadout>,
    },
}

type Sink = Box<dyn FnMut(MonitorEvent) + Send>;

/// Liveness and run-state polling for one connected target.
pub struct StatusMonitor {
    inspector: Inspector,
    device: Arc<Device>,
    target: String,
    auto_read: bool,
    peripheral: Option<String>,
    was_halted: bool,
    last_pc: Option<u32>,
    status: StatusSummary,
    sink: Option<Sink>,
}

impl StatusMonitor {
    pub fn new(client: Arc<OpenOcdClient>, device: Arc<Device>, target: impl Into<String>) -> Self {
        Self {
            inspector: Inspector::new(client),
            device,
            target: target.into(),
            auto_read: false,
            peripheral: None,
            was_halted: false,
            last_pc: None,
            status: StatusSummary::Disconnected,
            sink: None,
        }
    }

    pub fn with_auto_read(mut self, enabled: bool) -> Self {
        self.auto_read = enabled;
        self
    }

    pub fn with_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(MonitorEvent) + Send + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Chooses the peripheral re-read on halt.
    pub fn select_peripheral(&mut self, name: Option<String>) {
        self.peripheral = name;
    }

    pub fn status(&self) -> &StatusSummary {
        &self.status
    }

    /// One poll. Returns [`TickOutcome::Stop`] once the adapter is gone.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.inspector.client().check_alive() {
            return self.lost("liveness check failed");
        }
        match self.poll() {
            Ok(()) => TickOutcome::Continue,
            Err(e) => self.lost(&e.to_string()),
        }
    }

    fn poll(&mut self) -> Result<(), ClientError> {
        let client = self.inspector.client();
        let state = client.get_target_state(&self.target)?;
        let pc = if state.is_halted() {
            Some(client.get_program_counter()?)
        } else {
            None
        };

        let halted_anew = pc.is_some() && (!self.was_halted || pc != self.last_pc);
        self.was_halted = pc.is_some();
        if pc.is_some() {
            self.last_pc = pc;
        }

        self.update_status(StatusSummary::Connected {
            target: self.target.clone(),
            state,
            pc,
        });

        if self.auto_read && halted_anew {
            self.read_selected();
        }
        Ok(())
    }

    fn read_selected(&mut self) {
        let Some(name) = &self.peripheral else {
            return;
        };
        let Some(peripheral) = self.device.peripheral(name) else {
            tracing::warn!("Auto-read peripheral {} is not in the device", name);
            return;
        };
        tracing::debug!("Target halted at a new pc, re-reading {}", name);
        let registers = self.inspector.read_peripheral(peripheral);
        let peripheral = name.clone();
        self.emit(MonitorEvent::Readout {
            peripheral,
            registers,
        });
    }

    fn lost(&mut self, reason: &str) -> TickOutcome {
        tracing::warn!("Debug adapter lost: {}", reason);
        self.was_halted = false;
        self.status = StatusSummary::Disconnected;
        self.emit(MonitorEvent::Status(StatusSummary::Disconnected));
        TickOutcome::Stop
    }

    fn update_status(&mut self, status: StatusSummary) {
        if status != self.status {
            self.status = status.clone();
            self.emit(MonitorEvent::Status(status));
        }
    }

    fn emit(&mut self, event: MonitorEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink(event);
        }
    }
}
