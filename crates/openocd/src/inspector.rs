// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::client::{ClientError, OpenOcdClient};
use regscope_core::value::{recompose, ValueError};
use regscope_ir::{Peripheral, Register};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Result of reading one register during a bulk read.
#[derive(Debug)]
pub struct RegisterReadout {
    pub register: String,
    pub address: u32,
    pub value: Result<u32, ClientError>,
}

/// Register-level reads and writes at the addresses the device model gives.
#[derive(Clone)]
pub struct Inspector {
    client: Arc<OpenOcdClient>,
}

impl Inspector {
    pub fn new(client: Arc<OpenOcdClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<OpenOcdClient> {
        &self.client
    }

    pub fn read_register(
        &self,
        peripheral: &Peripheral,
        register: &Register,
    ) -> Result<u32, ClientError> {
        let address = peripheral.effective_address(register);
        let value = self.client.read_memory_word(address)?;
        tracing::debug!("{}.{} @ {:#010x} = {:#010x}", peripheral.name, register.name, address, value);
        Ok(value)
    }

    pub fn write_register(
        &self,
        peripheral: &Peripheral,
        register: &Register,
        value: u32,
    ) -> Result<(), ClientError> {
        let address = peripheral.effective_address(register);
        tracing::info!("Write {}.{} @ {:#010x} <- {:#010x}", peripheral.name, register.name, address, value);
        self.client.write_memory_word(address, value)
    }

    /// Writes one field on top of `previous` and returns the register value written.
    pub fn write_field(
        &self,
        peripheral: &Peripheral,
        register: &Register,
        field: &str,
        value: u32,
        previous: u32,
    ) -> Result<u32, InspectError> {
        let next = recompose(register, field, value, previous)?;
        self.write_register(peripheral, register, next)?;
        Ok(next)
    }

    /// Reads every readable register of `peripheral`.
    ///
    /// Each register is read independently; a failure is recorded in its
    /// readout and the remaining registers are still read.
    pub fn read_peripheral(&self, peripheral: &Peripheral) -> Vec<RegisterReadout> {
        peripheral
            .registers
            .iter()
            .filter(|r| r.is_readable())
            .map(|r| {
                let value = self.read_register(peripheral, r);
                if let Err(e) = &value {
                    tracing::warn!("Reading {}.{} failed: {}", peripheral.name, r.name, e);
                }
                RegisterReadout {
                    register: r.name.clone(),
                    address: peripheral.effective_address(r),
                    value,
                }
            })
            .collect()
    }
}
