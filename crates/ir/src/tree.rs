// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Resolution of raw parser output into an address-sorted [`Device`].

use crate::{DeviceError, Peripheral, RawPeripheral, Result};
use serde::{Deserialize, Serialize};

/// The resolved device: peripherals sorted by base address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Peripherals in ascending base address order, ties kept in document order.
    pub peripherals: Vec<Peripheral>,
}

/// Peripherals sharing a presentation group.
#[derive(Debug, Clone, PartialEq)]
pub struct PeripheralGroup<'a> {
    /// Group name; ungrouped peripherals are listed under their own name.
    pub name: &'a str,
    /// Members in address order.
    pub peripherals: Vec<&'a Peripheral>,
}

impl Device {
    /// Builds a device from parser output in document order.
    ///
    /// A peripheral with `derived_from` gets an independent copy of the
    /// register list of a peripheral that appears *earlier* in `raw`;
    /// forward or missing references fail the whole build. Registers the
    /// derived peripheral declares itself replace copied registers of the
    /// same name or are appended.
    pub fn build_from(raw: Vec<RawPeripheral>) -> Result<Self> {
        let mut peripherals: Vec<Peripheral> = Vec::with_capacity(raw.len());

        for rp in raw {
            if peripherals.iter().any(|p| p.name == rp.name) {
                return Err(DeviceError::DuplicatePeripheral { name: rp.name });
            }
            let mut registers = match &rp.derived_from {
                Some(source) => peripherals
                    .iter()
                    .find(|p| &p.name == source)
                    .map(|p| p.registers.clone())
                    .ok_or_else(|| DeviceError::UnresolvedDerivation {
                        peripheral: rp.name.clone(),
                        derived_from: source.clone(),
                    })?,
                None => Vec::new(),
            };

            for local in rp.registers {
                local.validate()?;
                match registers.iter().position(|r| r.name == local.name) {
                    Some(idx) => registers[idx] = local,
                    None => registers.push(local),
                }
            }

            // Stable sort: equal offsets keep document order.
            registers.sort_by_key(|r| r.address_offset);

            if let Some(source) = &rp.derived_from {
                tracing::debug!("{} derives {} registers from {}", rp.name, registers.len(), source);
            }

            peripherals.push(Peripheral {
                name: rp.name,
                description: rp.description,
                base_address: rp.base_address,
                group_name: rp.group_name,
                registers,
            });
        }

        peripherals.sort_by_key(|p| p.base_address);
        tracing::info!("Device model built with {} peripherals", peripherals.len());

        Ok(Self { peripherals })
    }

    /// Finds a peripheral by name.
    pub fn peripheral(&self, name: &str) -> Option<&Peripheral> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    /// Mutable access to a peripheral by name.
    pub fn peripheral_mut(&mut self, name: &str) -> Option<&mut Peripheral> {
        self.peripherals.iter_mut().find(|p| p.name == name)
    }

    /// Peripherals bucketed by group name, groups in order of first appearance.
    pub fn groups(&self) -> Vec<PeripheralGroup<'_>> {
        let mut groups: Vec<PeripheralGroup<'_>> = Vec::new();
        for p in &self.peripherals {
            let name = p.group_name.as_deref().unwrap_or(&p.name);
            match groups.iter_mut().find(|g| g.name == name) {
                Some(group) => group.peripherals.push(p),
                None => groups.push(PeripheralGroup {
                    name,
                    peripherals: vec![p],
                }),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Access, Field, Register};

    fn reg(name: &str, offset: u32) -> Register {
        Register {
            name: name.to_string(),
            description: None,
            address_offset: offset,
            size: 32,
            access: Access::ReadWrite,
            fields: vec![Field {
                name: "VAL".to_string(),
                description: None,
                lsb: 0,
                msb: 7,
                access: Access::ReadWrite,
                enumerated_values: Vec::new(),
            }],
        }
    }

    fn raw(name: &str, base: u32, derived_from: Option<&str>, regs: Vec<Register>) -> RawPeripheral {
        RawPeripheral {
            name: name.to_string(),
            description: None,
            base_address: base,
            group_name: None,
            derived_from: derived_from.map(str::to_string),
            registers: regs,
        }
    }

    #[test]
    fn test_sorting_is_stable() {
        let device = Device::build_from(vec![
            raw("TIM2", 0x4000_0000, None, vec![reg("B", 0x4), reg("A", 0x0), reg("A2", 0x0)]),
            raw("GPIOA", 0x4001_0800, None, vec![]),
            raw("USART2", 0x4000_4400, None, vec![]),
            raw("ALIAS", 0x4000_4400, None, vec![]),
        ])
        .unwrap();

        let names: Vec<_> = device.peripherals.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["TIM2", "USART2", "ALIAS", "GPIOA"]);

        let regs: Vec<_> = device.peripherals[0]
            .registers
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(regs, ["A", "A2", "B"]);
    }

    #[test]
    fn test_duplicate_peripheral_names_rejected() {
        let result = Device::build_from(vec![
            raw("USART1", 0x4001_3800, None, vec![reg("SR", 0x0)]),
            raw("USART1", 0x4000_4400, None, vec![reg("DR", 0x4)]),
        ]);
        assert!(matches!(
            result,
            Err(DeviceError::DuplicatePeripheral { name }) if name == "USART1"
        ));
    }

    #[test]
    fn test_derived_copy_is_independent() {
        let mut device = Device::build_from(vec![
            raw("USART1", 0x4001_3800, None, vec![reg("SR", 0x0), reg("DR", 0x4)]),
            raw("USART2", 0x4000_4400, Some("USART1"), vec![]),
        ])
        .unwrap();

        let source = device.peripheral("USART1").unwrap().registers.clone();
        assert_eq!(device.peripheral("USART2").unwrap().registers, source);

        device
            .peripheral_mut("USART2")
            .and_then(|p| p.register_mut("SR"))
            .and_then(|r| r.field_mut("VAL"))
            .unwrap()
            .msb = 3;

        let original = device.peripheral("USART1").unwrap();
        assert_eq!(original.register("SR").unwrap().field("VAL").unwrap().msb, 7);
    }

    #[test]
    fn test_derived_overrides_and_appends() {
        let mut local_sr = reg("SR", 0x0);
        local_sr.size = 16;
        let device = Device::build_from(vec![
            raw("SPI1", 0x4001_3000, None, vec![reg("CR1", 0x0), reg("SR", 0x8)]),
            raw("SPI2", 0x4000_3800, Some("SPI1"), vec![local_sr, reg("I2SCFGR", 0x1c)]),
        ])
        .unwrap();

        let spi2 = device.peripheral("SPI2").unwrap();
        let names: Vec<_> = spi2.registers.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["CR1", "SR", "I2SCFGR"]);
        assert_eq!(spi2.register("SR").unwrap().size, 16);
    }

    #[test]
    fn test_forward_derivation_fails() {
        let err = Device::build_from(vec![
            raw("USART2", 0x4000_4400, Some("USART1"), vec![]),
            raw("USART1", 0x4001_3800, None, vec![reg("SR", 0x0)]),
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            DeviceError::UnresolvedDerivation { ref peripheral, ref derived_from }
                if peripheral == "USART2" && derived_from == "USART1"
        ));
    }

    #[test]
    fn test_effective_address() {
        let device = Device::build_from(vec![raw(
            "RCC",
            0x4002_1000,
            None,
            vec![reg("CR", 0x0), reg("CFGR", 0x4)],
        )])
        .unwrap();
        let rcc = device.peripheral("RCC").unwrap();
        assert_eq!(rcc.effective_address(rcc.register("CFGR").unwrap()), 0x4002_1004);
    }

    #[test]
    fn test_groups_follow_address_order() {
        let mut a = raw("USART2", 0x4000_4400, None, vec![]);
        a.group_name = Some("USART".into());
        let mut b = raw("USART1", 0x4001_3800, None, vec![]);
        b.group_name = Some("USART".into());
        let c = raw("RCC", 0x4002_1000, None, vec![]);

        let device = Device::build_from(vec![b, c, a]).unwrap();
        let groups = device.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "USART");
        assert_eq!(groups[0].peripherals[0].name, "USART2");
        assert_eq!(groups[0].peripherals[1].name, "USART1");
        assert_eq!(groups[1].name, "RCC");
    }
}
