// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Text and JSON presentation of the device model and register readouts.

use regscope_core::{Base, RegisterValueModel};
use regscope_ir::{Device, Field, Peripheral, Register};
use regscope_openocd::RegisterReadout;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct RegisterReport {
    pub peripheral: String,
    pub register: String,
    pub address: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fields: Vec<FieldReport>,
}

#[derive(Debug, Serialize)]
pub struct FieldReport {
    pub name: String,
    pub bits: String,
    pub value: u32,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumerated: Option<String>,
}

/// `[msb:lsb]`, or `[bit]` for single-bit fields.
pub fn bit_range(field: &Field) -> String {
    if field.is_flag() {
        format!("[{}]", field.lsb)
    } else {
        format!("[{}:{}]", field.msb, field.lsb)
    }
}

pub fn register_report(
    peripheral: &Peripheral,
    register: &Register,
    readout: &RegisterReadout,
    base: Base,
) -> RegisterReport {
    let mut report = RegisterReport {
        peripheral: peripheral.name.clone(),
        register: register.name.clone(),
        address: readout.address,
        value: None,
        display: None,
        error: None,
        fields: Vec::new(),
    };

    match &readout.value {
        Ok(value) => {
            let model = RegisterValueModel::new(register, *value);
            report.value = Some(model.value());
            report.display = Some(model.format_value(base));
            report.fields = model
                .fields()
                .map(|(field, value)| FieldReport {
                    name: field.name.clone(),
                    bits: bit_range(field),
                    value,
                    display: regscope_core::format(value, base, field.width()),
                    enumerated: field.enum_by_value(value).map(|ev| ev.name.clone()),
                })
                .collect();
        }
        Err(e) => report.error = Some(e.to_string()),
    }
    report
}

pub fn register_text(report: &RegisterReport) -> String {
    let mut out = format!(
        "{}.{} @ 0x{:08x} = ",
        report.peripheral, report.register, report.address
    );
    match (&report.display, &report.error) {
        (Some(display), _) => out.push_str(display),
        (None, Some(error)) => {
            let _ = write!(out, "<error: {}>", error);
        }
        (None, None) => out.push('?'),
    }
    out.push('\n');

    let name_width = report.fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
    for f in &report.fields {
        let _ = write!(
            out,
            "  {:<8} {:<name_width$}  {}",
            f.bits,
            f.name,
            f.display,
            name_width = name_width
        );
        if let Some(name) = &f.enumerated {
            let _ = write!(out, " ({})", name);
        }
        out.push('\n');
    }
    out
}

/// Peripherals grouped by presentation group, with base addresses.
pub fn peripherals_text(device: &Device) -> String {
    let mut out = String::new();
    for group in device.groups() {
        let _ = writeln!(out, "{}", group.name);
        for p in group.peripherals {
            let _ = write!(out, "  {:<16} 0x{:08x}", p.name, p.base_address);
            if let Some(desc) = &p.description {
                let _ = write!(out, "  {}", desc);
            }
            out.push('\n');
        }
    }
    out
}

/// Register layout of one peripheral, optionally narrowed to one register.
pub fn layout_text(peripheral: &Peripheral, only: Option<&Register>) -> String {
    let mut out = format!("{} @ 0x{:08x}", peripheral.name, peripheral.base_address);
    if let Some(group) = &peripheral.group_name {
        let _ = write!(out, " [{}]", group);
    }
    out.push('\n');

    let registers: Vec<&Register> = match only {
        Some(r) => vec![r],
        None => peripheral.registers.iter().collect(),
    };
    for r in registers {
        let _ = write!(
            out,
            "  {:<12} 0x{:08x}  {:>2} bit  {}",
            r.name,
            peripheral.effective_address(r),
            r.size,
            r.access.as_str()
        );
        if let Some(desc) = &r.description {
            let _ = write!(out, "  {}", desc);
        }
        out.push('\n');

        for f in &r.fields {
            let _ = write!(out, "    {:<8} {:<16} {}", bit_range(f), f.name, f.access.as_str());
            if let Some(desc) = &f.description {
                let _ = write!(out, "  {}", desc);
            }
            out.push('\n');
            for ev in &f.enumerated_values {
                let _ = writeln!(
                    out,
                    "      {} = {}",
                    regscope_core::format(ev.value, Base::Hex, f.width()),
                    ev.name
                );
            }
        }
    }
    out
}
