// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! regscope Device Model
//!
//! This crate defines the strongly-typed records describing a microcontroller's
//! memory-mapped peripherals. It sits between:
//!
//! 1. **Description parsers**: CMSIS-SVD (via `svd-parser`) or pre-resolved JSON/YAML dumps.
//! 2. **The value model**: which decomposes register values into the fields described here.
//! 3. **The inspector**: which turns peripheral/register pairs into bus addresses.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

mod load;
#[cfg(feature = "svd")]
pub mod svd_transform;
mod tree;

pub use load::load_description;
pub use tree::{Device, PeripheralGroup};

/// Errors raised while building a [`Device`] from a description.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// A peripheral derives from one that is missing or declared later in the document.
    #[error("peripheral {peripheral} derives from unresolved peripheral {derived_from}")]
    UnresolvedDerivation {
        /// The derived peripheral.
        peripheral: String,
        /// The reference that could not be resolved.
        derived_from: String,
    },
    /// Two peripherals share a name, so lookups by name would be ambiguous.
    #[error("duplicate peripheral name {name}")]
    DuplicatePeripheral {
        /// The repeated name.
        name: String,
    },
    /// A field's bit range does not fit `0 <= lsb <= msb < width`.
    #[error("field {register}.{field} has bit range [{msb}:{lsb}] outside a {width}-bit register")]
    InvalidBitRange {
        /// Owning register.
        register: String,
        /// Offending field.
        field: String,
        /// Declared least significant bit.
        lsb: u32,
        /// Declared most significant bit.
        msb: u32,
        /// Register width in bits.
        width: u32,
    },
    /// Register widths outside 1..=32 bits cannot be accessed with word reads.
    #[error("register {register} has unsupported width {width}")]
    InvalidRegisterSize {
        /// Offending register.
        register: String,
        /// Declared width in bits.
        width: u32,
    },
    /// IO error while reading a description document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON description.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed YAML description.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The SVD document could not be parsed or converted.
    #[error("SVD error: {0}")]
    Svd(String),
    /// The file extension does not name a supported description format.
    #[error("unsupported description format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for device model operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

fn default_register_size() -> u32 {
    32
}

/// Peripheral record as produced by a description parser, before derivation is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPeripheral {
    /// Instance name, unique within the device (e.g. "USART1").
    pub name: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,

    /// Absolute base address in the memory map.
    pub base_address: u32,

    /// Presentation group (e.g. "USART"); peripherals sharing it are listed together.
    #[serde(default)]
    pub group_name: Option<String>,

    /// Name of a peripheral, earlier in the document, whose register layout is copied.
    #[serde(default)]
    pub derived_from: Option<String>,

    /// Registers declared by this peripheral itself.
    #[serde(default)]
    pub registers: Vec<Register>,
}

/// A named, address-mapped hardware block with its registers resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peripheral {
    /// Instance name, unique within the device.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Absolute base address in the memory map.
    pub base_address: u32,

    /// Presentation group name.
    pub group_name: Option<String>,

    /// Registers sorted by address offset, ties kept in document order.
    pub registers: Vec<Register>,
}

impl Peripheral {
    /// Finds a register by name.
    pub fn register(&self, name: &str) -> Option<&Register> {
        self.registers.iter().find(|r| r.name == name)
    }

    /// Mutable access to a register by name.
    pub fn register_mut(&mut self, name: &str) -> Option<&mut Register> {
        self.registers.iter_mut().find(|r| r.name == name)
    }

    /// Bus address of `register` inside this peripheral.
    pub fn effective_address(&self, register: &Register) -> u32 {
        self.base_address.wrapping_add(register.address_offset)
    }
}

/// A fixed-width storage location within a peripheral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Register {
    /// Register name (e.g. "CR1").
    pub name: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,

    /// Offset relative to the peripheral base address.
    pub address_offset: u32,

    /// Width in bits, 32 unless the description says otherwise.
    #[serde(default = "default_register_size")]
    pub size: u32,

    /// Register-level access mode.
    #[serde(default)]
    pub access: Access,

    /// Bit-fields in declaration order.
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Register {
    /// Finds a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Mutable access to a field by name.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// A register is readable unless the register itself, or every one of its fields, is write-only.
    pub fn is_readable(&self) -> bool {
        if !self.access.is_readable() {
            return false;
        }
        self.fields.is_empty() || self.fields.iter().any(|f| f.access.is_readable())
    }

    fn validate(&self) -> Result<()> {
        if !(1..=32).contains(&self.size) {
            return Err(DeviceError::InvalidRegisterSize {
                register: self.name.clone(),
                width: self.size,
            });
        }
        for field in &self.fields {
            if field.lsb > field.msb || field.msb >= self.size {
                return Err(DeviceError::InvalidBitRange {
                    register: self.name.clone(),
                    field: field.name.clone(),
                    lsb: field.lsb,
                    msb: field.msb,
                    width: self.size,
                });
            }
        }
        Ok(())
    }
}

/// A contiguous bit range within a register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name (e.g. "TXE").
    pub name: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,

    /// Least significant bit, 0-based.
    pub lsb: u32,

    /// Most significant bit, 0-based and inclusive.
    pub msb: u32,

    /// Access mode of the field.
    #[serde(default)]
    pub access: Access,

    /// Symbolic names for specific field values.
    #[serde(default)]
    pub enumerated_values: Vec<EnumeratedValue>,
}

impl Field {
    /// Number of bits covered by the field.
    pub fn width(&self) -> u32 {
        self.msb - self.lsb + 1
    }

    /// Right-aligned mask covering [`Field::width`] bits.
    pub fn mask(&self) -> u32 {
        match self.width() {
            w if w >= 32 => u32::MAX,
            w => (1 << w) - 1,
        }
    }

    /// Single-bit fields are presented as on/off flags.
    pub fn is_flag(&self) -> bool {
        self.msb == self.lsb
    }

    /// The first declared enumerated value equal to `value`.
    pub fn enum_by_value(&self, value: u32) -> Option<&EnumeratedValue> {
        self.enumerated_values.iter().find(|e| e.value == value)
    }

    /// Case-insensitive lookup of an enumerated value by name.
    pub fn enum_by_name(&self, name: &str) -> Option<&EnumeratedValue> {
        self.enumerated_values
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

/// Named alias for one integer value of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumeratedValue {
    /// Symbolic name (e.g. "Enabled").
    pub name: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,

    /// The field value this name stands for.
    pub value: u32,
}

/// Defines how software can interact with a register or field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    /// Read-only. Writes are ignored.
    ReadOnly,
    /// Write-only. Reads return undefined values.
    WriteOnly,
    /// Read and write allowed.
    ReadWrite,
    /// The description does not say.
    #[default]
    Unspecified,
}

impl Access {
    /// Whether reading returns meaningful data.
    pub fn is_readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    /// Whether writes have an effect.
    pub fn is_writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }

    /// Short label used in listings.
    pub fn as_str(self) -> &'static str {
        match self {
            Access::ReadOnly => "ro",
            Access::WriteOnly => "wo",
            Access::ReadWrite => "rw",
            Access::Unspecified => "--",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, lsb: u32, msb: u32) -> Field {
        Field {
            name: name.to_string(),
            description: None,
            lsb,
            msb,
            access: Access::ReadWrite,
            enumerated_values: Vec::new(),
        }
    }

    #[test]
    fn test_field_geometry() {
        let f = field("MODE", 4, 6);
        assert_eq!(f.width(), 3);
        assert_eq!(f.mask(), 0b111);
        assert!(!f.is_flag());

        let full = field("DATA", 0, 31);
        assert_eq!(full.mask(), u32::MAX);
        assert!(field("EN", 0, 0).is_flag());
    }

    #[test]
    fn test_enum_lookup_first_declared_wins() {
        let mut f = field("SPEED", 0, 1);
        f.enumerated_values = vec![
            EnumeratedValue {
                name: "Low".into(),
                description: None,
                value: 0,
            },
            EnumeratedValue {
                name: "Slow".into(),
                description: None,
                value: 0,
            },
            EnumeratedValue {
                name: "High".into(),
                description: None,
                value: 3,
            },
        ];

        assert_eq!(f.enum_by_value(0).map(|e| e.name.as_str()), Some("Low"));
        assert_eq!(f.enum_by_value(3).map(|e| e.name.as_str()), Some("High"));
        assert!(f.enum_by_value(2).is_none());
        assert_eq!(f.enum_by_name("high").map(|e| e.value), Some(3));
    }

    #[test]
    fn test_register_validation() {
        let mut reg = Register {
            name: "CR".into(),
            description: None,
            address_offset: 0,
            size: 16,
            access: Access::ReadWrite,
            fields: vec![field("OK", 0, 15)],
        };
        assert!(reg.validate().is_ok());

        reg.fields.push(field("TOO_WIDE", 8, 16));
        assert!(matches!(
            reg.validate(),
            Err(DeviceError::InvalidBitRange { msb: 16, width: 16, .. })
        ));

        reg.fields.clear();
        reg.size = 64;
        assert!(matches!(
            reg.validate(),
            Err(DeviceError::InvalidRegisterSize { width: 64, .. })
        ));
    }

    #[test]
    fn test_register_readability() {
        let mut reg = Register {
            name: "KR".into(),
            description: None,
            address_offset: 0,
            size: 32,
            access: Access::Unspecified,
            fields: vec![field("KEY", 0, 15)],
        };
        assert!(reg.is_readable());

        reg.fields[0].access = Access::WriteOnly;
        assert!(!reg.is_readable());

        reg.fields.clear();
        reg.access = Access::WriteOnly;
        assert!(!reg.is_readable());
    }

    #[test]
    fn test_register_defaults_from_json() {
        let reg: Register =
            serde_json::from_str(r#"{"name":"SR","address_offset":4}"#).unwrap();
        assert_eq!(reg.size, 32);
        assert_eq!(reg.access, Access::Unspecified);
        assert!(reg.fields.is_empty());
    }
}
