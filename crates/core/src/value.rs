// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::codec::{self, Base};
use regscope_ir::{EnumeratedValue, Field, Register};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("register {register} has no field {field}")]
    UnknownField { register: String, field: String },
    #[error("field {field} has no enumerated value {name}")]
    UnknownEnum { field: String, name: String },
}

/// Value of `field` inside `register_value`.
pub fn extract(field: &Field, register_value: u32) -> u32 {
    register_value.checked_shr(field.lsb).unwrap_or(0) & field.mask()
}

/// Replaces the bits of `field` in `register_value` with `field_value`.
///
/// Bits outside the field span are left untouched; excess bits of
/// `field_value` are dropped.
pub fn insert(field: &Field, field_value: u32, register_value: u32) -> u32 {
    let span = field.mask() << field.lsb;
    (register_value & !span) | ((field_value & field.mask()) << field.lsb)
}

/// Splits `register_value` into `(field, value)` pairs in declaration order.
pub fn decompose(register: &Register, register_value: u32) -> Vec<(&Field, u32)> {
    register
        .fields
        .iter()
        .map(|f| (f, extract(f, register_value)))
        .collect()
}

/// Computes the register value after editing one field of `previous`.
pub fn recompose(
    register: &Register,
    field_name: &str,
    field_value: u32,
    previous: u32,
) -> Result<u32, ValueError> {
    let field = lookup_field(register, field_name)?;
    Ok(insert(field, field_value, previous))
}

fn lookup_field<'a>(register: &'a Register, name: &str) -> Result<&'a Field, ValueError> {
    register.field(name).ok_or_else(|| ValueError::UnknownField {
        register: register.name.clone(),
        field: name.to_string(),
    })
}

fn register_mask(register: &Register) -> u32 {
    codec::max_value(register.size)
}

/// Current value of one register together with its per-field breakdown.
///
/// Field edits always go through [`insert`] on the register value, so a stale
/// field cache can never leak into bits it does not own.
#[derive(Debug, Clone)]
pub struct RegisterValueModel<'a> {
    register: &'a Register,
    value: u32,
    fields: Vec<u32>,
}

impl<'a> RegisterValueModel<'a> {
    pub fn new(register: &'a Register, value: u32) -> Self {
        let mut model = Self {
            register,
            value: 0,
            fields: Vec::with_capacity(register.fields.len()),
        };
        model.set_value(value);
        model
    }

    pub fn register(&self) -> &'a Register {
        self.register
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Replaces the register value, truncated to the register width, and refreshes the field cache.
    pub fn set_value(&mut self, value: u32) {
        self.value = value & register_mask(self.register);
        self.fields.clear();
        self.fields
            .extend(self.register.fields.iter().map(|f| extract(f, self.value)));
    }

    pub fn field_value(&self, name: &str) -> Option<u32> {
        let idx = self.register.fields.iter().position(|f| f.name == name)?;
        Some(self.fields[idx])
    }

    /// Fields with their cached values, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'a Field, u32)> + '_ {
        self.register.fields.iter().zip(self.fields.iter().copied())
    }

    /// Edits one field and returns the new register value.
    pub fn set_field(&mut self, name: &str, field_value: u32) -> Result<u32, ValueError> {
        let value = recompose(self.register, name, field_value, self.value)?;
        self.set_value(value);
        Ok(self.value)
    }

    /// Edits one field through the name of one of its enumerated values.
    pub fn set_field_enum(&mut self, name: &str, enum_name: &str) -> Result<u32, ValueError> {
        let field = lookup_field(self.register, name)?;
        let ev = field
            .enum_by_name(enum_name)
            .ok_or_else(|| ValueError::UnknownEnum {
                field: field.name.clone(),
                name: enum_name.to_string(),
            })?;
        self.set_field(name, ev.value)
    }

    /// The enumerated value the field currently holds.
    ///
    /// `None` covers both fields without enumerations and raw values outside
    /// the enumeration; the latter are still legal field values.
    pub fn enum_choice(&self, name: &str) -> Option<&'a EnumeratedValue> {
        let field = self.register.field(name)?;
        field.enum_by_value(self.field_value(name)?)
    }

    pub fn format_value(&self, base: Base) -> String {
        codec::format(self.value, base, self.register.size)
    }

    /// Formats a field at its own bit width; enumerated names are appended in parentheses.
    pub fn format_field(&self, name: &str, base: Base) -> Option<String> {
        let field = self.register.field(name)?;
        let raw = codec::format(self.field_value(name)?, base, field.width());
        Some(match self.enum_choice(name) {
            Some(ev) => format!("{} ({})", raw, ev.name),
            None => raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regscope_ir::Access;

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

    fn cr1() -> Register {
        let mut mode = field("MODE", 4, 5);
        mode.enumerated_values = vec![
            EnumeratedValue {
                name: "Input".into(),
                description: None,
                value: 0,
            },
            EnumeratedValue {
                name: "Output".into(),
                description: None,
                value: 1,
            },
            EnumeratedValue {
                name: "Alternate".into(),
                description: None,
                value: 2,
            },
        ];
        Register {
            name: "CR1".into(),
            description: None,
            address_offset: 0,
            size: 32,
            access: Access::ReadWrite,
            fields: vec![field("EN", 0, 0), mode, field("PSC", 16, 31)],
        }
    }

    #[test]
    fn test_decompose() {
        let reg = cr1();
        let parts = decompose(&reg, 0xABCD_0021);
        let values: Vec<_> = parts.iter().map(|(f, v)| (f.name.as_str(), *v)).collect();
        assert_eq!(values, [("EN", 1), ("MODE", 2), ("PSC", 0xABCD)]);
    }

    #[test]
    fn test_recompose_only_touches_field_span() {
        let reg = cr1();
        let next = recompose(&reg, "MODE", 1, 0xFFFF_FFFF).unwrap();
        assert_eq!(next, 0xFFFF_FFDF);
        let next = recompose(&reg, "MODE", 0xFF, 0).unwrap();
        assert_eq!(next, 0x30);
        assert_eq!(
            recompose(&reg, "NOPE", 1, 0),
            Err(ValueError::UnknownField {
                register: "CR1".into(),
                field: "NOPE".into()
            })
        );
    }

    #[test]
    fn test_model_field_edits() {
        let reg = cr1();
        let mut model = RegisterValueModel::new(&reg, 0);
        assert_eq!(model.set_field("EN", 1), Ok(0x1));
        assert_eq!(model.set_field("PSC", 0x1234), Ok(0x1234_0001));
        assert_eq!(model.set_field_enum("MODE", "alternate"), Ok(0x1234_0021));
        assert_eq!(model.field_value("MODE"), Some(2));
        assert_eq!(model.enum_choice("MODE").unwrap().name, "Alternate");
        assert!(model.set_field_enum("MODE", "Analog").is_err());
    }

    #[test]
    fn test_out_of_enum_value_is_not_an_error() {
        let reg = cr1();
        let model = RegisterValueModel::new(&reg, 0x30);
        assert_eq!(model.field_value("MODE"), Some(3));
        assert!(model.enum_choice("MODE").is_none());
        assert_eq!(model.format_field("MODE", Base::Bin).as_deref(), Some("11"));

        let model = RegisterValueModel::new(&reg, 0x10);
        assert_eq!(
            model.format_field("MODE", Base::Dec).as_deref(),
            Some("1 (Output)")
        );
    }

    #[test]
    fn test_value_truncated_to_register_width() {
        let mut reg = cr1();
        reg.size = 16;
        reg.fields.pop();
        let model = RegisterValueModel::new(&reg, 0xFFFF_0021);
        assert_eq!(model.value(), 0x0021);
        assert_eq!(model.format_value(Base::Hex), "0x0021");
    }

    #[test]
    fn test_flag_field_behaves_like_width_one() {
        let reg = cr1();
        let en = reg.field("EN").unwrap();
        assert!(en.is_flag());
        assert_eq!(insert(en, 1, 0x10), 0x11);
        assert_eq!(insert(en, 0, 0x11), 0x10);
        assert_eq!(extract(en, 0x11), 1);
    }
}
