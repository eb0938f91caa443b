//! SVD to device model transformation

use super::*;
use svd_parser::svd::{self, RegisterCluster};

/// Inherited register properties while walking the SVD tree.
#[derive(Debug, Clone, Copy)]
struct Defaults {
    size: Option<u32>,
    access: Option<svd::Access>,
}

impl Defaults {
    fn refine(self, props: &svd::RegisterProperties) -> Self {
        Self {
            size: props.size.or(self.size),
            access: props.access.or(self.access),
        }
    }
}

/// Parses CMSIS-SVD text and converts it to raw peripherals in document order.
pub fn parse_svd(xml: &str) -> Result<Vec<RawPeripheral>> {
    let device = svd_parser::parse(xml).map_err(|e| DeviceError::Svd(format!("{:#}", e)))?;
    raw_peripherals_from_svd(&device)
}

/// Converts a parsed SVD device into raw peripherals, keeping document order.
///
/// `derivedFrom` is carried as a reference; resolution happens in
/// [`Device::build_from`].
pub fn raw_peripherals_from_svd(device: &svd::Device) -> Result<Vec<RawPeripheral>> {
    let device_defaults = Defaults {
        size: device.default_register_properties.size,
        access: device.default_register_properties.access,
    };

    let mut out = Vec::with_capacity(device.peripherals.len());
    for p in &device.peripherals {
        let base_address = u32::try_from(p.base_address).map_err(|_| {
            DeviceError::Svd(format!(
                "peripheral {} base address {:#x} exceeds 32 bits",
                p.name, p.base_address
            ))
        })?;

        let defaults = device_defaults.refine(&p.default_register_properties);
        let mut registers = Vec::new();
        if let Some(regs) = &p.registers {
            for rc in regs {
                flatten_cluster(rc, 0, "", defaults, &mut registers)?;
            }
        }

        out.push(RawPeripheral {
            name: p.name.clone(),
            description: p.description.as_ref().map(|d| normalize_text(d)),
            base_address,
            group_name: p.group_name.clone(),
            derived_from: p.derived_from.clone(),
            registers,
        });
    }
    Ok(out)
}

/// Recursively flattens SVD clusters and arrays into a simple list of registers.
fn flatten_cluster(
    rc: &RegisterCluster,
    current_offset: u32,
    name_prefix: &str,
    defaults: Defaults,
    out: &mut Vec<Register>,
) -> Result<()> {
    match rc {
        RegisterCluster::Register(reg) => match reg {
            svd::Register::Single(info) => {
                let name = format!("{}{}", name_prefix, info.name);
                let offset = current_offset.wrapping_add(info.address_offset);
                out.push(convert_register(info, &name, offset, defaults)?);
            }
            svd::Register::Array(info, dim) => {
                let pattern = format!("{}{}", name_prefix, info.name);
                for i in 0..dim.dim {
                    let name = expand_dim_name(&pattern, dim, i);
                    let offset = current_offset
                        .wrapping_add(info.address_offset)
                        .wrapping_add(i * dim.dim_increment);
                    out.push(convert_register(info, &name, offset, defaults)?);
                }
            }
        },
        RegisterCluster::Cluster(cluster) => match cluster {
            svd::Cluster::Single(info) => {
                let prefix = format!("{}{}_", name_prefix, info.name);
                let offset = current_offset.wrapping_add(info.address_offset);
                let defaults = defaults.refine(&info.default_register_properties);
                for child in &info.children {
                    flatten_cluster(child, offset, &prefix, defaults, out)?;
                }
            }
            svd::Cluster::Array(info, dim) => {
                let pattern = format!("{}{}", name_prefix, info.name);
                let defaults = defaults.refine(&info.default_register_properties);
                for i in 0..dim.dim {
                    let prefix = format!("{}_", expand_dim_name(&pattern, dim, i));
                    let offset = current_offset
                        .wrapping_add(info.address_offset)
                        .wrapping_add(i * dim.dim_increment);
                    for child in &info.children {
                        flatten_cluster(child, offset, &prefix, defaults, out)?;
                    }
                }
            }
        },
    }
    Ok(())
}

fn expand_dim_name(pattern: &str, dim: &svd::DimElement, i: u32) -> String {
    let idx = dim
        .dim_index
        .as_ref()
        .and_then(|names| names.get(i as usize).cloned())
        .unwrap_or_else(|| i.to_string());
    let name = pattern.replace("[%s]", &idx).replace("%s", &idx);
    // No placeholder: append the index.
    if name == pattern {
        format!("{}{}", name, idx)
    } else {
        name
    }
}

fn convert_register(
    info: &svd::RegisterInfo,
    name: &str,
    offset: u32,
    defaults: Defaults,
) -> Result<Register> {
    let defaults = defaults.refine(&info.properties);
    let access = map_access(defaults.access);

    let mut fields = Vec::new();
    for f in info.fields.iter().flatten() {
        match f {
            svd::Field::Single(fi) => fields.push(convert_field(fi, &fi.name, 0, access)),
            svd::Field::Array(fi, dim) => {
                for i in 0..dim.dim {
                    let name = expand_dim_name(&fi.name, dim, i);
                    fields.push(convert_field(fi, &name, i * dim.dim_increment, access));
                }
            }
        }
    }

    Ok(Register {
        name: name.to_string(),
        description: info.description.as_ref().map(|d| normalize_text(d)),
        address_offset: offset,
        size: defaults.size.unwrap_or_else(default_register_size),
        access,
        fields,
    })
}

fn convert_field(info: &svd::FieldInfo, name: &str, shift: u32, inherited: Access) -> Field {
    let lsb = info.bit_range.lsb() + shift;
    let msb = info.bit_range.msb() + shift;

    let enumerated_values = info
        .enumerated_values
        .iter()
        .flat_map(|evs| evs.values.iter())
        .filter_map(|ev| {
            // Wildcard `isDefault` entries have no concrete value.
            let value = u32::try_from(ev.value?).ok()?;
            Some(EnumeratedValue {
                name: ev.name.clone(),
                description: ev.description.as_ref().map(|d| normalize_text(d)),
                value,
            })
        })
        .collect();

    Field {
        name: name.to_string(),
        description: info.description.as_ref().map(|d| normalize_text(d)),
        lsb,
        msb,
        access: info.access.map(|a| map_access(Some(a))).unwrap_or(inherited),
        enumerated_values,
    }
}

fn map_access(access: Option<svd::Access>) -> Access {
    match access {
        Some(svd::Access::ReadOnly) => Access::ReadOnly,
        Some(svd::Access::WriteOnly) | Some(svd::Access::WriteOnce) => Access::WriteOnly,
        Some(svd::Access::ReadWrite) | Some(svd::Access::ReadWriteOnce) => Access::ReadWrite,
        None => Access::Unspecified,
    }
}

/// Collapses the line breaks and indentation SVD files carry inside descriptions.
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
