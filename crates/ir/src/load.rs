// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Device, DeviceError, RawPeripheral, Result};
use std::path::Path;

/// Loads a description document and builds the resolved [`Device`].
///
/// The format is chosen by extension: `.json`, `.yaml`/`.yml` hold a list of
/// [`RawPeripheral`] records, `.svd`/`.xml` are CMSIS-SVD. Any failure aborts
/// the load; no partially built device is returned.
pub fn load_description<P: AsRef<Path>>(path: P) -> Result<Device> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    tracing::info!("Loading description {:?}", path);
    let content = std::fs::read_to_string(path)?;

    let raw: Vec<RawPeripheral> = match ext.as_str() {
        "json" => serde_json::from_str(&content)?,
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        #[cfg(feature = "svd")]
        "svd" | "xml" => crate::svd_transform::parse_svd(&content)?,
        other => return Err(DeviceError::UnsupportedFormat(other.to_string())),
    };

    Device::build_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_description() {
        let file = write_temp(
            ".yaml",
            r#"
- name: GPIOA
  base_address: 0x40010800
  group_name: GPIO
  registers:
    - name: ODR
      address_offset: 0xC
      fields:
        - name: ODR0
          lsb: 0
          msb: 0
          access: read-write
    - name: CRL
      address_offset: 0x0
- name: GPIOB
  base_address: 0x40010C00
  derived_from: GPIOA
"#,
        );

        let device = load_description(file.path()).unwrap();
        assert_eq!(device.peripherals.len(), 2);
        let gpiob = device.peripheral("GPIOB").unwrap();
        assert_eq!(gpiob.registers[0].name, "CRL");
        assert_eq!(gpiob.registers[1].name, "ODR");
        assert_eq!(gpiob.registers[1].fields[0].name, "ODR0");
    }

    #[test]
    fn test_load_json_with_forward_reference_fails() {
        let file = write_temp(
            ".json",
            r#"[
                {"name": "B", "base_address": 2, "derived_from": "A"},
                {"name": "A", "base_address": 1}
            ]"#,
        );
        assert!(matches!(
            load_description(file.path()),
            Err(DeviceError::UnresolvedDerivation { .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".txt", "");
        assert!(matches!(
            load_description(file.path()),
            Err(DeviceError::UnsupportedFormat(ext)) if ext == "txt"
        ));
    }
}
