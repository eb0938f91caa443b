// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use regscope_core::Base;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4444
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Connection and display settings for one inspection session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Reply timeout of a single adapter command.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Re-read the displayed peripheral whenever the target halts.
    #[serde(default)]
    pub auto_read: bool,
    #[serde(default)]
    pub display_base: Base,
    /// Device description document (SVD, YAML or JSON).
    #[serde(default)]
    pub description: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            auto_read: false,
            display_base: Base::default(),
            description: None,
        }
    }
}

impl SessionConfig {
    /// Loads and validates a YAML session file.
    ///
    /// A relative `description` path is taken relative to the directory of
    /// the session file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("Failed to open session config at {:?}", path))?;
        let mut config: Self =
            serde_yaml::from_reader(f).context("Failed to parse session config YAML")?;

        if let (Some(desc), Some(dir)) = (config.description.as_mut(), path.parent()) {
            if desc.is_relative() {
                *desc = dir.join(&*desc);
            }
        }

        config.validate()?;
        tracing::debug!("Loaded session config from {:?}: {:?}", path, config);
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse session config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("'host' cannot be empty");
        }
        if self.port == 0 {
            anyhow::bail!("'port' must be greater than zero");
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("'timeout_ms' must be greater than zero");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("'poll_interval_ms' must be greater than zero");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `host:port` as shown to the user.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_takes_defaults() {
        let config = SessionConfig::from_yaml("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.address(), "127.0.0.1:4444");
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.display_base, Base::Hex);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = SessionConfig::from_yaml("poll_interval_ms: 0").unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = SessionConfig {
            port: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(SessionConfig::from_yaml("hots: localhost").is_err());
    }
}
