//! Layered configuration: built-in defaults, then `receiver.toml`, then
//! `RECEIVER_*` environment variables (highest priority).

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::receiver::DEFAULT_MAX_BODY_BYTES;

pub const CONFIG_FILE: &str = "receiver.toml";
pub const ENV_PREFIX: &str = "RECEIVER_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Environment variable: `RECEIVER_HOST`
    #[serde(default = "default_host")]
    pub host: String,
    /// Environment variable: `RECEIVER_PORT`
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory records are written under, one subdirectory per source.
    ///
    /// Environment variable: `RECEIVER_STORAGE_DIR`
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Filter directives used when `RUST_LOG` is unset.
    ///
    /// Environment variable: `RECEIVER_LOG_LEVEL`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Environment variable: `RECEIVER_MAX_BODY_BYTES`
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn server_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("Invalid server address")
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }
        if self.storage_dir.as_os_str().is_empty() {
            anyhow::bail!("storage_dir must not be empty");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than 0");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage_dir: default_storage_dir(),
            log_level: default_log_level(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("webhook-requests")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server_addr().unwrap().port(), 8000);
        assert_eq!(config.storage_dir, PathBuf::from("webhook-requests"));
    }

    #[test]
    fn file_then_env_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                port = 9000
                storage_dir = "/var/lib/webhooks"
                log_level = "debug"
                "#,
            )?;
            jail.set_env("RECEIVER_PORT", "9100");
            jail.set_env("RECEIVER_HOST", "127.0.0.1");

            let config = Config::load().expect("config should load");
            assert_eq!(config.port, 9100);
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.storage_dir, PathBuf::from("/var/lib/webhooks"));
            assert_eq!(config.log_level, "debug");
            assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
            Ok(())
        });
    }

    #[test]
    fn zero_port_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("RECEIVER_PORT", "0");
            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn zero_body_limit_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("RECEIVER_MAX_BODY_BYTES", "0");
            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn bad_host_fails_address_parse() {
        let config = Config {
            host: "not a host".to_string(),
            ..Config::default()
        };
        assert!(config.server_addr().is_err());
    }
}
