use std::path::Path;
use serde::Deserialize;
use anyhow::{bail, Context, Result};
use shared::protocol::MACHINEKIT_SERVICE_TYPE;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub instance: InstanceConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Identity of the local Machinekit instance; only its services are relayed
    pub uuid: String,
    /// Remote communication switch, off unless explicitly enabled
    #[serde(default)]
    pub remote: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_service_types")]
    pub service_types: Vec<String>,
    /// Restrict mDNS to a single network interface
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_service_types() -> Vec<String> {
    vec![MACHINEKIT_SERVICE_TYPE.to_string()]
}

fn default_event_buffer() -> usize {
    256
}

fn default_listen() -> String {
    "0.0.0.0:8088".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_types: default_service_types(),
            interface: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;

        if config.instance.uuid.trim().is_empty() {
            bail!("instance.uuid must not be empty");
        }
        if config.discovery.event_buffer == 0 {
            bail!("discovery.event_buffer must be greater than zero");
        }

        Ok(config)
    }

    /// Fails unless remote communication is enabled for this instance
    pub fn ensure_remote_enabled(&self) -> Result<()> {
        if !self.instance.remote {
            bail!(
                "Remote communication is disabled for instance {}; \
                 set `remote = true` in the [instance] section to relay its services",
                self.instance.uuid
            );
        }
        Ok(())
    }
}
