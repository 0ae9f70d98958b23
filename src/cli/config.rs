use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Slave configuration file (TOML). Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaveConfig {
    /// Address the TCP listener binds to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// The only unit id this slave answers for
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Connections beyond this count are refused
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// How long shutdown waits for the listener to wind down
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// JSON seed file; the bundled register map is used when absent
    #[serde(default)]
    pub seed: Option<PathBuf>,
    /// Start the activity simulator immediately
    #[serde(default)]
    pub simulate: bool,
    #[serde(default = "default_simulation_interval_ms")]
    pub simulation_interval_ms: u64,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5502))
}

fn default_unit_id() -> u8 {
    1
}

fn default_max_clients() -> usize {
    5
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_simulation_interval_ms() -> u64 {
    2_000
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            unit_id: default_unit_id(),
            max_clients: default_max_clients(),
            timeout_ms: default_timeout_ms(),
            seed: None,
            simulate: false,
            simulation_interval_ms: default_simulation_interval_ms(),
        }
    }
}

impl SlaveConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid slave configuration")
    }

    /// Read configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in config file {}", path.display()))
    }

    /// Convert to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize slave configuration")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_millis(self.simulation_interval_ms)
    }
}
