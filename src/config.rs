//! Collector configuration.
//!
//! The YAML layout keeps the PascalCase keys the collector has always used:
//!
//! ```yaml
//! InfluxDb:
//!   Host: influxdb
//!   Port: 8086
//!   Database: switches
//! Switch:
//!   Name: sw1
//!   Host: 10.0.0.2
//!   User: admin
//!   PrivKeyFile: /config/id_rsa
//! InterfaceDesc:
//!   1: uplink
//!   2: server-a
//! ```

use crate::error::{CollectorError, Result};
use crate::metrics::data::{PortDescriptors, SwitchTarget};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/config/config.yaml";

/// Default InfluxDB HTTP port.
pub const DEFAULT_INFLUX_PORT: u16 = 8086;

/// Root of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Metrics store
    #[serde(rename = "InfluxDb")]
    pub influxdb: InfluxConfig,
    /// The switch to poll
    #[serde(rename = "Switch", default, skip_serializing_if = "Option::is_none")]
    pub switch: Option<SwitchTarget>,
    /// Additional switches, for a small fixed fleet
    #[serde(rename = "Switches", default, skip_serializing_if = "Vec::is_empty")]
    pub switches: Vec<SwitchTarget>,
    /// Port id → description, shared by all switches
    #[serde(rename = "InterfaceDesc")]
    pub interface_desc: PortDescriptors,
    /// Timeouts and scheduling knobs
    #[serde(rename = "Poll", default)]
    pub poll: PollConfig,
}

/// InfluxDB connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Host name, or a full `http(s)://` base URL
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port", default = "default_influx_port")]
    pub port: u16,
    #[serde(rename = "Database")]
    pub database: String,
}

fn default_influx_port() -> u16 {
    DEFAULT_INFLUX_PORT
}

impl InfluxConfig {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
        }
    }

    /// Base URL of the HTTP API, without trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

/// Poll timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// SSH connect timeout
    #[serde(rename = "ConnectTimeoutSecs")]
    pub connect_timeout_secs: u64,
    /// Bound on the remote command
    #[serde(rename = "CommandTimeoutSecs")]
    pub command_timeout_secs: u64,
    /// Bound on each metrics write
    #[serde(rename = "WriteTimeoutSecs")]
    pub write_timeout_secs: u64,
    /// How long in-flight cycles may run after a shutdown signal
    #[serde(rename = "ShutdownGraceSecs")]
    pub shutdown_grace_secs: u64,
    /// Pause before the first poll, giving a co-deployed database time to start
    #[serde(rename = "StartupDelaySecs")]
    pub startup_delay_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            command_timeout_secs: 30,
            write_timeout_secs: 10,
            shutdown_grace_secs: 30,
            startup_delay_secs: 10,
        }
    }
}

impl PollConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

impl CollectorConfig {
    /// Create a configuration for a single switch.
    pub fn new(influxdb: InfluxConfig, switch: SwitchTarget, interface_desc: PortDescriptors) -> Self {
        Self {
            influxdb,
            switch: Some(switch),
            switches: Vec::new(),
            interface_desc,
            poll: PollConfig::default(),
        }
    }

    /// Add another switch to poll.
    pub fn with_switch(mut self, switch: SwitchTarget) -> Self {
        self.switches.push(switch);
        self
    }

    /// Replace the poll timing settings.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CollectorError::config_error(format!("Could not open file: {} - {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| CollectorError::config_error(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// All switches to poll, `Switch` first.
    pub fn targets(&self) -> Vec<SwitchTarget> {
        self.switch
            .iter()
            .chain(self.switches.iter())
            .cloned()
            .collect()
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let targets = self.targets();
        if targets.is_empty() {
            return Err(CollectorError::config_error(
                "no switch configured (expected Switch or Switches)",
            ));
        }

        let mut names = HashSet::new();
        for target in &targets {
            for (key, value) in [
                ("Name", &target.name),
                ("Host", &target.host),
                ("User", &target.user),
                ("Command", &target.command),
            ] {
                if value.trim().is_empty() {
                    return Err(CollectorError::config_error(format!(
                        "Switch.{} must not be empty",
                        key
                    )));
                }
            }
            if !names.insert(target.name.as_str()) {
                return Err(CollectorError::config_error(format!(
                    "duplicate switch name {:?}",
                    target.name
                )));
            }
        }

        if self.influxdb.host.trim().is_empty() || self.influxdb.database.trim().is_empty() {
            return Err(CollectorError::config_error(
                "InfluxDb.Host and InfluxDb.Database are required",
            ));
        }
        if self.influxdb.port == 0 {
            return Err(CollectorError::config_error("InfluxDb.Port must not be 0"));
        }
        if self.poll.connect_timeout_secs == 0
            || self.poll.command_timeout_secs == 0
            || self.poll.write_timeout_secs == 0
        {
            return Err(CollectorError::config_error("Poll timeouts must be at least 1 second"));
        }

        Ok(())
    }
}
