//! Data structures for switch targets and interface metrics.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Measurement name every interface point is written under.
pub const INTERFACE_MEASUREMENT: &str = "interface";

/// Command that dumps per-port counters on the switch.
pub const DEFAULT_PORT_COMMAND: &str = "cat /proc/port/all";

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Identity of a switch to poll.
///
/// Built from the `Switch` block of the config file and never mutated after
/// startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchTarget {
    /// Label written as the `host` tag
    #[serde(rename = "Name")]
    pub name: String,
    /// Address used for the SSH connection
    #[serde(rename = "Host")]
    pub host: String,
    /// SSH port
    #[serde(rename = "Port", default = "default_ssh_port")]
    pub port: u16,
    /// Login user
    #[serde(rename = "User")]
    pub user: String,
    /// Private key used to authenticate
    #[serde(rename = "PrivKeyFile")]
    pub private_key_path: PathBuf,
    /// Command producing the port dump
    #[serde(rename = "Command", default = "default_port_command")]
    pub command: String,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_port_command() -> String {
    DEFAULT_PORT_COMMAND.to_string()
}

impl SwitchTarget {
    /// Create a target with the default port and command.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: user.into(),
            private_key_path: private_key_path.into(),
            command: DEFAULT_PORT_COMMAND.to_string(),
        }
    }

    /// Set the SSH port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the command run on the switch.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// `user@host`, as used in log lines and the SSH destination.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Display for SwitchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}@{}:{})", self.name, self.user, self.host, self.port)
    }
}

/// Raw `key=value` fields for one port, exactly as the switch printed them.
pub type RawPortRecord = BTreeMap<String, String>;

/// Parsed command output keyed by port id.
pub type PortData = BTreeMap<String, RawPortRecord>;

/// Static port id → human readable description table.
///
/// Port ids may be written as YAML integers (`1: uplink`) or strings
/// (`"1": uplink`); both map to the string id the switch prints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PortDescriptors(HashMap<String, String>);

#[derive(Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
enum PortKey {
    Number(i64),
    Name(String),
}

impl From<PortKey> for String {
    fn from(key: PortKey) -> Self {
        match key {
            PortKey::Number(n) => n.to_string(),
            PortKey::Name(s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for PortDescriptors {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = HashMap::<PortKey, String>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

impl PortDescriptors {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the description of a port.
    pub fn insert(&mut self, port: impl Into<String>, description: impl Into<String>) {
        self.0.insert(port.into(), description.into());
    }

    /// Look up the description of a port.
    pub fn describe(&self, port: &str) -> Option<&str> {
        self.0.get(port).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for PortDescriptors
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(port, desc)| (port.into(), desc.into()))
                .collect(),
        )
    }
}

/// A single field value of a metric point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// Integer value, if this is an integer field.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One time-series sample for one port.
///
/// No timestamp is attached; the metrics store assigns one on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Measurement name (always `interface`)
    pub measurement: String,
    /// Indexed tags (`host`, `ifDesc`)
    pub tags: BTreeMap<String, String>,
    /// Counter values
    pub fields: BTreeMap<String, FieldValue>,
}

impl MetricPoint {
    /// Create an empty interface point.
    pub fn interface() -> Self {
        Self {
            measurement: INTERFACE_MEASUREMENT.to_string(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}
