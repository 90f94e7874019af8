//! Conversion of parsed port records into interface metric points.

use crate::error::{CollectorError, Result};
use crate::metrics::data::{MetricPoint, PortData, PortDescriptors, RawPortRecord, SwitchTarget};

/// Raw field → metric name table for the integer counters.
pub const COUNTER_FIELDS: [(&str, &str); 14] = [
    ("mtu", "IfMtu"),
    ("speed", "IfSpeed"),
    ("rx_byte", "IfInOctets"),
    ("rx_pkt", "IfInUcastPkts"),
    ("rx_mcast", "IfInMulticastPkts"),
    ("rx_bcast", "IfInBroadcastPkts"),
    ("rx_drop", "IfInDiscards"),
    ("rx_error", "IfInErrors"),
    ("tx_byte", "IfOutOctets"),
    ("tx_pkt", "IfOutUcastPkts"),
    ("tx_mcast", "IfOutMulticastPkts"),
    ("tx_bcast", "IfOutBroadcastPkts"),
    ("tx_drop", "IfOutDiscards"),
    ("tx_error", "IfOutErrors"),
];

pub const TAG_HOST: &str = "host";
pub const TAG_IF_DESC: &str = "ifDesc";
pub const FIELD_IF_INDEX: &str = "IfIndex";
pub const FIELD_ADMIN_STATUS: &str = "IfAdminStatus";

const LINK_FIELD: &str = "link";
const LINK_UP: &str = "up";

/// Validated counters of one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCounters {
    pub link_up: bool,
    /// Values in [`COUNTER_FIELDS`] order
    pub counters: [i64; COUNTER_FIELDS.len()],
}

impl PortCounters {
    /// Validate a raw record.
    ///
    /// `link` must be present; every counter field must be present and parse
    /// as an integer. Fields the table does not know are ignored.
    pub fn from_record(port: &str, record: &RawPortRecord) -> Result<Self> {
        let link = record
            .get(LINK_FIELD)
            .ok_or_else(|| missing_field(port, LINK_FIELD))?;

        let mut counters = [0i64; COUNTER_FIELDS.len()];
        for (slot, (raw_name, _)) in counters.iter_mut().zip(COUNTER_FIELDS.iter()) {
            let value = record
                .get(*raw_name)
                .ok_or_else(|| missing_field(port, raw_name))?;
            *slot = value
                .trim()
                .parse::<i64>()
                .map_err(|_| CollectorError::InvalidField {
                    port: port.to_string(),
                    field: raw_name.to_string(),
                    value: value.clone(),
                })?;
        }

        Ok(Self {
            link_up: link == LINK_UP,
            counters,
        })
    }

    /// `IfAdminStatus` value.
    pub fn admin_status(&self) -> i64 {
        i64::from(self.link_up)
    }
}

fn missing_field(port: &str, field: &str) -> CollectorError {
    CollectorError::InvalidField {
        port: port.to_string(),
        field: field.to_string(),
        value: String::new(),
    }
}

/// Build one `interface` point per port.
///
/// All ports are validated before anything is returned: an undescribed port
/// or a bad field yields an error and no points at all.
pub fn map_port_data(
    port_data: &PortData,
    descriptors: &PortDescriptors,
    target: &SwitchTarget,
) -> Result<Vec<MetricPoint>> {
    port_data
        .iter()
        .map(|(port, record)| {
            let description = descriptors
                .describe(port)
                .ok_or_else(|| CollectorError::UnknownPort { port: port.clone() })?;
            let counters = PortCounters::from_record(port, record)?;
            Ok(build_point(port, description, &counters, target))
        })
        .collect()
}

fn build_point(
    port: &str,
    description: &str,
    counters: &PortCounters,
    target: &SwitchTarget,
) -> MetricPoint {
    let mut point = MetricPoint::interface()
        .with_tag(TAG_HOST, target.name.as_str())
        .with_tag(TAG_IF_DESC, description)
        .with_field(FIELD_IF_INDEX, port.to_string())
        .with_field(FIELD_ADMIN_STATUS, counters.admin_status());

    for ((_, metric_name), value) in COUNTER_FIELDS.iter().zip(counters.counters) {
        point = point.with_field(*metric_name, value);
    }

    point
}
