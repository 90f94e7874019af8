//! Parser for the switch's per-port status dump.
//!
//! Each line looks like
//! `port=1,link=up,mtu=1500,speed=1000,rx_byte=100,...` and describes one
//! port. The first token names the port; the rest are stored verbatim.

use crate::error::{CollectorError, Result};
use crate::metrics::data::{PortData, RawPortRecord};

/// Key of the token that must open every line.
pub const PORT_KEY: &str = "port";

/// Parse command output into a port id → raw record map.
///
/// Any empty line, any token without `=`, or a line that does not start with
/// `port=<id>` fails the whole parse. A port id seen twice keeps the record
/// of its last line.
pub fn parse_port_data<S: AsRef<str>>(lines: &[S]) -> Result<PortData> {
    let mut ports = PortData::new();

    for (index, line) in lines.iter().enumerate() {
        let line_no = index + 1;
        let line = line.as_ref().trim_end_matches(['\r', '\n']);
        let (port, record) = parse_line(line_no, line)?;
        ports.insert(port, record);
    }

    Ok(ports)
}

fn parse_line(line_no: usize, line: &str) -> Result<(String, RawPortRecord)> {
    if line.trim().is_empty() {
        return Err(CollectorError::malformed(line_no, "empty line"));
    }

    let mut tokens = line.split(',');

    // split() always yields at least one item
    let first = tokens.next().unwrap_or_default();
    let (key, port) = split_token(line_no, first)?;
    if key != PORT_KEY {
        return Err(CollectorError::malformed(
            line_no,
            format!("expected leading \"{}=<id>\", found {:?}", PORT_KEY, first),
        ));
    }
    if port.is_empty() {
        return Err(CollectorError::malformed(line_no, "empty port id"));
    }

    let mut record = RawPortRecord::new();
    for token in tokens {
        let (key, value) = split_token(line_no, token)?;
        record.insert(key.to_string(), value.to_string());
    }

    Ok((port.to_string(), record))
}

fn split_token(line_no: usize, token: &str) -> Result<(&str, &str)> {
    match token.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(CollectorError::malformed(
            line_no,
            format!("token {:?} has an empty key", token),
        )),
        Some((key, value)) => Ok((key, value)),
        None => Err(CollectorError::malformed(
            line_no,
            format!("token {:?} has no '='", token),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE_1: &str = "port=1,link=up,mtu=1500,speed=1000,rx_byte=100,rx_pkt=2,rx_mcast=0,rx_bcast=0,rx_drop=0,rx_error=0,tx_byte=200,tx_pkt=3,tx_mcast=0,tx_bcast=0,tx_drop=0,tx_error=0";
    const LINE_2: &str = "port=2,link=down,mtu=9216,speed=0,rx_byte=0,rx_pkt=0,rx_mcast=0,rx_bcast=0,rx_drop=0,rx_error=0,tx_byte=0,tx_pkt=0,tx_mcast=0,tx_bcast=0,tx_drop=0,tx_error=0";

    #[test]
    fn test_parse_two_ports() {
        let ports = parse_port_data(&[LINE_1, LINE_2]).unwrap();
        assert_eq!(ports.len(), 2);

        let port1 = &ports["1"];
        assert_eq!(port1["link"], "up");
        assert_eq!(port1["mtu"], "1500");
        assert_eq!(port1["tx_byte"], "200");
        // the port id is the key, not a field
        assert!(!port1.contains_key("port"));

        assert_eq!(ports["2"]["link"], "down");
    }

    #[test]
    fn test_parse_strips_line_endings() {
        let lines = vec![format!("{}\r\n", LINE_1)];
        let ports = parse_port_data(&lines).unwrap();
        assert_eq!(ports["1"]["tx_error"], "0");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let lines = [LINE_1, LINE_2];
        assert_eq!(
            parse_port_data(&lines).unwrap(),
            parse_port_data(&lines).unwrap()
        );
    }

    #[test]
    fn test_duplicate_port_last_line_wins() {
        let lines = ["port=1,link=down,mtu=1500", "port=1,link=up,mtu=9000"];
        let ports = parse_port_data(&lines).unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports["1"]["link"], "up");
        assert_eq!(ports["1"]["mtu"], "9000");
    }

    #[test]
    fn test_missing_separator_fails_whole_parse() {
        let lines = [LINE_1, "port=2,link=up,mtu"];
        match parse_port_data(&lines) {
            Err(CollectorError::MalformedOutput { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("mtu"));
            }
            other => panic!("expected MalformedOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_line_is_fatal() {
        let lines = [LINE_1, "", LINE_2];
        assert!(matches!(
            parse_port_data(&lines),
            Err(CollectorError::MalformedOutput { line: 2, .. })
        ));
    }

    #[test]
    fn test_line_must_start_with_port() {
        let lines = ["link=up,port=1"];
        assert!(matches!(
            parse_port_data(&lines),
            Err(CollectorError::MalformedOutput { line: 1, .. })
        ));

        let lines = ["port=,link=up"];
        assert!(matches!(
            parse_port_data(&lines),
            Err(CollectorError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn test_empty_output_has_no_ports() {
        let lines: [&str; 0] = [];
        assert!(parse_port_data(&lines).unwrap().is_empty());
    }
}
