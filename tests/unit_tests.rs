use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use switch_collector::{
    error::CollectorError,
    map_port_data,
    metrics::data::*,
    parse_port_data,
    sink::influx::{encode_batch, to_line_protocol},
    AppContext, CollectorConfig, CommandExecutor, CycleState, MetricsSink, PollCycle,
    PollScheduler, Result,
};
use tokio::task::JoinSet;
use tokio_test::{assert_err, assert_ok};

const PORT_1: &str = "port=1,link=up,mtu=1500,speed=1000,rx_byte=100,rx_pkt=2,rx_mcast=0,rx_bcast=0,rx_drop=0,rx_error=0,tx_byte=200,tx_pkt=3,tx_mcast=0,tx_bcast=0,tx_drop=0,tx_error=0";
const PORT_2: &str = "port=2,link=down,mtu=9216,speed=10000,rx_byte=5000000000,rx_pkt=4000000,rx_mcast=12,rx_bcast=7,rx_drop=1,rx_error=2,tx_byte=6000000000,tx_pkt=5000000,tx_mcast=3,tx_bcast=4,tx_drop=5,tx_error=6";

const CONFIG: &str = r#"
InfluxDb:
  Host: influxdb
  Port: 8086
  Database: switches
Switch:
  Name: sw1
  Host: 10.0.0.2
  User: admin
  PrivKeyFile: /config/id_rsa
InterfaceDesc:
  1: uplink
  2: server-a
"#;

fn sw1() -> SwitchTarget {
    SwitchTarget::new("sw1", "10.0.0.2", "admin", "/config/id_rsa")
}

fn descriptors() -> PortDescriptors {
    [("1", "uplink"), ("2", "server-a")].into_iter().collect()
}

fn int(point: &MetricPoint, field: &str) -> i64 {
    point.field(field).and_then(FieldValue::as_integer).unwrap()
}

/// Replays a fixed port dump.
struct ScriptedSwitch {
    output: Vec<String>,
}

#[async_trait]
impl CommandExecutor for ScriptedSwitch {
    async fn execute(&self, _target: &SwitchTarget, _command: &str) -> Result<Vec<String>> {
        Ok(self.output.clone())
    }
}

/// Simulates a switch that never answers.
struct UnreachableSwitch;

#[async_trait]
impl CommandExecutor for UnreachableSwitch {
    async fn execute(&self, target: &SwitchTarget, _command: &str) -> Result<Vec<String>> {
        Err(CollectorError::ConnectionTimeout {
            host: target.host.clone(),
            timeout_secs: 5,
        })
    }
}

#[derive(Default)]
struct MemorySink {
    points: Mutex<Vec<MetricPoint>>,
}

#[async_trait]
impl MetricsSink for MemorySink {
    async fn write_batch(&self, points: &[MetricPoint]) -> Result<()> {
        self.points.lock().unwrap().extend_from_slice(points);
        Ok(())
    }
}

/// Parse then map the reference line from the interface dump format
#[test]
fn test_reference_example() {
    let ports = parse_port_data(&[PORT_1]).unwrap();
    let points = map_port_data(&ports, &[("1", "uplink")].into_iter().collect(), &sw1()).unwrap();

    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.measurement, "interface");
    assert_eq!(point.tag("host"), Some("sw1"));
    assert_eq!(point.tag("ifDesc"), Some("uplink"));
    assert_eq!(point.field("IfIndex"), Some(&FieldValue::Text("1".to_string())));
    assert_eq!(int(point, "IfAdminStatus"), 1);
    assert_eq!(int(point, "IfMtu"), 1500);
    assert_eq!(int(point, "IfSpeed"), 1000);
    assert_eq!(int(point, "IfInOctets"), 100);
    assert_eq!(int(point, "IfInUcastPkts"), 2);
    assert_eq!(int(point, "IfOutOctets"), 200);
    assert_eq!(int(point, "IfOutUcastPkts"), 3);
}

/// Counters beyond 32 bits survive the mapping
#[test]
fn test_large_counters() {
    let ports = parse_port_data(&[PORT_2]).unwrap();
    let points = map_port_data(&ports, &descriptors(), &sw1()).unwrap();
    let point = &points[0];

    assert_eq!(int(point, "IfAdminStatus"), 0);
    assert_eq!(int(point, "IfInOctets"), 5_000_000_000);
    assert_eq!(int(point, "IfOutOctets"), 6_000_000_000);
    assert_eq!(int(point, "IfInMulticastPkts"), 12);
    assert_eq!(int(point, "IfInBroadcastPkts"), 7);
    assert_eq!(int(point, "IfInDiscards"), 1);
    assert_eq!(int(point, "IfInErrors"), 2);
    assert_eq!(int(point, "IfOutMulticastPkts"), 3);
    assert_eq!(int(point, "IfOutBroadcastPkts"), 4);
    assert_eq!(int(point, "IfOutDiscards"), 5);
    assert_eq!(int(point, "IfOutErrors"), 6);
}

/// The set of ports in the output is exactly the set in the input
#[test]
fn test_no_carry_forward_between_cycles() {
    let first = parse_port_data(&[PORT_1, PORT_2]).unwrap();
    let second = parse_port_data(&[PORT_2]).unwrap();

    let points_first = map_port_data(&first, &descriptors(), &sw1()).unwrap();
    let points_second = map_port_data(&second, &descriptors(), &sw1()).unwrap();

    assert_eq!(points_first.len(), 2);
    assert_eq!(points_second.len(), 1);
    assert_eq!(points_second[0].tag("ifDesc"), Some("server-a"));
}

/// Config file to points to line protocol
#[test]
fn test_config_drives_mapping() {
    let config = CollectorConfig::from_yaml_str(CONFIG).unwrap();
    let targets = config.targets();

    let ports = parse_port_data(&[PORT_1, PORT_2]).unwrap();
    let points = map_port_data(&ports, &config.interface_desc, &targets[0]).unwrap();
    let body = encode_batch(&points);

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("interface,host=sw1,ifDesc=uplink "));
    assert!(lines[0].contains("IfIndex=\"1\""));
    assert!(lines[1].contains("IfInOctets=5000000000i"));
    assert_eq!(lines[1], to_line_protocol(&points[1]));
}

/// A malformed dump never reaches the sink
#[tokio::test]
async fn test_malformed_dump_is_not_written() {
    let sink = Arc::new(MemorySink::default());
    let ctx = AppContext::new(
        vec![sw1()],
        descriptors(),
        Arc::new(ScriptedSwitch {
            output: vec![PORT_1.to_string(), "port=2;link=up".to_string()],
        }),
        sink.clone(),
    );

    let report = PollCycle::new(&ctx, &ctx.targets[0]).run().await;
    assert_eq!(report.state, CycleState::Failed);
    assert_eq!(report.failed_in, Some(CycleState::Parsing));
    assert!(sink.points.lock().unwrap().is_empty());
}

/// Full cycle through the scheduler's dispatch path
#[tokio::test]
async fn test_scheduler_tick_writes_points() {
    let sink = Arc::new(MemorySink::default());
    let ctx = AppContext::new(
        vec![sw1()],
        descriptors(),
        Arc::new(ScriptedSwitch {
            output: vec![PORT_1.to_string(), PORT_2.to_string()],
        }),
        sink.clone(),
    );
    let scheduler = PollScheduler::new(Arc::new(ctx));
    let mut tasks = JoinSet::new();

    let tick = scheduler.dispatch_tick(&mut tasks);
    assert_eq!(tick.dispatched, 1);

    let report = tasks.join_next().await.unwrap().unwrap();
    assert_eq!(assert_ok!(report.result), 2);
    assert_eq!(sink.points.lock().unwrap().len(), 2);
}

/// A timed-out switch produces nothing, and the next tick still fires
#[tokio::test]
async fn test_timeout_then_next_tick() {
    let sink = Arc::new(MemorySink::default());
    let ctx = AppContext::new(vec![sw1()], descriptors(), Arc::new(UnreachableSwitch), sink.clone());
    let scheduler = PollScheduler::new(Arc::new(ctx));
    let mut tasks = JoinSet::new();

    for _ in 0..2 {
        assert_eq!(scheduler.dispatch_tick(&mut tasks).dispatched, 1);
        let report = tasks.join_next().await.unwrap().unwrap();
        assert_eq!(report.failed_in, Some(CycleState::Connecting));
        let err = assert_err!(report.result);
        assert!(matches!(err, CollectorError::ConnectionTimeout { .. }));
        assert!(err.is_connection_error());
    }
    assert!(sink.points.lock().unwrap().is_empty());
}

/// MetricPoint serialization for the `once --format json` output
#[test]
fn test_point_json() {
    let ports = parse_port_data(&[PORT_1]).unwrap();
    let points = map_port_data(&ports, &descriptors(), &sw1()).unwrap();

    let json = serde_json::to_string(&points[0]).unwrap();
    assert!(json.contains("\"measurement\":\"interface\""));
    assert!(json.contains("\"IfIndex\":\"1\""));
    assert!(json.contains("\"IfMtu\":1500"));

    let back: MetricPoint = serde_json::from_str(&json).unwrap();
    assert_eq!(back, points[0]);
}
