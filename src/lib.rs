//! # Switch Collector - Interface Telemetry for SSH-managed Switches
//!
//! Once a minute, on the minute, this crate logs into each configured switch
//! over SSH, dumps its per-port counters, and writes them to InfluxDB as
//! `interface` points tagged with the switch name and port description.
//!
//! ## Pipeline
//!
//! - **Execute**: [`SshExecutor`] runs the dump command over a fresh session
//! - **Parse**: [`parse_port_data`] turns `port=<id>,key=value,...` lines into records
//! - **Map**: [`map_port_data`] validates records and builds [`MetricPoint`]s
//! - **Write**: [`InfluxSink`] posts the batch as line protocol
//!
//! [`PollCycle`] runs those stages for one switch; [`PollScheduler`] fires a
//! cycle per switch every minute and never lets two cycles for the same switch
//! overlap.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switch_collector::{
//!     AppContext, CollectorConfig, InfluxSink, PollScheduler, SshExecutor, SshOptions,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CollectorConfig::load("/config/config.yaml")?;
//!     let sink = InfluxSink::new(&config.influxdb, config.poll.write_timeout())?;
//!     let executor = SshExecutor::new(SshOptions::default());
//!
//!     let ctx = AppContext::new(
//!         config.targets(),
//!         config.interface_desc.clone(),
//!         Arc::new(executor),
//!         Arc::new(sink),
//!     );
//!     PollScheduler::new(Arc::new(ctx)).run(CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod poll;
pub mod sink;
pub mod switch;

// Re-export public API
pub use config::{CollectorConfig, InfluxConfig, PollConfig, DEFAULT_CONFIG_PATH};
pub use error::{CollectorError, Result};
pub use metrics::{
    data::{FieldValue, MetricPoint, PortData, PortDescriptors, RawPortRecord, SwitchTarget},
    mapper::map_port_data,
    traits::{CommandExecutor, MetricsSink},
};
pub use poll::{AppContext, CycleReport, CycleState, PollCycle, PollScheduler, TickReport};
pub use sink::InfluxSink;
pub use switch::{parse_port_data, SshExecutor, SshOptions};
