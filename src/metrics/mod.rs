//! Interface metric data structures and the raw-counter mapping.
//!
//! This module holds the typed shape of everything a poll cycle produces,
//! the conversion from parsed switch output into `interface` points, and the
//! traits the pipeline uses to reach the switch and the metrics store.

pub mod data;
pub mod mapper;
pub mod traits;

// Re-export commonly used items
pub use data::{MetricPoint, PortDescriptors, SwitchTarget};
pub use mapper::map_port_data;
pub use traits::{CommandExecutor, MetricsSink};
