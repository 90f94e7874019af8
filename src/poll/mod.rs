//! Poll orchestration: the per-target cycle and the minute scheduler.

pub mod cycle;
pub mod scheduler;

pub use cycle::{CycleReport, CycleState, PollCycle};
pub use scheduler::{PollScheduler, TickReport};

use crate::metrics::data::{PortDescriptors, SwitchTarget};
use crate::metrics::traits::{CommandExecutor, MetricsSink};
use std::sync::Arc;
use std::time::Duration;

/// Default time in-flight cycles get to finish after shutdown is requested.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Everything a poll cycle needs, built once at startup and shared by
/// reference with every cycle.
pub struct AppContext {
    pub targets: Vec<Arc<SwitchTarget>>,
    pub descriptors: PortDescriptors,
    pub executor: Arc<dyn CommandExecutor>,
    pub sink: Arc<dyn MetricsSink>,
    pub shutdown_grace: Duration,
}

impl AppContext {
    pub fn new(
        targets: Vec<SwitchTarget>,
        descriptors: PortDescriptors,
        executor: Arc<dyn CommandExecutor>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            targets: targets.into_iter().map(Arc::new).collect(),
            descriptors,
            executor,
            sink,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Set how long shutdown waits for in-flight cycles.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
