//! Seams between the poll pipeline and its I/O collaborators.

use crate::error::Result;
use crate::metrics::data::{MetricPoint, SwitchTarget};
use async_trait::async_trait;

/// Runs one command on a switch over a fresh remote session.
///
/// Implementations open a new session per call, close it before returning,
/// and report failures as the executor variants of
/// [`CollectorError`](crate::CollectorError).
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute `command` on `target` and return its standard output, line by line.
    async fn execute(&self, target: &SwitchTarget, command: &str) -> Result<Vec<String>>;
}

/// Destination for completed metric points.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Write a batch of points. The batch is accepted or rejected as a whole.
    async fn write_batch(&self, points: &[MetricPoint]) -> Result<()>;
}
