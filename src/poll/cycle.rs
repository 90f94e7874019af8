//! One poll of one switch: execute → parse → map → write.

use crate::error::{CollectorError, Result};
use crate::metrics::data::{MetricPoint, SwitchTarget};
use crate::metrics::mapper::map_port_data;
use crate::poll::AppContext;
use crate::switch::parser::parse_port_data;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Stage of a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleState {
    Idle,
    Connecting,
    Executing,
    Parsing,
    Mapping,
    Writing,
    Done,
    Failed,
}

impl CycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CycleState::Done | CycleState::Failed)
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of a finished cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub id: Uuid,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// `Done` or `Failed`
    pub state: CycleState,
    /// Stage the cycle was in when it failed
    pub failed_in: Option<CycleState>,
    /// Number of points written, or why none were
    pub result: Result<usize>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn points_written(&self) -> usize {
        self.result.as_ref().copied().unwrap_or(0)
    }
}

/// A single poll of one target.
///
/// Nothing survives the cycle: each call to [`PollCycle::run`] starts from
/// `Idle` with a fresh session and ends in `Done` or `Failed`.
pub struct PollCycle<'a> {
    ctx: &'a AppContext,
    target: &'a SwitchTarget,
    id: Uuid,
    started_at: DateTime<Utc>,
    state: CycleState,
}

impl<'a> PollCycle<'a> {
    pub fn new(ctx: &'a AppContext, target: &'a SwitchTarget) -> Self {
        Self {
            ctx,
            target,
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: CycleState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn enter(&mut self, next: CycleState) {
        debug!(
            "[{}] {}: {} -> {}",
            self.id, self.target.name, self.state, next
        );
        self.state = next;
    }

    /// Run the cycle to completion and log its outcome.
    pub async fn run(mut self) -> CycleReport {
        let clock = Instant::now();

        let result = match self.collect().await {
            Ok(points) => self.write(&points).await,
            Err(e) => Err(e),
        };

        let failed_in = match &result {
            Ok(_) => {
                self.enter(CycleState::Done);
                None
            }
            Err(e) => {
                let stage = self.state;
                self.log_failure(stage, e);
                self.enter(CycleState::Failed);
                Some(stage)
            }
        };

        CycleReport {
            id: self.id,
            target: self.target.name.clone(),
            started_at: self.started_at,
            elapsed: clock.elapsed(),
            state: self.state,
            failed_in,
            result,
        }
    }

    /// Fetch, parse and map the target's counters without writing them.
    ///
    /// On error the cycle stays in the stage that failed.
    pub async fn collect(&mut self) -> Result<Vec<MetricPoint>> {
        info!("[{}] Polling {}", self.id, self.target.destination());

        self.enter(CycleState::Connecting);
        let lines = match self
            .ctx
            .executor
            .execute(self.target, &self.target.command)
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                if !e.is_connection_error() {
                    self.enter(CycleState::Executing);
                }
                return Err(e);
            }
        };
        self.enter(CycleState::Executing);
        debug!("[{}] {} returned {} lines", self.id, self.target.name, lines.len());

        self.enter(CycleState::Parsing);
        let ports = parse_port_data(lines.as_slice())?;

        self.enter(CycleState::Mapping);
        map_port_data(&ports, &self.ctx.descriptors, self.target)
    }

    /// Hand points to the sink. An empty set is not written.
    pub async fn write(&mut self, points: &[MetricPoint]) -> Result<usize> {
        self.enter(CycleState::Writing);

        if points.is_empty() {
            warn!("{} reported no ports; nothing to write", self.target.name);
            return Ok(0);
        }

        self.ctx.sink.write_batch(points).await?;
        debug!(
            "Sending {} metrics from {} to the metrics store: successful",
            points.len(),
            self.target.name
        );
        Ok(points.len())
    }

    fn log_failure(&self, stage: CycleState, err: &CollectorError) {
        match stage {
            CycleState::Connecting | CycleState::Executing => {
                error!(
                    "[{}] {} ({}): {}",
                    self.id,
                    self.target.name,
                    err.kind(),
                    err
                );
                warn!("No data received from {}", self.target.destination());
            }
            CycleState::Writing => {
                error!(
                    "[{}] Sending metrics from {} failed ({}): {}",
                    self.id,
                    self.target.name,
                    err.kind(),
                    err
                );
            }
            _ => {
                error!(
                    "[{}] {} poll aborted while {:?} ({}): {}",
                    self.id,
                    self.target.name,
                    stage,
                    err.kind(),
                    err
                );
            }
        }
    }
}
