//! Minute-aligned scheduler driving one poll cycle per target per tick.
//!
//! A target whose previous cycle is still running when the next minute
//! starts has that tick skipped: two sessions to the same switch never
//! overlap, and a missed sample is preferred over a queue of stale ones.

use crate::metrics::data::SwitchTarget;
use crate::poll::cycle::{CycleReport, PollCycle};
use crate::poll::AppContext;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Cycles started
    pub dispatched: usize,
    /// Targets still busy with the previous cycle
    pub skipped: usize,
}

struct TargetSlot {
    target: Arc<SwitchTarget>,
    busy: Arc<Mutex<()>>,
}

/// Fires a poll cycle for every configured target at second `:00` of every
/// minute until cancelled.
pub struct PollScheduler {
    ctx: Arc<AppContext>,
    slots: Vec<TargetSlot>,
}

impl PollScheduler {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let slots = ctx
            .targets
            .iter()
            .map(|target| TargetSlot {
                target: target.clone(),
                busy: Arc::new(Mutex::new(())),
            })
            .collect();
        Self { ctx, slots }
    }

    /// Start a cycle for every idle target; skip the busy ones.
    ///
    /// Each spawned cycle holds its target's guard until it finishes.
    pub fn dispatch_tick(&self, tasks: &mut JoinSet<CycleReport>) -> TickReport {
        let mut report = TickReport::default();

        for slot in &self.slots {
            let guard = match slot.busy.clone().try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    warn!(
                        "Previous poll of {} is still running; skipping this tick",
                        slot.target.name
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            let ctx = self.ctx.clone();
            let target = slot.target.clone();
            tasks.spawn(async move {
                let _guard = guard;
                PollCycle::new(&ctx, &target).run().await
            });
            report.dispatched += 1;
        }

        report
    }

    /// Run until `shutdown` is cancelled, then give in-flight cycles the
    /// context's grace period before aborting them.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Scheduler started: polling {} target(s) every minute",
            self.slots.len()
        );

        let mut ticks = Box::pin(minute_ticks());
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested; no further polls will be scheduled");
                    break;
                }
                tick = ticks.next() => match tick {
                    Some(at) => {
                        let report = self.dispatch_tick(&mut tasks);
                        debug!(
                            "Tick {}: {} dispatched, {} skipped",
                            at.format("%H:%M:%S"),
                            report.dispatched,
                            report.skipped
                        );
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_joined(joined);
                }
            }
        }

        self.drain(tasks).await;
        info!("Scheduler stopped");
    }

    async fn drain(&self, mut tasks: JoinSet<CycleReport>) {
        if tasks.is_empty() {
            return;
        }

        let grace = self.ctx.shutdown_grace;
        info!(
            "Waiting up to {}s for {} in-flight poll(s)",
            grace.as_secs(),
            tasks.len()
        );

        let finished = tokio::time::timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                log_joined(joined);
            }
        })
        .await;

        if finished.is_err() {
            warn!(
                "Grace period expired; aborting {} poll(s)",
                tasks.len()
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}

fn log_joined(joined: Result<CycleReport, JoinError>) {
    match joined {
        Ok(report) => debug!(
            "[{}] {} finished {:?} in {}ms",
            report.id,
            report.target,
            report.state,
            report.elapsed.as_millis()
        ),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!("Poll task panicked: {}", e),
    }
}

/// Start of the minute after `now`.
///
/// A time exactly on a boundary maps to the following one.
pub fn next_minute_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let next = (now.timestamp().div_euclid(60) + 1) * 60;
    DateTime::<Utc>::from_timestamp(next, 0).unwrap_or(now + chrono::Duration::seconds(60))
}

/// Time left until [`next_minute_boundary`].
pub fn delay_until_next_minute(now: DateTime<Utc>) -> Duration {
    (next_minute_boundary(now) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Yields once at every wall-clock minute boundary.
///
/// An early wake-up never produces the same minute twice.
pub fn minute_ticks() -> impl Stream<Item = DateTime<Utc>> {
    stream::unfold(None, |last: Option<DateTime<Utc>>| async move {
        let now = Utc::now();
        let mut due = next_minute_boundary(now);
        if let Some(last) = last {
            if due <= last {
                due = next_minute_boundary(last);
            }
        }

        let wait = (due - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
        Some((due, Some(due)))
    })
}
