//! Daily rotation worker
//!
//! Polls the wall clock and, once the configured time of day has passed,
//! flushes the meta log, resets the counters and switches output to a new
//! daily directory. Drift is bounded by one poll interval.

use crate::error::Result;
use crate::state::{with_state_blocking, SharedState};
use chrono::{Local, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// System local time
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// First instant strictly after `now` whose time of day is `at`
pub fn next_boundary(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        return today;
    }
    match now.date().succ_opt() {
        Some(tomorrow) => tomorrow.and_time(at),
        None => today,
    }
}

pub struct RotationScheduler {
    state: SharedState,
    clock: Arc<dyn Clock>,
    rotate_at: NaiveTime,
    poll_interval: Duration,
    next: NaiveDateTime,
}

impl RotationScheduler {
    pub fn new(
        state: SharedState,
        clock: Arc<dyn Clock>,
        rotate_at: NaiveTime,
        poll_interval: Duration,
    ) -> Self {
        let next = next_boundary(clock.now(), rotate_at);
        Self {
            state,
            clock,
            rotate_at,
            poll_interval,
            next,
        }
    }

    /// Next instant a rotation is due
    pub fn next_rotation(&self) -> NaiveDateTime {
        self.next
    }

    /// Rotate if the boundary has passed; returns whether a rotation happened
    ///
    /// A failed rotation keeps the boundary, so the next poll retries it.
    pub async fn tick(&mut self) -> Result<bool> {
        let now = self.clock.now();
        if now < self.next {
            return Ok(false);
        }

        let label = with_state_blocking(&self.state, move |state| {
            Ok(state.rotate(now.date())?.label())
        })
        .await?;

        self.next = next_boundary(now, self.rotate_at);
        tracing::info!(dir = %label, next = %self.next, "Daily rotation complete");
        Ok(true)
    }

    /// Poll until cancelled
    pub async fn run(mut self, token: CancellationToken) {
        tracing::info!(next = %self.next, "Rotation scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {},
            }

            if let Err(e) = self.tick().await {
                tracing::warn!(error = %e, "Rotation failed, retrying on next poll");
            }
        }

        tracing::info!("Rotation scheduler stopped");
    }
}
