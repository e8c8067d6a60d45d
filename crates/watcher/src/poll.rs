//! The polling loop
//!
//! Each cycle lists every root under the state lock, releases the lock,
//! reports listing failures, diffs against the previous snapshot, hands the
//! events to the consumer and finally commits the new snapshot. The loop then
//! sleeps for the interval, waking early if the watcher is closed.

use crate::dispatch::{is_cancelled, Delivery, Dispatcher, Outlet};
use crate::state::{CyclePlan, WatchState};
use crossbeam_channel::{select, Receiver};
use parking_lot::Mutex;
use pollwatch_core::SnapshotDiff;
use std::time::Duration;
use tracing::{debug, info};

/// Drives poll cycles until the watcher is closed
pub(crate) struct PollLoop<'a> {
    state: &'a Mutex<WatchState>,
    outlet: Outlet,
    cancel: &'a Receiver<()>,
    interval: Duration,
}

impl<'a> PollLoop<'a> {
    pub(crate) fn new(
        state: &'a Mutex<WatchState>,
        outlet: Outlet,
        cancel: &'a Receiver<()>,
        interval: Duration,
    ) -> Self {
        Self {
            state,
            outlet,
            cancel,
            interval,
        }
    }

    /// Run until cancelled; returns the number of completed cycles
    pub(crate) fn run(self) -> u64 {
        info!("Starting poll loop (interval: {:?})", self.interval);

        let mut cycles = 0;
        while self.cycle() {
            cycles += 1;

            select! {
                recv(self.cancel) -> _ => break,
                default(self.interval) => {}
            }
        }

        info!("Poll loop stopped after {} cycles", cycles);
        cycles
    }

    /// One list/diff/deliver/commit pass; false once the loop must stop
    fn cycle(&self) -> bool {
        if is_cancelled(self.cancel) {
            return false;
        }

        let plan = {
            let mut state = self.state.lock();
            if !state.is_running() {
                return false;
            }
            state.begin_cycle()
        };
        let CyclePlan {
            previous,
            current,
            failures,
            policy,
            roots,
            generation,
        } = plan;

        let dispatcher = Dispatcher::new(&self.outlet, self.cancel);
        if !dispatcher.report(failures) {
            return false;
        }

        let diff = SnapshotDiff::compute(&previous, &current);
        drop(previous);
        if !diff.is_empty() {
            debug!(
                "Cycle found {} changes ({} modified, {} relocated, {} created, {} removed)",
                diff.len(),
                diff.modified.len(),
                diff.relocated.len(),
                diff.created.len(),
                diff.removed.len()
            );
        }

        match dispatcher.deliver(diff.into_events(), &policy) {
            Delivery::Cancelled => return false,
            Delivery::Truncated { sent, dropped } => {
                debug!("Event cap reached after {} events, dropped {}", sent, dropped);
            }
            Delivery::Completed { sent } if sent > 0 => debug!("Delivered {} events", sent),
            Delivery::Completed { .. } => {}
        }

        self.state.lock().commit(current, &roots, generation)
    }
}
