//! Event gating and hand-off to consumers
//!
//! The dispatcher applies the operation filter and the per-cycle event cap,
//! then hands each surviving event to the consumer over a zero-capacity
//! channel. Every send also watches the cancellation signal, so a close
//! request interrupts a producer stuck behind a slow (or absent) consumer.

use crate::error::WatchError;
use ahash::AHashSet;
use crossbeam_channel::{select, Receiver, Sender, TryRecvError};
use pollwatch_core::{Event, Op};

/// Dispatch settings read once per poll cycle
#[derive(Debug, Clone, Default)]
pub struct DispatchPolicy {
    /// Forwarded operations; empty forwards everything
    ops: AHashSet<Op>,
    /// Maximum events per cycle; zero means unlimited
    max_events: usize,
}

impl DispatchPolicy {
    /// Replace the operation filter
    pub fn set_ops(&mut self, ops: impl IntoIterator<Item = Op>) {
        self.ops = ops.into_iter().collect();
    }

    /// Set the per-cycle cap (zero disables it)
    pub fn set_max_events(&mut self, max: usize) {
        self.max_events = max;
    }

    /// Whether events of this kind are forwarded
    pub fn allows(&self, op: Op) -> bool {
        self.ops.is_empty() || self.ops.contains(&op)
    }

    /// Per-cycle cap, zero when unlimited
    pub fn max_events(&self) -> usize {
        self.max_events
    }

    /// Forwarded operations, in declaration order; empty when unfiltered
    pub fn ops(&self) -> Vec<Op> {
        Op::ALL
            .into_iter()
            .filter(|op| self.ops.contains(op))
            .collect()
    }
}

/// Sending halves of the public channels
#[derive(Clone)]
pub(crate) struct Outlet {
    pub(crate) events: Sender<Event>,
    pub(crate) errors: Sender<WatchError>,
}

/// How a cycle's delivery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Every allowed event reached the consumer
    Completed { sent: usize },
    /// The cap was hit; `dropped` events (filtered or not) were discarded
    Truncated { sent: usize, dropped: usize },
    /// Close was requested mid-delivery
    Cancelled,
}

/// Hands events and errors to consumers for one poll loop
pub(crate) struct Dispatcher<'a> {
    outlet: &'a Outlet,
    cancel: &'a Receiver<()>,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(outlet: &'a Outlet, cancel: &'a Receiver<()>) -> Self {
        Self { outlet, cancel }
    }

    /// Deliver one cycle's events under `policy`
    pub(crate) fn deliver(&self, events: Vec<Event>, policy: &DispatchPolicy) -> Delivery {
        let total = events.len();
        let mut sent = 0;

        for (idx, event) in events.into_iter().enumerate() {
            if !policy.allows(event.op) {
                continue;
            }

            if policy.max_events() > 0 && sent >= policy.max_events() {
                return Delivery::Truncated {
                    sent,
                    dropped: total - idx,
                };
            }

            if !send_or_cancel(&self.outlet.events, event, self.cancel) {
                return Delivery::Cancelled;
            }
            sent += 1;
        }

        Delivery::Completed { sent }
    }

    /// Report listing failures; returns false if cancelled
    pub(crate) fn report(&self, errors: Vec<WatchError>) -> bool {
        errors
            .into_iter()
            .all(|err| send_or_cancel(&self.outlet.errors, err, self.cancel))
    }
}

/// Block until `value` is received or `cancel` fires; true when received
pub(crate) fn send_or_cancel<T>(tx: &Sender<T>, value: T, cancel: &Receiver<()>) -> bool {
    // A pending close wins over a consumer that happens to be ready
    if is_cancelled(cancel) {
        return false;
    }

    select! {
        send(tx, value) -> res => res.is_ok(),
        recv(cancel) -> _ => false,
    }
}

/// Whether the cancellation signal has fired
pub(crate) fn is_cancelled(cancel: &Receiver<()>) -> bool {
    matches!(cancel.try_recv(), Err(TryRecvError::Disconnected))
}
