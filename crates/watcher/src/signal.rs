//! One-shot broadcast signals built on zero-capacity channels

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

/// A signal that fires at most once and is observed by every receiver
///
/// Nothing is ever sent on the channel. Firing drops the only sender, after
/// which every receiver (including clones handed out earlier) sees the
/// channel as disconnected, so `recv` returns immediately and `select!`
/// arms on it become ready.
pub(crate) struct Latch {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl Latch {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Fire the signal; returns true only for the call that actually fired it
    pub(crate) fn fire(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    /// Block until the signal fires
    pub(crate) fn wait(&self) {
        // Only ever returns Err(RecvError) once the sender is gone
        let _ = self.rx.recv();
    }

    /// Receiver usable in `select!`
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}
