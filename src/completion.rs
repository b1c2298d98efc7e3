// CLASSIFICATION: COMMUNITY
// Filename: completion.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-06-22

//! Single-shot completion signals.
//!
//! A completion becomes signalled at most once. The worker side holds the
//! [`Signal`], the requester holds the [`Completion`]; either side may be
//! dropped independently, and a dropped signal surfaces as `None` to the
//! waiter rather than blocking it forever.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::time::Duration;

/// Create a linked signal/completion pair.
pub fn pair<T>() -> (Signal<T>, Completion<T>) {
    let (tx, rx) = bounded(1);
    (Signal { tx }, Completion { rx })
}

/// The firing side of a completion. Consumed on use.
pub struct Signal<T> {
    tx: Sender<T>,
}

impl<T> Signal<T> {
    /// Fire the completion with `value`. A vanished waiter is not an error.
    pub fn fire(self, value: T) {
        let _ = self.tx.send(value);
    }
}

/// The waiting side of a single-shot signal.
pub struct Completion<T> {
    rx: Receiver<T>,
}

impl<T> Completion<T> {
    /// A completion that is already signalled with `value`.
    pub fn ready(value: T) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(value);
        Completion { rx }
    }

    /// Block until the signal fires. `None` if the signal side was dropped
    /// without firing.
    pub fn wait(self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Check for the value without blocking. Consumes the completion only on
    /// a hit.
    pub fn poll(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Whether the signal has fired and the value is waiting.
    pub fn is_ready(&self) -> bool {
        !self.rx.is_empty()
    }
}
