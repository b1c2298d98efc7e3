// CLASSIFICATION: COMMUNITY
// Filename: broadcast.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-06-22

//! Append-only broadcast channel.
//!
//! Producers append values to a shared log; every subscriber holds its own
//! cursor into that log and never blocks a producer. Subscribing observes
//! only values published after the subscription point. Closing the channel
//! wakes blocked subscribers, which then drain whatever remains and see
//! `None`.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

struct State<T> {
    log: Vec<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    cv: Condvar,
}

/// Multi-producer broadcast channel with independent subscriber cursors.
pub struct Broadcast<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Broadcast<T> {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    log: Vec::new(),
                    closed: false,
                }),
                cv: Condvar::new(),
            }),
        }
    }

    /// Append a value and wake blocked subscribers. Ignored after `close`.
    pub fn publish(&self, value: T) {
        let mut state = self.shared.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.log.push(value);
        self.shared.cv.notify_all();
    }

    /// Close the channel. Subscribers drain the remaining log, then see `None`.
    pub fn close(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.closed = true;
        self.shared.cv.notify_all();
    }

    /// Open a subscription starting at the current end of the log.
    pub fn subscribe(&self) -> Subscriber<T> {
        let state = self.shared.state.lock().unwrap();
        Subscriber {
            shared: Arc::clone(&self.shared),
            cursor: state.log.len(),
        }
    }
}

/// A reader cursor into a [`Broadcast`] channel.
pub struct Subscriber<T> {
    shared: Arc<Shared<T>>,
    cursor: usize,
}

impl<T: Clone> Subscriber<T> {
    /// Block until the next value is available. `None` once the channel is
    /// closed and drained.
    pub fn recv(&mut self) -> Option<T> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if self.cursor < state.log.len() {
                let value = state.log[self.cursor].clone();
                self.cursor += 1;
                return Some(value);
            }
            if state.closed {
                return None;
            }
            state = self.shared.cv.wait(state).unwrap();
        }
    }

    /// Return the next value if one is already buffered.
    pub fn try_recv(&mut self) -> Option<T> {
        let state = self.shared.state.lock().unwrap();
        if self.cursor < state.log.len() {
            let value = state.log[self.cursor].clone();
            self.cursor += 1;
            Some(value)
        } else {
            None
        }
    }

    /// Block for at most `timeout` waiting for the next value.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<T> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if self.cursor < state.log.len() {
                let value = state.log[self.cursor].clone();
                self.cursor += 1;
                return Some(value);
            }
            if state.closed {
                return None;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let (next, timed_out) = self.shared.cv.wait_timeout(state, deadline - now).unwrap();
            state = next;
            if timed_out.timed_out() && self.cursor >= state.log.len() {
                return None;
            }
        }
    }

    /// Number of buffered values this subscriber has not yet received.
    pub fn pending(&self) -> usize {
        let state = self.shared.state.lock().unwrap();
        state.log.len() - self.cursor
    }
}
