// CLASSIFICATION: COMMUNITY
// Filename: input.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-07-24

//! Terminal input core.
//!
//! A single reader thread owns the handle. Requests drain the staging buffer
//! first; whatever is still missing is queued as a waiter, and the reader
//! delivers syscall results directly into the waiter's buffer. New requests
//! are pushed at the head of the queue and the reader services the tail, so
//! requests complete in issue order. When nobody is waiting, arriving bytes
//! land in the staging buffer until a later request claims them.

use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::debug;

use crate::completion::{self, Completion, Signal};

use super::poll;
use super::{ReadCompletion, TermError};

/// Staging capacity. One page of backlog is plenty for a terminal; the
/// reader parks when it fills and nobody is draining.
const STAGING_CAP: usize = 4096;

/// Linear staging buffer with the ring's drain-and-reset discipline:
/// `read_off <= write_off <= cap`, both reset to zero once fully drained.
struct Staging {
    buf: Vec<u8>,
    read_off: usize,
    write_off: usize,
}

impl Staging {
    fn new() -> Self {
        Self {
            buf: vec![0; STAGING_CAP],
            read_off: 0,
            write_off: 0,
        }
    }

    fn available(&self) -> usize {
        self.write_off - self.read_off
    }

    fn has_space(&self) -> bool {
        self.write_off < self.buf.len()
    }

    /// Copy up to `dst.len()` staged bytes out, advancing the read offset.
    fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let n = self.available().min(dst.len());
        dst[..n].copy_from_slice(&self.buf[self.read_off..self.read_off + n]);
        self.read_off += n;
        if self.read_off == self.write_off {
            self.read_off = 0;
            self.write_off = 0;
        }
        n
    }

    fn space(&mut self) -> &mut [u8] {
        &mut self.buf[self.write_off..]
    }

    fn commit(&mut self, n: usize) {
        self.write_off += n;
        debug_assert!(self.write_off <= self.buf.len());
    }
}

struct Waiter {
    buf: Vec<u8>,
    filled: usize,
    signal: Signal<Result<Vec<u8>, TermError>>,
}

/// Why the stream stopped, when it has.
#[derive(Clone)]
enum StreamEnd {
    Eof,
    Failed(TermError),
}

struct InputState {
    waiters: std::collections::VecDeque<Waiter>,
    staging: Staging,
    ended: Option<StreamEnd>,
}

struct InputShared {
    fd: OwnedFd,
    state: Mutex<InputState>,
    cv: Condvar,
}

/// Reader state machine over one nonblocking handle.
pub struct TermInput {
    shared: Arc<InputShared>,
}

impl TermInput {
    /// Take ownership of the read side and spawn the reader thread.
    pub fn spawn(fd: OwnedFd) -> Self {
        let shared = Arc::new(InputShared {
            fd,
            state: Mutex::new(InputState {
                waiters: std::collections::VecDeque::new(),
                staging: Staging::new(),
                ended: None,
            }),
            cv: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        thread::spawn(move || reader_loop(worker));
        Self { shared }
    }

    /// Request the next `dst.len()` bytes of the stream.
    ///
    /// Staged bytes are claimed immediately; if they satisfy the request the
    /// returned completion is already signalled. Otherwise the partially
    /// filled buffer is parked as a waiter and the reader finishes it.
    pub fn read_bytes(&self, mut dst: Vec<u8>) -> ReadCompletion {
        let wanted = dst.len();
        let mut state = self.shared.state.lock().unwrap();
        let copied = state.staging.drain_into(&mut dst);
        if copied > 0 {
            // Freed staging space; the reader may be parked on a full buffer.
            self.shared.cv.notify_one();
        }
        if copied == wanted {
            return ReadCompletion(Completion::ready(Ok(dst)));
        }
        match &state.ended {
            Some(StreamEnd::Eof) => {
                dst.truncate(copied);
                ReadCompletion(Completion::ready(Err(TermError::Eof {
                    partial: dst,
                    wanted,
                })))
            }
            Some(StreamEnd::Failed(err)) => ReadCompletion(Completion::ready(Err(err.clone()))),
            None => {
                debug_assert_eq!(state.staging.available(), 0);
                let (signal, completion) = completion::pair();
                state.waiters.push_front(Waiter {
                    buf: dst,
                    filled: copied,
                    signal,
                });
                self.shared.cv.notify_one();
                ReadCompletion(completion)
            }
        }
    }

    /// Bytes currently staged but unclaimed. Test and introspection hook.
    pub fn staged(&self) -> usize {
        self.shared.state.lock().unwrap().staging.available()
    }
}

fn end_stream(state: &mut InputState, end: StreamEnd) {
    state.ended = Some(end.clone());
    while let Some(waiter) = state.waiters.pop_back() {
        let wanted = waiter.buf.len();
        let mut partial = waiter.buf;
        partial.truncate(waiter.filled);
        let err = match &end {
            StreamEnd::Eof => TermError::Eof { partial, wanted },
            StreamEnd::Failed(err) => err.clone(),
        };
        waiter.signal.fire(Err(err));
    }
}

fn reader_loop(shared: Arc<InputShared>) {
    loop {
        // Park until a read could make progress.
        {
            let mut state = shared.state.lock().unwrap();
            loop {
                if state.ended.is_some() {
                    return;
                }
                if !state.waiters.is_empty() || state.staging.has_space() {
                    break;
                }
                state = shared.cv.wait(state).unwrap();
            }
        }

        let revents = match poll::wait_readable(shared.fd.as_fd()) {
            Ok(revents) => revents,
            Err(err) => {
                let mut state = shared.state.lock().unwrap();
                end_stream(&mut state, StreamEnd::Failed(TermError::from_io(&err)));
                return;
            }
        };
        if revents.is_fatal() {
            debug!("term input: poll raised {revents:?}, failing stream");
            let mut state = shared.state.lock().unwrap();
            end_stream(&mut state, StreamEnd::Failed(TermError::Handle { flags: revents }));
            return;
        }
        // HUP alone falls through: drain until read reports the end.

        let mut state = shared.state.lock().unwrap();
        if let Some(waiter) = state.waiters.back_mut() {
            let filled = waiter.filled;
            match crate::sys::read(shared.fd.as_fd(), &mut waiter.buf[filled..]) {
                Ok(0) => {
                    end_stream(&mut state, StreamEnd::Eof);
                    return;
                }
                Ok(n) => {
                    waiter.filled += n;
                    if waiter.filled == waiter.buf.len() {
                        let done = state.waiters.pop_back().expect("back entry exists");
                        done.signal.fire(Ok(done.buf));
                    }
                }
                Err(err) => {
                    if !transient(&err) {
                        end_stream(&mut state, StreamEnd::Failed(TermError::from_io(&err)));
                        return;
                    }
                }
            }
        } else {
            let n = {
                let space = state.staging.space();
                if space.is_empty() {
                    // Raced with a new full staging; re-park.
                    continue;
                }
                crate::sys::read(shared.fd.as_fd(), space)
            };
            match n {
                Ok(0) => {
                    end_stream(&mut state, StreamEnd::Eof);
                    return;
                }
                Ok(n) => state.staging.commit(n),
                Err(err) => {
                    if !transient(&err) {
                        end_stream(&mut state, StreamEnd::Failed(TermError::from_io(&err)));
                        return;
                    }
                }
            }
        }
    }
}

fn transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_drain_resets_offsets() {
        let mut staging = Staging::new();
        let n = {
            let space = staging.space();
            space[..4].copy_from_slice(b"abcd");
            4
        };
        staging.commit(n);
        assert_eq!(staging.available(), 4);

        let mut out = [0u8; 2];
        assert_eq!(staging.drain_into(&mut out), 2);
        assert_eq!(&out, b"ab");
        assert_eq!(staging.available(), 2);
        assert_eq!(staging.read_off, 2);

        let mut rest = [0u8; 8];
        assert_eq!(staging.drain_into(&mut rest), 2);
        assert_eq!(&rest[..2], b"cd");
        // Fully drained: both offsets reset.
        assert_eq!(staging.read_off, 0);
        assert_eq!(staging.write_off, 0);
    }

    #[test]
    fn staging_space_shrinks_until_drained() {
        let mut staging = Staging::new();
        staging.commit(STAGING_CAP);
        assert!(!staging.has_space());
        let mut out = vec![0u8; STAGING_CAP];
        assert_eq!(staging.drain_into(&mut out), STAGING_CAP);
        assert!(staging.has_space());
    }
}
