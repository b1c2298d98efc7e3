// CLASSIFICATION: COMMUNITY
// Filename: output.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-07-24

//! Terminal output core.
//!
//! Writes queue FIFO; a single writer thread pops the oldest entry, waits
//! for the handle to accept data, and issues one nonblocking write. A short
//! count re-queues the remainder of the same entry at the service end, so a
//! request's completion fires only once every byte has left.

use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::debug;

use crate::completion::{self, Completion, Signal};

use super::poll::{self, PollFlags};
use super::{TermError, WriteCompletion};

struct WriteEntry {
    buf: Vec<u8>,
    off: usize,
    signal: Signal<Result<(), TermError>>,
}

struct OutputState {
    queue: std::collections::VecDeque<WriteEntry>,
    ended: Option<TermError>,
}

struct OutputShared {
    fd: OwnedFd,
    state: Mutex<OutputState>,
    cv: Condvar,
}

/// Writer state machine over one nonblocking handle.
pub struct TermOutput {
    shared: Arc<OutputShared>,
}

impl TermOutput {
    /// Take ownership of the write side and spawn the writer thread.
    pub fn spawn(fd: OwnedFd) -> Self {
        let shared = Arc::new(OutputShared {
            fd,
            state: Mutex::new(OutputState {
                queue: std::collections::VecDeque::new(),
                ended: None,
            }),
            cv: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        thread::spawn(move || writer_loop(worker));
        Self { shared }
    }

    /// Queue `src` for output. The completion fires once the final byte has
    /// been accepted by the handle.
    pub fn write_bytes(&self, src: Vec<u8>) -> WriteCompletion {
        let mut state = self.shared.state.lock().unwrap();
        if let Some(err) = &state.ended {
            return WriteCompletion(Completion::ready(Err(err.clone())));
        }
        if src.is_empty() {
            return WriteCompletion(Completion::ready(Ok(())));
        }
        let (signal, completion) = completion::pair();
        state.queue.push_front(WriteEntry {
            buf: src,
            off: 0,
            signal,
        });
        self.shared.cv.notify_one();
        WriteCompletion(completion)
    }

    /// Write `line` then a newline, waiting only on the newline. The payload
    /// stays pipelined behind it; FIFO service makes the order safe.
    pub fn write_line(&self, line: &str) -> Result<(), TermError> {
        let _payload = self.write_bytes(line.as_bytes().to_vec());
        self.write_bytes(vec![b'\n']).wait()
    }

    /// Entries still queued. Test and introspection hook.
    pub fn backlog(&self) -> usize {
        self.shared.state.lock().unwrap().queue.len()
    }
}

fn fail_all(state: &mut OutputState, err: TermError) {
    state.ended = Some(err.clone());
    while let Some(entry) = state.queue.pop_back() {
        entry.signal.fire(Err(err.clone()));
    }
}

fn writer_loop(shared: Arc<OutputShared>) {
    loop {
        // Park until there is something to write.
        {
            let mut state = shared.state.lock().unwrap();
            loop {
                if state.ended.is_some() {
                    return;
                }
                if !state.queue.is_empty() {
                    break;
                }
                state = shared.cv.wait(state).unwrap();
            }
        }

        let revents = match poll::wait_writable(shared.fd.as_fd()) {
            Ok(revents) => revents,
            Err(err) => {
                let mut state = shared.state.lock().unwrap();
                fail_all(&mut state, TermError::from_io(&err));
                return;
            }
        };
        // A hung-up or erroring sink can accept nothing more; fail the
        // backlog rather than spinning on a dead handle.
        if revents.is_fatal() || revents.contains(PollFlags::HUP) {
            debug!("term output: poll raised {revents:?}, failing backlog");
            let mut state = shared.state.lock().unwrap();
            fail_all(&mut state, TermError::Handle { flags: revents });
            return;
        }

        let mut state = shared.state.lock().unwrap();
        let Some(mut entry) = state.queue.pop_back() else {
            continue;
        };
        match crate::sys::write(shared.fd.as_fd(), &entry.buf[entry.off..]) {
            Ok(n) => {
                entry.off += n;
                if entry.off == entry.buf.len() {
                    entry.signal.fire(Ok(()));
                } else {
                    // Short count: the remainder goes back to the service
                    // end of the queue.
                    state.queue.push_back(entry);
                }
            }
            Err(err) if transient(&err) => {
                state.queue.push_back(entry);
            }
            Err(err) => {
                entry.signal.fire(Err(TermError::from_io(&err)));
                fail_all(&mut state, TermError::from_io(&err));
                return;
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
