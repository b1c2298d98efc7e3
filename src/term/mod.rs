// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-21

//! Asynchronous terminal I/O cores.
//!
//! One nonblocking handle is multiplexed between any number of concurrent
//! callers. Reads deliver straight into the caller's buffer, with a staging
//! buffer catching bytes that arrive while nobody is waiting; writes queue
//! FIFO and survive short counts. Each request returns a single-shot
//! completion the caller may wait on, so issuing work never suspends.

pub mod input;
pub mod output;
pub mod poll;

pub use input::TermInput;
pub use output::TermOutput;
pub use poll::PollFlags;

use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::time::Duration;

use thiserror::Error;

use crate::completion::Completion;
use crate::sys;

/// Terminal stream errors. Completions carry these, so the type is cheap to
/// clone per pending request.
#[derive(Debug, Clone, Error)]
pub enum TermError {
    /// The stream ended before the request was satisfied; the bytes that did
    /// arrive ride along so nothing delivered is ever dropped.
    #[error("end of stream after {} of {wanted} requested bytes", partial.len())]
    Eof { partial: Vec<u8>, wanted: usize },
    /// `poll` raised a fatal condition on the handle.
    #[error("terminal handle reported {flags:?}")]
    Handle { flags: PollFlags },
    /// A read or write syscall failed hard.
    #[error("terminal syscall failed: {}", io::Error::from_raw_os_error(*errno))]
    Io { errno: i32 },
    /// The worker for this stream is gone.
    #[error("terminal worker is gone")]
    Closed,
}

impl TermError {
    pub(crate) fn from_io(err: &io::Error) -> Self {
        TermError::Io {
            errno: err.raw_os_error().unwrap_or(0),
        }
    }
}

/// Completion of a `read_bytes` request; resolves to the filled buffer.
pub struct ReadCompletion(pub(crate) Completion<Result<Vec<u8>, TermError>>);

impl ReadCompletion {
    /// Block until the read completes.
    pub fn wait(self) -> Result<Vec<u8>, TermError> {
        self.0.wait().unwrap_or(Err(TermError::Closed))
    }

    /// Block for at most `timeout`; `None` means still pending.
    pub fn wait_timeout(self, timeout: Duration) -> Option<Result<Vec<u8>, TermError>> {
        self.0.wait_timeout(timeout)
    }

    pub fn is_ready(&self) -> bool {
        self.0.is_ready()
    }
}

/// Completion of a `write_bytes` request.
pub struct WriteCompletion(pub(crate) Completion<Result<(), TermError>>);

impl WriteCompletion {
    /// Block until every byte of the request has been written.
    pub fn wait(self) -> Result<(), TermError> {
        self.0.wait().unwrap_or(Err(TermError::Closed))
    }

    /// Block for at most `timeout`; `None` means still pending.
    pub fn wait_timeout(self, timeout: Duration) -> Option<Result<(), TermError>> {
        self.0.wait_timeout(timeout)
    }

    pub fn is_ready(&self) -> bool {
        self.0.is_ready()
    }
}

/// Both cores over one terminal handle.
pub struct Terminal {
    input: TermInput,
    output: TermOutput,
}

impl Terminal {
    /// Take ownership of a nonblocking handle and spawn the two workers.
    /// The handle is duplicated so each direction owns its fd.
    pub fn new(fd: OwnedFd) -> io::Result<Self> {
        let write_fd = sys::dup(fd.as_fd())?;
        Ok(Self {
            input: TermInput::spawn(fd),
            output: TermOutput::spawn(write_fd),
        })
    }

    /// Request the next `dst.len()` bytes of the input stream, delivered
    /// into `dst` itself.
    pub fn read_bytes(&self, dst: Vec<u8>) -> ReadCompletion {
        self.input.read_bytes(dst)
    }

    /// Queue `src` for output.
    pub fn write_bytes(&self, src: Vec<u8>) -> WriteCompletion {
        self.output.write_bytes(src)
    }

    /// Write `line` followed by a newline and wait for the newline to land.
    /// The payload is left pipelined behind it on purpose.
    pub fn write_line(&self, line: &str) -> Result<(), TermError> {
        self.output.write_line(line)
    }

    /// Synchronously read exactly `N` bytes.
    pub fn read_array<const N: usize>(&self) -> Result<[u8; N], TermError> {
        let buf = self.read_bytes(vec![0u8; N]).wait()?;
        let arr: [u8; N] = buf
            .try_into()
            .expect("completion preserves requested length");
        Ok(arr)
    }

    /// Block until any single byte arrives; the byte is consumed.
    pub fn wait_for_key(&self) -> Result<u8, TermError> {
        self.read_array::<1>().map(|b| b[0])
    }

    pub fn input(&self) -> &TermInput {
        &self.input
    }

    pub fn output(&self) -> &TermOutput {
        &self.output
    }
}
