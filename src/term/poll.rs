// CLASSIFICATION: COMMUNITY
// Filename: poll.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-20

//! Readiness waits for the terminal workers.

use std::io;
use std::os::fd::BorrowedFd;

use bitflags::bitflags;

use crate::sys;

bitflags! {
    /// Raised `poll(2)` revents bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PollFlags: i16 {
        const IN = libc::POLLIN;
        const OUT = libc::POLLOUT;
        const ERR = libc::POLLERR;
        const HUP = libc::POLLHUP;
        const NVAL = libc::POLLNVAL;
    }
}

impl PollFlags {
    /// Conditions that end a stream outright. `HUP` is deliberately not
    /// included: a hung-up input side may still have buffered bytes, and the
    /// next zero-length read reports the end cleanly.
    pub fn is_fatal(self) -> bool {
        self.intersects(PollFlags::ERR | PollFlags::NVAL)
    }
}

/// Block until `fd` is readable or an error condition is raised.
pub fn wait_readable(fd: BorrowedFd<'_>) -> io::Result<PollFlags> {
    sys::poll(fd, PollFlags::IN.bits()).map(PollFlags::from_bits_truncate)
}

/// Block until `fd` is writable or an error condition is raised.
pub fn wait_writable(fd: BorrowedFd<'_>) -> io::Result<PollFlags> {
    sys::poll(fd, PollFlags::OUT.bits()).map(PollFlags::from_bits_truncate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    #[test]
    fn writable_pipe_reports_out() {
        let (_r, w) = crate::sys::pipe_nonblock().unwrap();
        let flags = wait_writable(w.as_fd()).unwrap();
        assert!(flags.contains(PollFlags::OUT));
    }

    #[test]
    fn hup_alone_is_not_fatal() {
        assert!(!PollFlags::HUP.is_fatal());
        assert!(PollFlags::ERR.is_fatal());
        assert!((PollFlags::HUP | PollFlags::NVAL).is_fatal());
    }
}
