// CLASSIFICATION: COMMUNITY
// Filename: sys.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-07-12

//! Thin syscall facade.
//!
//! The only module that talks to `libc` or uses `unsafe`. Wrappers return
//! `io::Result` with the thread's errno captured, and hand back owned fds so
//! lifetimes stay with the type system.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::types::{DeviceId, DeviceKind};

fn cpath(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))
}

/// Open `path` read/write, nonblocking, close-on-exec.
pub fn open_nonblock(path: &Path) -> io::Result<OwnedFd> {
    let c = cpath(path)?;
    let fd = unsafe { libc::open(c.as_ptr(), libc::O_RDWR | libc::O_NONBLOCK | libc::O_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Open `path` as a directory handle.
pub fn open_dir(path: &Path) -> io::Result<OwnedFd> {
    let c = cpath(path)?;
    let fd = unsafe { libc::open(c.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Create a device special file for `kind`/`id` at `path`, mode 0600.
pub fn mknod_dev(path: &Path, kind: DeviceKind, id: DeviceId) -> io::Result<()> {
    let c = cpath(path)?;
    let ty = match kind {
        DeviceKind::Char => libc::S_IFCHR,
        DeviceKind::Block => libc::S_IFBLK,
    };
    let dev = libc::makedev(id.major, id.minor);
    let rc = unsafe { libc::mknod(c.as_ptr(), ty | 0o600, dev) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Remove a filesystem name.
pub fn unlink(path: &Path) -> io::Result<()> {
    let c = cpath(path)?;
    let rc = unsafe { libc::unlink(c.as_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Duplicate an fd (close-on-exec).
pub fn dup(fd: BorrowedFd<'_>) -> io::Result<OwnedFd> {
    let raw = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 0) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

/// One nonblocking read. `Ok(0)` is end-of-file.
pub fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

/// One nonblocking write.
pub fn write(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
    let n = unsafe { libc::write(fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

/// Block in `poll(2)` until `events` (or an error condition) is pending on
/// `fd`; returns the raised revents bits. Interruptions retry.
pub fn poll(fd: BorrowedFd<'_>, events: i16) -> io::Result<i16> {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events,
        revents: 0,
    };
    loop {
        let rc = unsafe { libc::poll(&mut pfd, 1, -1) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc > 0 {
            return Ok(pfd.revents);
        }
    }
}

/// Create a pipe pair, both ends nonblocking. Used by the terminal tests and
/// by callers that want an in-process byte stream behind the terminal cores.
pub fn pipe_nonblock() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

/// Create a connected nonblocking stream socket pair; a duplex stand-in for
/// a terminal handle.
pub fn socketpair_nonblock() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0i32; 2];
    let ty = libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
    let rc = unsafe { libc::socketpair(libc::AF_UNIX, ty, 0, fds.as_mut_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    #[test]
    fn pipe_round_trip() {
        let (r, w) = pipe_nonblock().unwrap();
        assert_eq!(write(w.as_fd(), b"abc").unwrap(), 3);
        let mut buf = [0u8; 8];
        assert_eq!(read(r.as_fd(), &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn empty_pipe_read_would_block() {
        let (r, _w) = pipe_nonblock().unwrap();
        let mut buf = [0u8; 4];
        let err = read(r.as_fd(), &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn closed_writer_reads_eof() {
        let (r, w) = pipe_nonblock().unwrap();
        drop(w);
        let mut buf = [0u8; 4];
        assert_eq!(read(r.as_fd(), &mut buf).unwrap(), 0);
    }
}
