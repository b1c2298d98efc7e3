// CLASSIFICATION: COMMUNITY
// Filename: terminal_io.rs v0.3
// Author: Cohesix Codex
// Date Modified: 2026-07-28

//! Terminal core behaviour over real nonblocking pipes and socket pairs.

use std::os::fd::{AsFd, OwnedFd};
use std::thread;
use std::time::{Duration, Instant};

use cohdev::sys;
use cohdev::term::{TermError, TermInput, TermOutput, Terminal};
use serial_test::serial;

const WAIT: Duration = Duration::from_secs(2);

/// Write all of `bytes` into a nonblocking fd, retrying on a full buffer.
fn feed(fd: &OwnedFd, bytes: &[u8]) {
    let mut off = 0;
    let deadline = Instant::now() + WAIT;
    while off < bytes.len() {
        match sys::write(fd.as_fd(), &bytes[off..]) {
            Ok(n) => off += n,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                assert!(Instant::now() < deadline, "peer never drained");
                thread::sleep(Duration::from_millis(1));
            }
            Err(err) => panic!("feed failed: {err}"),
        }
    }
}

/// Drain exactly `n` bytes from a nonblocking fd.
fn drain(fd: &OwnedFd, n: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(n);
    let mut chunk = [0u8; 4096];
    let deadline = Instant::now() + Duration::from_secs(5);
    while out.len() < n {
        match sys::read(fd.as_fd(), &mut chunk) {
            Ok(0) => panic!("stream ended after {} of {n} bytes", out.len()),
            Ok(got) => out.extend_from_slice(&chunk[..got]),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                assert!(Instant::now() < deadline, "writer stalled");
                thread::sleep(Duration::from_millis(1));
            }
            Err(err) => panic!("drain failed: {err}"),
        }
    }
    out
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
#[serial]
fn read_pipeline_with_staging() {
    let (r, w) = sys::pipe_nonblock().unwrap();
    let input = TermInput::spawn(r);

    // Request three bytes before any data exists.
    let pending = input.read_bytes(vec![0u8; 3]);
    assert!(!pending.is_ready());

    feed(&w, &[0x41, 0x42]);
    thread::sleep(Duration::from_millis(20));
    feed(&w, &[0x43, 0x44]);

    let buf = pending.wait_timeout(WAIT).expect("read completed").unwrap();
    assert_eq!(buf, vec![0x41, 0x42, 0x43]);

    // The fourth byte landed in staging; the next request is satisfied
    // without touching the handle again.
    wait_until("fourth byte staged", || input.staged() == 1);
    let tail = input.read_bytes(vec![0u8; 1]);
    assert!(tail.is_ready());
    assert_eq!(tail.wait().unwrap(), vec![0x44]);
}

#[test]
#[serial]
fn reads_complete_in_issue_order() {
    let (r, w) = sys::pipe_nonblock().unwrap();
    let input = TermInput::spawn(r);

    let first = input.read_bytes(vec![0u8; 2]);
    let second = input.read_bytes(vec![0u8; 2]);
    feed(&w, b"wxyz");

    assert_eq!(first.wait_timeout(WAIT).unwrap().unwrap(), b"wx".to_vec());
    assert_eq!(second.wait_timeout(WAIT).unwrap().unwrap(), b"yz".to_vec());
}

#[test]
#[serial]
fn eof_fails_pending_and_later_reads() {
    let (r, w) = sys::pipe_nonblock().unwrap();
    let input = TermInput::spawn(r);

    let pending = input.read_bytes(vec![0u8; 4]);
    feed(&w, b"hi");
    thread::sleep(Duration::from_millis(20));
    drop(w);

    match pending.wait_timeout(WAIT).expect("signalled on eof") {
        Err(TermError::Eof { partial, wanted }) => {
            assert_eq!(partial, b"hi".to_vec());
            assert_eq!(wanted, 4);
        }
        other => panic!("expected eof, got {other:?}"),
    }

    // The stream stays ended for later requests.
    match input.read_bytes(vec![0u8; 1]).wait() {
        Err(TermError::Eof { partial, wanted }) => {
            assert!(partial.is_empty());
            assert_eq!(wanted, 1);
        }
        other => panic!("expected eof, got {other:?}"),
    }
}

#[test]
#[serial]
fn short_writes_requeue_until_flushed() {
    let (r, w) = sys::pipe_nonblock().unwrap();
    let output = TermOutput::spawn(w);

    // Larger than the pipe buffer, so the writer takes several short counts.
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let completion = output.write_bytes(payload.clone());

    let echoed = drain(&r, payload.len());
    assert!(matches!(
        completion.wait_timeout(Duration::from_secs(5)),
        Some(Ok(()))
    ));
    assert_eq!(echoed, payload);
}

#[test]
#[serial]
fn writes_preserve_issue_order() {
    let (r, w) = sys::pipe_nonblock().unwrap();
    let output = TermOutput::spawn(w);

    let first = output.write_bytes(b"hello ".to_vec());
    let second = output.write_bytes(b"world".to_vec());

    assert_eq!(drain(&r, 11), b"hello world".to_vec());
    assert!(matches!(first.wait(), Ok(())));
    assert!(matches!(second.wait(), Ok(())));
}

#[test]
#[serial]
fn write_line_appends_newline_and_waits() {
    let (r, w) = sys::pipe_nonblock().unwrap();
    let output = TermOutput::spawn(w);

    output.write_line("status: ok").expect("line written");
    assert_eq!(drain(&r, 11), b"status: ok\n".to_vec());
}

#[test]
#[serial]
fn terminal_duplex_over_socketpair() {
    let (ours, peer) = sys::socketpair_nonblock().unwrap();
    let term = Terminal::new(ours).expect("terminal spawn");

    feed(&peer, b"K");
    assert_eq!(term.wait_for_key().unwrap(), b'K');

    feed(&peer, &[1, 2, 3, 4]);
    let arr: [u8; 4] = term.read_array().unwrap();
    assert_eq!(arr, [1, 2, 3, 4]);

    term.write_line("ping").expect("line written");
    assert_eq!(drain(&peer, 5), b"ping\n".to_vec());
}

#[test]
#[serial]
fn hard_handle_error_fails_backlog() {
    // Write side of a pipe whose reader is gone: poll raises ERR and the
    // backlog fails rather than spinning.
    let (r, w) = sys::pipe_nonblock().unwrap();
    drop(r);
    let output = TermOutput::spawn(w);

    let completion = output.write_bytes(b"doomed".to_vec());
    match completion.wait_timeout(WAIT).expect("failed promptly") {
        Err(TermError::Handle { .. }) | Err(TermError::Io { .. }) => {}
        other => panic!("expected handle failure, got {other:?}"),
    }
}
