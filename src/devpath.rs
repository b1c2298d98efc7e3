// CLASSIFICATION: COMMUNITY
// Filename: devpath.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-06-09

//! Device path helpers.
//!
//! Device paths are `/`-separated segment strings such as
//! `platform/serial8250/tty/ttyS0`. A leading slash is accepted and ignored;
//! the empty path names the tree root.

/// Split a device path into its first segment and the remainder.
///
/// The remainder has its own leading slash stripped, so repeated calls walk
/// the path one segment at a time. An empty input yields `("", "")`.
pub fn split(path: &str) -> (&str, &str) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.find('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => (trimmed, ""),
    }
}

/// Iterate the segments of a device path in order.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/')
        .unwrap_or(path)
        .split('/')
        .filter(|s| !s.is_empty())
}

/// Join a parent path and a child segment without doubling separators.
pub fn join(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}/{segment}")
    }
}
