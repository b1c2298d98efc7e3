// CLASSIFICATION: COMMUNITY
// Filename: handle.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-07-14

//! Device handle broker.
//!
//! Opens devices through ephemeral special files: a uniquely named node is
//! `mknod`ed under the managed devfs root, opened nonblocking, then unlinked
//! so nothing lingers in the namespace. An unlink failure leaks one devfs
//! name but never costs the caller a usable handle.

use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use thiserror::Error;

use crate::sys;
use crate::types::Device;

/// Errors surfaced by the device manager and broker.
#[derive(Debug, Error)]
pub enum DevError {
    /// The tree has no entry at the given path.
    #[error("no device tree entry at {0:?}")]
    EntryNotFound(String),
    /// The entry exists but carries no openable device identity.
    #[error("device not found at {0:?}")]
    DeviceNotFound(String),
    /// A missing or unusable event field, e.g. `DEVPATH_OLD` on a move.
    #[error("malformed event: {0}")]
    MalformedEvent(&'static str),
    /// A syscall failed.
    #[error("{call} failed: {source}")]
    Sys {
        call: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl DevError {
    fn sys(call: &'static str, source: std::io::Error) -> Self {
        DevError::Sys { call, source }
    }
}

/// Broker for ephemeral device special files under one devfs root.
pub struct HandleBroker {
    devfs: PathBuf,
    counter: AtomicU64,
}

impl HandleBroker {
    /// Attach to a devfs root. The monotonic name counter starts at zero.
    pub fn new(devfs: impl Into<PathBuf>) -> Self {
        Self {
            devfs: devfs.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Open `device`, returning a nonblocking read/write handle.
    pub fn open_device(&self, device: Device) -> Result<OwnedFd, DevError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.devfs.join(format!("dev{n}"));
        sys::mknod_dev(&path, device.kind, device.id)
            .map_err(|e| DevError::sys("mknod", e))?;
        let opened = sys::open_nonblock(&path).map_err(|e| DevError::sys("open", e));
        if let Err(err) = sys::unlink(&path) {
            warn!("handle: unlink {} failed: {err}", path.display());
        }
        let fd = opened?;
        debug!("handle: opened {device} via {}", path.display());
        Ok(fd)
    }

    /// Open the pre-existing `./dev/{char|block}/{major}:{minor}` directory
    /// entry for `device`.
    pub fn open_device_dir(&self, device: Device) -> Result<OwnedFd, DevError> {
        let path = self
            .devfs
            .join("dev")
            .join(device.kind.dir_name())
            .join(device.id.to_string());
        sys::open_dir(&path).map_err(|e| DevError::sys("open", e))
    }

    /// Devfs root this broker manages.
    pub fn devfs(&self) -> &std::path::Path {
        &self.devfs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceId, DeviceKind};
    use tempfile::tempdir;

    #[test]
    fn ephemeral_names_are_unique() {
        let dir = tempdir().unwrap();
        let broker = HandleBroker::new(dir.path());
        // mknod needs privilege; only the name counter is observable here.
        let device = Device {
            kind: DeviceKind::Char,
            id: DeviceId::new(1, 3),
        };
        let first = broker.open_device(device);
        let second = broker.open_device(device);
        // Either both opens worked (privileged run) or both failed the same
        // way; the counter must advance regardless.
        assert_eq!(broker.counter.load(Ordering::Relaxed), 2);
        drop((first, second));
    }

    #[test]
    fn device_dir_lookup_misses_cleanly() {
        let dir = tempdir().unwrap();
        let broker = HandleBroker::new(dir.path());
        let device = Device {
            kind: DeviceKind::Block,
            id: DeviceId::new(7, 2),
        };
        let err = broker.open_device_dir(device).unwrap_err();
        assert!(matches!(err, DevError::Sys { call: "open", .. }));
    }
}
