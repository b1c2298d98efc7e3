// CLASSIFICATION: COMMUNITY
// Filename: sysfs.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-07-10

//! Sysfs reader facade.
//!
//! Two attribute reads are all the device manager needs per node: the
//! `subsystem` symlink (classification) and the `dev` file (`MAJOR:MINOR\n`).
//! Everything else in sysfs stays behind this facade.

use std::fs;
use std::path::{Path, PathBuf};

use log::error;
use thiserror::Error;

use crate::types::{Device, DeviceId, DeviceKind};

/// At most this many bytes of a `dev` file are ever parsed.
const DEV_FILE_MAX: usize = 16;

/// Malformed `dev` file content.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SysfsError {
    #[error("dev file is not MAJOR:MINOR: {0:?}")]
    MalformedDev(String),
}

/// Reads device attributes relative to one sysfs root.
#[derive(Debug, Clone)]
pub struct SysfsReader {
    root: PathBuf,
}

impl SysfsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a `devices/`-relative node directory.
    pub fn node_dir(&self, rel: &str) -> PathBuf {
        self.root.join("devices").join(rel)
    }

    /// Basename of the `subsystem` symlink for `rel`, or `None` when the
    /// link is absent or unreadable.
    pub fn read_subsystem(&self, rel: &str) -> Option<String> {
        let link = self.node_dir(rel).join("subsystem");
        let target = fs::read_link(link).ok()?;
        target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Device number from the `dev` attribute of `rel`.
    ///
    /// A missing file simply means the node is not openable. Malformed
    /// content is a kernel-side anomaly: it is logged here and the node is
    /// registered without a device.
    pub fn read_dev_file(&self, rel: &str) -> Option<DeviceId> {
        let path = self.node_dir(rel).join("dev");
        let raw = fs::read(&path).ok()?;
        let head = &raw[..raw.len().min(DEV_FILE_MAX)];
        match parse_dev(head) {
            Ok(id) => Some(id),
            Err(err) => {
                error!("sysfs: {}: {err}", path.display());
                None
            }
        }
    }
}

/// Parse `dev` file content: `decimal ":" decimal "\n"` (the trailing
/// newline is tolerated but not required).
pub fn parse_dev(raw: &[u8]) -> Result<DeviceId, SysfsError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| SysfsError::MalformedDev(String::from_utf8_lossy(raw).into_owned()))?;
    let text = text.trim_end_matches('\n');
    let malformed = || SysfsError::MalformedDev(text.to_string());
    let (major, minor) = text.split_once(':').ok_or_else(malformed)?;
    let major: u32 = major.parse().map_err(|_| malformed())?;
    let minor: u32 = minor.parse().map_err(|_| malformed())?;
    Ok(DeviceId::new(major, minor))
}

/// Classify a device number: block devices live in the `block` subsystem,
/// everything else is a character device.
pub fn make_device(subsystem: Option<&str>, id: DeviceId) -> Device {
    let kind = if subsystem == Some("block") {
        DeviceKind::Block
    } else {
        DeviceKind::Char
    };
    Device { kind, id }
}
