// CLASSIFICATION: COMMUNITY
// Filename: main.rs v0.3
// Date Modified: 2026-07-26
// Author: Lukas Bower

//! Entry point for the cohdevd device daemon.
//!
//! Mirrors the kernel device tree and logs subsystem appearances. The
//! netlink listener feeds `manager.event_source()` when one is wired in;
//! standalone runs still serve cold-plugged state.

use std::env;

use anyhow::{Context, Result};
use log::info;

use cohdev::DeviceManager;

fn main() -> Result<()> {
    env_logger::init();

    let sysfs = env::var("COHDEV_SYSFS_ROOT").unwrap_or_else(|_| "/sys".into());
    let devfs = env::var("COHDEV_DEVFS_ROOT").unwrap_or_else(|_| "/run/cohdev".into());

    let manager = DeviceManager::init(&sysfs, &devfs)
        .with_context(|| format!("bringing up device manager over {sysfs}"))?;

    for (path, node) in manager.list_devices() {
        info!(
            "device {path} [{}] {}",
            node.subsystem.as_deref().unwrap_or("-"),
            node.device.map(|d| d.to_string()).unwrap_or_default()
        );
    }
    info!("classes: {}", manager.list_device_classes().join(", "));

    let mut subsystems = manager.subscribe_subsystem_add();
    info!("cohdevd: watching for new subsystems");
    while let Some(name) = subsystems.recv() {
        info!("subsystem appeared: {name}");
    }
    Ok(())
}
