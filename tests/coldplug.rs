// CLASSIFICATION: COMMUNITY
// Filename: coldplug.rs v0.2
// Author: Cohesix Codex
// Date Modified: 2026-07-27

//! Cold-plug enumeration against a faked sysfs root.

use std::fs;
use std::os::unix::fs::symlink;
use std::sync::Arc;

use cohdev::{DeviceKind, DeviceManager};
use tempfile::{tempdir, TempDir};

/// Build a sysfs root holding one char device at `platform/foo`,
/// classified under `xyz` with dev number 240:5.
fn fake_sysfs() -> TempDir {
    let root = tempdir().expect("sysfs tempdir");
    let foo = root.path().join("devices/platform/foo");
    fs::create_dir_all(&foo).unwrap();
    fs::create_dir_all(root.path().join("class/xyz")).unwrap();
    symlink(root.path().join("class/xyz"), foo.join("subsystem")).unwrap();
    fs::write(foo.join("dev"), b"240:5\n").unwrap();
    root
}

#[test]
fn cold_plug_single_device() {
    let _ = env_logger::builder().is_test(true).try_init();
    let sysfs = fake_sysfs();
    let devfs = tempdir().unwrap();
    let manager = DeviceManager::init(sysfs.path(), devfs.path()).expect("manager init");

    let node = manager
        .device_lookup("/platform/foo")
        .expect("cold-plugged node present");
    assert_eq!(node.subsystem.as_deref(), Some("xyz"));
    let device = node.device.expect("dev file parsed");
    assert_eq!(device.kind, DeviceKind::Char);
    assert_eq!((device.id.major, device.id.minor), (240, 5));

    // Intermediate directories become anonymous nodes.
    let platform = manager.device_lookup("platform").expect("ancestor present");
    assert!(platform.subsystem.is_none());
    assert!(platform.device.is_none());

    let listed = manager.list_devices_with_class("xyz");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].0, "platform/foo");
    assert!(Arc::ptr_eq(&listed[0].1, &node));

    assert_eq!(manager.list_device_classes(), vec!["xyz".to_string()]);
    let devices = manager.list_devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].0, "platform/foo");
}

#[test]
fn cold_plug_skips_symlinks_and_files() {
    let _ = env_logger::builder().is_test(true).try_init();
    let sysfs = fake_sysfs();
    // A stray file and a directory symlink must not become nodes.
    fs::write(sysfs.path().join("devices/uevent"), b"").unwrap();
    symlink(
        sysfs.path().join("class"),
        sysfs.path().join("devices/loopback"),
    )
    .unwrap();

    let devfs = tempdir().unwrap();
    let manager = DeviceManager::init(sysfs.path(), devfs.path()).expect("manager init");

    assert!(manager.device_lookup("uevent").is_none());
    assert!(manager.device_lookup("loopback").is_none());
    assert!(manager.device_lookup("platform/foo").is_some());
}

#[test]
fn cold_plug_without_dev_file_registers_bare_node() {
    let _ = env_logger::builder().is_test(true).try_init();
    let sysfs = tempdir().unwrap();
    let bare = sysfs.path().join("devices/virtual/misc");
    fs::create_dir_all(&bare).unwrap();

    let devfs = tempdir().unwrap();
    let manager = DeviceManager::init(sysfs.path(), devfs.path()).expect("manager init");

    let node = manager.device_lookup("virtual/misc").expect("node present");
    assert!(node.device.is_none());
    assert!(node.subsystem.is_none());
    assert!(manager.list_devices().is_empty());
}

#[test]
fn cold_plug_tolerates_malformed_dev_file() {
    let _ = env_logger::builder().is_test(true).try_init();
    let sysfs = tempdir().unwrap();
    let node_dir = sysfs.path().join("devices/platform/broken");
    fs::create_dir_all(&node_dir).unwrap();
    fs::write(node_dir.join("dev"), b"not-a-devno\n").unwrap();

    let devfs = tempdir().unwrap();
    let manager = DeviceManager::init(sysfs.path(), devfs.path()).expect("manager init");

    // The anomaly is logged and the node is kept, without a device.
    let node = manager.device_lookup("platform/broken").expect("node kept");
    assert!(node.device.is_none());
}
