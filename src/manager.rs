// CLASSIFICATION: COMMUNITY
// Filename: manager.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-07-19

//! Device manager.
//!
//! Maintains the in-memory mirror of the kernel device model: cold-plug
//! enumeration walks sysfs once at startup, then a dedicated thread applies
//! the uevent stream. The tree and the subsystem index live behind one
//! read-write lock; every multi-structure update (tree edit, index edit,
//! channel emission) happens under the write guard so observers never see a
//! torn state. Lookups clone the current root `Arc` and walk the snapshot
//! without holding the lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::broadcast::{Broadcast, Subscriber};
use crate::devpath::{self, split};
use crate::event::{
    EventAction, EventSource, KernelEvent, DETAIL_DEVPATH_OLD, DETAIL_MAJOR, DETAIL_MINOR,
    DETAIL_SUBSYSTEM,
};
use crate::handle::{DevError, HandleBroker};
use crate::subsystem::SubsystemIndex;
use crate::sysfs::{make_device, SysfsReader};
use crate::tree::{self, DeviceNode};
use crate::types::{Device, DeviceId};

struct ManagerState {
    root: Arc<DeviceNode>,
    subsystems: HashMap<String, SubsystemIndex>,
}

struct ManagerShared {
    sysfs: SysfsReader,
    state: RwLock<ManagerState>,
    on_subsystem_add: Broadcast<String>,
}

/// Live mirror of the kernel's device tree.
pub struct DeviceManager {
    shared: Arc<ManagerShared>,
    broker: HandleBroker,
    events: EventSource,
    worker: Option<JoinHandle<()>>,
}

impl DeviceManager {
    /// Bring up the manager over a sysfs root and a managed devfs root.
    ///
    /// The inbound event subscription is opened before enumeration starts,
    /// so uevents delivered while the sysfs walk is still running queue up
    /// and are applied afterwards rather than being lost.
    pub fn init(
        sysfs_root: impl Into<PathBuf>,
        devfs_root: impl Into<PathBuf>,
    ) -> Result<Self, DevError> {
        let devfs = devfs_root.into();
        fs::create_dir_all(&devfs).map_err(|e| DevError::Sys {
            call: "mkdir",
            source: e,
        })?;

        let events = EventSource::new();
        let mut inbound = events.subscribe();

        let shared = Arc::new(ManagerShared {
            sysfs: SysfsReader::new(sysfs_root),
            state: RwLock::new(ManagerState {
                root: DeviceNode::create(None, None),
                subsystems: HashMap::new(),
            }),
            on_subsystem_add: Broadcast::new(),
        });

        coldplug(&shared);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || {
            while let Some(ev) = inbound.recv() {
                handle_event(&worker_shared, &ev);
            }
            debug!("manager: event stream closed, worker exiting");
        });

        info!(
            "manager: initialised over {} ({} devices cold-plugged)",
            shared.sysfs.root().display(),
            tree::collect_devices(&shared.state.read().unwrap().root).len()
        );

        Ok(Self {
            shared,
            broker: HandleBroker::new(devfs),
            events,
            worker: Some(worker),
        })
    }

    /// The inbound event channel. The netlink listener publishes parsed
    /// uevents here.
    pub fn event_source(&self) -> &EventSource {
        &self.events
    }

    /// Snapshot lookup of a device path. Non-suspending.
    pub fn device_lookup(&self, path: &str) -> Option<Arc<DeviceNode>> {
        let root = Arc::clone(&self.shared.state.read().unwrap().root);
        tree::lookup(&root, path)
    }

    /// All nodes carrying a device identity, sorted by path.
    pub fn list_devices(&self) -> Vec<(String, Arc<DeviceNode>)> {
        let root = Arc::clone(&self.shared.state.read().unwrap().root);
        tree::collect_devices(&root)
    }

    /// All subsystem names seen so far, sorted.
    pub fn list_device_classes(&self) -> Vec<String> {
        let state = self.shared.state.read().unwrap();
        let mut classes: Vec<String> = state.subsystems.keys().cloned().collect();
        classes.sort();
        classes
    }

    /// `(path, node)` pairs for every device currently classified under
    /// `class`, resolved against the current tree snapshot.
    pub fn list_devices_with_class(&self, class: &str) -> Vec<(String, Arc<DeviceNode>)> {
        let state = self.shared.state.read().unwrap();
        let root = Arc::clone(&state.root);
        match state.subsystems.get(class) {
            Some(index) => index
                .devices()
                .filter_map(|path| tree::lookup(&root, path).map(|node| (path.to_string(), node)))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Device paths currently classified under `class`, sorted.
    pub fn class_devices(&self, class: &str) -> Vec<String> {
        let state = self.shared.state.read().unwrap();
        match state.subsystems.get(class) {
            Some(index) => index.devices().map(str::to_string).collect(),
            None => Vec::new(),
        }
    }

    /// Subscribe to first-appearance announcements of subsystems.
    pub fn subscribe_subsystem_add(&self) -> Subscriber<String> {
        self.shared.on_subsystem_add.subscribe()
    }

    /// Subscribe to device additions under `class`, if the class is known.
    pub fn subscribe_class_add(&self, class: &str) -> Option<Subscriber<String>> {
        let state = self.shared.state.read().unwrap();
        state.subsystems.get(class).map(|i| i.subscribe_add())
    }

    /// Subscribe to device removals under `class`, if the class is known.
    pub fn subscribe_class_remove(&self, class: &str) -> Option<Subscriber<String>> {
        let state = self.shared.state.read().unwrap();
        state.subsystems.get(class).map(|i| i.subscribe_remove())
    }

    /// Open a handle to `device` through the ephemeral-mknod broker.
    pub fn get_device_handle(&self, device: Device) -> Result<OwnedFd, DevError> {
        self.broker.open_device(device)
    }

    /// Resolve `path` in the tree, then open the device it names.
    pub fn get_device_handle_by_name(&self, path: &str) -> Result<OwnedFd, DevError> {
        let node = self
            .device_lookup(path)
            .ok_or_else(|| DevError::EntryNotFound(path.to_string()))?;
        let device = node
            .device
            .ok_or_else(|| DevError::DeviceNotFound(path.to_string()))?;
        self.broker.open_device(device)
    }

    /// Close a handle obtained from this manager.
    pub fn release_device_handle(handle: OwnedFd) {
        drop(handle);
    }

    /// Open the `./dev/{char|block}/{major}:{minor}` directory for `device`.
    pub fn open_device_dir(&self, device: Device) -> Result<OwnedFd, DevError> {
        self.broker.open_device_dir(device)
    }

    /// Close the event stream and join the worker thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.events.close();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Best-effort recursive walk of `<sysfs>/devices`; every real directory
/// becomes a synthetic add. Listing failures are logged and skipped — the
/// event stream repairs anything the walk missed.
fn coldplug(shared: &ManagerShared) {
    let base = shared.sysfs.root().join("devices");
    walk(shared, &base, "");
}

fn walk(shared: &ManagerShared, dir: &Path, rel: &str) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("coldplug: cannot list {}: {err}", dir.display());
            return;
        }
    };
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("coldplug: bad entry under {}: {err}", dir.display());
                continue;
            }
        };
        // file_type() does not follow symlinks, so `subsystem`-style links
        // and cross-links between buses are skipped rather than recursed.
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let child_rel = devpath::join(rel, &name);
        device_add(shared, &child_rel, None);
        walk(shared, &entry.path(), &child_rel);
    }
}

fn handle_event(shared: &ManagerShared, ev: &KernelEvent) {
    let (head, rest) = split(&ev.devpath);
    match head {
        "devices" => match &ev.action {
            EventAction::Add => device_add(shared, rest, Some(ev)),
            EventAction::Remove => device_remove(shared, rest, ev),
            EventAction::Move => {
                if let Err(err) = device_move(shared, rest, ev) {
                    error!("manager: move for {}: {err}", ev.devpath);
                }
            }
            EventAction::Change
            | EventAction::Online
            | EventAction::Offline
            | EventAction::Other(_) => publish_state_change(shared, rest, ev),
        },
        "module" => debug!("manager: ignoring module event {}", ev.devpath),
        _ => warn!("manager: unhandled event path {}", ev.devpath),
    }
}

/// Device identity from event details, when both numbers are present and
/// parse. Anything else falls back to sysfs.
fn id_from_details(ev: &KernelEvent) -> Option<DeviceId> {
    let major: u32 = ev.detail(DETAIL_MAJOR)?.parse().ok()?;
    let minor: u32 = ev.detail(DETAIL_MINOR)?.parse().ok()?;
    Some(DeviceId::new(major, minor))
}

fn device_add(shared: &ManagerShared, path: &str, ev: Option<&KernelEvent>) {
    if path.is_empty() {
        warn!("manager: add event addressed the tree root, ignoring");
        return;
    }
    let subsystem = ev
        .and_then(|e| e.detail(DETAIL_SUBSYSTEM))
        .map(str::to_string)
        .or_else(|| shared.sysfs.read_subsystem(path));
    let id = ev
        .and_then(id_from_details)
        .or_else(|| shared.sysfs.read_dev_file(path));
    let device = id.map(|id| make_device(subsystem.as_deref(), id));
    if device.is_some() && subsystem.is_none() {
        warn!("manager: {path} carries a dev file but no subsystem link");
    }

    let node = DeviceNode::create(subsystem.clone(), device);
    let mut state = shared.state.write().unwrap();
    state.root = tree::insert(&state.root, path, node);
    if let Some(name) = subsystem {
        match state.subsystems.entry(name) {
            Entry::Vacant(slot) => {
                // Announce the subsystem itself before its first device.
                shared.on_subsystem_add.publish(slot.key().clone());
                slot.insert(SubsystemIndex::new()).add(path);
            }
            Entry::Occupied(mut slot) => slot.get_mut().add(path),
        }
    }
    debug!("manager: added {path}");
}

fn device_remove(shared: &ManagerShared, path: &str, ev: &KernelEvent) {
    if path.is_empty() {
        warn!("manager: remove event addressed the tree root, ignoring");
        return;
    }
    let mut state = shared.state.write().unwrap();
    let node = match tree::lookup(&state.root, path) {
        Some(node) => node,
        None => {
            warn!("manager: remove for unknown path {path}");
            return;
        }
    };
    node.events().on_remove.publish(ev.clone());
    state.root = tree::remove(&state.root, path);
    if let Some(name) = node.subsystem.as_deref() {
        if let Some(index) = state.subsystems.get_mut(name) {
            index.remove(path);
        }
    }
    debug!("manager: removed {path}");
}

fn device_move(shared: &ManagerShared, path: &str, ev: &KernelEvent) -> Result<(), DevError> {
    let old_raw = ev
        .detail(DETAIL_DEVPATH_OLD)
        .ok_or(DevError::MalformedEvent("move event without DEVPATH_OLD"))?;
    let (old_head, old_rest) = split(old_raw);
    if old_head != "devices" || old_rest.is_empty() {
        return Err(DevError::MalformedEvent("DEVPATH_OLD outside /devices"));
    }

    let mut state = shared.state.write().unwrap();
    match tree::lookup(&state.root, old_rest) {
        Some(node) => {
            state.root = tree::relocate(&state.root, old_rest, path);
            if let Some(name) = node.subsystem.as_deref() {
                if let Some(index) = state.subsystems.get_mut(name) {
                    index.rename(old_rest, path);
                }
            }
            node.events().on_move.publish(ev.clone());
            debug!("manager: moved {old_rest} -> {path}");
        }
        None => {
            warn!("manager: move source {old_rest} unknown, treating as add of {path}");
            drop(state);
            device_add(shared, path, Some(ev));
        }
    }
    Ok(())
}

fn publish_state_change(shared: &ManagerShared, path: &str, ev: &KernelEvent) {
    let root = Arc::clone(&shared.state.read().unwrap().root);
    match tree::lookup(&root, path) {
        Some(node) => {
            if let Some(chan) = node.events().channel_for(&ev.action) {
                chan.publish(ev.clone());
            }
        }
        None => warn!("manager: {:?} event for unknown path {path}", ev.action),
    }
}
