// CLASSIFICATION: COMMUNITY
// Filename: subsystem.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-08

//! Per-subsystem device index.
//!
//! Mirrors the `/class/<name>` view: the set of device paths currently
//! classified under each subsystem, with add/remove broadcast channels. All
//! mutation happens inside the device manager's locked region so the index
//! never disagrees with the tree it shadows.

use std::collections::BTreeSet;

use crate::broadcast::{Broadcast, Subscriber};

/// Index entry for one subsystem.
pub struct SubsystemIndex {
    devices: BTreeSet<String>,
    on_add: Broadcast<String>,
    on_remove: Broadcast<String>,
}

impl Default for SubsystemIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SubsystemIndex {
    pub fn new() -> Self {
        Self {
            devices: BTreeSet::new(),
            on_add: Broadcast::new(),
            on_remove: Broadcast::new(),
        }
    }

    /// Record `path` under this subsystem and announce it.
    pub fn add(&mut self, path: &str) {
        self.devices.insert(path.to_string());
        self.on_add.publish(path.to_string());
    }

    /// Forget `path` and announce the removal. Unknown paths are ignored
    /// silently; the caller warned already if that matters.
    pub fn remove(&mut self, path: &str) {
        if self.devices.remove(path) {
            self.on_remove.publish(path.to_string());
        }
    }

    /// Rename an entry in place. Used for kernel `move` events, which are
    /// neither an add nor a remove, so nothing is announced.
    pub fn rename(&mut self, old: &str, new: &str) {
        if self.devices.remove(old) {
            self.devices.insert(new.to_string());
        }
    }

    /// Current device paths, in sorted order.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.devices.contains(path)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Subscribe to future additions.
    pub fn subscribe_add(&self) -> Subscriber<String> {
        self.on_add.subscribe()
    }

    /// Subscribe to future removals.
    pub fn subscribe_remove(&self) -> Subscriber<String> {
        self.on_remove.subscribe()
    }
}
