// CLASSIFICATION: COMMUNITY
// Filename: event.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-07-02

//! Kernel object events and the shared event source.
//!
//! Uevent records are parsed upstream (the netlink listener is an external
//! collaborator); this module defines the in-process representation and the
//! broadcast channel the device manager and its observers consume.

use std::collections::BTreeMap;

use crate::broadcast::{Broadcast, Subscriber};

/// Detail key carrying the decimal major number on `add` events.
pub const DETAIL_MAJOR: &str = "MAJOR";
/// Detail key carrying the decimal minor number on `add` events.
pub const DETAIL_MINOR: &str = "MINOR";
/// Detail key carrying the previous device path on `move` events.
pub const DETAIL_DEVPATH_OLD: &str = "DEVPATH_OLD";
/// Detail key carrying the subsystem hint, when the kernel includes one.
pub const DETAIL_SUBSYSTEM: &str = "SUBSYSTEM";

/// Kernel event action, as carried in the uevent `ACTION` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    Add,
    Remove,
    Move,
    Change,
    Online,
    Offline,
    /// Any action this layer does not model explicitly (`bind`, `unbind`, ...).
    Other(String),
}

impl EventAction {
    /// Map a raw `ACTION` string onto an action variant.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "add" => EventAction::Add,
            "remove" => EventAction::Remove,
            "move" => EventAction::Move,
            "change" => EventAction::Change,
            "online" => EventAction::Online,
            "offline" => EventAction::Offline,
            other => EventAction::Other(other.to_string()),
        }
    }
}

/// A parsed kernel object event.
#[derive(Debug, Clone)]
pub struct KernelEvent {
    pub action: EventAction,
    /// Kernel object path, e.g. `/devices/platform/serial8250`.
    pub devpath: String,
    /// Remaining key/value payload of the uevent record.
    pub details: BTreeMap<String, String>,
}

impl KernelEvent {
    pub fn new(action: EventAction, devpath: impl Into<String>) -> Self {
        Self {
            action,
            devpath: devpath.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a detail key/value pair; chainable for construction sites.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Look up a detail value.
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

/// Shared inbound channel of kernel events.
///
/// The netlink listener publishes here; the device manager consumes a
/// subscription taken before cold-plug enumeration so nothing received during
/// the sysfs walk is lost.
#[derive(Clone, Default)]
pub struct EventSource {
    chan: Broadcast<KernelEvent>,
}

impl EventSource {
    pub fn new() -> Self {
        Self {
            chan: Broadcast::new(),
        }
    }

    /// Inject an event into the stream.
    pub fn publish(&self, event: KernelEvent) {
        self.chan.publish(event);
    }

    /// Open an independent cursor over future events.
    pub fn subscribe(&self) -> Subscriber<KernelEvent> {
        self.chan.subscribe()
    }

    /// Close the stream; consumers drain and then terminate.
    pub fn close(&self) {
        self.chan.close();
    }
}
