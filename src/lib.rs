// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.7
// Date Modified: 2026-07-26
// Author: Lukas Bower

//! Root library for the Cohesix device-model mirror and terminal I/O cores.
//!
//! `cohdev` keeps a live, concurrently queryable copy of the kernel's device
//! tree — cold-plugged from sysfs, then maintained from the uevent stream —
//! and multiplexes nonblocking terminal handles between concurrent readers
//! and writers.

/// Device path split/join helpers.
pub mod devpath;

/// Shared device identity types.
pub mod types;

/// Append-only broadcast channel with per-subscriber cursors.
pub mod broadcast;

/// Single-shot completion signals.
pub mod completion;

/// Kernel events and the shared event source.
pub mod event;

/// Immutable-by-replacement device tree.
pub mod tree;

/// Per-subsystem device index.
pub mod subsystem;

/// Sysfs attribute reader facade.
pub mod sysfs;

/// The device manager.
pub mod manager;

/// Ephemeral-mknod device handle broker.
pub mod handle;

/// Thin libc syscall facade.
pub mod sys;

/// Asynchronous terminal I/O cores.
pub mod term;

pub use event::{EventAction, EventSource, KernelEvent};
pub use handle::DevError;
pub use manager::DeviceManager;
pub use term::{TermError, Terminal};
pub use tree::DeviceNode;
pub use types::{Device, DeviceId, DeviceKind};
