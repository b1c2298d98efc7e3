// CLASSIFICATION: COMMUNITY
// Filename: tree.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-08

//! Immutable-by-replacement device tree.
//!
//! Every structural operation returns a new root; the owner of the shared
//! cell publishes that root atomically. Nodes along the rebuilt spine are
//! fresh `Arc`s, but each carries the same `Arc<NodeEvents>` as its
//! predecessor, so a subscription taken on a node keeps observing it across
//! re-publications. Untouched subtrees are shared, not copied.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::broadcast::Broadcast;
use crate::devpath::split;
use crate::event::{EventAction, KernelEvent};
use crate::types::Device;

/// The six per-node event channels.
///
/// `Add` is absent on purpose: an add materialises the node itself, so there
/// is nobody subscribed yet; it is observable through the subsystem index.
pub struct NodeEvents {
    pub on_remove: Broadcast<KernelEvent>,
    pub on_change: Broadcast<KernelEvent>,
    pub on_move: Broadcast<KernelEvent>,
    pub on_online: Broadcast<KernelEvent>,
    pub on_offline: Broadcast<KernelEvent>,
    pub on_other: Broadcast<KernelEvent>,
}

impl NodeEvents {
    fn new() -> Self {
        Self {
            on_remove: Broadcast::new(),
            on_change: Broadcast::new(),
            on_move: Broadcast::new(),
            on_online: Broadcast::new(),
            on_offline: Broadcast::new(),
            on_other: Broadcast::new(),
        }
    }

    /// Channel corresponding to a state-change action. `Add` has no per-node
    /// channel and `Remove`/`Move` are published by the manager at the point
    /// it restructures the tree.
    pub fn channel_for(&self, action: &EventAction) -> Option<&Broadcast<KernelEvent>> {
        match action {
            EventAction::Change => Some(&self.on_change),
            EventAction::Online => Some(&self.on_online),
            EventAction::Offline => Some(&self.on_offline),
            EventAction::Other(_) => Some(&self.on_other),
            EventAction::Add | EventAction::Remove | EventAction::Move => None,
        }
    }
}

/// One node of the device tree.
pub struct DeviceNode {
    /// Subsystem classification, when known.
    pub subsystem: Option<String>,
    /// Openable device identity, when this node represents one.
    pub device: Option<Device>,
    events: Arc<NodeEvents>,
    children: HashMap<String, Arc<DeviceNode>>,
}

impl DeviceNode {
    /// Allocate a detached node with fresh event channels and no children.
    pub fn create(subsystem: Option<String>, device: Option<Device>) -> Arc<DeviceNode> {
        Arc::new(DeviceNode {
            subsystem,
            device,
            events: Arc::new(NodeEvents::new()),
            children: HashMap::new(),
        })
    }

    /// The node's event channels. Identity is stable across tree rebuilds.
    pub fn events(&self) -> &NodeEvents {
        &self.events
    }

    pub fn child(&self, segment: &str) -> Option<&Arc<DeviceNode>> {
        self.children.get(segment)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Arc<DeviceNode>)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Shallow copy with a replaced child map entry; payload and channel
    /// identity carry over.
    fn with_child(&self, segment: &str, child: Option<Arc<DeviceNode>>) -> Arc<DeviceNode> {
        let mut children = self.children.clone();
        match child {
            Some(node) => {
                children.insert(segment.to_string(), node);
            }
            None => {
                children.remove(segment);
            }
        }
        Arc::new(DeviceNode {
            subsystem: self.subsystem.clone(),
            device: self.device,
            events: Arc::clone(&self.events),
            children,
        })
    }
}

/// Descend from `root` following `path`. Empty path names the root itself.
pub fn lookup(root: &Arc<DeviceNode>, path: &str) -> Option<Arc<DeviceNode>> {
    let (head, tail) = split(path);
    if head.is_empty() {
        return Some(Arc::clone(root));
    }
    let child = root.child(head)?;
    lookup(child, tail)
}

/// Insert `node` at `path`, creating anonymous intermediate nodes as needed.
/// An existing node at the final segment is replaced, subtree included.
pub fn insert(root: &Arc<DeviceNode>, path: &str, node: Arc<DeviceNode>) -> Arc<DeviceNode> {
    let (head, tail) = split(path);
    if head.is_empty() {
        return node;
    }
    let child = if tail.is_empty() {
        node
    } else {
        let base = root
            .child(head)
            .cloned()
            .unwrap_or_else(|| DeviceNode::create(None, None));
        insert(&base, tail, node)
    };
    root.with_child(head, Some(child))
}

/// Delete the node at `path`, subtree included. Absent paths leave the tree
/// unchanged.
pub fn remove(root: &Arc<DeviceNode>, path: &str) -> Arc<DeviceNode> {
    let (head, tail) = split(path);
    if head.is_empty() {
        return Arc::clone(root);
    }
    if tail.is_empty() {
        if root.child(head).is_none() {
            return Arc::clone(root);
        }
        return root.with_child(head, None);
    }
    match root.child(head) {
        Some(child) => {
            let rebuilt = remove(child, tail);
            root.with_child(head, Some(rebuilt))
        }
        None => Arc::clone(root),
    }
}

/// Move the subtree at `src` to `tgt`.
///
/// While both paths share a leading segment the rebuild stays inside that
/// subtree; once they diverge the source is looked up, detached, and
/// re-inserted wholesale, so the moved node keeps its `Arc` identity. A
/// missing source is a usage error: it trips a debug assertion and is a
/// logged no-op in release builds.
pub fn relocate(root: &Arc<DeviceNode>, src: &str, tgt: &str) -> Arc<DeviceNode> {
    let (src_head, src_tail) = split(src);
    let (tgt_head, tgt_tail) = split(tgt);
    if src_head == tgt_head && !src_tail.is_empty() && !tgt_tail.is_empty() {
        return match root.child(src_head) {
            Some(child) => {
                let rebuilt = relocate(child, src_tail, tgt_tail);
                root.with_child(src_head, Some(rebuilt))
            }
            None => {
                debug_assert!(false, "relocate source {src} missing");
                warn!("relocate: source path {src} not in tree");
                Arc::clone(root)
            }
        };
    }
    match lookup(root, src) {
        Some(node) => insert(&remove(root, src), tgt, node),
        None => {
            debug_assert!(false, "relocate source {src} missing");
            warn!("relocate: source path {src} not in tree");
            Arc::clone(root)
        }
    }
}

/// Collect `(path, node)` for every node below `root` that carries a device.
pub fn collect_devices(root: &Arc<DeviceNode>) -> Vec<(String, Arc<DeviceNode>)> {
    let mut out = Vec::new();
    fn walk(prefix: &str, node: &Arc<DeviceNode>, out: &mut Vec<(String, Arc<DeviceNode>)>) {
        for (name, child) in node.children() {
            let path = crate::devpath::join(prefix, name);
            if child.device.is_some() {
                out.push((path.clone(), Arc::clone(child)));
            }
            walk(&path, child, out);
        }
    }
    walk("", root, &mut out);
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceId, DeviceKind};

    fn dev(major: u32, minor: u32) -> Option<Device> {
        Some(Device {
            kind: DeviceKind::Char,
            id: DeviceId::new(major, minor),
        })
    }

    #[test]
    fn insert_creates_anonymous_ancestors() {
        let root = DeviceNode::create(None, None);
        let node = DeviceNode::create(Some("tty".into()), dev(4, 64));
        let root = insert(&root, "a/b/c", node);

        let a = lookup(&root, "a").expect("a exists");
        assert!(a.subsystem.is_none() && a.device.is_none());
        let ab = lookup(&root, "a/b").expect("a/b exists");
        assert!(ab.subsystem.is_none() && ab.device.is_none());
        let abc = lookup(&root, "a/b/c").expect("a/b/c exists");
        assert_eq!(abc.subsystem.as_deref(), Some("tty"));
    }

    #[test]
    fn lookup_missing_child_is_none() {
        let root = DeviceNode::create(None, None);
        assert!(lookup(&root, "nope").is_none());
        assert!(lookup(&root, "").is_some());
    }

    #[test]
    fn remove_deletes_subtree_and_tolerates_absence() {
        let root = DeviceNode::create(None, None);
        let root = insert(&root, "a/b", DeviceNode::create(None, dev(1, 3)));
        let root = remove(&root, "a/b");
        assert!(lookup(&root, "a/b").is_none());
        assert!(lookup(&root, "a").is_some());

        let unchanged = remove(&root, "missing/path");
        assert!(Arc::ptr_eq(&unchanged, &root));
    }

    #[test]
    fn relocate_preserves_node_identity() {
        let root = DeviceNode::create(None, None);
        let root = insert(&root, "a/b", DeviceNode::create(Some("block".into()), dev(7, 2)));
        let before = lookup(&root, "a/b").unwrap();

        let root = relocate(&root, "a/b", "a/c");
        assert!(lookup(&root, "a/b").is_none());
        let after = lookup(&root, "a/c").expect("moved node present");
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn relocate_across_unrelated_subtrees() {
        let root = DeviceNode::create(None, None);
        let root = insert(&root, "pci/eth0", DeviceNode::create(Some("net".into()), None));
        let root = relocate(&root, "pci/eth0", "virtual/net/eth0");
        assert!(lookup(&root, "pci/eth0").is_none());
        assert_eq!(
            lookup(&root, "virtual/net/eth0").unwrap().subsystem.as_deref(),
            Some("net")
        );
    }

    #[test]
    fn channels_survive_spine_rebuild() {
        let root = DeviceNode::create(None, None);
        let root = insert(&root, "a", DeviceNode::create(None, None));
        let a_before = lookup(&root, "a").unwrap();
        let mut sub = a_before.events().on_change.subscribe();

        // Inserting below "a" rebuilds the "a" node itself.
        let root = insert(&root, "a/b", DeviceNode::create(None, None));
        let a_after = lookup(&root, "a").unwrap();
        assert!(!Arc::ptr_eq(&a_before, &a_after));

        a_after
            .events()
            .on_change
            .publish(KernelEvent::new(EventAction::Change, "/devices/a"));
        assert!(sub.try_recv().is_some());
    }

    #[test]
    fn collect_devices_sorted_by_path() {
        let root = DeviceNode::create(None, None);
        let root = insert(&root, "b/dev1", DeviceNode::create(None, dev(1, 1)));
        let root = insert(&root, "a/dev0", DeviceNode::create(None, dev(1, 0)));
        let found = collect_devices(&root);
        let paths: Vec<&str> = found.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["a/dev0", "b/dev1"]);
    }
}
