//! In-memory `ToolbarRegion` implementation.
//!
//! Stands in for the host's live DOM region in tests and headless embedders.
//! Structural changes (children added, removed, replaced) invoke the
//! registered child-list listener, exactly like a child-list mutation
//! observer would; `set_hidden` is an attribute write and deliberately does
//! not, which is the decoupling the mutation watcher relies on.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::toolbar::{NodeHandle, ToolbarNode, ToolbarRegion};

type ChildListener = Box<dyn Fn() + Send + Sync>;

/// Specification of one child element, used when building or re-rendering
/// the bar from the "host" side.
#[derive(Debug, Clone, Default)]
pub struct ItemSpec {
    element_id: Option<String>,
    attrs: HashMap<String, String>,
    hidden: bool,
}

impl ItemSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn element_id(mut self, id: &str) -> Self {
        self.element_id = Some(id.to_string());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Debug, Clone)]
struct StoredNode {
    handle: NodeHandle,
    element_id: Option<String>,
    attrs: HashMap<String, String>,
    hidden: bool,
}

/// An in-memory native bar with host-side mutation helpers.
pub struct InMemoryBar {
    mounted: AtomicBool,
    nodes: Mutex<Vec<StoredNode>>,
    next_handle: AtomicU64,
    /// Number of `set_hidden` calls that actually changed state would be the
    /// reconciler's business; this counts every write request it makes.
    writes: AtomicUsize,
    child_listener: Mutex<Option<ChildListener>>,
}

impl InMemoryBar {
    /// A mounted, empty bar.
    pub fn new() -> Self {
        Self {
            mounted: AtomicBool::new(true),
            nodes: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            writes: AtomicUsize::new(0),
            child_listener: Mutex::new(None),
        }
    }

    /// A bar that does not exist yet (host has not rendered it).
    pub fn unmounted() -> Self {
        let bar = Self::new();
        bar.mounted.store(false, Ordering::SeqCst);
        bar
    }

    /// Host mounts the bar (late mounting).
    pub fn mount(&self) {
        self.mounted.store(true, Ordering::SeqCst);
    }

    /// Register the child-list mutation listener (one per bar, like an
    /// observer attached to the region).
    pub fn on_children_changed(&self, listener: impl Fn() + Send + Sync + 'static) {
        *self.child_listener.lock() = Some(Box::new(listener));
    }

    fn fire_child_listener(&self) {
        if let Some(listener) = self.child_listener.lock().as_ref() {
            listener();
        }
    }

    fn insert(&self, spec: ItemSpec) -> NodeHandle {
        let handle = NodeHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.nodes.lock().push(StoredNode {
            handle,
            element_id: spec.element_id,
            attrs: spec.attrs,
            hidden: spec.hidden,
        });
        handle
    }

    /// Host appends a quick-reply item element.
    pub fn push_item(&self, build: impl FnOnce(ItemSpec) -> ItemSpec) -> NodeHandle {
        let handle = self.insert(build(ItemSpec::new()));
        self.fire_child_listener();
        handle
    }

    /// Host appends a plain element identified only by its raw `id`
    /// (e.g. a helper toolbar from an unrelated plugin).
    pub fn push_element(&self, element_id: &str) -> NodeHandle {
        let handle = self.insert(ItemSpec::new().element_id(element_id));
        self.fire_child_listener();
        handle
    }

    /// Host clears and repopulates the bar in one re-render. All previous
    /// handles become stale.
    pub fn replace_children(&self, specs: Vec<ItemSpec>) {
        {
            let mut nodes = self.nodes.lock();
            nodes.clear();
            for spec in specs {
                let handle = NodeHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
                nodes.push(StoredNode {
                    handle,
                    element_id: spec.element_id,
                    attrs: spec.attrs,
                    hidden: spec.hidden,
                });
            }
        }
        self.fire_child_listener();
    }

    /// Current visibility of a node, from the host's point of view.
    pub fn is_hidden(&self, handle: NodeHandle) -> bool {
        self.nodes
            .lock()
            .iter()
            .find(|n| n.handle == handle)
            .is_some_and(|n| n.hidden)
    }

    /// Total `set_hidden` writes performed against this bar.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBar {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolbarRegion for InMemoryBar {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<ToolbarNode> {
        self.nodes
            .lock()
            .iter()
            .map(|n| ToolbarNode {
                handle: n.handle,
                element_id: n.element_id.clone(),
                attrs: n.attrs.clone(),
                hidden: n.hidden,
            })
            .collect()
    }

    fn set_hidden(&self, handle: NodeHandle, hidden: bool) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(node) = self.nodes.lock().iter_mut().find(|n| n.handle == handle) {
            node.hidden = hidden;
        }
        // Attribute write only: the child-list listener is intentionally
        // not fired.
    }
}
