//! Native toolbar abstraction and scanner.
//!
//! The host application owns the native quick-reply bar and re-renders it at
//! will; this crate only ever reads snapshots of it and flips a single
//! visibility flag per element. The structural contract for recognizing a
//! quick-reply item is negotiated with the host, not inferred:
//!
//! - an item carries a `data-qr-source` attribute naming the upstream plugin
//!   (`JSSlashRunner`, `QuickReplyV2`, `LittleWhiteBox`);
//! - its discriminators are carried as `data-script-id`, `data-set-name`,
//!   `data-task-scope` and `data-task-id`;
//! - elements without `data-qr-source` participate only in the raw-element-id
//!   builtin check via their `id` attribute.

use std::collections::HashMap;

use crate::identity::{self, CanonicalId, QuickReplyRecord, QuickReplySource, RecordOrigin};

/// Attribute names of the host element contract.
pub mod attr {
    pub const SOURCE: &str = "data-qr-source";
    pub const LABEL: &str = "data-label";
    pub const SET_NAME: &str = "data-set-name";
    pub const IS_STANDARD: &str = "data-is-standard";
    pub const SCRIPT_ID: &str = "data-script-id";
    pub const BUTTON_ID: &str = "data-button-id";
    pub const API_BASED: &str = "data-is-api-based";
    pub const TASK_ID: &str = "data-task-id";
    pub const TASK_SCOPE: &str = "data-task-scope";
}

/// Opaque handle to a live element. Only meaningful to the `ToolbarRegion`
/// that issued it, and only until the host's next re-render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Snapshot of one candidate element in the native bar.
///
/// Ephemeral: recomputed on every reconciliation pass and never cached across
/// host re-renders, because the host may replace the nodes entirely.
#[derive(Debug, Clone)]
pub struct ToolbarNode {
    pub handle: NodeHandle,
    /// The element's raw `id` attribute, if any.
    pub element_id: Option<String>,
    pub attrs: HashMap<String, String>,
    /// Current visibility state, so writes can be skipped when already in
    /// the target state.
    pub hidden: bool,
}

impl ToolbarNode {
    fn attr(&self, name: &str) -> Option<String> {
        self.attrs.get(name).cloned()
    }
}

/// The host's native toolbar container, as seen by this subsystem.
///
/// Implementations bridge to a real DOM region (or an in-memory stand-in for
/// tests). `set_hidden` is the only mutation the reconciler performs, and it
/// must be expressed as an attribute/class change rather than a structural
/// one, so the child-list-only mutation watcher cannot observe our own
/// writes.
pub trait ToolbarRegion: Send + Sync {
    /// False until the host mounts the bar; the region may appear late.
    fn is_mounted(&self) -> bool;

    /// Snapshot of the bar's current item elements. Empty when unmounted or
    /// mid-re-render; never an error.
    fn snapshot(&self) -> Vec<ToolbarNode>;

    /// Apply visibility to one element. Must be a no-structural-change write.
    fn set_hidden(&self, handle: NodeHandle, hidden: bool);
}

/// A toolbar element paired with its resolved identity for one pass.
#[derive(Debug, Clone)]
pub struct ElementBinding {
    pub node: ToolbarNode,
    /// `None` when the element could not be mapped to a canonical identity;
    /// such elements are left untouched by the reconciler.
    pub id: Option<CanonicalId>,
}

/// Reconstruct the aggregation-equivalent record from a node's attributes.
///
/// Returns `None` when the node does not carry the item contract at all
/// (no `data-qr-source`).
fn record_from_attrs(node: &ToolbarNode) -> Option<QuickReplyRecord> {
    let source = QuickReplySource::parse(&node.attr(attr::SOURCE)?);

    let origin = match source {
        QuickReplySource::JsSlashRunner => RecordOrigin::JsSlashRunner {
            script_id: node.attr(attr::SCRIPT_ID),
            button_id: node.attr(attr::BUTTON_ID),
            api_based: node.attr(attr::API_BASED).as_deref() == Some("true"),
        },
        QuickReplySource::QuickReplyV2 => RecordOrigin::QuickReplyV2,
        QuickReplySource::LittleWhiteBox => RecordOrigin::LittleWhiteBox {
            task_scope: node.attr(attr::TASK_SCOPE),
            task_id: node.attr(attr::TASK_ID),
        },
        QuickReplySource::Unknown => RecordOrigin::Unknown,
    };

    Some(QuickReplyRecord {
        label: node.attr(attr::LABEL).unwrap_or_default(),
        set_name: node.attr(attr::SET_NAME).unwrap_or_default(),
        is_standard: node.attr(attr::IS_STANDARD).as_deref() != Some("false"),
        scope: None,
        origin,
    })
}

/// Scan the region and bind each current element to a canonical identity.
///
/// Lazy, one-shot sequence over the snapshot taken at call time: each scan
/// reflects only that instant's DOM, and bindings are discarded after the
/// pass. An unmounted region yields an empty sequence rather than failing.
pub fn scan(region: &dyn ToolbarRegion) -> impl Iterator<Item = ElementBinding> {
    let nodes = if region.is_mounted() {
        region.snapshot()
    } else {
        Vec::new()
    };

    nodes.into_iter().map(|node| {
        let id = record_from_attrs(&node).and_then(|record| identity::resolve(&record));
        ElementBinding { node, id }
    })
}
