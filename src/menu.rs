//! View models for the consolidated launcher menu and the management panel.
//!
//! Pure projection: this module fetches records from the aggregation source,
//! resolves identities, and shapes them for presentation. It never touches the
//! native bar or the policy store; the caller supplies a policy snapshot.

use std::collections::HashSet;

use crate::identity::{self, CanonicalId, QuickReplyRecord};
use crate::whitelist::WhitelistPolicy;

/// Records fetched from the aggregation layer in one batch, pre-split by the
/// launcher's two menu sections.
#[derive(Debug, Clone, Default)]
pub struct FetchedReplies {
    /// Script-produced items (slash-runner buttons, scheduled tasks).
    pub script_items: Vec<QuickReplyRecord>,
    /// Standard quick-reply items from enabled sets.
    pub standard_items: Vec<QuickReplyRecord>,
}

/// Aggregation source seam. Implementations bridge to the upstream plugins'
/// runtime APIs; failures are per-fetch and never poison later fetches.
pub trait QuickReplyProvider: Send + Sync {
    fn fetch_all(&self) -> Result<FetchedReplies, String>;
}

/// One launcher menu row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub set_name: String,
    /// `None` for records the resolver cannot identify; such rows still show
    /// in the menu, they just cannot be whitelisted.
    pub id: Option<CanonicalId>,
    pub scope: Option<String>,
}

impl MenuEntry {
    fn from_record(record: &QuickReplyRecord) -> Self {
        Self {
            label: record.label.clone(),
            set_name: record.set_name.clone(),
            id: identity::resolve(record),
            scope: record.scope.clone(),
        }
    }
}

/// The launcher menu, split the way the popup renders it.
#[derive(Debug, Clone, Default)]
pub struct MenuView {
    pub script_items: Vec<MenuEntry>,
    pub standard_items: Vec<MenuEntry>,
}

/// Build the launcher menu from a fresh fetch.
///
/// A failed fetch degrades to an empty menu rather than an error surface; the
/// popup renders its empty state and the next open retries.
pub fn menu_view(provider: &dyn QuickReplyProvider) -> MenuView {
    let fetched = match provider.fetch_all() {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("quick-reply fetch failed: {e}");
            return MenuView::default();
        }
    };

    MenuView {
        script_items: fetched.script_items.iter().map(MenuEntry::from_record).collect(),
        standard_items: fetched.standard_items.iter().map(MenuEntry::from_record).collect(),
    }
}

/// One management-panel row: a whitelistable quick-reply group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelEntry {
    pub id: CanonicalId,
    /// Set name preferred over the first button's label; groups read better
    /// under their set name.
    pub display_name: String,
    pub builtin: bool,
    pub whitelisted: bool,
}

/// The management panel, pre-partitioned by current visibility.
#[derive(Debug, Clone, Default)]
pub struct PanelView {
    pub visible: Vec<PanelEntry>,
    pub hidden: Vec<PanelEntry>,
}

fn display_name(record: &QuickReplyRecord) -> String {
    if record.set_name.is_empty() {
        record.label.clone()
    } else {
        record.set_name.clone()
    }
}

/// Build the management panel: one row per canonical identity, deduplicated
/// (first record wins), partitioned by whether the policy currently shows it.
///
/// Unresolvable records are omitted; the panel only lists what the policy can
/// act on.
pub fn panel_view(provider: &dyn QuickReplyProvider, policy: &WhitelistPolicy) -> PanelView {
    let fetched = match provider.fetch_all() {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("quick-reply fetch failed: {e}");
            return PanelView::default();
        }
    };

    let mut seen: HashSet<CanonicalId> = HashSet::new();
    let mut view = PanelView::default();

    for record in fetched.script_items.iter().chain(&fetched.standard_items) {
        let Some(id) = identity::resolve(record) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }

        let entry = PanelEntry {
            builtin: policy.is_builtin(id.as_str()),
            whitelisted: policy.is_allowed(&id),
            display_name: display_name(record),
            id,
        };
        if entry.whitelisted {
            view.visible.push(entry);
        } else {
            view.hidden.push(entry);
        }
    }

    view
}
