//! qrhub: consolidated quick-reply launcher core with a visibility policy for
//! the host chat UI's native toolbar.
//!
//! The host application renders quick-reply buttons from several upstream
//! plugins into one native bar. This crate aggregates those items into a
//! launcher menu and, independently, keeps the native bar reconciled against a
//! user-editable whitelist: items whose canonical identity is whitelisted stay
//! visible, identified items off the whitelist are hidden, and anything the
//! resolver cannot identify is left alone.
//!
//! The host is the single source of truth for the bar's contents. This crate
//! never adds or removes bar elements; its only mutation is an attribute-level
//! visibility flip, which is what lets the child-list mutation watcher observe
//! host re-renders without ever observing itself.
//!
//! Embedders implement two seams: [`ToolbarRegion`] (the native bar) and
//! [`QuickReplyProvider`] (the aggregation source), then drive everything
//! through a [`Hub`].

pub mod engine;
pub mod identity;
pub mod in_memory;
pub mod menu;
pub mod reconcile;
pub mod settings;
pub mod toolbar;
pub mod watcher;
pub mod whitelist;

pub use engine::{ReconcileEngine, ReconcileMetrics};
pub use identity::{CanonicalId, QuickReplyRecord, QuickReplySource, RecordOrigin};
pub use menu::{
    menu_view, panel_view, FetchedReplies, MenuEntry, MenuView, PanelEntry, PanelView,
    QuickReplyProvider,
};
pub use reconcile::ReconcileMode;
pub use settings::{JsonSettingsStore, Persister, PluginSettings, SettingsStore};
pub use toolbar::{ElementBinding, NodeHandle, ToolbarNode, ToolbarRegion};
pub use watcher::{BarWatcher, WatcherState};
pub use whitelist::{ToggleOutcome, WhitelistPolicy, BUILTIN_WHITELIST};

use std::sync::Arc;

/// Everything wired together for one bar region.
///
/// Owns the engine, the mutation watcher, and the aggregation provider.
/// Construction loads persisted settings and spawns the background tasks;
/// the host adapter then forwards child-list mutations to
/// [`Hub::watcher`]'s `notify_children_changed` and calls the view and
/// policy methods from its UI handlers.
pub struct Hub<R: ToolbarRegion> {
    engine: Arc<ReconcileEngine<R>>,
    watcher: BarWatcher,
    provider: Arc<dyn QuickReplyProvider>,
}

impl<R: ToolbarRegion + 'static> Hub<R> {
    /// Load settings from `store`, spawn the persister and the watcher, and
    /// return the wired hub. Requires a tokio runtime.
    pub fn init(
        region: Arc<R>,
        store: Arc<dyn SettingsStore>,
        provider: Arc<dyn QuickReplyProvider>,
    ) -> Self {
        let settings = store.load();
        let persister = Persister::spawn(store);
        let engine = Arc::new(ReconcileEngine::new(region, settings, Some(persister)));
        let watcher = BarWatcher::spawn(engine.clone());
        Self {
            engine,
            watcher,
            provider,
        }
    }

    pub fn engine(&self) -> &Arc<ReconcileEngine<R>> {
        &self.engine
    }

    pub fn watcher(&self) -> &BarWatcher {
        &self.watcher
    }

    /// Wait for the bar region to mount, then run the initial pass.
    pub async fn attach(&self) {
        watcher::attach_when_mounted(&self.engine).await;
    }

    /// Build the launcher menu from a fresh fetch.
    pub fn menu(&self) -> MenuView {
        menu::menu_view(self.provider.as_ref())
    }

    /// Build the management panel against the current policy.
    pub fn panel(&self) -> PanelView {
        menu::panel_view(self.provider.as_ref(), &self.engine.policy_snapshot())
    }

    /// Toggle an identity on the whitelist; persists and refreshes the bar.
    pub fn toggle(&self, id: &CanonicalId) -> ToggleOutcome {
        self.engine.toggle(id)
    }

    /// Enable or disable enforcement; disabling restores full visibility.
    pub fn set_enabled(&self, enabled: bool) {
        self.engine.set_enabled(enabled)
    }
}
