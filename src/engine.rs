//! Reconciliation engine: policy + scanner + reconciler behind one handle.
//!
//! All operations are synchronous and return after completing their state and
//! DOM writes; the only suspension point in the subsystem is the mutation
//! watcher's coalescing timer. The engine is the single writer for both the
//! whitelist and the bar's visibility state.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::identity::CanonicalId;
use crate::reconcile::{reconcile, ReconcileMode};
use crate::settings::{Persister, PluginSettings};
use crate::toolbar::{scan, ToolbarRegion};
use crate::whitelist::{ToggleOutcome, WhitelistPolicy};

/// Counters for observability. Lock-free, zero overhead when idle.
pub struct ReconcileMetrics {
    /// Passes that scanned and reconciled the bar.
    pub passes_run: AtomicUsize,
    /// Passes skipped because the region was unavailable.
    pub passes_skipped: AtomicUsize,
    /// Total visibility writes across all passes.
    pub dom_writes: AtomicUsize,
}

impl ReconcileMetrics {
    pub const fn new() -> Self {
        Self {
            passes_run: AtomicUsize::new(0),
            passes_skipped: AtomicUsize::new(0),
            dom_writes: AtomicUsize::new(0),
        }
    }
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// The visibility reconciliation engine for one native bar region.
pub struct ReconcileEngine<R: ToolbarRegion> {
    region: Arc<R>,
    policy: RwLock<WhitelistPolicy>,
    enabled: AtomicBool,
    persister: Option<Persister>,
    pub metrics: ReconcileMetrics,
}

impl<R: ToolbarRegion> ReconcileEngine<R> {
    /// Build an engine from loaded settings. Pass `None` for the persister
    /// when persistence is handled elsewhere (tests, read-only embedders).
    pub fn new(region: Arc<R>, settings: PluginSettings, persister: Option<Persister>) -> Self {
        Self {
            region,
            policy: RwLock::new(WhitelistPolicy::new(settings.whitelist)),
            enabled: AtomicBool::new(settings.enabled),
            persister,
            metrics: ReconcileMetrics::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn mode(&self) -> ReconcileMode {
        if self.is_enabled() {
            ReconcileMode::Enforce
        } else {
            ReconcileMode::Restore
        }
    }

    /// Current settings, for persistence and UI.
    pub fn settings_snapshot(&self) -> PluginSettings {
        PluginSettings {
            enabled: self.is_enabled(),
            whitelist: self.policy.read().entries().to_vec(),
        }
    }

    /// Clone of the current policy, for view-model construction.
    pub fn policy_snapshot(&self) -> WhitelistPolicy {
        self.policy.read().clone()
    }

    fn request_persist(&self) {
        if let Some(persister) = &self.persister {
            persister.request(self.settings_snapshot());
        }
    }

    /// Scan the bar and apply the current policy once.
    ///
    /// Skips (leaving previous visibility intact) when the region is not
    /// mounted; the caller retries on the next qualifying event. Never
    /// panics and never surfaces errors to the user.
    pub fn run_pass(&self) -> Result<usize, String> {
        if !self.region.is_mounted() {
            self.metrics.passes_skipped.fetch_add(1, Ordering::Relaxed);
            return Err("native bar region is not mounted".to_string());
        }

        let policy = self.policy.read().clone();
        let mode = self.mode();
        let writes = reconcile(self.region.as_ref(), scan(self.region.as_ref()), &policy, mode);

        self.metrics.passes_run.fetch_add(1, Ordering::Relaxed);
        self.metrics.dom_writes.fetch_add(writes, Ordering::Relaxed);
        tracing::debug!(writes, ?mode, "reconcile pass complete");
        Ok(writes)
    }

    /// `run_pass` for callers that only want the fail-soft behavior.
    pub(crate) fn run_pass_logged(&self) {
        if let Err(e) = self.run_pass() {
            tracing::debug!("reconcile pass skipped: {e}");
        }
    }

    /// Toggle a canonical id on the whitelist.
    ///
    /// On a membership change this requests a (debounced) persist and
    /// synchronously re-runs the pass, so the management UI sees the toolbar
    /// refresh before the call returns. Builtin ids are rejected unchanged.
    pub fn toggle(&self, id: &CanonicalId) -> ToggleOutcome {
        let outcome = self.policy.write().toggle(id);
        if outcome != ToggleOutcome::RejectedBuiltin {
            self.request_persist();
            self.run_pass_logged();
        }
        outcome
    }

    /// Enable or disable policy enforcement. Disabling restores the native
    /// bar to full visibility on the spot.
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            self.request_persist();
            self.run_pass_logged();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryBar;
    use crate::toolbar::attr;

    fn bar_with_two_sets() -> Arc<InMemoryBar> {
        let bar = Arc::new(InMemoryBar::new());
        bar.push_item(|item| {
            item.attr(attr::SOURCE, "QuickReplyV2")
                .attr(attr::SET_NAME, "Allowed")
        });
        bar.push_item(|item| {
            item.attr(attr::SOURCE, "QuickReplyV2")
                .attr(attr::SET_NAME, "Clutter")
        });
        bar
    }

    fn engine_with(bar: Arc<InMemoryBar>, whitelist: &[&str]) -> ReconcileEngine<InMemoryBar> {
        ReconcileEngine::new(
            bar,
            PluginSettings {
                enabled: true,
                whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
            },
            None,
        )
    }

    #[test]
    fn run_pass_enforces_whitelist() {
        let bar = bar_with_two_sets();
        let engine = engine_with(bar.clone(), &["QRV2::Allowed"]);

        let writes = engine.run_pass().unwrap();
        assert_eq!(writes, 1);

        let snapshot = bar.snapshot();
        assert!(!snapshot[0].hidden);
        assert!(snapshot[1].hidden);
        assert_eq!(engine.metrics.passes_run.load(Ordering::Relaxed), 1);
        assert_eq!(engine.metrics.dom_writes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn run_pass_on_unmounted_region_skips() {
        let bar = Arc::new(InMemoryBar::unmounted());
        let engine = engine_with(bar.clone(), &[]);

        assert!(engine.run_pass().is_err());
        assert_eq!(engine.metrics.passes_skipped.load(Ordering::Relaxed), 1);
        assert_eq!(engine.metrics.passes_run.load(Ordering::Relaxed), 0);

        // Host mounts the bar later; the next pass works
        bar.mount();
        assert!(engine.run_pass().is_ok());
        assert_eq!(engine.metrics.passes_run.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn toggle_refreshes_the_bar_synchronously() {
        let bar = bar_with_two_sets();
        let engine = engine_with(bar.clone(), &["QRV2::Allowed"]);
        engine.run_pass().unwrap();
        assert!(bar.snapshot()[1].hidden);

        let outcome = engine.toggle(&CanonicalId::from("QRV2::Clutter"));
        assert_eq!(outcome, ToggleOutcome::Added);
        // No further pass needed by the caller: the toggle ran one itself
        assert!(!bar.snapshot()[1].hidden);

        let outcome = engine.toggle(&CanonicalId::from("QRV2::Clutter"));
        assert_eq!(outcome, ToggleOutcome::Removed);
        assert!(bar.snapshot()[1].hidden);
    }

    #[test]
    fn toggle_builtin_is_a_noop() {
        let bar = bar_with_two_sets();
        let engine = engine_with(bar.clone(), &["QRV2::Allowed"]);
        engine.run_pass().unwrap();
        let passes_before = engine.metrics.passes_run.load(Ordering::Relaxed);

        let outcome = engine.toggle(&CanonicalId::from("input_helper_toolbar"));
        assert_eq!(outcome, ToggleOutcome::RejectedBuiltin);
        assert_eq!(
            engine.settings_snapshot().whitelist,
            vec!["QRV2::Allowed".to_string()],
            "whitelist unchanged by builtin toggle"
        );
        assert_eq!(
            engine.metrics.passes_run.load(Ordering::Relaxed),
            passes_before,
            "no extra pass for a rejected toggle"
        );
    }

    #[test]
    fn disabling_restores_full_visibility() {
        let bar = bar_with_two_sets();
        let engine = engine_with(bar.clone(), &[]);
        engine.run_pass().unwrap();
        assert!(bar.snapshot().iter().all(|n| n.hidden));

        engine.set_enabled(false);
        assert!(bar.snapshot().iter().all(|n| !n.hidden));
        assert!(!engine.settings_snapshot().enabled);

        // Re-enabling enforces again
        engine.set_enabled(true);
        assert!(bar.snapshot().iter().all(|n| n.hidden));
    }

    #[test]
    fn set_enabled_same_value_does_nothing() {
        let bar = bar_with_two_sets();
        let engine = engine_with(bar, &[]);
        engine.run_pass().unwrap();
        let passes = engine.metrics.passes_run.load(Ordering::Relaxed);

        engine.set_enabled(true);
        assert_eq!(engine.metrics.passes_run.load(Ordering::Relaxed), passes);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_requests_debounced_persistence() {
        use crate::settings::{JsonSettingsStore, Persister, SettingsStore};
        use std::time::Duration;

        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(JsonSettingsStore::with_dir(dir.path()));
        let persister = Persister::spawn_with_debounce(store.clone(), Duration::from_millis(500));

        let bar = bar_with_two_sets();
        let engine = ReconcileEngine::new(bar, PluginSettings::default(), Some(persister));

        engine.toggle(&CanonicalId::from("QRV2::Allowed"));
        engine.toggle(&CanonicalId::from("QRV2::Clutter"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;

        let persisted = store.load();
        assert_eq!(
            persisted.whitelist,
            vec!["QRV2::Allowed".to_string(), "QRV2::Clutter".to_string()]
        );
    }
}
