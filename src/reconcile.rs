//! Visibility reconciler.
//!
//! The only component allowed to mutate the native bar's visual state. Its
//! writes are attribute-level visibility flips and nothing else (never
//! adding, removing, or reordering nodes), so the child-list mutation watcher
//! cannot observe them and the observe/write loop is broken by construction.

use crate::toolbar::{ElementBinding, ToolbarRegion};
use crate::whitelist::WhitelistPolicy;

/// How policy is applied during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Normal operation: hide resolved items not on the whitelist.
    Enforce,
    /// Plugin disabled: hand the bar back to the host by making every
    /// resolved item visible again.
    Restore,
}

/// Decide the target visibility for one binding.
///
/// `None` means "leave the element untouched": elements that could not be
/// identified are never forcibly hidden or shown.
fn target_hidden(binding: &ElementBinding, policy: &WhitelistPolicy, mode: ReconcileMode) -> Option<bool> {
    // Raw-element-id builtin protection applies even to elements the
    // resolver cannot identify (helper toolbars from unrelated plugins).
    if let Some(element_id) = &binding.node.element_id {
        if policy.is_builtin(element_id) {
            return Some(false);
        }
    }

    let id = binding.id.as_ref()?;
    match mode {
        ReconcileMode::Enforce => Some(!policy.is_allowed(id)),
        ReconcileMode::Restore => Some(false),
    }
}

/// Apply the policy decision to each bound element, idempotently.
///
/// Returns the number of visibility writes performed. Calling twice in a row
/// with unchanged policy and DOM performs zero writes on the second call,
/// which is what keeps the mutation watcher from seeing its own reflection.
pub fn reconcile<I>(region: &dyn ToolbarRegion, bindings: I, policy: &WhitelistPolicy, mode: ReconcileMode) -> usize
where
    I: IntoIterator<Item = ElementBinding>,
{
    let mut writes = 0;
    for binding in bindings {
        let Some(hidden) = target_hidden(&binding, policy, mode) else {
            continue;
        };
        // No-op when already in the target state
        if binding.node.hidden == hidden {
            continue;
        }
        region.set_hidden(binding.node.handle, hidden);
        writes += 1;
    }
    writes
}
