//! Mutation watcher for the native bar.
//!
//! The host re-renders the bar on its own schedule; adapters forward its
//! **child-list** mutations (nodes added/removed) to this watcher, which
//! coalesces bursts and runs one reconciliation pass per quiet window.
//! Attribute mutations must never be forwarded: the reconciler's own writes
//! are attribute-only, so keeping the observation path child-list-only breaks
//! the feedback loop by construction rather than by heuristics.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::engine::ReconcileEngine;
use crate::toolbar::ToolbarRegion;

/// Coalescing window: bursts of host re-renders inside this window collapse
/// into a single reconciliation pass.
pub const COALESCE_MS: u64 = 200;

/// How often to re-check for a late-mounting bar region.
pub const MOUNT_POLL_MS: u64 = 150;

/// Watcher lifecycle. Transitions: Idle → Scheduled → Reconciling → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatcherState {
    /// No pending work.
    Idle = 0,
    /// A qualifying mutation arrived; the coalescing delay is running.
    Scheduled = 1,
    /// Scanner + reconciler are executing.
    Reconciling = 2,
}

impl WatcherState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => WatcherState::Scheduled,
            2 => WatcherState::Reconciling,
            _ => WatcherState::Idle,
        }
    }
}

/// Handle to a spawned bar watcher.
///
/// Cloneable so host adapters can hold their own notifier. Dropping the last
/// handle closes the channel; the watcher task finishes any in-flight
/// coalescing window and exits.
#[derive(Clone)]
pub struct BarWatcher {
    tx: mpsc::UnboundedSender<()>,
    state: Arc<AtomicU8>,
}

impl BarWatcher {
    pub fn spawn<R>(engine: Arc<ReconcileEngine<R>>) -> Self
    where
        R: ToolbarRegion + 'static,
    {
        Self::spawn_with_delay(engine, Duration::from_millis(COALESCE_MS))
    }

    pub fn spawn_with_delay<R>(engine: Arc<ReconcileEngine<R>>, delay: Duration) -> Self
    where
        R: ToolbarRegion + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let state = Arc::new(AtomicU8::new(WatcherState::Idle as u8));
        let task_state = state.clone();

        tokio::spawn(async move {
            // Idle: wait for the first qualifying mutation
            while rx.recv().await.is_some() {
                task_state.store(WatcherState::Scheduled as u8, Ordering::SeqCst);

                // Scheduled: each further mutation resets (never accumulates)
                // the delay, so a burst collapses into one pass as of the
                // state at timer-fire.
                let mut deadline = Instant::now() + delay;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        more = rx.recv() => match more {
                            Some(()) => deadline = Instant::now() + delay,
                            None => break,
                        },
                    }
                }

                // Reconciling → Idle is unconditional, even when the pass
                // fails: a failed pass must not stall future observation.
                task_state.store(WatcherState::Reconciling as u8, Ordering::SeqCst);
                if let Err(e) = engine.run_pass() {
                    tracing::warn!("reconcile pass failed: {e}");
                }
                task_state.store(WatcherState::Idle as u8, Ordering::SeqCst);
            }
        });

        Self { tx, state }
    }

    /// Report a qualifying structural change (child nodes added/removed) in
    /// the watched region. Cheap, non-blocking, callable from any host
    /// adapter callback.
    pub fn notify_children_changed(&self) {
        let _ = self.tx.send(());
    }

    pub fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// Wait for a late-mounting bar region, then run the initial pass.
///
/// The region's existence is not guaranteed at subsystem start; this polls
/// until the host mounts it. Returns after the first successful pass.
pub async fn attach_when_mounted<R>(engine: &ReconcileEngine<R>)
where
    R: ToolbarRegion,
{
    attach_when_mounted_with_poll(engine, Duration::from_millis(MOUNT_POLL_MS)).await
}

pub async fn attach_when_mounted_with_poll<R>(engine: &ReconcileEngine<R>, poll: Duration)
where
    R: ToolbarRegion,
{
    loop {
        if engine.run_pass().is_ok() {
            return;
        }
        tokio::time::sleep(poll).await;
    }
}
