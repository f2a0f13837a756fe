use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide phase. Ordered so "has shutdown started" is a simple
/// comparison; transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Starting,
    Ready,
    ShuttingDown,
    Stopped,
}

/// Shared handle to the process lifecycle. The coordinator path advances
/// the phase; every task observes it read-only. Cloning is cheap and all
/// clones see the same phase.
#[derive(Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<Phase>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Phase::Starting);
        Self { tx: Arc::new(tx) }
    }

    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase() >= Phase::ShuttingDown
    }

    /// Open the gate for tasks blocked on [`ready`](Self::ready).
    /// Repeated calls are no-ops.
    pub fn mark_ready(&self) {
        self.advance(Phase::Ready);
    }

    /// Ask every long-running task to stop. Repeated calls are no-ops.
    pub fn begin_shutdown(&self) {
        self.advance(Phase::ShuttingDown);
    }

    /// Record that transport teardown finished.
    pub fn mark_stopped(&self) {
        self.advance(Phase::Stopped);
    }

    /// Wait until the phase reaches Ready or later. Returns immediately if
    /// it already has; any number of tasks may wait, any number of times.
    pub async fn ready(&self) {
        self.wait_for(Phase::Ready).await;
    }

    /// Wait until shutdown has been requested. Meant to sit in a
    /// `tokio::select!` arm so long sleeps are interruptible.
    pub async fn shutdown_requested(&self) {
        self.wait_for(Phase::ShuttingDown).await;
    }

    fn advance(&self, next: Phase) {
        self.tx.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    async fn wait_for(&self, at_least: Phase) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the watch cannot close
        // while a caller holds a handle.
        let _ = rx.wait_for(|phase| *phase >= at_least).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
