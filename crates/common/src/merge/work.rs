use tokio::sync::watch;

/// Progress of the lookups dispatched for one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkState {
    /// Tasks dispatched and not yet finished
    pub pending: usize,
    /// Tasks whose comrade was accepted
    pub accepted: usize,
}

impl WorkState {
    pub fn is_idle(&self) -> bool {
        self.pending == 0
    }

    /// At least one device answered, or every device has
    pub fn has_first_hit(&self) -> bool {
        self.accepted > 0 || self.pending == 0
    }
}

/// Task group tracking in-flight lookups for one node.
///
/// Waiters are only woken when the group drains or a task lands a comrade,
///  so intermediate completions cost nothing. Two waits are offered:
///  [`LookupGroup::wait_first_hit`] for lookups that can proceed on any
///  hit, and [`LookupGroup::wait_idle`] for operations that need a stable
///  comrade list.
#[derive(Debug)]
pub struct LookupGroup {
    tx: watch::Sender<WorkState>,
}

impl Default for LookupGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupGroup {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(WorkState::default());
        Self { tx }
    }

    pub fn state(&self) -> WorkState {
        *self.tx.borrow()
    }

    pub fn is_idle(&self) -> bool {
        self.state().is_idle()
    }

    /// Account for `count` tasks about to be dispatched
    pub fn begin(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.tx.send_if_modified(|state| {
            state.pending += count;
            false
        });
    }

    /// Mark one task done, waking waiters if the group drained or the
    ///  task's comrade was accepted
    pub fn finish(&self, accepted: bool) {
        self.tx.send_if_modified(|state| {
            state.pending = state.pending.saturating_sub(1);
            if accepted {
                state.accepted += 1;
            }
            state.pending == 0 || accepted
        });
    }

    pub async fn wait_idle(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(WorkState::is_idle).await;
    }

    pub async fn wait_first_hit(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(WorkState::has_first_hit).await;
    }
}
