//! Counting completion signal for worker pools.
//!
//! A [`WorkGroup`] counts outstanding units of work. Each unit is represented
//! by a [`WorkTicket`]; dropping the ticket releases the unit. [`WorkGroup::wait`]
//! resolves once the count drops to zero.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct WorkGroup {
    pending: Arc<watch::Sender<usize>>,
}

impl Default for WorkGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkGroup {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            pending: Arc::new(tx),
        }
    }

    /// Register one unit of outstanding work.
    pub fn ticket(&self) -> WorkTicket {
        self.pending.send_modify(|n| *n += 1);
        WorkTicket {
            group: self.clone(),
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until every ticket handed out so far has been dropped.
    ///
    /// Returns immediately if nothing is pending.
    pub async fn wait(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn release(&self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// One unit of outstanding work. Released on drop.
pub struct WorkTicket {
    group: WorkGroup,
}

impl Drop for WorkTicket {
    fn drop(&mut self) {
        self.group.release();
    }
}
