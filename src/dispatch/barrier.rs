//! Join barrier for handlers fanning out into concurrent sub-tasks.
//!
//! A handler that issues several parallel fetches enlists each one, then
//! awaits [`JoinBarrier::join`] before responding. Tasks may enlist under a
//! named group; other tasks can block on that group alone via
//! [`JoinBarrier::group`]. This replaces nested callback chains with a
//! counter that releases waiters when it reaches zero.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

#[derive(Default)]
struct State {
    pending: usize,
    groups: HashMap<String, usize>,
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

/// Counting barrier with optional named groups.
#[derive(Clone)]
pub struct JoinBarrier {
    inner: Arc<Inner>,
}

impl JoinBarrier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
            }),
        }
    }

    /// Register one pending task. The returned guard completes the task when
    /// dropped or when [`Pending::complete`] is called.
    pub fn enlist(&self) -> Pending {
        self.enlist_inner(None)
    }

    /// Register one pending task under a named group.
    pub fn enlist_in(&self, group: &str) -> Pending {
        self.enlist_inner(Some(group.to_string()))
    }

    fn enlist_inner(&self, group: Option<String>) -> Pending {
        let mut state = self.inner.state.lock().expect("barrier poisoned");
        state.pending += 1;
        if let Some(name) = &group {
            *state.groups.entry(name.clone()).or_insert(0) += 1;
        }
        Pending {
            inner: Arc::clone(&self.inner),
            group,
            done: false,
        }
    }

    /// Number of tasks not yet completed.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().expect("barrier poisoned").pending
    }

    /// Wait until every enlisted task has completed.
    pub async fn join(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.state.lock().expect("barrier poisoned").pending == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Wait until every task enlisted under `name` has completed. A group
    /// nobody enlisted in counts as already complete.
    pub async fn group(&self, name: &str) {
        loop {
            let notified = self.inner.notify.notified();
            {
                let state = self.inner.state.lock().expect("barrier poisoned");
                if state.groups.get(name).copied().unwrap_or(0) == 0 {
                    return;
                }
            }
            notified.await;
        }
    }
}

impl Default for JoinBarrier {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one enlisted task. Dropping it counts as completion, so a
/// panicking task cannot wedge the barrier.
pub struct Pending {
    inner: Arc<Inner>,
    group: Option<String>,
    done: bool,
}

impl Pending {
    pub fn complete(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        let mut state = self.inner.state.lock().expect("barrier poisoned");
        state.pending = state.pending.saturating_sub(1);
        if let Some(name) = &self.group {
            if let Some(count) = state.groups.get_mut(name) {
                *count = count.saturating_sub(1);
            }
        }
        drop(state);
        self.inner.notify.notify_waiters();
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_releases_at_zero() {
        let barrier = JoinBarrier::new();
        let a = barrier.enlist();
        let b = barrier.enlist();
        assert_eq!(barrier.pending(), 2);

        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.join().await })
        };

        a.complete();
        assert_eq!(barrier.pending(), 1);
        b.complete();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("join did not release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_named_group_releases_independently() {
        let barrier = JoinBarrier::new();
        let _other = barrier.enlist();
        let named = barrier.enlist_in("fetch");

        let group_wait = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.group("fetch").await })
        };

        named.complete();
        tokio::time::timeout(Duration::from_secs(1), group_wait)
            .await
            .expect("group wait did not release")
            .unwrap();

        // The overall barrier still has the unnamed task pending.
        assert_eq!(barrier.pending(), 1);
    }

    #[tokio::test]
    async fn test_unknown_group_is_already_complete() {
        let barrier = JoinBarrier::new();
        tokio::time::timeout(Duration::from_millis(100), barrier.group("nobody"))
            .await
            .expect("unknown group should not block");
    }

    #[tokio::test]
    async fn test_drop_counts_as_completion() {
        let barrier = JoinBarrier::new();
        {
            let _task = barrier.enlist();
        }
        assert_eq!(barrier.pending(), 0);
        tokio::time::timeout(Duration::from_millis(100), barrier.join())
            .await
            .expect("join should resolve after drop");
    }
}
