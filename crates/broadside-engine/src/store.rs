//! The session store: every live session plus the open-slot pointer.
//!
//! This is the only state shared between concurrent requests. It is
//! guarded by a single store-wide lock, and each session additionally has
//! its own lock so that shots in different sessions proceed in parallel.
//!
//! The open slot can only be read or written through a
//! [`MatchmakingGuard`], which holds the store-wide lock for its whole
//! lifetime. That makes "look at the slot, decide, write the slot" one
//! atomic step; no caller can observe the slot and act on it later.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use broadside_protocol::{MatchmakerReport, SessionId};
use tokio::sync::{Mutex, MutexGuard};

use crate::GameSession;

/// Shared handle to one session. Lock it to read or mutate the session.
pub type SessionHandle = Arc<Mutex<GameSession>>;

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<SessionId, SessionHandle>,
    /// The session waiting for a second player, if any.
    open_slot: Option<SessionId>,
}

/// Concurrent registry of sessions keyed by id.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<StoreInner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session, replacing any previous session with the same id.
    #[cfg(test)]
    pub(crate) async fn put(&self, session: GameSession) -> SessionHandle {
        self.inner.lock().await.put(session)
    }

    /// Looks up a session handle.
    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.inner.lock().await.sessions.get(id).cloned()
    }

    /// Removes a session. If it was the open slot, the slot is cleared in
    /// the same step. Removing an absent id is not an error.
    pub async fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        let mut inner = self.inner.lock().await;
        if inner.open_slot.as_ref() == Some(id) {
            inner.open_slot = None;
        }
        let removed = inner.sessions.remove(id);
        if removed.is_some() {
            tracing::info!(session_id = %id, "session removed");
        }
        removed
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Returns `true` if the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.sessions.is_empty()
    }

    /// Takes the store-wide lock for a matchmaking decision.
    pub async fn matchmaking(&self) -> MatchmakingGuard<'_> {
        MatchmakingGuard {
            inner: self.inner.lock().await,
        }
    }

    /// Debugging view of the open slot and the session count.
    pub async fn report(&self) -> MatchmakerReport {
        let (mut report, waiting) = {
            let inner = self.inner.lock().await;
            let report = MatchmakerReport {
                open_slot: inner.open_slot.clone(),
                session_count: inner.sessions.len(),
                waiting_status: None,
                waiting_player1: None,
                waiting_player2: None,
            };
            let waiting = inner
                .open_slot
                .as_ref()
                .and_then(|id| inner.sessions.get(id))
                .cloned();
            (report, waiting)
        };

        if let Some(handle) = waiting {
            let session = handle.lock().await;
            report.waiting_status = Some(session.status());
            report.waiting_player1 = Some(session.player1_id().clone());
            report.waiting_player2 = session.player2_id().cloned();
        }

        report
    }

    /// Removes every session idle for longer than `max_idle` and returns
    /// their ids.
    ///
    /// Never waits on a session lock while holding the store lock. A
    /// session whose lock is held is in use and therefore not idle, so it
    /// is skipped.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<SessionId> {
        let candidates: Vec<(SessionId, SessionHandle)> = {
            let inner = self.inner.lock().await;
            inner
                .sessions
                .iter()
                .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
                .collect()
        };

        let stale: Vec<(SessionId, SessionHandle)> = candidates
            .into_iter()
            .filter(|(_, handle)| is_idle(handle, max_idle))
            .collect();
        if stale.is_empty() {
            return Vec::new();
        }

        let mut inner = self.inner.lock().await;
        let mut evicted = Vec::with_capacity(stale.len());
        for (id, handle) in stale {
            // The id may have been removed, replaced or touched since the scan.
            let unchanged = inner
                .sessions
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(current, &handle));
            if !unchanged || !is_idle(&handle, max_idle) {
                continue;
            }

            inner.sessions.remove(&id);
            if inner.open_slot.as_ref() == Some(&id) {
                inner.open_slot = None;
            }
            tracing::info!(session_id = %id, "idle session evicted");
            evicted.push(id);
        }

        evicted
    }
}

/// `true` if the session is unlocked and untouched for longer than
/// `max_idle`.
fn is_idle(handle: &SessionHandle, max_idle: Duration) -> bool {
    handle
        .try_lock()
        .is_ok_and(|session| session.idle_for() > max_idle)
}

impl StoreInner {
    fn put(&mut self, session: GameSession) -> SessionHandle {
        let id = session.id().clone();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&handle));
        handle
    }
}

/// Exclusive access to the store for one matchmaking decision.
///
/// Holding this guard blocks every other store operation, so keep the
/// work done under it O(1).
///
/// Outside this crate the guard is read-only. Only the matchmaker may
/// move the open slot or insert sessions:
///
/// ```compile_fail
/// # async fn retarget(store: &broadside_engine::SessionStore) {
/// let mut guard = store.matchmaking().await;
/// guard.set_open_slot(None);
/// # }
/// ```
pub struct MatchmakingGuard<'a> {
    inner: MutexGuard<'a, StoreInner>,
}

impl MatchmakingGuard<'_> {
    /// The current open slot, exactly as stored.
    pub fn open_slot(&self) -> Option<&SessionId> {
        self.inner.open_slot.as_ref()
    }

    /// Points the open slot at `id`, or clears it.
    pub(crate) fn set_open_slot(&mut self, id: Option<SessionId>) {
        self.inner.open_slot = id;
    }

    /// Clears the open slot if it names a session that is missing, no
    /// longer WAITING, or already has a second player, then returns the
    /// open session's handle if one remains.
    pub async fn normalize_open_slot(&mut self) -> Option<SessionHandle> {
        let id = self.inner.open_slot.clone()?;

        if let Some(handle) = self.inner.sessions.get(&id) {
            if handle.lock().await.is_open() {
                return Some(Arc::clone(handle));
            }
        }

        tracing::debug!(session_id = %id, "clearing stale open slot");
        self.inner.open_slot = None;
        None
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.inner.sessions.get(id).cloned()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.inner.sessions.contains_key(id)
    }

    pub(crate) fn put(&mut self, session: GameSession) -> SessionHandle {
        self.inner.put(session)
    }
}
