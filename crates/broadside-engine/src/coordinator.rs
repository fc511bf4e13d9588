//! The engine's public face: join, status, fire, leave, diagnostics.
//!
//! `Coordinator` owns the [`SessionStore`] and wires the matchmaker and
//! turn engine to it. Transport adapters hold one `Coordinator` (usually
//! behind an `Arc`) and call these methods from concurrent tasks.

use std::time::Duration;

use broadside_protocol::{
    MatchmakerReport, PlayerId, SessionId, SessionSnapshot, ShipPlacement,
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineConfig, FireOutcome, GameError, JoinOutcome, Matchmaker, ScoreReporter,
    SessionStore, ShipCatalog, TurnEngine,
};

/// Reply to a leave request. Leaving never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveOutcome {
    pub ok: bool,
    pub message: String,
    /// The session that was removed; `None` if it was already gone.
    pub removed_session_id: Option<SessionId>,
    pub player_id: PlayerId,
}

/// Coordinates every session operation against one shared store.
pub struct Coordinator<C: ShipCatalog, R: ScoreReporter> {
    store: SessionStore,
    matchmaker: Matchmaker<C>,
    turns: TurnEngine<R>,
    config: EngineConfig,
}

impl<C: ShipCatalog, R: ScoreReporter> Coordinator<C, R> {
    /// Creates a coordinator with an empty store and default config.
    pub fn new(catalog: C, reporter: R) -> Self {
        Self::with_config(catalog, reporter, EngineConfig::default())
    }

    pub fn with_config(catalog: C, reporter: R, config: EngineConfig) -> Self {
        Self::with_store(SessionStore::new(), catalog, reporter, config)
    }

    /// Creates a coordinator around an existing store.
    pub fn with_store(
        store: SessionStore,
        catalog: C,
        reporter: R,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            matchmaker: Matchmaker::new(catalog),
            turns: TurnEngine::new(reporter),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn reporter(&self) -> &R {
        self.turns.reporter()
    }

    /// Submits a fleet and enters matchmaking.
    pub async fn join(
        &self,
        player_id: PlayerId,
        placements: Vec<ShipPlacement>,
    ) -> Result<JoinOutcome, GameError> {
        self.matchmaker.join(&self.store, player_id, placements).await
    }

    /// Copies out a session's full state, or `None` if it is unknown.
    pub async fn status(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        let handle = self.store.get(session_id).await?;
        let session = handle.lock().await;
        Some(session.snapshot())
    }

    /// Fires one shot. Only this session is locked while the shot is
    /// resolved.
    pub async fn fire(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
        cell_index: i32,
    ) -> Result<FireOutcome, GameError> {
        let handle = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| GameError::NotFound(session_id.clone()))?;

        let mut session = handle.lock().await;
        self.turns.fire(&mut session, player_id, cell_index)
    }

    /// Removes a session. Idempotent; never awards a win.
    pub async fn leave(&self, session_id: &SessionId, player_id: &PlayerId) -> LeaveOutcome {
        let removed = self.store.remove(session_id).await;
        tracing::info!(%session_id, %player_id, removed = removed.is_some(), "leave");

        match removed {
            Some(_) => LeaveOutcome {
                ok: true,
                message: "Game removed".to_string(),
                removed_session_id: Some(session_id.clone()),
                player_id: player_id.clone(),
            },
            None => LeaveOutcome {
                ok: true,
                message: "Game already removed".to_string(),
                removed_session_id: None,
                player_id: player_id.clone(),
            },
        }
    }

    /// Debugging view of the matchmaker.
    pub async fn diagnostics(&self) -> MatchmakerReport {
        self.store.report().await
    }

    /// Evicts sessions idle beyond the configured timeout. Does nothing
    /// when no timeout is configured.
    pub async fn reap_idle(&self) -> Vec<SessionId> {
        match self.config.idle_timeout {
            Some(max_idle) => self.evict_idle(max_idle).await,
            None => Vec::new(),
        }
    }

    /// Evicts sessions idle for longer than `max_idle`.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<SessionId> {
        self.store.evict_idle(max_idle).await
    }
}
