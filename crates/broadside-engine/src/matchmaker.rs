//! Matchmaking: pair an arriving player with the open session, or open a
//! new one.
//!
//! The whole decision runs under a single [`MatchmakingGuard`], so two
//! concurrent joins can never both claim the same open slot or both
//! believe they opened the first session.

use broadside_protocol::{PlayerId, Role, SessionId, ShipPlacement};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{GameError, GameSession, SessionStore, ShipCatalog, occupied_cells};

/// Where a joining player ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub session_id: SessionId,
    pub role: Role,
}

/// Pairs players into sessions.
pub struct Matchmaker<C: ShipCatalog> {
    catalog: C,
}

impl<C: ShipCatalog> Matchmaker<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Seats `player_id` with the given fleet.
    ///
    /// 1. Drop the open slot if it has gone stale.
    /// 2. If a slot is open and belongs to someone else, take seat 2 and
    ///    start the match. If it belongs to this same player, hand back
    ///    seat 1 unchanged.
    /// 3. Otherwise open a new session and become its open slot.
    pub async fn join(
        &self,
        store: &SessionStore,
        player_id: PlayerId,
        placements: Vec<ShipPlacement>,
    ) -> Result<JoinOutcome, GameError> {
        let mut guard = store.matchmaking().await;

        if let Some(handle) = guard.normalize_open_slot().await {
            let mut session = handle.lock().await;
            let session_id = session.id().clone();

            if *session.player1_id() == player_id {
                tracing::debug!(
                    %session_id,
                    %player_id,
                    "player re-joined own open session"
                );
                return Ok(JoinOutcome {
                    session_id,
                    role: Role::Player1,
                });
            }

            let occupied = occupied_cells(&placements, &self.catalog);
            session.seat_player2(player_id.clone(), placements, occupied)?;
            guard.set_open_slot(None);

            tracing::info!(
                %session_id,
                %player_id,
                opponent = %session.player1_id(),
                "player joined as PLAYER2, session active"
            );
            return Ok(JoinOutcome {
                session_id,
                role: Role::Player2,
            });
        }

        let mut session_id = generate_session_id();
        while guard.contains(&session_id) {
            session_id = generate_session_id();
        }

        let occupied = occupied_cells(&placements, &self.catalog);
        let cells = occupied.len();
        guard.put(GameSession::new(
            session_id.clone(),
            player_id.clone(),
            placements,
            occupied,
        ));
        guard.set_open_slot(Some(session_id.clone()));

        tracing::info!(
            %session_id,
            %player_id,
            occupied = cells,
            "session created, waiting for opponent"
        );
        Ok(JoinOutcome {
            session_id,
            role: Role::Player1,
        })
    }
}

/// Generates a random 32-character hex session id (128 bits).
fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    SessionId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

#[cfg(test)]
mod tests {
    use broadside_protocol::SessionStatus;

    use super::*;
    use crate::FleetCatalog;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn matchmaker() -> Matchmaker<FleetCatalog> {
        Matchmaker::new(FleetCatalog::standard())
    }

    fn fleet() -> Vec<ShipPlacement> {
        vec![ShipPlacement::horizontal(5, 0)]
    }

    #[test]
    fn test_generate_session_id_is_32_hex_chars() {
        let id = generate_session_id();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_session_id(), id);
    }

    #[tokio::test]
    async fn test_join_first_player_opens_waiting_session() {
        let store = SessionStore::new();
        let mm = matchmaker();

        let outcome = mm.join(&store, pid("alice"), fleet()).await.unwrap();
        assert_eq!(outcome.role, Role::Player1);

        let handle = store.get(&outcome.session_id).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.status(), SessionStatus::Waiting);
        assert_eq!(session.current_turn(), Some(&pid("alice")));
        assert_eq!(
            session.occupied(Role::Player1).iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
        drop(session);

        assert_eq!(store.report().await.open_slot, Some(outcome.session_id));
    }

    #[tokio::test]
    async fn test_join_second_player_activates_same_session() {
        let store = SessionStore::new();
        let mm = matchmaker();

        let first = mm.join(&store, pid("alice"), fleet()).await.unwrap();
        let second = mm
            .join(&store, pid("bob"), vec![ShipPlacement::vertical(8, 50)])
            .await
            .unwrap();

        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.role, Role::Player2);

        let handle = store.get(&first.session_id).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.player2_id(), Some(&pid("bob")));
        assert_eq!(
            session.occupied(Role::Player2).iter().copied().collect::<Vec<_>>(),
            vec![50, 60, 70]
        );
        drop(session);

        assert_eq!(store.report().await.open_slot, None);
    }

    #[tokio::test]
    async fn test_join_third_player_opens_new_session() {
        let store = SessionStore::new();
        let mm = matchmaker();

        let first = mm.join(&store, pid("alice"), fleet()).await.unwrap();
        mm.join(&store, pid("bob"), fleet()).await.unwrap();
        let third = mm.join(&store, pid("carol"), fleet()).await.unwrap();

        assert_ne!(third.session_id, first.session_id);
        assert_eq!(third.role, Role::Player1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_join_same_player_twice_is_not_self_matched() {
        let store = SessionStore::new();
        let mm = matchmaker();

        let first = mm.join(&store, pid("alice"), fleet()).await.unwrap();
        let again = mm.join(&store, pid("alice"), Vec::new()).await.unwrap();

        assert_eq!(again, first);
        assert_eq!(store.len().await, 1);

        let handle = store.get(&first.session_id).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.status(), SessionStatus::Waiting);
        assert_eq!(session.player2_id(), None);
        // The original fleet is kept.
        assert_eq!(session.occupied(Role::Player1).len(), 2);
    }

    #[tokio::test]
    async fn test_join_after_open_session_removed_opens_new_one() {
        let store = SessionStore::new();
        let mm = matchmaker();

        let first = mm.join(&store, pid("alice"), fleet()).await.unwrap();
        store.remove(&first.session_id).await;

        let next = mm.join(&store, pid("bob"), fleet()).await.unwrap();
        assert_eq!(next.role, Role::Player1);
        assert_ne!(next.session_id, first.session_id);
    }

    #[tokio::test]
    async fn test_join_heals_slot_pointing_at_missing_session() {
        let store = SessionStore::new();
        let mm = matchmaker();
        store
            .matchmaking()
            .await
            .set_open_slot(Some(SessionId::new("vanished")));

        let outcome = mm.join(&store, pid("alice"), fleet()).await.unwrap();
        assert_eq!(outcome.role, Role::Player1);
        assert_ne!(outcome.session_id, SessionId::new("vanished"));
        assert_eq!(store.report().await.open_slot, Some(outcome.session_id));
    }
}
