//! The session entity: one match's full state.
//!
//! `GameSession` owns its fields privately. The only ways to change it
//! are the methods below, each of which keeps the entity's invariants:
//!
//! - player 2 is seated at most once, and only while WAITING
//! - shot sequences never contain duplicates
//! - every hit is also a shot
//! - status only moves forward, and a winner exists iff FINISHED
//!
//! Which session is "open" is not tracked here; that belongs to the
//! [`SessionStore`](crate::SessionStore).

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use broadside_protocol::{
    PlayerId, Role, SessionId, SessionSnapshot, SessionStatus, ShipPlacement,
};

use crate::GameError;

/// One player's side of the table.
#[derive(Debug, Clone, Default)]
struct Board {
    ships: Vec<ShipPlacement>,
    occupied: BTreeSet<u8>,
    /// Cells the opponent fired at, in order.
    shots: Vec<u8>,
    /// The subset of `shots` that landed on `occupied`.
    hits: Vec<u8>,
}

impl Board {
    fn new(ships: Vec<ShipPlacement>, occupied: BTreeSet<u8>) -> Self {
        Self {
            ships,
            occupied,
            shots: Vec::new(),
            hits: Vec::new(),
        }
    }

    fn is_sunk(&self) -> bool {
        !self.occupied.is_empty()
            && self.occupied.iter().all(|cell| self.hits.contains(cell))
    }
}

/// State of a single match between two players.
#[derive(Debug, Clone)]
pub struct GameSession {
    id: SessionId,
    player1_id: PlayerId,
    player2_id: Option<PlayerId>,
    player1: Board,
    player2: Board,
    current_turn: Option<PlayerId>,
    status: SessionStatus,
    winner_id: Option<PlayerId>,
    score_awarded: bool,
    last_activity: Instant,
}

impl GameSession {
    /// Opens a session for its first player. Player 1 moves first.
    pub fn new(
        id: SessionId,
        player1_id: PlayerId,
        ships: Vec<ShipPlacement>,
        occupied: BTreeSet<u8>,
    ) -> Self {
        Self {
            id,
            current_turn: Some(player1_id.clone()),
            player1_id,
            player2_id: None,
            player1: Board::new(ships, occupied),
            player2: Board::default(),
            status: SessionStatus::Waiting,
            winner_id: None,
            score_awarded: false,
            last_activity: Instant::now(),
        }
    }

    /// Seats the second player and starts the match.
    ///
    /// # Errors
    /// [`GameError::InvalidState`] if the session is no longer WAITING or
    /// already has a second player.
    pub fn seat_player2(
        &mut self,
        player2_id: PlayerId,
        ships: Vec<ShipPlacement>,
        occupied: BTreeSet<u8>,
    ) -> Result<(), GameError> {
        if !self.is_open() {
            return Err(GameError::InvalidState {
                session_id: self.id.clone(),
                status: self.status,
            });
        }

        self.player2_id = Some(player2_id);
        self.player2 = Board::new(ships, occupied);
        self.status = SessionStatus::Active;
        self.touch();
        Ok(())
    }

    /// Returns `true` while the session is WAITING with an empty second
    /// seat.
    pub fn is_open(&self) -> bool {
        self.status.is_joinable() && self.player2_id.is_none()
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn player1_id(&self) -> &PlayerId {
        &self.player1_id
    }

    pub fn player2_id(&self) -> Option<&PlayerId> {
        self.player2_id.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_turn(&self) -> Option<&PlayerId> {
        self.current_turn.as_ref()
    }

    pub fn winner_id(&self) -> Option<&PlayerId> {
        self.winner_id.as_ref()
    }

    pub fn score_awarded(&self) -> bool {
        self.score_awarded
    }

    /// The seat `player` occupies, if any.
    pub fn role_of(&self, player: &PlayerId) -> Option<Role> {
        if *player == self.player1_id {
            Some(Role::Player1)
        } else if self.player2_id.as_ref() == Some(player) {
            Some(Role::Player2)
        } else {
            None
        }
    }

    /// The player in `role`, if seated.
    pub fn player(&self, role: Role) -> Option<&PlayerId> {
        match role {
            Role::Player1 => Some(&self.player1_id),
            Role::Player2 => self.player2_id.as_ref(),
        }
    }

    /// Cells covered by the fleet of the player in `role`.
    pub fn occupied(&self, role: Role) -> &BTreeSet<u8> {
        &self.board(role).occupied
    }

    /// Cells already fired at the player in `role`, in firing order.
    pub fn shots_at(&self, role: Role) -> &[u8] {
        &self.board(role).shots
    }

    /// The subset of [`shots_at`](Self::shots_at) that hit a ship.
    pub fn hits_at(&self, role: Role) -> &[u8] {
        &self.board(role).hits
    }

    /// Returns `true` once every occupied cell of `role` has been hit.
    /// An empty fleet is never sunk.
    pub fn is_sunk(&self, role: Role) -> bool {
        self.board(role).is_sunk()
    }

    /// How long since the session last changed.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Copies the full state out for callers outside the lock.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            player1_id: self.player1_id.clone(),
            player2_id: self.player2_id.clone(),
            player1_ships: self.player1.ships.clone(),
            player2_ships: self.player2.ships.clone(),
            player1_occupied: self.player1.occupied.iter().copied().collect(),
            player2_occupied: self.player2.occupied.iter().copied().collect(),
            shots_at_player1: self.player1.shots.clone(),
            shots_at_player2: self.player2.shots.clone(),
            hits_at_player1: self.player1.hits.clone(),
            hits_at_player2: self.player2.hits.clone(),
            current_turn: self.current_turn.clone(),
            status: self.status,
            winner_id: self.winner_id.clone(),
            score_awarded: self.score_awarded,
        }
    }

    // -- Mutation used by the turn engine --

    /// Appends a shot at `target`. Returns `false` and changes nothing if
    /// the cell was already fired at.
    pub(crate) fn record_shot(&mut self, target: Role, cell: u8, hit: bool) -> bool {
        let board = self.board_mut(target);
        if board.shots.contains(&cell) {
            return false;
        }
        board.shots.push(cell);
        if hit {
            board.hits.push(cell);
        }
        self.touch();
        true
    }

    pub(crate) fn set_current_turn(&mut self, player: PlayerId) {
        self.current_turn = Some(player);
    }

    /// Moves ACTIVE → FINISHED and records the winner. Has no effect on a
    /// session that is not ACTIVE.
    pub(crate) fn finish(&mut self, winner: PlayerId) {
        if !self.status.can_transition_to(SessionStatus::Finished) {
            return;
        }
        self.status = SessionStatus::Finished;
        self.winner_id = Some(winner);
    }

    pub(crate) fn mark_score_awarded(&mut self) {
        self.score_awarded = true;
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn board(&self, role: Role) -> &Board {
        match role {
            Role::Player1 => &self.player1,
            Role::Player2 => &self.player2,
        }
    }

    fn board_mut(&mut self, role: Role) -> &mut Board {
        match role {
            Role::Player1 => &mut self.player1,
            Role::Player2 => &mut self.player2,
        }
    }

    // -- Fault injection for tests of the turn engine's self-healing --

    #[cfg(test)]
    pub(crate) fn clear_current_turn(&mut self) {
        self.current_turn = None;
    }

    #[cfg(test)]
    pub(crate) fn force_active_without_opponent(&mut self) {
        self.status = SessionStatus::Active;
        self.current_turn = None;
    }

    #[cfg(test)]
    pub(crate) fn backdate_activity(&mut self, by: Duration) {
        if let Some(earlier) = self.last_activity.checked_sub(by) {
            self.last_activity = earlier;
        }
    }
}
