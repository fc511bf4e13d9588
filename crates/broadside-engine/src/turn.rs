//! Shot resolution: turn legality, hit/miss, turn handoff, win detection.

use broadside_protocol::{PlayerId, Role, SessionStatus, ShotStatus};
use serde::{Deserialize, Serialize};

use crate::{CELL_COUNT, GameError, GameSession, ScoreReporter};

/// Result of an accepted shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireOutcome {
    /// `GameOver` when this shot sank the last occupied cell.
    pub status: ShotStatus,
    pub cell_index: u8,
    pub hit: bool,
    /// Who fires next; `None` once the game is over.
    pub next_turn: Option<PlayerId>,
    pub game_status: SessionStatus,
    pub winner_id: Option<PlayerId>,
}

impl FireOutcome {
    pub fn game_over(&self) -> bool {
        self.status == ShotStatus::GameOver
    }
}

/// Applies shots to sessions and reports finished games.
pub struct TurnEngine<R: ScoreReporter> {
    reporter: R,
}

impl<R: ScoreReporter> TurnEngine<R> {
    pub fn new(reporter: R) -> Self {
        Self { reporter }
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Resolves `firing` shooting at `cell_index` of the opponent's grid.
    ///
    /// The caller must hold the session's lock for the whole call; that
    /// is what makes the turn check and the mutation one atomic step.
    ///
    /// A hit keeps the turn with the shooter. A miss passes it to the
    /// opponent. Every rejection leaves the session untouched.
    ///
    /// # Errors
    /// Checked in this order: [`GameError::InvalidState`],
    /// [`GameError::Unauthorized`], [`GameError::IntegrityGap`],
    /// [`GameError::TurnViolation`], [`GameError::OutOfRange`],
    /// [`GameError::Repeat`].
    ///
    /// `IntegrityGap` is raised for any ACTIVE session with an empty
    /// opponent seat, even when a turn is set: there is no board to
    /// shoot at and nobody to hand a missed turn to.
    pub fn fire(
        &self,
        session: &mut GameSession,
        firing: &PlayerId,
        cell_index: i32,
    ) -> Result<FireOutcome, GameError> {
        if session.status() != SessionStatus::Active {
            return Err(GameError::InvalidState {
                session_id: session.id().clone(),
                status: session.status(),
            });
        }

        let shooter = session.role_of(firing).ok_or_else(|| GameError::Unauthorized {
            session_id: session.id().clone(),
            player_id: firing.clone(),
        })?;

        let target = opponent(shooter);
        let opponent_id = session
            .player(target)
            .cloned()
            .ok_or_else(|| GameError::IntegrityGap(session.id().clone()))?;

        // A missing turn with both seats filled defaults to player 1.
        let turn = match session.current_turn() {
            Some(turn) => turn.clone(),
            None => {
                tracing::warn!(
                    session_id = %session.id(),
                    "session had no current turn, defaulting to player 1"
                );
                session.player1_id().clone()
            }
        };

        if turn != *firing {
            return Err(GameError::TurnViolation { current_turn: turn });
        }

        let cell = u8::try_from(cell_index)
            .ok()
            .filter(|c| usize::from(*c) < CELL_COUNT)
            .ok_or(GameError::OutOfRange(cell_index))?;

        let hit = session.occupied(target).contains(&cell);
        if !session.record_shot(target, cell, hit) {
            return Err(GameError::Repeat(cell));
        }

        let next = if hit { turn } else { opponent_id };
        session.set_current_turn(next.clone());

        tracing::debug!(
            session_id = %session.id(),
            player_id = %firing,
            cell,
            hit,
            "shot fired"
        );

        if !session.is_sunk(target) {
            return Ok(FireOutcome {
                status: ShotStatus::ShotFired,
                cell_index: cell,
                hit,
                next_turn: Some(next),
                game_status: session.status(),
                winner_id: None,
            });
        }

        session.finish(firing.clone());
        tracing::info!(
            session_id = %session.id(),
            winner = %firing,
            "game finished"
        );
        self.award_score(session);

        Ok(FireOutcome {
            status: ShotStatus::GameOver,
            cell_index: cell,
            hit,
            next_turn: None,
            game_status: session.status(),
            winner_id: session.winner_id().cloned(),
        })
    }

    /// Reports the finished game once. Reporter failures are logged and
    /// otherwise ignored; the session is marked as scored either way.
    fn award_score(&self, session: &mut GameSession) {
        if session.score_awarded() {
            return;
        }
        let Some(winner) = session.winner_id().cloned() else {
            return;
        };

        let players = [Some(session.player1_id()), session.player2_id()];
        for player in players.into_iter().flatten() {
            if let Err(e) = self.reporter.record_game_played(player) {
                tracing::warn!(
                    session_id = %session.id(),
                    player_id = %player,
                    error = %e,
                    "failed to record game played"
                );
            }
        }
        if let Err(e) = self.reporter.record_win(&winner) {
            tracing::warn!(
                session_id = %session.id(),
                player_id = %winner,
                error = %e,
                "failed to record win"
            );
        }

        session.mark_score_awarded();
    }
}

fn opponent(role: Role) -> Role {
    match role {
        Role::Player1 => Role::Player2,
        Role::Player2 => Role::Player1,
    }
}
