//! Error types for the engine.

use broadside_protocol::{PlayerId, SessionId, SessionStatus};

/// Why a request against a session was refused.
///
/// Every variant is a recoverable, caller-facing outcome. None of them
/// leave a session partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// No session with this id is in the store.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session is not accepting this operation in its current status,
    /// e.g. firing while still WAITING or after FINISHED.
    #[error("session {session_id} is {status}")]
    InvalidState {
        session_id: SessionId,
        status: SessionStatus,
    },

    /// The player is not seated in this session.
    #[error("player {player_id} is not part of session {session_id}")]
    Unauthorized {
        session_id: SessionId,
        player_id: PlayerId,
    },

    /// The player fired out of turn.
    #[error("not your turn: it is {current_turn}'s turn")]
    TurnViolation { current_turn: PlayerId },

    /// The cell index is outside `0..100`.
    #[error("cell index {0} is outside the grid")]
    OutOfRange(i32),

    /// The attacker already fired at this cell.
    #[error("cell {0} was already fired at")]
    Repeat(u8),

    /// The session has no usable current turn and no opponent to default
    /// to. Indicates a construction bug, not a user mistake.
    #[error("session {0} has no defined turn and no opponent")]
    IntegrityGap(SessionId),
}

impl GameError {
    /// HTTP-style status code used when the error is reported on the wire.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidState { .. } => 409,
            Self::Unauthorized { .. } => 403,
            Self::TurnViolation { .. } => 409,
            Self::OutOfRange(_) => 400,
            Self::Repeat(_) => 409,
            Self::IntegrityGap(_) => 500,
        }
    }
}

/// Failure from a [`ScoreReporter`](crate::ScoreReporter).
///
/// The engine logs and swallows these. A finished game stays finished
/// whether or not the counters were updated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    /// The reporter could not map the player to an account.
    #[error("no account for player {0}")]
    UnknownPlayer(PlayerId),

    /// The backing store could not be reached.
    #[error("score store unavailable: {0}")]
    Unavailable(String),
}
