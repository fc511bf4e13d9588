//! Core protocol types for Broadside's wire format.
//!
//! Every type in this module is serializable: it either travels on the
//! wire directly or is embedded in something that does.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An opaque, pre-authenticated player identifier.
///
/// The engine never interprets the contents. Whatever the authentication
/// layer hands out (an account number, a username, a UUID) is carried
/// as-is and compared for equality only.
///
/// `#[serde(transparent)]` keeps the JSON form a bare string:
/// `PlayerId::new("42")` serializes as `"42"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A unique identifier for one match.
///
/// Generated once by the matchmaker when a session is opened and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// Game data
// ---------------------------------------------------------------------------

/// Where one ship sits on the 10×10 grid.
///
/// This is a plain transfer shape. The engine derives occupied cells from
/// it and keeps a copy by value; nothing holds a reference back into the
/// transport layer.
///
/// `start_cell_index` is signed so that a client sending `-1` produces a
/// placement the engine can skip, rather than a decode failure that throws
/// away the whole fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipPlacement {
    /// Key into the ship catalog. `None` means "unknown ship".
    #[serde(default)]
    pub ship_id: Option<u64>,
    /// Row-major index of the bow, `row * 10 + col`.
    pub start_cell_index: i32,
    /// `true` for a run along the row, `false` for a run down the column.
    #[serde(default)]
    pub is_horizontal: bool,
}

impl ShipPlacement {
    /// A horizontal placement.
    pub fn horizontal(ship_id: u64, start_cell_index: i32) -> Self {
        Self {
            ship_id: Some(ship_id),
            start_cell_index,
            is_horizontal: true,
        }
    }

    /// A vertical placement.
    pub fn vertical(ship_id: u64, start_cell_index: i32) -> Self {
        Self {
            ship_id: Some(ship_id),
            start_cell_index,
            is_horizontal: false,
        }
    }
}

/// Which seat a player occupies in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Opened the session; fires first.
    Player1,
    /// Joined an open session.
    Player2,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player1 => f.write_str("PLAYER1"),
            Self::Player2 => f.write_str("PLAYER2"),
        }
    }
}

/// Lifecycle of a session.
///
/// Transitions only move forward:
///
/// ```text
/// Waiting → Active → Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    /// Opened by player 1, waiting for an opponent.
    Waiting,
    /// Both players present; shots are accepted.
    Active,
    /// Someone won. Terminal.
    Finished,
}

impl SessionStatus {
    /// Returns `true` if a second player may still join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns the status that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Active),
            Self::Active => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` keeps the lifecycle monotonic.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("WAITING"),
            Self::Active => f.write_str("ACTIVE"),
            Self::Finished => f.write_str("FINISHED"),
        }
    }
}

/// Outcome label of a successful shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShotStatus {
    /// The shot was recorded and the game continues.
    ShotFired,
    /// The shot sank the last occupied cell.
    GameOver,
}

/// A read-only copy of one session's full state.
///
/// Occupied sets are sorted ascending; shot and hit sequences keep the
/// order in which the shots landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub player1_id: PlayerId,
    pub player2_id: Option<PlayerId>,
    pub player1_ships: Vec<ShipPlacement>,
    pub player2_ships: Vec<ShipPlacement>,
    pub player1_occupied: Vec<u8>,
    pub player2_occupied: Vec<u8>,
    pub shots_at_player1: Vec<u8>,
    pub shots_at_player2: Vec<u8>,
    pub hits_at_player1: Vec<u8>,
    pub hits_at_player2: Vec<u8>,
    pub current_turn: Option<PlayerId>,
    pub status: SessionStatus,
    pub winner_id: Option<PlayerId>,
    pub score_awarded: bool,
}

/// Debugging view of the matchmaker. Nothing depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchmakerReport {
    /// The session currently waiting for a second player, if any.
    pub open_slot: Option<SessionId>,
    /// Number of sessions held by the store.
    pub session_count: usize,
    /// Status of the open-slot session, when it resolves.
    pub waiting_status: Option<SessionStatus>,
    pub waiting_player1: Option<PlayerId>,
    pub waiting_player2: Option<PlayerId>,
}

// ---------------------------------------------------------------------------
// Message — everything that crosses the wire
// ---------------------------------------------------------------------------

/// Requests and responses exchanged over a connection.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "Fire", "session_id": "…", "cell_index": 42 }`.
///
/// Requests never carry a player id. The connection authenticates once
/// during the handshake and every later request acts as that player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    // -- Connection lifecycle --
    /// Client → Server: first frame on every connection.
    Handshake { version: u32, token: Option<String> },

    /// Server → Client: the connection now acts as `player_id`.
    HandshakeAck { player_id: PlayerId, server_time: u64 },

    /// Either direction: closing the connection.
    Disconnect { reason: String },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client keep-alive reply.
    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- Game operations --
    /// Client → Server: submit a fleet and enter matchmaking.
    Join { placements: Vec<ShipPlacement> },

    /// Server → Client: the session and seat the player landed in.
    Joined { session_id: SessionId, role: Role },

    /// Client → Server: poll a session.
    Status { session_id: SessionId },

    /// Server → Client: the session's state, or `None` if unknown.
    Snapshot { session: Option<SessionSnapshot> },

    /// Client → Server: fire at one cell of the opponent's grid.
    Fire { session_id: SessionId, cell_index: i32 },

    /// Server → Client: result of an accepted shot.
    ShotResult {
        status: ShotStatus,
        cell_index: u8,
        hit: bool,
        next_turn: Option<PlayerId>,
        game_status: SessionStatus,
        winner_id: Option<PlayerId>,
    },

    /// Client → Server: tear the session down.
    Leave { session_id: SessionId },

    /// Server → Client: leave always succeeds.
    Left {
        ok: bool,
        message: String,
        removed_session_id: Option<SessionId>,
        player_id: PlayerId,
    },

    /// Client → Server: request the matchmaker debug view.
    Diagnostics,

    /// Server → Client: the matchmaker debug view.
    MatchmakerReport(MatchmakerReport),

    // -- Errors --
    /// Server → Client: a request was rejected. `code` follows HTTP
    /// conventions (400, 401, 403, 404, 409, 500).
    Error { code: u16, message: String },
}

/// A framed message with ordering metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-connection sequence number assigned by the sender.
    pub seq: u64,
    /// Milliseconds since the sender's connection start.
    pub timestamp: u64,
    pub message: Message,
}
