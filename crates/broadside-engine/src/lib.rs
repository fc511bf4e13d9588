//! Session coordination engine for Broadside.
//!
//! Everything with a real invariant lives here: pairing players,
//! deriving ship occupancy, enforcing turns, resolving shots, and
//! declaring exactly one winner per match.
//!
//! # Key types
//!
//! - [`occupied_cells`] + [`ShipCatalog`] — placements → occupied cells
//! - [`GameSession`] — one match's state, mutated only through
//!   invariant-preserving methods
//! - [`SessionStore`] — the shared registry plus the open-slot pointer
//! - [`Matchmaker`] — claims the open slot or opens a new session
//! - [`TurnEngine`] — resolves a single shot
//! - [`ScoreReporter`] — the games-played / wins sink
//! - [`Coordinator`] — the four public operations wired together
//!
//! # Locking
//!
//! ```text
//! SessionStore lock  ──(held across)──→  per-session lock
//! ```
//!
//! Matchmaking takes the store lock and may then lock the open session.
//! Firing, status and the diagnostics report take the store lock only
//! long enough to clone a session handle, then lock that one session.
//! Idle eviction only `try_lock`s sessions and skips busy ones. No path
//! acquires the store lock while holding a session lock, so the order is
//! fixed and operations on different sessions never wait on each other.

mod config;
mod coordinator;
mod error;
mod matchmaker;
mod occupancy;
mod score;
mod session;
mod store;
mod turn;

pub use config::EngineConfig;
pub use coordinator::{Coordinator, LeaveOutcome};
pub use error::{GameError, ScoreError};
pub use matchmaker::{JoinOutcome, Matchmaker};
pub use occupancy::{CELL_COUNT, FleetCatalog, GRID_SIZE, ShipCatalog, occupied_cells};
pub use score::{PlayerStats, ScoreReporter, Scoreboard};
pub use session::GameSession;
pub use store::{MatchmakingGuard, SessionHandle, SessionStore};
pub use turn::{FireOutcome, TurnEngine};
