//! Score reporting: the games-played and wins counters.
//!
//! The engine calls a [`ScoreReporter`] once per finished session. The
//! reporter is an outside collaborator (typically an account database);
//! [`Scoreboard`] is the in-memory implementation used by the demo server
//! and by tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use broadside_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use crate::ScoreError;

/// Sink for end-of-game bookkeeping.
///
/// Called while the finishing session is locked, so implementations must
/// return quickly. Slow backends should queue the update and return.
pub trait ScoreReporter: Send + Sync + 'static {
    /// Adds one to the player's games-played counter.
    fn record_game_played(&self, player: &PlayerId) -> Result<(), ScoreError>;

    /// Adds one to the player's wins counter.
    fn record_win(&self, player: &PlayerId) -> Result<(), ScoreError>;
}

impl<R: ScoreReporter + ?Sized> ScoreReporter for Arc<R> {
    fn record_game_played(&self, player: &PlayerId) -> Result<(), ScoreError> {
        (**self).record_game_played(player)
    }

    fn record_win(&self, player: &PlayerId) -> Result<(), ScoreError> {
        (**self).record_win(player)
    }
}

/// A player's lifetime record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub games_played: u64,
    pub wins: u64,
    /// `games_played - wins`, never negative.
    pub losses: u64,
    /// Wins as a percentage of games played; `0.0` with no games.
    pub win_rate: f64,
}

impl PlayerStats {
    fn from_counts(games_played: u64, wins: u64) -> Self {
        let win_rate = if games_played == 0 {
            0.0
        } else {
            wins as f64 * 100.0 / games_played as f64
        };
        Self {
            games_played,
            wins,
            losses: games_played.saturating_sub(wins),
            win_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    games_played: u64,
    wins: u64,
}

/// In-memory [`ScoreReporter`].
#[derive(Debug, Default)]
pub struct Scoreboard {
    counters: Mutex<HashMap<PlayerId, Counters>>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the player's record. Unknown players have an empty record.
    pub fn stats(&self, player: &PlayerId) -> PlayerStats {
        let counters = match self.counters.lock() {
            Ok(map) => map.get(player).copied().unwrap_or_default(),
            Err(poisoned) => poisoned
                .into_inner()
                .get(player)
                .copied()
                .unwrap_or_default(),
        };
        PlayerStats::from_counts(counters.games_played, counters.wins)
    }

    fn update(
        &self,
        player: &PlayerId,
        apply: impl FnOnce(&mut Counters),
    ) -> Result<(), ScoreError> {
        let mut map = self
            .counters
            .lock()
            .map_err(|e| ScoreError::Unavailable(e.to_string()))?;
        apply(map.entry(player.clone()).or_default());
        Ok(())
    }
}

impl ScoreReporter for Scoreboard {
    fn record_game_played(&self, player: &PlayerId) -> Result<(), ScoreError> {
        self.update(player, |c| c.games_played += 1)
    }

    fn record_win(&self, player: &PlayerId) -> Result<(), ScoreError> {
        self.update(player, |c| c.wins += 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_unknown_player_is_empty() {
        let board = Scoreboard::new();
        let stats = board.stats(&PlayerId::new("ghost"));
        assert_eq!(stats.games_played, 0);
        assert_eq!(stats.wins, 0);
        assert_eq!(stats.losses, 0);
        assert_eq!(stats.win_rate, 0.0);
    }

    #[test]
    fn test_stats_derives_losses_and_win_rate() {
        let board = Scoreboard::new();
        let alice = PlayerId::new("alice");
        for _ in 0..4 {
            board.record_game_played(&alice).unwrap();
        }
        board.record_win(&alice).unwrap();

        let stats = board.stats(&alice);
        assert_eq!(stats.games_played, 4);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 3);
        assert_eq!(stats.win_rate, 25.0);
    }

    #[test]
    fn test_losses_never_negative() {
        let stats = PlayerStats::from_counts(1, 3);
        assert_eq!(stats.losses, 0);
    }

    #[test]
    fn test_arc_scoreboard_is_a_reporter() {
        let board = Arc::new(Scoreboard::new());
        let reporter: Arc<Scoreboard> = Arc::clone(&board);
        reporter.record_win(&PlayerId::new("bob")).unwrap();
        assert_eq!(board.stats(&PlayerId::new("bob")).wins, 1);
    }
}
