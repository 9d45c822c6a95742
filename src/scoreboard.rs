//! High score leaderboard system
//!
//! Full play history for all three games, persisted after every change and
//! ranked per game type on demand.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::persistence::{self, FileStorage, LoadOutcome};
use crate::settings::{Difficulty, ScoreboardSettings};

/// Which mini-game a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Matching,
    Sequencing,
    Reaction,
}

impl GameType {
    pub const ALL: [GameType; 3] = [GameType::Matching, GameType::Sequencing, GameType::Reaction];

    /// Title shown in menus
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Matching => "Memory Match",
            GameType::Sequencing => "Number Rush",
            GameType::Reaction => "Color Blast",
        }
    }

}

impl FromStr for GameType {
    type Err = GameError;

    /// Accepts the menu title, the serialized name or a short alias
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "matching" | "memory" | "memory match" | "match" => Ok(GameType::Matching),
            "sequencing" | "number rush" | "numbers" | "rush" => Ok(GameType::Sequencing),
            "reaction" | "color blast" | "colors" | "blast" => Ok(GameType::Reaction),
            _ => Err(GameError::validation(format!("unknown game '{s}'"))),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finished attempt by one player. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    player_name: String,
    game_type: GameType,
    score: u64,
    level: Difficulty,
    timestamp: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn new(
        player_name: impl Into<String>,
        game_type: GameType,
        score: u64,
        level: Difficulty,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            player_name: player_name.into(),
            game_type,
            score,
            level,
            timestamp,
        }
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn level(&self) -> Difficulty {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Persistent score history
pub struct Scoreboard {
    records: Vec<ScoreRecord>,
    options: ScoreboardSettings,
    storage: Box<dyn FileStorage>,
}

impl fmt::Debug for Scoreboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoreboard")
            .field("records", &self.records.len())
            .field("options", &self.options)
            .finish()
    }
}

impl Scoreboard {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "scores.json";

    /// Load the score store. A missing or unreadable store yields an empty board.
    pub fn load(storage: Box<dyn FileStorage>, options: ScoreboardSettings) -> Self {
        let outcome = persistence::load_records::<ScoreRecord>(storage.as_ref(), Self::STORAGE_KEY);
        match &outcome {
            LoadOutcome::Missing => log::info!("No scores found, starting fresh"),
            LoadOutcome::Loaded(records) => log::info!("Loaded {} scores", records.len()),
            LoadOutcome::Recovered(records) => {
                log::warn!("Score store damaged, restored {} scores from backup", records.len())
            }
            LoadOutcome::Corrupt(reason) => {
                log::warn!("Score store unreadable ({reason}), starting with an empty scoreboard")
            }
        }
        Self {
            records: outcome.into_records(),
            options,
            storage,
        }
    }

    /// Append a record and write the store.
    ///
    /// On a write failure the record is kept in memory and the error is returned.
    pub fn record(&mut self, entry: ScoreRecord) -> Result<()> {
        let game_type = entry.game_type;
        log::info!(
            "{}: {} scored {} (level {})",
            game_type,
            entry.player_name,
            entry.score,
            entry.level
        );
        self.records.push(entry);
        if let Some(keep) = self.options.keep_per_game {
            self.prune(game_type, keep);
        }
        self.save()
    }

    /// Up to `n` best records for a game: score descending, earlier timestamp first on ties
    pub fn top(&self, game_type: GameType, n: usize) -> Vec<ScoreRecord> {
        self.ranked(game_type).into_iter().take(n).cloned().collect()
    }

    /// Leaderboard using the configured size
    pub fn leaderboard(&self, game_type: GameType) -> Vec<ScoreRecord> {
        self.top(game_type, self.options.leaderboard_size)
    }

    /// Full history in insertion order
    pub fn all(&self) -> &[ScoreRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Best score for a game (if any)
    pub fn top_score(&self, game_type: GameType) -> Option<u64> {
        self.ranked(game_type).first().map(|r| r.score)
    }

    /// 1-based rank of the player's best record for a game
    pub fn rank_of(&self, game_type: GameType, player_name: &str) -> Option<usize> {
        self.ranked(game_type)
            .iter()
            .position(|r| r.player_name == player_name)
            .map(|i| i + 1)
    }

    /// Check if a score would make the leaderboard
    pub fn qualifies(&self, game_type: GameType, score: u64) -> bool {
        self.potential_rank(game_type, score).is_some()
    }

    /// Rank a new score would take (1-based; ties go behind existing records)
    pub fn potential_rank(&self, game_type: GameType, score: u64) -> Option<usize> {
        if score == 0 {
            return None;
        }
        let ahead = self
            .records
            .iter()
            .filter(|r| r.game_type == game_type && r.score >= score)
            .count();
        (ahead < self.options.leaderboard_size).then_some(ahead + 1)
    }

    /// Remove records for one game, or everything
    pub fn clear(&mut self, game_type: Option<GameType>) -> Result<()> {
        match game_type {
            Some(game_type) => self.records.retain(|r| r.game_type != game_type),
            None => self.records.clear(),
        }
        log::info!(
            "Cleared scores for {}",
            game_type.map(|g| g.as_str()).unwrap_or("all games")
        );
        self.save()
    }

    fn ranked(&self, game_type: GameType) -> Vec<&ScoreRecord> {
        let mut ranked: Vec<&ScoreRecord> = self
            .records
            .iter()
            .filter(|r| r.game_type == game_type)
            .collect();
        // Stable sort keeps insertion order for identical timestamps
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.timestamp.cmp(&b.timestamp)));
        ranked
    }

    fn prune(&mut self, game_type: GameType, keep: usize) {
        let survivors: Vec<ScoreRecord> = self.top(game_type, keep);
        let before = self.records.len();
        let mut budget = survivors;
        self.records.retain(|r| {
            if r.game_type != game_type {
                return true;
            }
            match budget.iter().position(|s| s == r) {
                Some(i) => {
                    budget.swap_remove(i);
                    true
                }
                None => false,
            }
        });
        let dropped = before - self.records.len();
        if dropped > 0 {
            log::debug!("Pruned {dropped} {game_type} records");
        }
    }

    fn save(&self) -> Result<()> {
        persistence::save_records(self.storage.as_ref(), Self::STORAGE_KEY, &self.records)?;
        log::info!("Scores saved ({} entries)", self.records.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use crate::persistence::MemoryStorage;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn options() -> ScoreboardSettings {
        ScoreboardSettings {
            leaderboard_size: 10,
            keep_per_game: None,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn entry(name: &str, game_type: GameType, score: u64, secs: i64) -> ScoreRecord {
        ScoreRecord::new(name, game_type, score, Difficulty::new(1).unwrap(), at(secs))
    }

    fn board(storage: &MemoryStorage) -> Scoreboard {
        Scoreboard::load(Box::new(storage.clone()), options())
    }

    #[test]
    fn test_record_persists_and_reloads() {
        let storage = MemoryStorage::new();
        let mut scores = board(&storage);
        let rec = entry("Ada", GameType::Matching, 120, 0);
        scores.record(rec.clone()).unwrap();

        let reloaded = board(&storage);
        assert_eq!(reloaded.all(), &[rec.clone()]);
        // Byte-for-byte equal after serialization
        assert_eq!(
            serde_json::to_vec(&reloaded.all()[0]).unwrap(),
            serde_json::to_vec(&rec).unwrap()
        );
    }

    #[test]
    fn test_top_orders_by_score_then_timestamp() {
        let storage = MemoryStorage::new();
        let mut scores = board(&storage);
        scores.record(entry("late", GameType::Reaction, 50, 30)).unwrap();
        scores.record(entry("high", GameType::Reaction, 90, 20)).unwrap();
        scores.record(entry("early", GameType::Reaction, 50, 10)).unwrap();
        scores.record(entry("other", GameType::Matching, 999, 0)).unwrap();

        let names: Vec<_> = scores
            .top(GameType::Reaction, 10)
            .iter()
            .map(|r| r.player_name().to_string())
            .collect();
        assert_eq!(names, ["high", "early", "late"]);
        assert_eq!(scores.top(GameType::Reaction, 2).len(), 2);
        assert_eq!(scores.top_score(GameType::Matching), Some(999));
        assert_eq!(scores.all().len(), 4);
    }

    #[test]
    fn test_rank_and_qualifies() {
        let storage = MemoryStorage::new();
        let mut scores = Scoreboard::load(
            Box::new(storage),
            ScoreboardSettings {
                leaderboard_size: 2,
                keep_per_game: None,
            },
        );
        scores.record(entry("a", GameType::Sequencing, 100, 0)).unwrap();
        scores.record(entry("b", GameType::Sequencing, 200, 1)).unwrap();

        assert_eq!(scores.rank_of(GameType::Sequencing, "a"), Some(2));
        assert_eq!(scores.rank_of(GameType::Sequencing, "zed"), None);
        assert_eq!(scores.potential_rank(GameType::Sequencing, 150), Some(2));
        assert!(!scores.qualifies(GameType::Sequencing, 100));
        assert!(!scores.qualifies(GameType::Sequencing, 0));
        assert!(scores.qualifies(GameType::Matching, 1));
    }

    #[test]
    fn test_corrupt_store_starts_empty() {
        let storage = MemoryStorage::new();
        storage.put(Scoreboard::STORAGE_KEY, "");
        assert!(board(&storage).all().is_empty());

        storage.put(Scoreboard::STORAGE_KEY, "[{\"player_name\": 3}]");
        assert!(board(&storage).all().is_empty());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let storage = MemoryStorage::new();
        let mut scores = board(&storage);
        storage.set_fail_writes(true);
        let err = scores
            .record(entry("Ada", GameType::Matching, 10, 0))
            .unwrap_err();
        assert!(matches!(err, GameError::Persistence(_)));
        // Still visible for the rest of the run
        assert_eq!(scores.all().len(), 1);
    }

    #[test]
    fn test_prune_keeps_best_in_insertion_order() {
        let storage = MemoryStorage::new();
        let mut scores = Scoreboard::load(
            Box::new(storage),
            ScoreboardSettings {
                leaderboard_size: 10,
                keep_per_game: Some(2),
            },
        );
        scores.record(entry("a", GameType::Matching, 30, 0)).unwrap();
        scores.record(entry("x", GameType::Reaction, 1, 1)).unwrap();
        scores.record(entry("b", GameType::Matching, 10, 2)).unwrap();
        scores.record(entry("c", GameType::Matching, 20, 3)).unwrap();

        let names: Vec<_> = scores.all().iter().map(|r| r.player_name()).collect();
        assert_eq!(names, ["a", "x", "c"]);
    }

    #[test]
    fn test_clear_one_game() {
        let storage = MemoryStorage::new();
        let mut scores = board(&storage);
        scores.record(entry("a", GameType::Matching, 30, 0)).unwrap();
        scores.record(entry("b", GameType::Reaction, 30, 0)).unwrap();
        scores.clear(Some(GameType::Matching)).unwrap();
        assert_eq!(board(&storage).all().len(), 1);
        scores.clear(None).unwrap();
        assert!(board(&storage).is_empty());
    }

    #[test]
    fn test_game_type_names() {
        for game in GameType::ALL {
            assert_eq!(game.as_str().parse::<GameType>().unwrap(), game);
        }
        assert_eq!("  Blast ".parse::<GameType>().unwrap(), GameType::Reaction);
        assert!(matches!(
            "pong".parse::<GameType>(),
            Err(GameError::Validation(_))
        ));
        assert_eq!(
            serde_json::to_string(&GameType::Sequencing).unwrap(),
            "\"sequencing\""
        );
    }

    proptest! {
        #[test]
        fn prop_top_is_bounded_and_sorted(
            entries in prop::collection::vec((0u64..50, 0i64..20, 0usize..3), 0..40)
        ) {
            let storage = MemoryStorage::new();
            let mut scores = board(&storage);
            for (i, (score, secs, game)) in entries.iter().enumerate() {
                let rec = entry(&format!("p{i}"), GameType::ALL[*game], *score, *secs);
                scores.record(rec).unwrap();
            }
            let top = scores.top(GameType::Matching, 10);
            prop_assert!(top.len() <= 10);
            for pair in top.windows(2) {
                prop_assert!(pair[0].score() >= pair[1].score());
                if pair[0].score() == pair[1].score() {
                    prop_assert!(pair[0].timestamp() <= pair[1].timestamp());
                }
            }
        }
    }
}
