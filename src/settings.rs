//! Game settings and per-level tuning
//!
//! Persisted as `settings.json` next to the score store. Every table holds
//! exactly one entry per difficulty level.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_LEVEL, MIN_LEVEL, SLOT_SCALE};
use crate::error::{GameError, Result};
use crate::persistence::{FileStorage, StorageError};

/// Difficulty level, always within `MIN_LEVEL..=MAX_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub fn new(level: u8) -> Result<Self> {
        if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            Ok(Self(level))
        } else {
            Err(GameError::validation(format!(
                "difficulty must be between {MIN_LEVEL} and {MAX_LEVEL}, got {level}"
            )))
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Zero-based index into the level tables
    pub fn index(self) -> usize {
        (self.0 - MIN_LEVEL) as usize
    }

    pub fn all() -> impl Iterator<Item = Difficulty> {
        (MIN_LEVEL..=MAX_LEVEL).map(Difficulty)
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = GameError;

    fn try_from(level: u8) -> Result<Self> {
        Difficulty::new(level)
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memory Match tuning for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingLevel {
    pub rows: u8,
    pub cols: u8,
    /// Seconds before the round is lost
    pub time_limit: f32,
    /// Points for a match made at the start of the round
    pub base_points: u64,
    /// Points lost per whole elapsed second
    pub decay_per_sec: u64,
    /// Floor for a single match before the combo is applied
    pub min_points: u64,
    /// Awarded on a win to every player with at least one match
    pub completion_bonus: u64,
}

impl MatchingLevel {
    /// Playable cards; odd grids leave the last slot blank
    pub fn card_count(&self) -> usize {
        (self.rows as usize * self.cols as usize) & !1
    }

    pub fn pairs(&self) -> usize {
        self.card_count() / 2
    }
}

/// Number Rush tuning for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencingLevel {
    /// Targets are numbered `1..=count`
    pub count: u32,
    pub time_limit: f32,
    /// Points for a correct click at the very start of the round
    pub base_points: u64,
    /// Deducted (saturating) for each out-of-order click
    pub wrong_click_penalty: u64,
    /// Completion bonus per remaining second
    pub time_bonus_per_sec: u64,
}

/// Color Blast tuning for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionLevel {
    /// Prompts per player
    pub rounds: u32,
    /// Seconds each player has for their round
    pub time_limit: f32,
    /// Correct answers that count as reaching the goal
    pub target: u32,
    /// Seconds before an unanswered prompt is skipped
    pub round_timeout: f32,
    /// Points for an instant correct answer
    pub base_points: u64,
    /// Options shown per prompt, including the correct one
    pub choices: usize,
}

/// A named set of card symbols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolTheme {
    pub name: String,
    pub symbols: Vec<String>,
}

impl SymbolTheme {
    fn new(name: &str, symbols: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub name: String,
    pub hex: String,
}

/// Number Rush play area, in presentation units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playfield {
    pub width: f32,
    pub height: f32,
    /// Side of the square click target
    pub target_size: f32,
}

impl Playfield {
    /// Side of the slot each target is jittered within
    pub fn slot_size(&self) -> f32 {
        self.target_size * SLOT_SCALE
    }

    /// Slot grid dimensions (columns, rows)
    pub fn slot_grid(&self) -> (usize, usize) {
        let slot = self.slot_size();
        if slot <= 0.0 {
            return (0, 0);
        }
        (
            (self.width / slot).floor().max(0.0) as usize,
            (self.height / slot).floor().max(0.0) as usize,
        )
    }

    pub fn capacity(&self) -> usize {
        let (cols, rows) = self.slot_grid();
        cols * rows
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreboardSettings {
    /// Entries shown on a leaderboard
    pub leaderboard_size: usize,
    /// Keep only this many records per game type (None keeps everything)
    #[serde(default)]
    pub keep_per_game: Option<usize>,
}

/// All tunable parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub matching: Vec<MatchingLevel>,
    /// Seconds a mismatched pair stays visible
    pub hide_delay: f32,
    pub themes: Vec<SymbolTheme>,
    pub default_theme: String,

    pub sequencing: Vec<SequencingLevel>,
    pub playfield: Playfield,

    pub reaction: Vec<ReactionLevel>,
    pub palette: Vec<PaletteColor>,

    pub scoreboard: ScoreboardSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let matching = |rows, cols, time_limit, base_points, completion_bonus| MatchingLevel {
            rows,
            cols,
            time_limit,
            base_points,
            decay_per_sec: 1,
            min_points: 1,
            completion_bonus,
        };
        let sequencing =
            |count, time_limit, base_points, wrong_click_penalty| SequencingLevel {
                count,
                time_limit,
                base_points,
                wrong_click_penalty,
                time_bonus_per_sec: base_points,
            };
        let reaction = |rounds, time_limit, target, round_timeout, base_points| ReactionLevel {
            rounds,
            time_limit,
            target,
            round_timeout,
            base_points,
            choices: 4,
        };
        let color = |name: &str, hex: &str| PaletteColor {
            name: name.to_string(),
            hex: hex.to_string(),
        };

        Self {
            matching: vec![
                matching(4, 4, 90.0, 10, 100),
                matching(4, 4, 75.0, 20, 150),
                matching(5, 5, 120.0, 30, 200),
                matching(6, 6, 180.0, 40, 300),
                matching(6, 6, 150.0, 50, 500),
            ],
            hide_delay: 0.8,
            themes: default_themes(),
            default_theme: "Animals".to_string(),

            sequencing: vec![
                sequencing(15, 30.0, 10, 5),
                sequencing(20, 35.0, 20, 5),
                sequencing(25, 40.0, 30, 10),
                sequencing(30, 45.0, 40, 10),
                sequencing(40, 60.0, 50, 15),
            ],
            playfield: Playfield {
                width: 800.0,
                height: 560.0,
                target_size: 60.0,
            },

            reaction: vec![
                reaction(20, 45.0, 10, 5.0, 10),
                reaction(30, 40.0, 15, 4.0, 20),
                reaction(40, 35.0, 20, 3.0, 30),
                reaction(50, 30.0, 25, 2.5, 40),
                reaction(60, 25.0, 30, 2.0, 50),
            ],
            palette: vec![
                color("RED", "#E74C3C"),
                color("BLUE", "#3498DB"),
                color("GREEN", "#2ECC71"),
                color("YELLOW", "#F1C40F"),
                color("PURPLE", "#9B59B6"),
                color("ORANGE", "#E67E22"),
                color("PINK", "#FF69B4"),
                color("CYAN", "#00CED1"),
            ],

            scoreboard: ScoreboardSettings {
                leaderboard_size: 10,
                keep_per_game: None,
            },
        }
    }
}

fn default_themes() -> Vec<SymbolTheme> {
    vec![
        SymbolTheme::new(
            "Animals",
            &[
                "🐶", "🐱", "🐭", "🐹", "🐰", "🦊", "🐻", "🐼", "🐨", "🐯", "🦁", "🐮", "🐷",
                "🐸", "🐵", "🐔", "🐧", "🐙",
            ],
        ),
        SymbolTheme::new(
            "Fruits",
            &[
                "🍎", "🍊", "🍋", "🍌", "🍉", "🍇", "🍓", "🫐", "🍒", "🍑", "🥭", "🍍", "🥥",
                "🥝", "🍐", "🍈", "🍏", "🥑",
            ],
        ),
        SymbolTheme::new(
            "Sports",
            &[
                "⚽", "🏀", "🏈", "⚾", "🎾", "🏐", "🏉", "🎱", "🏓", "🏸", "🏒", "🏑", "🥊",
                "🥋", "⛳", "🏹", "🎳", "🥌",
            ],
        ),
        SymbolTheme::new(
            "Food",
            &[
                "🍕", "🍔", "🌭", "🍟", "🍿", "🧁", "🍰", "🎂", "🍪", "🍩", "🍦", "🍨", "🌮",
                "🌯", "🥐", "🥞", "🧇", "🍣",
            ],
        ),
        SymbolTheme::new(
            "Faces",
            &[
                "😀", "😎", "🤩", "😍", "🥳", "😊", "😂", "🤣", "😇", "🥰", "😋", "🤗", "🤔",
                "😴", "🤠", "🥶", "😱", "🤓",
            ],
        ),
        SymbolTheme::new(
            "Letters",
            &[
                "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P",
                "Q", "R",
            ],
        ),
        SymbolTheme::new(
            "Numbers",
            &[
                "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15",
                "16", "17", "18",
            ],
        ),
    ]
}

fn level_entry<'a, T>(table: &'a [T], game: &str, difficulty: Difficulty) -> Result<&'a T> {
    table.get(difficulty.index()).ok_or_else(|| {
        GameError::validation(format!("{game} has no level {difficulty} configured"))
    })
}

impl Settings {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "settings.json";

    pub fn matching_level(&self, difficulty: Difficulty) -> Result<&MatchingLevel> {
        level_entry(&self.matching, "Memory Match", difficulty)
    }

    pub fn sequencing_level(&self, difficulty: Difficulty) -> Result<&SequencingLevel> {
        level_entry(&self.sequencing, "Number Rush", difficulty)
    }

    pub fn reaction_level(&self, difficulty: Difficulty) -> Result<&ReactionLevel> {
        level_entry(&self.reaction, "Color Blast", difficulty)
    }

    /// Look up a theme by name (case-insensitive)
    pub fn theme(&self, name: &str) -> Option<&SymbolTheme> {
        self.themes
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Check that every level of every game can actually be played
    pub fn validate(&self) -> Result<()> {
        let levels = (MAX_LEVEL - MIN_LEVEL + 1) as usize;
        for (game, len) in [
            ("matching", self.matching.len()),
            ("sequencing", self.sequencing.len()),
            ("reaction", self.reaction.len()),
        ] {
            if len != levels {
                return Err(GameError::validation(format!(
                    "{game} table has {len} levels, expected {levels}"
                )));
            }
        }

        let max_pairs = self.matching.iter().map(|l| l.pairs()).max().unwrap_or(0);
        if let Some(level) = self.matching.iter().find(|l| l.pairs() == 0) {
            return Err(GameError::validation(format!(
                "{}x{} grid holds no pairs",
                level.rows, level.cols
            )));
        }
        for theme in &self.themes {
            let mut unique = theme.symbols.clone();
            unique.sort();
            unique.dedup();
            if unique.len() != theme.symbols.len() {
                return Err(GameError::validation(format!(
                    "theme {} repeats a symbol",
                    theme.name
                )));
            }
            if theme.symbols.len() < max_pairs {
                return Err(GameError::validation(format!(
                    "theme {} has {} symbols, needs {max_pairs}",
                    theme.name,
                    theme.symbols.len()
                )));
            }
        }
        if self.theme(&self.default_theme).is_none() {
            return Err(GameError::validation(format!(
                "default theme {} does not exist",
                self.default_theme
            )));
        }

        let max_count = self.sequencing.iter().map(|l| l.count).max().unwrap_or(0) as usize;
        if self.playfield.capacity() < max_count {
            return Err(GameError::validation(format!(
                "playfield fits {} targets, needs {max_count}",
                self.playfield.capacity()
            )));
        }

        for level in &self.reaction {
            if level.choices < 2 || level.choices > self.palette.len() {
                return Err(GameError::validation(format!(
                    "{} choices cannot be drawn from a palette of {}",
                    level.choices,
                    self.palette.len()
                )));
            }
            if level.rounds == 0 {
                return Err(GameError::validation("reaction level with zero rounds"));
            }
            if level.target == 0 || level.target > level.rounds {
                return Err(GameError::validation(format!(
                    "reaction target {} must be within 1..={}",
                    level.target, level.rounds
                )));
            }
        }

        let timed = self
            .matching
            .iter()
            .map(|l| l.time_limit)
            .chain(self.sequencing.iter().map(|l| l.time_limit))
            .chain(self.reaction.iter().flat_map(|l| [l.time_limit, l.round_timeout]));
        for limit in timed {
            if !(limit > 0.0) {
                return Err(GameError::validation(format!(
                    "time limits must be positive, got {limit}"
                )));
            }
        }
        Ok(())
    }

    /// Load settings from storage, falling back to defaults
    pub fn load(storage: &dyn FileStorage) -> Self {
        let bytes = match storage.load(Self::STORAGE_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                log::info!("Using default settings");
                return Self::default();
            }
            Err(e) => {
                log::warn!("Could not read settings ({e}), using defaults");
                return Self::default();
            }
        };

        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(settings) => match settings.validate() {
                Ok(()) => {
                    log::info!("Loaded settings");
                    settings
                }
                Err(e) => {
                    log::warn!("Ignoring invalid settings: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Settings file is corrupt ({e}), using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, storage: &dyn FileStorage) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(self)?;
        storage.save(Self::STORAGE_KEY, &json)?;
        log::info!("Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;

    #[test]
    fn test_defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn test_difficulty_bounds() {
        assert!(Difficulty::new(0).is_err());
        assert!(Difficulty::new(6).is_err());
        assert_eq!(Difficulty::new(3).unwrap().index(), 2);
        assert_eq!(Difficulty::all().count(), 5);
    }

    #[test]
    fn test_difficulty_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Difficulty>("4").is_ok());
        assert!(serde_json::from_str::<Difficulty>("9").is_err());
    }

    #[test]
    fn test_odd_grid_rounds_down() {
        let settings = Settings::default();
        let level3 = settings.matching_level(Difficulty::new(3).unwrap()).unwrap();
        assert_eq!(level3.card_count(), 24);
        assert_eq!(level3.pairs(), 12);
    }

    #[test]
    fn test_load_missing_and_corrupt_fall_back() {
        let storage = MemoryStorage::new();
        assert_eq!(Settings::load(&storage), Settings::default());

        storage.put(Settings::STORAGE_KEY, "{{{{");
        assert_eq!(Settings::load(&storage), Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let mut settings = Settings::default();
        settings.matching[0].time_limit = 42.0;
        settings.save(&storage).unwrap();
        assert_eq!(Settings::load(&storage).matching[0].time_limit, 42.0);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = Settings::default();
        settings.themes[0].symbols.truncate(10);
        assert!(settings.validate().is_err());

        let storage = MemoryStorage::new();
        settings.save(&storage).unwrap();
        assert_eq!(Settings::load(&storage), Settings::default());

        let mut settings = Settings::default();
        settings.playfield.width = 100.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.reaction.pop();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.reaction[0].target = settings.reaction[0].rounds + 1;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.reaction[4].time_limit = 0.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_theme_lookup_is_case_insensitive() {
        let settings = Settings::default();
        assert!(settings.theme("fruits").is_some());
        assert!(settings.theme("Planets").is_none());
    }
}
