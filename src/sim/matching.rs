//! Memory Match: find every pair of symbols on a shared board
//!
//! Clearing a board below the top level offers the next level. Scores carry
//! over; matches and streaks start again.

use rand::seq::{IndexedRandom, SliceRandom};
use rand_pcg::Pcg32;

use super::engine::{GameEngine, TimerQueue, already_finished, unsupported};
use super::event::{GameEvent, InputEvent, RoundEnd, SessionId, Timer, TimerId, TimerKind};
use crate::consts::MAX_LEVEL;
use crate::error::{GameError, Result};
use crate::scoreboard::GameType;
use crate::settings::{Difficulty, MatchingLevel, SymbolTheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Hidden,
    Revealed,
    /// Matched cards stay face up for the rest of the round
    Matched,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub symbol: String,
    pub state: CardState,
}

/// Card layout. Cards fill the grid row by row; an odd grid leaves its last slot empty.
#[derive(Debug, Clone)]
pub struct Board {
    rows: u8,
    cols: u8,
    cards: Vec<Card>,
}

impl Board {
    /// Draw `pairs` distinct symbols from the theme and shuffle two of each onto the grid
    pub fn generate(level: &MatchingLevel, theme: &SymbolTheme, rng: &mut Pcg32) -> Result<Self> {
        let pairs = level.pairs();
        if theme.symbols.len() < pairs {
            return Err(GameError::validation(format!(
                "theme {} has {} symbols but a {}x{} grid needs {pairs}",
                theme.name,
                theme.symbols.len(),
                level.rows,
                level.cols
            )));
        }

        let chosen: Vec<&String> = theme.symbols.choose_multiple(rng, pairs).collect();
        let mut cards: Vec<Card> = chosen
            .iter()
            .chain(chosen.iter())
            .map(|symbol| Card {
                symbol: (*symbol).clone(),
                state: CardState::Hidden,
            })
            .collect();
        cards.shuffle(rng);

        Ok(Self {
            rows: level.rows,
            cols: level.cols,
            cards,
        })
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Grid position (row, col) of a card
    pub fn position(&self, cell: usize) -> (usize, usize) {
        let cols = self.cols.max(1) as usize;
        (cell / cols, cell % cols)
    }

    /// Number of distinct symbols on the board
    pub fn unique_symbols(&self) -> usize {
        let mut symbols: Vec<&str> = self.cards.iter().map(|c| c.symbol.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();
        symbols.len()
    }

    pub fn all_matched(&self) -> bool {
        self.cards.iter().all(|c| c.state == CardState::Matched)
    }

    fn hide(&mut self, cell: usize) {
        if let Some(card) = self.cards.get_mut(cell) {
            if card.state == CardState::Revealed {
                card.state = CardState::Hidden;
            }
        }
    }
}

/// Per-player running totals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPlayer {
    pub score: u64,
    pub matches: u32,
    /// Consecutive matches by this player
    pub streak: u32,
}

impl MatchPlayer {
    /// Multiplier for the current streak: x1 for matches 1-2, x2 from the third, ...
    pub fn combo(&self) -> u64 {
        1 + (self.streak / 3) as u64
    }
}

#[derive(Debug, Clone)]
pub struct MatchingEngine {
    levels: Vec<MatchingLevel>,
    level: MatchingLevel,
    difficulty: Difficulty,
    hide_delay: f32,
    theme: SymbolTheme,
    rng: Pcg32,
    board: Board,
    players: Vec<MatchPlayer>,
    current: usize,
    first_pick: Option<usize>,
    pending_hide: Option<(usize, usize, TimerId)>,
    moves: u32,
    started_at: f32,
    /// Board cleared, waiting for `ContinueLevel`
    cleared: bool,
    ended: Option<RoundEnd>,
    timers: TimerQueue,
}

fn level_for(levels: &[MatchingLevel], difficulty: Difficulty) -> Result<MatchingLevel> {
    levels.get(difficulty.index()).cloned().ok_or_else(|| {
        GameError::validation(format!("no Memory Match table for level {difficulty}"))
    })
}

impl MatchingEngine {
    /// `levels` is the full level table, indexed by difficulty
    pub fn new(
        levels: Vec<MatchingLevel>,
        difficulty: Difficulty,
        hide_delay: f32,
        theme: SymbolTheme,
        player_count: usize,
        session: SessionId,
        mut rng: Pcg32,
    ) -> Result<Self> {
        let level = level_for(&levels, difficulty)?;
        let board = Board::generate(&level, &theme, &mut rng)?;
        Ok(Self {
            levels,
            level,
            difficulty,
            hide_delay,
            theme,
            rng,
            board,
            players: vec![MatchPlayer::default(); player_count.max(1)],
            current: 0,
            first_pick: None,
            pending_hide: None,
            moves: 0,
            started_at: 0.0,
            cleared: false,
            ended: None,
            timers: TimerQueue::new(session),
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Waiting for the players to continue to the next level or stop
    pub fn level_cleared(&self) -> bool {
        self.cleared
    }

    pub fn current_player(&self) -> usize {
        self.current
    }

    pub fn player(&self, idx: usize) -> Option<&MatchPlayer> {
        self.players.get(idx)
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn matched_pairs(&self) -> usize {
        self.board
            .cards
            .iter()
            .filter(|c| c.state == CardState::Matched)
            .count()
            / 2
    }

    /// A card is face up (revealed this turn or matched)
    pub fn is_face_up(&self, cell: usize) -> bool {
        self.board
            .cards
            .get(cell)
            .is_some_and(|c| c.state != CardState::Hidden)
    }

    pub fn outcome(&self) -> Option<RoundEnd> {
        self.ended
    }

    /// Seconds left on the round clock at `now`
    pub fn time_left(&self, now: f32) -> f32 {
        (self.started_at + self.level.time_limit - now).max(0.0)
    }

    /// Points for one match before the combo is applied
    pub fn match_points(&self, elapsed: f32) -> u64 {
        let secs = elapsed.max(0.0).floor() as u64;
        self.level
            .base_points
            .saturating_sub(self.level.decay_per_sec.saturating_mul(secs))
            .max(self.level.min_points)
    }

    fn reveal(&mut self, cell: usize, now: f32, events: &mut Vec<GameEvent>) -> Result<()> {
        if cell >= self.board.len() {
            return Err(GameError::validation(format!(
                "cell {cell} is outside the {}-card board",
                self.board.len()
            )));
        }
        if now >= self.started_at + self.level.time_limit {
            self.end(RoundEnd::TimeUp, events);
            return Ok(());
        }

        // A new reveal hides a mismatched pair that is still showing
        self.flush_hide(events);

        match self.board.cards[cell].state {
            CardState::Matched => {
                events.push(GameEvent::InputIgnored {
                    reason: "card already matched",
                });
                return Ok(());
            }
            CardState::Revealed => {
                events.push(GameEvent::InputIgnored {
                    reason: "card already revealed",
                });
                return Ok(());
            }
            CardState::Hidden => {}
        }

        self.board.cards[cell].state = CardState::Revealed;
        events.push(GameEvent::CardRevealed {
            cell,
            symbol: self.board.cards[cell].symbol.clone(),
        });

        match self.first_pick.take() {
            None => self.first_pick = Some(cell),
            Some(first) => self.resolve_pair(first, cell, now, events),
        }
        Ok(())
    }

    fn resolve_pair(&mut self, a: usize, b: usize, now: f32, events: &mut Vec<GameEvent>) {
        self.moves += 1;
        let player_idx = self.current;

        if self.board.cards[a].symbol == self.board.cards[b].symbol {
            self.board.cards[a].state = CardState::Matched;
            self.board.cards[b].state = CardState::Matched;

            let base = self.match_points(now - self.started_at);
            let player = &mut self.players[player_idx];
            player.matches += 1;
            player.streak += 1;
            let combo = player.combo();
            let points = base * combo;
            player.score += points;
            log::debug!("player {player_idx} matched {a}/{b} for {points} (x{combo})");
            events.push(GameEvent::MatchFound {
                player: player_idx,
                cells: (a, b),
                points,
                combo,
            });

            if self.board.all_matched() {
                self.award_completion_bonus(events);
                self.clear_level(events);
                return;
            }
        } else {
            self.players[player_idx].streak = 0;
            events.push(GameEvent::Mismatch {
                player: player_idx,
                cells: (a, b),
            });
            let id = self
                .timers
                .schedule(TimerKind::HidePair, now + self.hide_delay, events);
            self.pending_hide = Some((a, b, id));
        }

        self.current = (self.current + 1) % self.players.len();
        events.push(GameEvent::TurnChanged {
            player: self.current,
        });
    }

    fn award_completion_bonus(&mut self, events: &mut Vec<GameEvent>) {
        let bonus = self.level.completion_bonus;
        for (idx, player) in self.players.iter_mut().enumerate() {
            if player.matches > 0 {
                player.score += bonus;
                events.push(GameEvent::BonusAwarded {
                    player: idx,
                    points: bonus,
                });
            }
        }
    }

    /// Offer the next level, or end the game at the top level
    fn clear_level(&mut self, events: &mut Vec<GameEvent>) {
        let level = self.difficulty.level();
        if level >= MAX_LEVEL || self.levels.len() <= self.difficulty.index() + 1 {
            self.end(RoundEnd::Completed, events);
            return;
        }
        self.cleared = true;
        self.timers.clear();
        self.first_pick = None;
        self.pending_hide = None;
        log::info!("Memory Match level {level} cleared after {} moves", self.moves);
        events.push(GameEvent::LevelCleared {
            level,
            next: level + 1,
        });
    }

    /// Deal the next level's board, keeping scores
    fn next_level(&mut self, now: f32, events: &mut Vec<GameEvent>) -> Result<()> {
        let difficulty = Difficulty::new(self.difficulty.level() + 1)?;
        let level = level_for(&self.levels, difficulty)?;
        let board = Board::generate(&level, &self.theme, &mut self.rng)?;

        self.difficulty = difficulty;
        self.level = level;
        self.board = board;
        self.cleared = false;
        self.moves = 0;
        self.current = 0;
        for player in &mut self.players {
            player.matches = 0;
            player.streak = 0;
        }
        log::info!("Memory Match continuing at level {difficulty}");
        self.start(now, events);
        Ok(())
    }

    fn flush_hide(&mut self, events: &mut Vec<GameEvent>) {
        if let Some((a, b, id)) = self.pending_hide.take() {
            self.timers.cancel(id);
            self.board.hide(a);
            self.board.hide(b);
            events.push(GameEvent::CardsHidden { cells: (a, b) });
        }
    }

    fn end(&mut self, reason: RoundEnd, events: &mut Vec<GameEvent>) {
        if self.ended.is_some() {
            return;
        }
        self.ended = Some(reason);
        self.cleared = false;
        self.timers.clear();
        self.first_pick = None;
        self.pending_hide = None;
        log::info!(
            "Memory Match round over ({reason:?}) after {} moves, {} pairs",
            self.moves,
            self.matched_pairs()
        );
        events.push(GameEvent::RoundEnded {
            player: self.current,
            reason,
        });
    }
}

impl GameEngine for MatchingEngine {
    fn start(&mut self, now: f32, events: &mut Vec<GameEvent>) {
        self.started_at = now;
        events.push(GameEvent::RoundStarted { player: 0 });
        events.push(GameEvent::TurnChanged { player: 0 });
        self.timers.schedule(
            TimerKind::RoundLimit,
            now + self.level.time_limit,
            events,
        );
    }

    fn apply_input(
        &mut self,
        input: InputEvent,
        now: f32,
        events: &mut Vec<GameEvent>,
    ) -> Result<()> {
        if self.ended.is_some() {
            return match input {
                InputEvent::TimerExpired(_) => Ok(()),
                _ => Err(already_finished(&input)),
            };
        }
        if self.cleared {
            return match input {
                InputEvent::ContinueLevel { accept: true } => self.next_level(now, events),
                InputEvent::ContinueLevel { accept: false } => {
                    self.end(RoundEnd::Completed, events);
                    Ok(())
                }
                InputEvent::AbortRequested => {
                    self.abort(events);
                    Ok(())
                }
                InputEvent::NumberClicked { .. } | InputEvent::ColorClicked { .. } => {
                    Err(unsupported(GameType::Matching, &input))
                }
                InputEvent::CellClicked { .. } | InputEvent::Ready => {
                    events.push(GameEvent::InputIgnored {
                        reason: "level cleared, continue or stop",
                    });
                    Ok(())
                }
                InputEvent::TimerExpired(_) => Ok(()),
            };
        }
        match input {
            InputEvent::CellClicked { cell } => self.reveal(cell, now, events),
            InputEvent::TimerExpired(id) => {
                let Some(timer) = self.timers.take(id) else {
                    return Ok(());
                };
                match timer.kind {
                    TimerKind::HidePair => {
                        if self.pending_hide.is_some_and(|(_, _, pending)| pending == id) {
                            // Already removed from the queue; flush just hides the cards
                            self.flush_hide(events);
                        }
                    }
                    TimerKind::RoundLimit => self.end(RoundEnd::TimeUp, events),
                    TimerKind::PromptTimeout => {}
                }
                Ok(())
            }
            InputEvent::Ready => {
                events.push(GameEvent::InputIgnored {
                    reason: "Memory Match has a single shared round",
                });
                Ok(())
            }
            InputEvent::ContinueLevel { .. } => {
                events.push(GameEvent::InputIgnored {
                    reason: "level not cleared yet",
                });
                Ok(())
            }
            InputEvent::AbortRequested => {
                self.abort(events);
                Ok(())
            }
            InputEvent::NumberClicked { .. } | InputEvent::ColorClicked { .. } => {
                Err(unsupported(GameType::Matching, &input))
            }
        }
    }

    fn abort(&mut self, events: &mut Vec<GameEvent>) {
        self.end(RoundEnd::Aborted, events);
    }

    fn is_finished(&self) -> bool {
        self.ended.is_some()
    }

    fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    fn final_scores(&self) -> Vec<u64> {
        self.players.iter().map(|p| p.score).collect()
    }

    fn pending_timers(&self) -> &[Timer] {
        self.timers.pending()
    }
}
