//! Number Rush: click 1..N in order before the clock runs out
//!
//! Players take turns; each gets a fresh layout and the full time limit.

use glam::Vec2;
use rand::Rng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::engine::{GameEngine, TimerQueue, already_finished, time_weighted_points, unsupported};
use super::event::{GameEvent, InputEvent, RoundEnd, SessionId, Timer, TimerKind};
use crate::error::{GameError, Result};
use crate::scoreboard::GameType;
use crate::settings::{Difficulty, Playfield, SequencingLevel};

/// A clickable number. `pos` is the top-left corner of its square.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub value: u32,
    pub pos: Vec2,
    pub clicked: bool,
}

/// Two square targets of side `size` overlap
pub fn overlaps(a: Vec2, b: Vec2, size: f32) -> bool {
    (a.x - b.x).abs() < size && (a.y - b.y).abs() < size
}

/// Place `1..=count` on distinct slots of the playfield, jittered within each slot.
///
/// Slots are `SLOT_SCALE` times the target size, so jitter never causes overlap.
pub fn layout_targets(count: u32, field: &Playfield, rng: &mut Pcg32) -> Result<Vec<Target>> {
    let (cols, rows) = field.slot_grid();
    let count = count as usize;
    if cols * rows < count {
        return Err(GameError::validation(format!(
            "playfield has room for {} targets, {count} requested",
            cols * rows
        )));
    }

    let slot = field.slot_size();
    let slack = (slot - field.target_size).max(0.0);
    let mut slots: Vec<usize> = (0..cols * rows).collect();
    slots.shuffle(rng);

    Ok(slots
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, s)| {
            let jitter = Vec2::new(rng.random::<f32>(), rng.random::<f32>()) * slack;
            let corner = Vec2::new((s % cols) as f32, (s / cols) as f32) * slot;
            Target {
                value: i as u32 + 1,
                pos: corner + jitter,
                clicked: false,
            }
        })
        .collect())
}

/// Per-player results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RushPlayer {
    pub score: u64,
    pub mistakes: u32,
    /// Seconds taken, if every number was clicked
    pub finish_time: Option<f32>,
    pub result: Option<RoundEnd>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RushPhase {
    Playing,
    /// Waiting for `Ready` before the next player's round
    BetweenRounds,
    Finished,
}

#[derive(Debug, Clone)]
pub struct SequencingEngine {
    level: SequencingLevel,
    difficulty: Difficulty,
    playfield: Playfield,
    players: Vec<RushPlayer>,
    current: usize,
    targets: Vec<Target>,
    expected: u32,
    started_at: f32,
    phase: RushPhase,
    rng: Pcg32,
    timers: TimerQueue,
}

impl SequencingEngine {
    pub fn new(
        level: SequencingLevel,
        difficulty: Difficulty,
        playfield: Playfield,
        player_count: usize,
        session: SessionId,
        rng: Pcg32,
    ) -> Result<Self> {
        if playfield.capacity() < level.count as usize {
            return Err(GameError::validation(format!(
                "playfield cannot hold {} targets",
                level.count
            )));
        }
        Ok(Self {
            level,
            difficulty,
            playfield,
            players: vec![RushPlayer::default(); player_count.max(1)],
            current: 0,
            targets: Vec::new(),
            expected: 1,
            started_at: 0.0,
            phase: RushPhase::Playing,
            rng,
            timers: TimerQueue::new(session),
        })
    }

    /// Next value that will be accepted
    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target_size(&self) -> f32 {
        self.playfield.target_size
    }

    pub fn current_player(&self) -> usize {
        self.current
    }

    pub fn player(&self, idx: usize) -> Option<&RushPlayer> {
        self.players.get(idx)
    }

    pub fn phase(&self) -> RushPhase {
        self.phase
    }

    pub fn time_left(&self, now: f32) -> f32 {
        match self.phase {
            RushPhase::Playing => (self.started_at + self.level.time_limit - now).max(0.0),
            _ => 0.0,
        }
    }

    fn begin_round(&mut self, now: f32, events: &mut Vec<GameEvent>) {
        // Capacity was checked in `new`, so layout cannot fail here
        self.targets = layout_targets(self.level.count, &self.playfield, &mut self.rng)
            .unwrap_or_default();
        self.expected = 1;
        self.started_at = now;
        self.phase = RushPhase::Playing;

        events.push(GameEvent::RoundStarted {
            player: self.current,
        });
        events.push(GameEvent::TargetsPlaced {
            positions: self.targets.iter().map(|t| (t.value, t.pos)).collect(),
        });
        self.timers.schedule(
            TimerKind::RoundLimit,
            now + self.level.time_limit,
            events,
        );
    }

    fn click(&mut self, value: u32, now: f32, events: &mut Vec<GameEvent>) -> Result<()> {
        if value == 0 || value > self.level.count {
            return Err(GameError::validation(format!(
                "number {value} is not on the board (1..={})",
                self.level.count
            )));
        }
        let elapsed = now - self.started_at;
        if elapsed >= self.level.time_limit {
            self.end_round(RoundEnd::TimeUp, now, events);
            return Ok(());
        }

        let player = &mut self.players[self.current];
        if value == self.expected {
            let points = time_weighted_points(self.level.base_points, elapsed, self.level.time_limit);
            player.score += points;
            if let Some(target) = self.targets.iter_mut().find(|t| t.value == value) {
                target.clicked = true;
            }
            self.expected += 1;
            events.push(GameEvent::NumberAccepted {
                value,
                points,
                next: self.expected,
            });

            if self.expected > self.level.count {
                let remaining = (self.level.time_limit - elapsed).max(0.0).ceil() as u64;
                let bonus = remaining * self.level.time_bonus_per_sec;
                player.score += bonus;
                events.push(GameEvent::BonusAwarded {
                    player: self.current,
                    points: bonus,
                });
                self.end_round(RoundEnd::Completed, now, events);
            }
        } else {
            let penalty = self.level.wrong_click_penalty.min(player.score);
            player.score -= penalty;
            player.mistakes += 1;
            log::debug!("wrong number {value}, expected {}", self.expected);
            events.push(GameEvent::WrongNumber {
                value,
                expected: self.expected,
                penalty,
            });
        }
        Ok(())
    }

    fn end_round(&mut self, reason: RoundEnd, now: f32, events: &mut Vec<GameEvent>) {
        self.timers.clear();
        let player = &mut self.players[self.current];
        player.result = Some(reason);
        if reason == RoundEnd::Completed {
            player.finish_time = Some(now - self.started_at);
        }
        log::info!(
            "Number Rush round for player {} over ({reason:?}), score {}",
            self.current,
            player.score
        );
        events.push(GameEvent::RoundEnded {
            player: self.current,
            reason,
        });

        self.phase = if reason != RoundEnd::Aborted && self.current + 1 < self.players.len() {
            RushPhase::BetweenRounds
        } else {
            RushPhase::Finished
        };
    }
}

impl GameEngine for SequencingEngine {
    fn start(&mut self, now: f32, events: &mut Vec<GameEvent>) {
        self.current = 0;
        self.begin_round(now, events);
    }

    fn apply_input(
        &mut self,
        input: InputEvent,
        now: f32,
        events: &mut Vec<GameEvent>,
    ) -> Result<()> {
        match (self.phase, input) {
            (RushPhase::Finished, InputEvent::TimerExpired(_)) => Ok(()),
            (RushPhase::Finished, _) => Err(already_finished(&input)),
            (_, InputEvent::AbortRequested) => {
                self.abort(events);
                Ok(())
            }
            (RushPhase::Playing, InputEvent::NumberClicked { value }) => {
                self.click(value, now, events)
            }
            (RushPhase::BetweenRounds, InputEvent::NumberClicked { .. }) => {
                events.push(GameEvent::InputIgnored {
                    reason: "waiting for the next player",
                });
                Ok(())
            }
            (RushPhase::BetweenRounds, InputEvent::Ready) => {
                self.current += 1;
                self.begin_round(now, events);
                Ok(())
            }
            (RushPhase::Playing, InputEvent::Ready) => {
                events.push(GameEvent::InputIgnored {
                    reason: "round already running",
                });
                Ok(())
            }
            (_, InputEvent::TimerExpired(id)) => {
                if let Some(timer) = self.timers.take(id) {
                    if timer.kind == TimerKind::RoundLimit && self.phase == RushPhase::Playing {
                        self.end_round(RoundEnd::TimeUp, now, events);
                    }
                }
                Ok(())
            }
            (
                _,
                InputEvent::CellClicked { .. }
                | InputEvent::ColorClicked { .. }
                | InputEvent::ContinueLevel { .. },
            ) => Err(unsupported(GameType::Sequencing, &input)),
        }
    }

    fn abort(&mut self, events: &mut Vec<GameEvent>) {
        match self.phase {
            RushPhase::Playing => {
                let now = self.started_at;
                self.end_round(RoundEnd::Aborted, now, events);
            }
            RushPhase::BetweenRounds => {
                self.timers.clear();
                self.phase = RushPhase::Finished;
            }
            RushPhase::Finished => {}
        }
    }

    fn is_finished(&self) -> bool {
        self.phase == RushPhase::Finished
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
