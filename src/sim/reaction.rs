//! Color Blast: pick the ink colour of a colour word, fast
//!
//! Each prompt shows a colour name drawn in some ink. The player must click
//! the option naming the ink, not the word. Wrong picks count as misses and
//! leave the prompt up; unanswered prompts are skipped after a timeout.
//! Each player's round also runs against a clock and a target of correct
//! answers.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::engine::{GameEngine, TimerQueue, already_finished, time_weighted_points, unsupported};
use super::event::{GameEvent, InputEvent, RoundEnd, SessionId, Timer, TimerId, TimerKind};
use crate::error::{GameError, Result};
use crate::scoreboard::GameType;
use crate::settings::{Difficulty, PaletteColor, ReactionLevel};

/// Final score: latency points plus an accuracy bonus of `⌊100·correct/rounds⌋ × level`
pub fn final_score(points: u64, correct: u32, rounds: u32, difficulty: Difficulty) -> u64 {
    if rounds == 0 {
        return points;
    }
    let accuracy = 100 * correct as u64 / rounds as u64;
    points + accuracy * difficulty.level() as u64
}

/// The prompt currently on screen. Colours are palette indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Colour named by the text
    pub word: usize,
    /// Colour the text is drawn in; the correct answer
    pub ink: usize,
    pub choices: Vec<usize>,
    pub shown_at: f32,
    timer: TimerId,
}

impl Prompt {
    /// Index of the correct option
    pub fn answer(&self) -> Option<usize> {
        self.choices.iter().position(|&c| c == self.ink)
    }
}

/// Per-player results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlastPlayer {
    /// Sum of latency-weighted points
    pub points: u64,
    pub correct: u32,
    pub misses: u32,
    pub timeouts: u32,
    pub result: Option<RoundEnd>,
    pub target_reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlastPhase {
    Playing,
    BetweenRounds,
    Finished,
}

#[derive(Debug, Clone)]
pub struct ReactionEngine {
    level: ReactionLevel,
    difficulty: Difficulty,
    palette: Vec<PaletteColor>,
    players: Vec<BlastPlayer>,
    current: usize,
    /// Prompts resolved by the current player
    resolved: u32,
    round_started: f32,
    prompt: Option<Prompt>,
    phase: BlastPhase,
    rng: Pcg32,
    timers: TimerQueue,
}

impl ReactionEngine {
    pub fn new(
        level: ReactionLevel,
        difficulty: Difficulty,
        palette: Vec<PaletteColor>,
        player_count: usize,
        session: SessionId,
        rng: Pcg32,
    ) -> Result<Self> {
        if level.choices < 2 || level.choices > palette.len() {
            return Err(GameError::validation(format!(
                "cannot offer {} distinct choices from {} colours",
                level.choices,
                palette.len()
            )));
        }
        Ok(Self {
            level,
            difficulty,
            palette,
            players: vec![BlastPlayer::default(); player_count.max(1)],
            current: 0,
            resolved: 0,
            round_started: 0.0,
            prompt: None,
            phase: BlastPhase::Playing,
            rng,
            timers: TimerQueue::new(session),
        })
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn palette(&self) -> &[PaletteColor] {
        &self.palette
    }

    pub fn color_name(&self, idx: usize) -> &str {
        self.palette.get(idx).map(|c| c.name.as_str()).unwrap_or("?")
    }

    pub fn current_player(&self) -> usize {
        self.current
    }

    pub fn player(&self, idx: usize) -> Option<&BlastPlayer> {
        self.players.get(idx)
    }

    pub fn phase(&self) -> BlastPhase {
        self.phase
    }

    /// Prompts resolved so far by the current player
    pub fn resolved(&self) -> u32 {
        self.resolved
    }

    pub fn rounds(&self) -> u32 {
        self.level.rounds
    }

    /// Correct answers needed for a successful round
    pub fn target(&self) -> u32 {
        self.level.target
    }

    /// Seconds left on the current player's clock
    pub fn time_left(&self, now: f32) -> f32 {
        match self.phase {
            BlastPhase::Playing => (self.round_started + self.level.time_limit - now).max(0.0),
            _ => 0.0,
        }
    }

    /// Correct answers over prompts per player, 0.0 to 1.0
    pub fn accuracy(&self, idx: usize) -> f32 {
        match self.players.get(idx) {
            Some(p) if self.level.rounds > 0 => p.correct as f32 / self.level.rounds as f32,
            _ => 0.0,
        }
    }

    fn show_prompt(&mut self, now: f32, events: &mut Vec<GameEvent>) {
        let ink = self.rng.random_range(0..self.palette.len());
        let word = self.rng.random_range(0..self.palette.len());

        let mut distractors: Vec<usize> = (0..self.palette.len()).filter(|&c| c != ink).collect();
        distractors.shuffle(&mut self.rng);
        let mut choices: Vec<usize> = distractors
            .into_iter()
            .take(self.level.choices - 1)
            .collect();
        choices.push(ink);
        choices.shuffle(&mut self.rng);

        let timer = self.timers.schedule(
            TimerKind::PromptTimeout,
            now + self.level.round_timeout,
            events,
        );
        events.push(GameEvent::PromptShown {
            round: self.resolved + 1,
            word: self.color_name(word).to_string(),
            ink: self.color_name(ink).to_string(),
            choices: choices.iter().map(|&c| self.color_name(c).to_string()).collect(),
        });
        self.prompt = Some(Prompt {
            word,
            ink,
            choices,
            shown_at: now,
            timer,
        });
    }

    fn begin_round(&mut self, now: f32, events: &mut Vec<GameEvent>) {
        self.resolved = 0;
        self.round_started = now;
        self.phase = BlastPhase::Playing;
        events.push(GameEvent::RoundStarted {
            player: self.current,
        });
        self.timers
            .schedule(TimerKind::RoundLimit, now + self.level.time_limit, events);
        self.show_prompt(now, events);
    }

    fn choose(&mut self, choice: usize, now: f32, events: &mut Vec<GameEvent>) -> Result<()> {
        let Some(prompt) = self.prompt.as_ref() else {
            events.push(GameEvent::InputIgnored {
                reason: "no prompt on screen",
            });
            return Ok(());
        };
        let Some(&picked) = prompt.choices.get(choice) else {
            return Err(GameError::validation(format!(
                "choice {choice} is not one of the {} options",
                prompt.choices.len()
            )));
        };

        if now >= self.round_started + self.level.time_limit {
            self.end_round(RoundEnd::TimeUp, events);
            return Ok(());
        }
        let latency = now - prompt.shown_at;
        if latency >= self.level.round_timeout {
            self.skip_prompt(now, events);
            return Ok(());
        }

        let ink = prompt.ink;
        if picked == ink {
            let points = time_weighted_points(self.level.base_points, latency, self.level.round_timeout);
            let target = self.level.target;
            let player = &mut self.players[self.current];
            player.points += points;
            player.correct += 1;
            events.push(GameEvent::ColorHit { points, latency });
            if player.correct >= target && !player.target_reached {
                player.target_reached = true;
                events.push(GameEvent::TargetReached {
                    player: self.current,
                    correct: player.correct,
                });
            }
            self.advance(now, events);
        } else {
            self.players[self.current].misses += 1;
            events.push(GameEvent::ColorMiss {
                chosen: self.color_name(picked).to_string(),
                target: self.color_name(ink).to_string(),
            });
        }
        Ok(())
    }

    fn skip_prompt(&mut self, now: f32, events: &mut Vec<GameEvent>) {
        self.players[self.current].timeouts += 1;
        events.push(GameEvent::PromptTimedOut {
            round: self.resolved + 1,
        });
        self.advance(now, events);
    }

    /// Resolve the current prompt and show the next one, or end the round
    fn advance(&mut self, now: f32, events: &mut Vec<GameEvent>) {
        if let Some(prompt) = self.prompt.take() {
            self.timers.cancel(prompt.timer);
        }
        self.resolved += 1;
        if self.resolved >= self.level.rounds {
            self.end_round(RoundEnd::Completed, events);
        } else {
            self.show_prompt(now, events);
        }
    }

    fn end_round(&mut self, reason: RoundEnd, events: &mut Vec<GameEvent>) {
        self.timers.clear();
        self.prompt = None;
        let player = &mut self.players[self.current];
        player.result = Some(reason);
        log::info!(
            "Color Blast round for player {} over ({reason:?}): {} correct of {} needed, {} misses, {} skipped",
            self.current,
            player.correct,
            self.level.target,
            player.misses,
            player.timeouts
        );
        events.push(GameEvent::RoundEnded {
            player: self.current,
            reason,
        });

        self.phase = if reason != RoundEnd::Aborted && self.current + 1 < self.players.len() {
            BlastPhase::BetweenRounds
        } else {
            BlastPhase::Finished
        };
    }
}

impl GameEngine for ReactionEngine {
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
            (BlastPhase::Finished, InputEvent::TimerExpired(_)) => Ok(()),
            (BlastPhase::Finished, _) => Err(already_finished(&input)),
            (_, InputEvent::AbortRequested) => {
                self.abort(events);
                Ok(())
            }
            (BlastPhase::Playing, InputEvent::ColorClicked { choice }) => {
                self.choose(choice, now, events)
            }
            (BlastPhase::BetweenRounds, InputEvent::ColorClicked { .. }) => {
                events.push(GameEvent::InputIgnored {
                    reason: "waiting for the next player",
                });
                Ok(())
            }
            (BlastPhase::BetweenRounds, InputEvent::Ready) => {
                self.current += 1;
                self.begin_round(now, events);
                Ok(())
            }
            (BlastPhase::Playing, InputEvent::Ready) => {
                events.push(GameEvent::InputIgnored {
                    reason: "round already running",
                });
                Ok(())
            }
            (_, InputEvent::TimerExpired(id)) => {
                let Some(timer) = self.timers.take(id) else {
                    return Ok(());
                };
                if self.phase != BlastPhase::Playing {
                    return Ok(());
                }
                match timer.kind {
                    TimerKind::RoundLimit => self.end_round(RoundEnd::TimeUp, events),
                    TimerKind::PromptTimeout => {
                        if self.prompt.as_ref().map(|p| p.timer) == Some(id) {
                            self.skip_prompt(now, events);
                        }
                    }
                    TimerKind::HidePair => {}
                }
                Ok(())
            }
            (
                _,
                InputEvent::CellClicked { .. }
                | InputEvent::NumberClicked { .. }
                | InputEvent::ContinueLevel { .. },
            ) => Err(unsupported(GameType::Reaction, &input)),
        }
    }

    fn abort(&mut self, events: &mut Vec<GameEvent>) {
        match self.phase {
            BlastPhase::Playing => self.end_round(RoundEnd::Aborted, events),
            BlastPhase::BetweenRounds => {
                self.timers.clear();
                self.phase = BlastPhase::Finished;
            }
            BlastPhase::Finished => {}
        }
    }

    fn is_finished(&self) -> bool {
        self.phase == BlastPhase::Finished
    }

    fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    fn final_scores(&self) -> Vec<u64> {
        self.players
            .iter()
            .map(|p| final_score(p.points, p.correct, self.level.rounds, self.difficulty))
            .collect()
    }

    fn pending_timers(&self) -> &[Timer] {
        self.timers.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::engine::seeded_rng;

    fn engine(level: u8, players: usize, seed: u64) -> ReactionEngine {
        let settings = Settings::default();
        let difficulty = Difficulty::new(level).unwrap();
        let mut engine = ReactionEngine::new(
            settings.reaction_level(difficulty).unwrap().clone(),
            difficulty,
            settings.palette.clone(),
            players,
            1,
            seeded_rng(seed),
        )
        .unwrap();
        engine.start(0.0, &mut Vec::new());
        engine
    }

    fn pick(engine: &mut ReactionEngine, choice: usize, now: f32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        engine
            .apply_input(InputEvent::ColorClicked { choice }, now, &mut events)
            .unwrap();
        events
    }

    fn right(engine: &ReactionEngine) -> usize {
        engine.prompt().and_then(Prompt::answer).unwrap()
    }

    fn wrong(engine: &ReactionEngine) -> usize {
        (right(engine) + 1) % engine.prompt().unwrap().choices.len()
    }

    #[test]
    fn test_prompt_has_one_correct_and_distinct_choices() {
        let mut engine = engine(1, 1, 4);
        for _ in 0..20 {
            let prompt = engine.prompt().unwrap().clone();
            assert_eq!(prompt.choices.len(), 4);
            assert_eq!(prompt.choices.iter().filter(|&&c| c == prompt.ink).count(), 1);
            let mut unique = prompt.choices.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), 4);
            let answer = right(&engine);
            pick(&mut engine, answer, prompt.shown_at);
        }
        assert!(engine.is_finished());
    }

    #[test]
    fn test_hit_advances_miss_does_not() {
        let mut engine = engine(1, 1, 8);
        let miss = wrong(&engine);
        let events = pick(&mut engine, miss, 0.5);
        assert!(matches!(events[0], GameEvent::ColorMiss { .. }));
        assert_eq!(engine.resolved(), 0);
        assert_eq!(engine.player(0).unwrap().misses, 1);
        assert_eq!(engine.player(0).unwrap().points, 0);

        let hit = right(&engine);
        let events = pick(&mut engine, hit, 2.5);
        // 10 * (1 - 2.5/5) = 5
        assert_eq!(events[0], GameEvent::ColorHit { points: 5, latency: 2.5 });
        assert_eq!(engine.resolved(), 1);
        assert_eq!(engine.player(0).unwrap().correct, 1);
    }

    #[test]
    fn test_prompt_timeout_skips() {
        let mut engine = engine(1, 1, 8);
        let timer = engine
            .pending_timers()
            .iter()
            .find(|t| t.kind == TimerKind::PromptTimeout)
            .copied()
            .unwrap();
        assert_eq!(timer.fire_at, 5.0);

        let mut events = Vec::new();
        engine
            .apply_input(InputEvent::TimerExpired(timer.id), 5.0, &mut events)
            .unwrap();
        assert!(events.contains(&GameEvent::PromptTimedOut { round: 1 }));
        assert_eq!(engine.resolved(), 1);
        assert_eq!(engine.player(0).unwrap().timeouts, 1);
        // New prompt, new timer, old one gone; the round clock keeps running
        let prompt_timers: Vec<_> = engine
            .pending_timers()
            .iter()
            .filter(|t| t.kind == TimerKind::PromptTimeout)
            .collect();
        assert_eq!(prompt_timers.len(), 1);
        assert_ne!(prompt_timers[0].id, timer.id);
        assert!(engine
            .pending_timers()
            .iter()
            .any(|t| t.kind == TimerKind::RoundLimit));

        // A late click on the new prompt counts as a skip as well
        let shown = engine.prompt().unwrap().shown_at;
        let hit = right(&engine);
        pick(&mut engine, hit, shown + 5.0);
        assert_eq!(engine.player(0).unwrap().timeouts, 2);
        assert_eq!(engine.player(0).unwrap().correct, 0);
    }

    #[test]
    fn test_final_score_formula() {
        let d3 = Difficulty::new(3).unwrap();
        assert_eq!(final_score(120, 15, 20, d3), 120 + 75 * 3);
        assert_eq!(final_score(0, 0, 20, d3), 0);
        assert_eq!(final_score(7, 1, 0, d3), 7);
    }

    #[test]
    fn test_scores_are_deterministic_for_same_outcomes() {
        let play = |seed| {
            let mut engine = engine(2, 1, seed);
            let mut now = 0.0;
            while !engine.is_finished() {
                now += 1.0;
                let hit = right(&engine);
                let miss = wrong(&engine);
                pick(&mut engine, miss, now);
                pick(&mut engine, hit, now);
            }
            engine.final_scores()
        };
        // Colours differ by seed but scoring only depends on outcomes and latency
        assert_eq!(play(1), play(2));
        // 30 hits at latency 1 of 4: ceil(20 * 0.75) = 15 each; accuracy 100% at level 2
        assert_eq!(play(1), vec![30 * 15 + 200]);
    }

    #[test]
    fn test_players_take_turns() {
        let mut engine = engine(1, 2, 8);
        for _ in 0..20 {
            let hit = right(&engine);
            pick(&mut engine, hit, 0.0);
        }
        assert_eq!(engine.phase(), BlastPhase::BetweenRounds);
        let events = pick(&mut engine, 0, 1.0);
        assert!(matches!(events[0], GameEvent::InputIgnored { .. }));

        let mut events = Vec::new();
        engine.apply_input(InputEvent::Ready, 2.0, &mut events).unwrap();
        assert_eq!(engine.current_player(), 1);
        assert!(engine.prompt().is_some());

        engine.abort(&mut Vec::new());
        assert!(engine.is_finished());
        assert!(engine.pending_timers().is_empty());
        let scores = engine.final_scores();
        assert_eq!(scores[0], 200 + 100);
        assert_eq!(scores[1], 0);
    }

    #[test]
    fn test_round_clock_ends_each_players_round() {
        let mut engine = engine(1, 2, 8);
        let hit = right(&engine);
        pick(&mut engine, hit, 0.5);
        let clock = engine
            .pending_timers()
            .iter()
            .find(|t| t.kind == TimerKind::RoundLimit)
            .copied()
            .unwrap();
        assert_eq!(clock.fire_at, 45.0);
        assert_eq!(engine.time_left(15.0), 30.0);

        let mut events = Vec::new();
        engine
            .apply_input(InputEvent::TimerExpired(clock.id), 45.0, &mut events)
            .unwrap();
        assert!(events.contains(&GameEvent::RoundEnded {
            player: 0,
            reason: RoundEnd::TimeUp,
        }));
        assert_eq!(engine.phase(), BlastPhase::BetweenRounds);
        assert!(engine.pending_timers().is_empty());
        assert_eq!(engine.player(0).unwrap().correct, 1);

        // The second player gets a fresh clock; the first one's timer is stale
        let mut events = Vec::new();
        engine.apply_input(InputEvent::Ready, 50.0, &mut events).unwrap();
        let mut events = Vec::new();
        engine
            .apply_input(InputEvent::TimerExpired(clock.id), 51.0, &mut events)
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(engine.phase(), BlastPhase::Playing);
        assert_eq!(engine.time_left(50.0), 45.0);
    }

    #[test]
    fn test_click_past_round_clock_ends_round_unscored() {
        let mut engine = engine(1, 1, 8);
        let hit = right(&engine);
        let events = pick(&mut engine, hit, 45.0);
        assert!(events.contains(&GameEvent::RoundEnded {
            player: 0,
            reason: RoundEnd::TimeUp,
        }));
        assert!(engine.is_finished());
        assert_eq!(engine.player(0).unwrap().correct, 0);
        assert_eq!(engine.final_scores(), vec![0]);
    }

    #[test]
    fn test_target_reached_is_announced_once() {
        let mut engine = engine(1, 1, 8);
        assert_eq!(engine.target(), 10);
        for n in 1..=11 {
            let shown = engine.prompt().unwrap().shown_at;
            let hit = right(&engine);
            let events = pick(&mut engine, hit, shown);
            let announced = events
                .iter()
                .any(|e| matches!(e, GameEvent::TargetReached { player: 0, .. }));
            assert_eq!(announced, n == 10, "hit {n}");
        }
        assert!(engine.player(0).unwrap().target_reached);
    }

    #[test]
    fn test_bad_choice_index() {
        let mut engine = engine(1, 1, 8);
        let mut events = Vec::new();
        assert!(matches!(
            engine.apply_input(InputEvent::ColorClicked { choice: 4 }, 0.0, &mut events),
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            engine.apply_input(InputEvent::CellClicked { cell: 0 }, 0.0, &mut events),
            Err(GameError::Validation(_))
        ));
    }
}
