//! Game state: status machine, tap resolution, scoring, terminal condition, delegate notifications.

use crate::action_queue::Finalize;
use crate::block::{Block, BlockColor, Column, Position};
use crate::config::GameConfig;
use crate::error::WorldError;
use crate::spawner::Spawner;
use crate::world::{Axis, World, WorldEvent};
use crossbeam_channel::{Receiver, Sender};
use glam::Vec3;
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Idle,
    Paused,
    /// A tap's combo + gather is running.
    Resolving,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    /// Last block cleared.
    Cleared,
    /// A column reached the fill limit.
    Overflow,
}

/// Observer of a session. Each call happens at most once per triggering event, in the order
/// combo colour, score increment, game over.
pub trait GameDelegate {
    /// Suggested background colour after a combo.
    fn combo_color(&self, _color: BlockColor) {}
    fn score_increment(&self, increment: u32);
    fn game_over(&self);
}

/// The delegate notifications as values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    ComboColor(BlockColor),
    ScoreIncrement(u32),
    GameOver,
}

/// Delegate that forwards every notification down a channel to a single subscriber.
/// Sends to a dropped receiver are traced and otherwise ignored.
#[derive(Debug, Clone)]
pub struct ChannelDelegate {
    tx: Sender<GameEvent>,
}

impl ChannelDelegate {
    pub fn channel() -> (Self, Receiver<GameEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    fn forward(&self, event: GameEvent) {
        if self.tx.send(event).is_err() {
            trace!(?event, "notification dropped, no subscriber");
        }
    }
}

impl GameDelegate for ChannelDelegate {
    fn combo_color(&self, color: BlockColor) {
        self.forward(GameEvent::ComboColor(color));
    }

    fn score_increment(&self, increment: u32) {
        self.forward(GameEvent::ScoreIncrement(increment));
    }

    fn game_over(&self) {
        self.forward(GameEvent::GameOver);
    }
}

/// What a resolved tap did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapOutcome {
    /// Dead blocks, tapped block included.
    pub removed: Vec<Block>,
    pub increment: u32,
    pub combo_color: Option<BlockColor>,
    /// Blocks moved by the gather-up that followed.
    pub moved: usize,
    pub game_over: bool,
}

/// One session: owns the world, the clock and the status. Holds the delegate weakly.
pub struct Game {
    config: GameConfig,
    world: World,
    status: GameStatus,
    game_over_reason: Option<GameOverReason>,
    score: u64,
    /// Animation clock for the renderer. Never read by game logic.
    uniform_time: f32,
    delegate: Option<Weak<dyn GameDelegate>>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("status", &self.status)
            .field("score", &self.score)
            .field("blocks", &self.world.len())
            .field("uniform_time", &self.uniform_time)
            .finish_non_exhaustive()
    }
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        let world = World::from_config(&config);
        Self {
            config,
            world,
            status: GameStatus::Idle,
            game_over_reason: None,
            score: 0,
            uniform_time: 0.0,
            delegate: None,
        }
    }

    /// Observe this game without owning the observer. Replaces any previous delegate.
    pub fn set_delegate<D: GameDelegate + 'static>(&mut self, delegate: &Rc<D>) {
        let weak = Rc::downgrade(delegate);
        self.delegate = Some(weak);
    }

    pub fn clear_delegate(&mut self) {
        self.delegate = None;
    }

    fn notify(&self, f: impl FnOnce(&dyn GameDelegate)) {
        if let Some(delegate) = self.delegate.as_ref().and_then(Weak::upgrade) {
            f(delegate.as_ref());
        }
    }

    #[inline]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Drain the world's created/dismissed/moved events for the renderer.
    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        self.world.take_events()
    }

    pub fn set_lit(&mut self, position: Position, lit: bool) -> bool {
        match self.world.query_position(position).map(Block::id) {
            Some(id) => self.world.set_lit(id, lit),
            None => false,
        }
    }

    /// Keep exactly the block under the cursor lit.
    pub fn light_only(&mut self, position: Option<Position>) -> bool {
        self.world.light_only(position)
    }

    #[inline]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    #[inline]
    pub fn status(&self) -> GameStatus {
        self.status
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.status == GameStatus::Paused
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.status == GameStatus::GameOver
    }

    pub fn game_over_reason(&self) -> Option<GameOverReason> {
        self.game_over_reason
    }

    #[inline]
    pub fn score(&self) -> u64 {
        self.score
    }

    #[inline]
    pub fn uniform_time(&self) -> f32 {
        self.uniform_time
    }

    /// Taps, spawns and rotations are only accepted while idle.
    fn accepts_input(&self) -> bool {
        matches!(self.status, GameStatus::Idle)
    }

    pub fn pause(&mut self) {
        if !self.is_over() {
            self.status = GameStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.status == GameStatus::Paused {
            self.status = GameStatus::Idle;
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Advance the animation clock. Non-positive or non-finite deltas are ignored.
    pub fn advance_time(&mut self, delta: f32) {
        if delta.is_finite() && delta > 0.0 {
            self.uniform_time += delta;
        }
    }

    /// Tap a world-space point; it is snapped to the nearest grid cell.
    pub fn tap_world_at(&mut self, point: Vec3) -> Option<TapOutcome> {
        self.tap_at(Position::snap(point))
    }

    /// Remove the tapped block and its combo, score it, gather up, check for game over.
    /// `None` when nothing is there, or while paused or over.
    pub fn tap_at(&mut self, position: Position) -> Option<TapOutcome> {
        if !self.accepts_input() {
            trace!(%position, status = ?self.status, "tap ignored");
            return None;
        }
        self.world.query_position(position)?;

        self.status = GameStatus::Resolving;
        let removed = self.world.remove_combo(position);
        let is_combo = removed.len() >= 2;
        let increment = if is_combo {
            removed.len() as u32
        } else {
            self.config.single_block_score.max(1)
        };
        let combo_color = if is_combo {
            removed.first().map(Block::color)
        } else {
            None
        };

        if let Some(color) = combo_color {
            info!(size = removed.len(), color = color.name(), "combo");
            self.notify(|d| d.combo_color(color));
        }
        self.score += u64::from(increment);
        self.notify(|d| d.score_increment(increment));

        let moved = self.world.gather_up();
        let game_over = self.check_terminal(true);
        if !game_over {
            self.status = GameStatus::Idle;
        }
        debug!(%position, removed = removed.len(), increment, moved, "tap resolved");
        Some(TapOutcome {
            removed,
            increment,
            combo_color,
            moved,
            game_over,
        })
    }

    /// Drop a new block onto `column`. Inert (`Ok(None)`) unless idle.
    pub fn spawn_block(&mut self, color: BlockColor, column: Column) -> Result<Option<Block>, WorldError> {
        if !self.accepts_input() {
            return Ok(None);
        }
        let block = self.world.add_block_with_color(color, column)?;
        self.check_terminal(false);
        Ok(Some(block))
    }

    /// Seed the arena with up to `count` blocks chosen by the spawner, leaving headroom below
    /// the fill limit. Returns how many landed.
    pub fn populate(&mut self, spawner: &mut Spawner, count: usize) -> usize {
        if !self.accepts_input() {
            return 0;
        }
        let ceiling = if self.config.game_over.on_overflow() {
            self.config.effective_fill_limit().saturating_sub(1)
        } else {
            self.world.arena().height as usize
        };
        let placed = spawner.fill(&mut self.world, count, ceiling);
        debug!(placed, "arena populated");
        placed
    }

    /// Drop one spawner-chosen block into any column with room. Inert unless idle.
    pub fn spawn_next(&mut self, spawner: &mut Spawner) -> Option<Block> {
        if !self.accepts_input() {
            return None;
        }
        let (color, column) = spawner.pick(&self.world, self.world.arena().height as usize)?;
        self.spawn_block(color, column).ok().flatten()
    }

    /// Quarter-turn the whole arena, then let everything settle. Inert unless idle.
    pub fn rotate_world(&mut self, axis: Axis, quarter_turns: i32) -> Result<bool, WorldError> {
        if !self.accepts_input() {
            return Ok(false);
        }
        self.world.rotate(axis, quarter_turns)?;
        self.world.gather_up();
        self.check_terminal(false);
        Ok(true)
    }

    /// Empty world, zero score and clock, back to idle.
    pub fn restart(&mut self) {
        self.world.reset();
        self.status = GameStatus::Idle;
        self.game_over_reason = None;
        self.score = 0;
        self.uniform_time = 0.0;
        info!("game restarted");
    }

    /// Apply the configured game-over policy. `after_removal` enables the empty check,
    /// so a fresh empty world is not over before the first tap.
    fn check_terminal(&mut self, after_removal: bool) -> bool {
        if self.is_over() {
            return true;
        }
        let policy = self.config.game_over;
        let reason = if after_removal && policy.on_empty() && self.world.is_empty() {
            Some(GameOverReason::Cleared)
        } else if policy.on_overflow()
            && self.world.max_column_top() >= self.config.effective_fill_limit()
        {
            Some(GameOverReason::Overflow)
        } else {
            None
        };
        match reason {
            Some(reason) => {
                self.status = GameStatus::GameOver;
                self.game_over_reason = Some(reason);
                info!(?reason, score = self.score, "game over");
                self.notify(|d| d.game_over());
                true
            }
            None => false,
        }
    }
}

impl Finalize for Game {
    fn is_finalized(&self) -> bool {
        self.is_over()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameOverPolicy, Neighborhood};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<GameEvent>>,
    }

    impl GameDelegate for Recorder {
        fn combo_color(&self, color: BlockColor) {
            self.events.borrow_mut().push(GameEvent::ComboColor(color));
        }

        fn score_increment(&self, increment: u32) {
            self.events.borrow_mut().push(GameEvent::ScoreIncrement(increment));
        }

        fn game_over(&self) {
            self.events.borrow_mut().push(GameEvent::GameOver);
        }
    }

    fn p(x: i32, y: i32, z: i32) -> Position {
        Position::new(x, y, z)
    }

    fn game_with(config: GameConfig) -> (Game, Rc<Recorder>) {
        let mut game = Game::new(config);
        let recorder = Rc::new(Recorder::default());
        game.set_delegate(&recorder);
        (game, recorder)
    }

    fn spawn(game: &mut Game, color: BlockColor, x: i32, z: i32) -> Block {
        game.spawn_block(color, Column::new(x, z)).unwrap().unwrap()
    }

    #[test]
    fn test_tap_lone_block_scores_fixed_value() {
        let (mut game, rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 0, 0);
        spawn(&mut game, BlockColor::Blue, 0, 0);
        spawn(&mut game, BlockColor::Green, 1, 0);

        let outcome = game.tap_at(p(0, 0, 0)).unwrap();
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.increment, 1);
        assert_eq!(outcome.combo_color, None);
        assert_eq!(outcome.moved, 1);
        assert!(!outcome.game_over);
        assert_eq!(*rec.events.borrow(), vec![GameEvent::ScoreIncrement(1)]);
        assert_eq!(game.world().query_position(p(0, 0, 0)).map(Block::color), Some(BlockColor::Blue));
        assert_eq!(game.status(), GameStatus::Idle);
        assert_eq!(game.score(), 1);
    }

    #[test]
    fn test_combo_notifies_color_before_score() {
        let (mut game, rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Yellow, 0, 0);
        spawn(&mut game, BlockColor::Yellow, 1, 0);
        spawn(&mut game, BlockColor::Yellow, 2, 0);
        spawn(&mut game, BlockColor::Red, 3, 0);

        let outcome = game.tap_at(p(1, 0, 0)).unwrap();
        assert_eq!(outcome.increment, 3);
        assert_eq!(outcome.combo_color, Some(BlockColor::Yellow));
        assert_eq!(
            *rec.events.borrow(),
            vec![
                GameEvent::ComboColor(BlockColor::Yellow),
                GameEvent::ScoreIncrement(3)
            ]
        );
    }

    #[test]
    fn test_tap_on_empty_cell_is_noop() {
        let (mut game, rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 0, 0);
        assert!(game.tap_at(p(3, 3, 3)).is_none());
        assert!(game.tap_at(p(-1, 0, 0)).is_none());
        assert!(rec.events.borrow().is_empty());
        assert_eq!(game.world().len(), 1);
    }

    #[test]
    fn test_tap_world_at_snaps_point() {
        let (mut game, _rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 2, 3);
        spawn(&mut game, BlockColor::Blue, 0, 0);
        let outcome = game.tap_world_at(Vec3::new(2.2, 0.3, 2.8)).unwrap();
        assert_eq!(outcome.removed[0].color(), BlockColor::Red);
    }

    #[test]
    fn test_pause_blocks_taps_spawns_and_rotations() {
        let (mut game, rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 0, 0);
        game.pause();
        assert_eq!(game.status(), GameStatus::Paused);
        assert!(game.tap_at(p(0, 0, 0)).is_none());
        assert_eq!(game.spawn_block(BlockColor::Red, Column::new(1, 1)), Ok(None));
        assert_eq!(game.rotate_world(Axis::Y, 1), Ok(false));
        assert_eq!(game.world().len(), 1);
        assert!(rec.events.borrow().is_empty());

        game.toggle_pause();
        assert_eq!(game.status(), GameStatus::Idle);
        assert!(game.tap_at(p(0, 0, 0)).is_some());
    }

    #[test]
    fn test_clearing_last_block_ends_game_once() {
        let (mut game, rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 0, 0);
        let outcome = game.tap_at(p(0, 0, 0)).unwrap();
        assert!(outcome.game_over);
        assert!(game.is_over());
        assert_eq!(game.game_over_reason(), Some(GameOverReason::Cleared));
        assert_eq!(
            *rec.events.borrow(),
            vec![GameEvent::ScoreIncrement(1), GameEvent::GameOver]
        );
        assert_eq!(game.spawn_block(BlockColor::Red, Column::new(0, 0)), Ok(None));
        assert!(game.tap_at(p(0, 0, 0)).is_none());
        assert_eq!(rec.events.borrow().len(), 2);
    }

    #[test]
    fn test_overflow_ends_game_and_freezes_world() {
        let config = GameConfig {
            game_over: GameOverPolicy::Overflow,
            ..GameConfig::default().with_arena(3, 3, 3)
        };
        let (mut game, rec) = game_with(config);
        spawn(&mut game, BlockColor::Red, 0, 0);
        spawn(&mut game, BlockColor::Blue, 0, 0);
        assert!(!game.is_over());
        spawn(&mut game, BlockColor::Green, 0, 0);
        assert!(game.is_over());
        assert_eq!(game.game_over_reason(), Some(GameOverReason::Overflow));
        assert_eq!(*rec.events.borrow(), vec![GameEvent::GameOver]);

        assert!(game.tap_at(p(0, 2, 0)).is_none());
        assert_eq!(game.world().len(), 3);
        game.pause();
        assert_eq!(game.status(), GameStatus::GameOver);
    }

    #[test]
    fn test_overflow_policy_does_not_end_on_empty() {
        let config = GameConfig {
            game_over: GameOverPolicy::Overflow,
            ..GameConfig::default()
        };
        let (mut game, _rec) = game_with(config);
        spawn(&mut game, BlockColor::Red, 0, 0);
        assert!(!game.tap_at(p(0, 0, 0)).unwrap().game_over);
        assert!(game.world().is_empty());
        assert_eq!(game.status(), GameStatus::Idle);
    }

    #[test]
    fn test_dropped_delegate_is_tolerated() {
        let (mut game, rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 0, 0);
        spawn(&mut game, BlockColor::Red, 0, 0);
        drop(rec);
        let outcome = game.tap_at(p(0, 0, 0)).unwrap();
        assert_eq!(outcome.increment, 2);
        assert!(game.is_over());
    }

    #[test]
    fn test_channel_delegate_delivers_in_order() {
        let mut game = Game::new(GameConfig::default());
        let (delegate, rx) = ChannelDelegate::channel();
        let delegate = Rc::new(delegate);
        game.set_delegate(&delegate);
        spawn(&mut game, BlockColor::Cyan, 0, 0);
        spawn(&mut game, BlockColor::Cyan, 0, 0);
        game.tap_at(p(0, 1, 0));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                GameEvent::ComboColor(BlockColor::Cyan),
                GameEvent::ScoreIncrement(2),
                GameEvent::GameOver
            ]
        );
    }

    #[test]
    fn test_set_delegate_replaces_previous_observer() {
        let (mut game, first) = game_with(GameConfig::default());
        let second = Rc::new(Recorder::default());
        game.set_delegate(&second);
        spawn(&mut game, BlockColor::Green, 0, 0);
        spawn(&mut game, BlockColor::Blue, 1, 0);
        game.tap_at(p(0, 0, 0));
        assert!(first.events.borrow().is_empty());
        assert_eq!(*second.events.borrow(), vec![GameEvent::ScoreIncrement(1)]);
        // the game never keeps its observer alive
        assert_eq!(Rc::strong_count(&second), 1);
    }

    #[test]
    fn test_channel_delegate_without_subscriber_keeps_playing() {
        let mut game = Game::new(GameConfig::default());
        let (delegate, rx) = ChannelDelegate::channel();
        drop(rx);
        let delegate = Rc::new(delegate);
        game.set_delegate(&delegate);
        spawn(&mut game, BlockColor::Cyan, 0, 0);
        spawn(&mut game, BlockColor::Cyan, 0, 0);
        let outcome = game.tap_at(p(0, 0, 0)).unwrap();
        assert_eq!(outcome.increment, 2);
        assert!(game.is_over());
        assert_eq!(game.score(), 2);
    }

    #[test]
    fn test_advance_time_is_monotonic_and_inert() {
        let (mut game, _rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 0, 0);
        let before = game.world().block_set();
        game.advance_time(0.5);
        game.advance_time(-1.0);
        game.advance_time(f32::NAN);
        game.pause();
        game.advance_time(0.25);
        assert!((game.uniform_time() - 0.75).abs() < f32::EPSILON);
        assert_eq!(game.world().block_set(), before);
    }

    #[test]
    fn test_rotate_world_settles_blocks() {
        let config = GameConfig::default().with_arena(3, 3, 3);
        let (mut game, _rec) = game_with(config);
        spawn(&mut game, BlockColor::Red, 0, 1);
        spawn(&mut game, BlockColor::Red, 1, 1);
        assert_eq!(game.rotate_world(Axis::Z, 1), Ok(true));
        assert_eq!(game.world().max_column_top(), 2);
        assert!(!game.is_over());
        let config = GameConfig::default().with_arena(3, 4, 3);
        let mut game = Game::new(config);
        assert_eq!(game.rotate_world(Axis::X, 1), Err(WorldError::NonSquareRotation(Axis::X)));
    }

    #[test]
    fn test_restart_clears_everything() {
        let (mut game, _rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 0, 0);
        game.tap_at(p(0, 0, 0));
        assert!(game.is_over());
        game.advance_time(1.0);
        game.restart();
        assert_eq!(game.status(), GameStatus::Idle);
        assert_eq!(game.score(), 0);
        assert_eq!(game.uniform_time(), 0.0);
        assert!(game.world().is_empty());
        assert_eq!(game.game_over_reason(), None);
    }

    #[test]
    fn test_neighborhood_config_reaches_world() {
        let config = GameConfig {
            neighborhood: Neighborhood::Edges,
            ..GameConfig::default()
        };
        let (mut game, _rec) = game_with(config);
        spawn(&mut game, BlockColor::Red, 0, 0);
        spawn(&mut game, BlockColor::Blue, 1, 0);
        spawn(&mut game, BlockColor::Red, 1, 0);
        // (0,0,0) and (1,1,0) share an edge
        assert_eq!(game.tap_at(p(0, 0, 0)).unwrap().increment, 2);
    }

    #[test]
    fn test_populate_leaves_headroom() {
        let config = GameConfig::default().with_arena(3, 4, 3);
        let (mut game, rec) = game_with(config);
        let mut spawner = Spawner::new(9, 3);
        let placed = game.populate(&mut spawner, 1000);
        assert_eq!(placed, 27);
        assert_eq!(game.world().max_column_top(), 3);
        assert!(!game.is_over());
        assert!(rec.events.borrow().is_empty());
        // the next drop tops a column out
        assert!(game.spawn_next(&mut spawner).is_some());
        assert!(game.is_over());
        assert!(game.spawn_next(&mut spawner).is_none());
    }

    #[test]
    fn test_set_lit_goes_through_world() {
        let (mut game, _rec) = game_with(GameConfig::default());
        spawn(&mut game, BlockColor::Red, 0, 0);
        assert!(game.set_lit(p(0, 0, 0), true));
        assert!(game.world().query_position(p(0, 0, 0)).unwrap().is_lit());
        assert!(!game.set_lit(p(1, 0, 0), true));
    }
}
