//! App: terminal init, main loop, spawn timer, key and mouse handling.

use crate::Args;
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, ArenaLayout, Fade, View};
use anyhow::Result;
use blockbuster::{
    ActionQueue, ActionSender, Axis, BlockColor, ChannelDelegate, Game, GameConfig, GameEvent,
    Position, Spawner, WorldEvent,
};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEventKind};
use ratatui::DefaultTerminal;
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct App {
    args: Args,
    theme: Theme,
    game: Game,
    queue: ActionQueue<Game>,
    spawner: Spawner,
    /// Kept alive here; the game only holds it weakly.
    delegate: Rc<ChannelDelegate>,
    notifications: Receiver<GameEvent>,
    cursor: Position,
    combo_color: Option<BlockColor>,
    last_increment: Option<u32>,
    fade: Fade,
    layout: ArenaLayout,
    last_frame: Instant,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let mut game = Game::new(config);
        let (delegate, notifications) = ChannelDelegate::channel();
        let delegate = Rc::new(delegate);
        game.set_delegate(&delegate);
        let mut spawner = Spawner::new(args.seed, args.colors);
        let placed = game.populate(&mut spawner, args.initial_blocks);
        info!(placed, seed = args.seed, "session started");
        Ok(Self {
            args,
            theme,
            game,
            queue: ActionQueue::new(),
            spawner,
            delegate,
            notifications,
            cursor: Position::default(),
            combo_color: None,
            last_increment: None,
            fade: Fade::default(),
            layout: ArenaLayout::default(),
            last_frame: Instant::now(),
        })
    }

    fn restart(&mut self) {
        // still finalized here, so whatever was queued since game over is dropped
        let stale = self.queue.drain(&mut self.game);
        if stale.dropped > 0 {
            debug!(dropped = stale.dropped, "stale actions dropped before restart");
        }
        self.game.restart();
        // dismissals from the reset are not animated
        self.game.take_events();
        self.fade.clear();
        self.combo_color = None;
        self.last_increment = None;
        let placed = self.game.populate(&mut self.spawner, self.args.initial_blocks);
        debug!(placed, "arena repopulated");
    }

    /// Translate a player action into a queued game mutation (or a shell-only change).
    /// Returns false to quit.
    fn apply_action(&mut self, action: Action) -> bool {
        let arena = self.game.world().arena();
        let c = &mut self.cursor;
        match action {
            Action::Quit => return false,
            Action::None => {}
            Action::CursorLeft => c.x = (c.x - 1).max(0),
            Action::CursorRight => c.x = (c.x + 1).min(arena.width - 1),
            Action::CursorUp => c.y = (c.y + 1).min(arena.height - 1),
            Action::CursorDown => c.y = (c.y - 1).max(0),
            Action::LayerPrev => c.z = (c.z - 1).max(0),
            Action::LayerNext => c.z = (c.z + 1).min(arena.depth - 1),
            Action::Tap => {
                let target = *c;
                self.queue.enqueue(move |g: &mut Game| {
                    g.tap_at(target);
                });
            }
            Action::RotateX => self.enqueue_rotation(Axis::X),
            Action::RotateY => self.enqueue_rotation(Axis::Y),
            Action::RotateZ => self.enqueue_rotation(Axis::Z),
            Action::Pause => self.queue.enqueue(Game::toggle_pause),
            // the queue drops everything once the game is over, so restart bypasses it
            Action::Restart => {
                if self.game.is_over() {
                    self.restart();
                }
            }
        }
        true
    }

    fn enqueue_rotation(&self, axis: Axis) {
        self.queue.enqueue(move |g: &mut Game| {
            if let Err(err) = g.rotate_world(axis, 1) {
                warn!(%err, "rotation refused");
            }
        });
    }

    /// Mirror the delegate's notifications into shell state.
    fn drain_notifications(&mut self) {
        for event in self.notifications.try_iter() {
            match event {
                GameEvent::ComboColor(color) => self.combo_color = Some(color),
                GameEvent::ScoreIncrement(n) => self.last_increment = Some(n),
                GameEvent::GameOver => {
                    info!(score = self.game.score(), "game over shown");
                }
            }
        }
    }

    fn collect_world_events(&mut self) {
        for event in self.game.take_events() {
            if let WorldEvent::Dismissed { position, color, .. } = event {
                if !self.args.no_animation {
                    self.fade.push(position, color);
                }
            }
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let (stop, stopped) = crossbeam_channel::bounded::<()>(0);
        let timer = self.start_spawn_timer(stopped);

        let result = self.run_loop(&mut terminal);

        // disconnecting wakes the timer immediately
        drop(stop);
        if let Some(handle) = timer {
            let _ = handle.join();
        }

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    /// Background thread that queues one spawn every `--spawn-ms`. Exits once `stop` disconnects
    /// or the queue is gone.
    fn start_spawn_timer(&mut self, stop: Receiver<()>) -> Option<JoinHandle<()>> {
        if self.args.spawn_ms == 0 {
            return None;
        }
        let period = Duration::from_millis(self.args.spawn_ms);
        let sender: ActionSender<Game> = self.queue.sender();
        let mut spawner = self.spawner.fork();
        let handle = thread::Builder::new()
            .name("spawn-timer".into())
            .spawn(move || {
                while let Err(RecvTimeoutError::Timeout) = stop.recv_timeout(period) {
                    let mut child = spawner.fork();
                    let sent = sender.enqueue(move |g: &mut Game| {
                        g.spawn_next(&mut child);
                    });
                    if !sent {
                        break;
                    }
                }
            });
        match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(%err, "spawn timer not started");
                None
            }
        }
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.tick_rate.max(1.0));
        loop {
            let now = Instant::now();
            let delta = now.saturating_duration_since(self.last_frame);
            self.last_frame = now;
            self.game.advance_time(delta.as_secs_f32());

            let report = self.queue.drain(&mut self.game);
            if report.dropped > 0 {
                debug!(dropped = report.dropped, "actions dropped after game over");
            }
            self.collect_world_events();
            self.drain_notifications();
            self.game.light_only(Some(self.cursor));

            let view = View {
                game: &self.game,
                theme: &self.theme,
                cursor: self.cursor,
                combo_color: self.combo_color,
                last_increment: self.last_increment,
            };
            let fade = &mut self.fade;
            let mut layout = ArenaLayout::default();
            terminal.draw(|f| layout = ui::draw(f, &view, fade, now))?;
            self.layout = layout;
            self.fade.finish_if_done();

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if !self.apply_action(key_to_action(key)) {
                            return Ok(());
                        }
                    }
                    Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                        if let Some(target) = self.layout.position_at(mouse.column, mouse.row) {
                            self.cursor = target;
                            self.apply_action(Action::Tap);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.game.clear_delegate();
        debug!(observers = Rc::strong_count(&self.delegate), "app closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn app(extra: &[&str]) -> App {
        let argv = ["blockbuster", "--spawn-ms", "0"].iter().chain(extra).copied();
        let args = Args::parse_from(argv);
        let config = args.game_config();
        App::new(args, config, Theme::default()).unwrap()
    }

    fn play_until_over(app: &mut App) {
        while !app.game.is_over() {
            let target = app.game.world().position_set().into_iter().next();
            app.game.tap_at(target.unwrap());
        }
    }

    #[test]
    fn test_restart_discards_actions_queued_after_game_over() {
        let mut app = app(&["--initial-blocks", "6", "--seed", "9"]);
        play_until_over(&mut app);

        // a tap and a spawn arrive while the game is over, then restart in the same batch
        assert!(app.apply_action(Action::Tap));
        let mut spawner = Spawner::new(1, 1);
        app.queue.sender().enqueue(move |g: &mut Game| {
            g.spawn_next(&mut spawner);
        });
        assert!(app.apply_action(Action::Restart));

        assert!(!app.game.is_over());
        assert!(app.queue.is_empty());
        let fresh = app.game.world().block_set();
        assert_eq!(fresh.len(), 6);
        let report = app.queue.drain(&mut app.game);
        assert_eq!(report.executed, 0);
        assert_eq!(app.game.world().block_set(), fresh);
        assert_eq!(app.game.score(), 0);
    }

    #[test]
    fn test_restart_is_ignored_while_playing() {
        let mut app = app(&["--initial-blocks", "6"]);
        let before = app.game.world().block_set();
        assert!(app.apply_action(Action::Restart));
        assert_eq!(app.game.world().block_set(), before);
    }

    #[test]
    fn test_quit_action_stops_the_loop() {
        let mut app = app(&[]);
        assert!(!app.apply_action(Action::Quit));
    }
}
