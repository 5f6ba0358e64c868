//! Layout and drawing: arena layers, sidebar, pause and game-over overlays, dismiss fade.

use crate::theme::Theme;
use blockbuster::{Arena, BlockColor, Game, GameOverReason, GameStatus, Position};
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position as ScreenPos, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each arena cell is two terminal columns wide so cubes look square.
const CELL_WIDTH: u16 = 2;
const LAYER_GAP: u16 = 1;
const SIDEBAR_WIDTH: u16 = 26;
const SIDEBAR_MIN_HEIGHT: u16 = 22;
/// Duration of the dismiss fade in ms.
const FADE_MS: u32 = 350;

/// Screen placement of every z layer. Maps arena positions to terminal cells and back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArenaLayout {
    /// Bordered rect per layer, index = z.
    outer: Vec<Rect>,
    /// Cell area inside each border, index = z.
    inner: Vec<Rect>,
    width: i32,
    height: i32,
}

impl ArenaLayout {
    /// Centre the layers plus sidebar in `area`. Returns the layout and the sidebar rect.
    pub fn compute(area: Rect, arena: Arena) -> (Self, Rect) {
        let extent = |n: i32| u16::try_from(n.max(0)).unwrap_or(u16::MAX);
        let cols = extent(arena.width);
        let rows = extent(arena.height);
        let depth = extent(arena.depth);
        // oversized arenas saturate and get clipped to `area` below
        let layer_w = cols.saturating_mul(CELL_WIDTH).saturating_add(2);
        let layer_h = rows.saturating_add(2);
        let stride = layer_w.saturating_add(LAYER_GAP);
        let layers_w = depth.saturating_mul(stride);
        let total_w = layers_w.saturating_add(SIDEBAR_WIDTH);

        let horiz = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(total_w),
                Constraint::Fill(1),
            ])
            .split(area);
        let vert = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(layer_h.max(SIDEBAR_MIN_HEIGHT)),
                Constraint::Fill(1),
            ])
            .split(horiz[1]);
        let active = vert[1];

        let mut outer = Vec::with_capacity(usize::from(depth));
        let mut inner = Vec::with_capacity(usize::from(depth));
        for z in 0..depth {
            let rect = Rect {
                x: active.x.saturating_add(z.saturating_mul(stride)),
                y: active.y,
                width: layer_w,
                height: layer_h,
            }
            .intersection(area);
            outer.push(rect);
            inner.push(Rect {
                x: rect.x.saturating_add(1),
                y: rect.y.saturating_add(1),
                width: cols.saturating_mul(CELL_WIDTH).min(rect.width.saturating_sub(2)),
                height: rows.min(rect.height.saturating_sub(2)),
            });
        }
        let sidebar = Rect {
            x: active.x.saturating_add(layers_w),
            y: active.y,
            width: SIDEBAR_WIDTH,
            height: active.height,
        }
        .intersection(area);
        let layout = Self {
            outer,
            inner,
            width: arena.width,
            height: arena.height,
        };
        (layout, sidebar)
    }

    /// Terminal cells showing `position`, if it is on screen.
    pub fn cell_rect(&self, position: Position) -> Option<Rect> {
        if !(0..self.width).contains(&position.x) || !(0..self.height).contains(&position.y) {
            return None;
        }
        let layer = *self.inner.get(usize::try_from(position.z).ok()?)?;
        let col = u16::try_from(position.x).ok()?.saturating_mul(CELL_WIDTH);
        let row = u16::try_from(self.height - 1 - position.y).ok()?;
        let rect = Rect {
            x: layer.x.saturating_add(col),
            y: layer.y.saturating_add(row),
            width: CELL_WIDTH,
            height: 1,
        };
        let visible = rect.intersection(layer);
        (!visible.is_empty()).then_some(visible)
    }

    /// Arena position under a terminal cell (mouse click).
    pub fn position_at(&self, col: u16, row: u16) -> Option<Position> {
        let (z, layer) = self
            .inner
            .iter()
            .enumerate()
            .find(|(_, r)| r.contains(ScreenPos { x: col, y: row }))?;
        let x = i32::from((col - layer.x) / CELL_WIDTH);
        let y = self.height - 1 - i32::from(row - layer.y);
        (x < self.width && y >= 0).then(|| Position::new(x, y, z as i32))
    }

    /// Union of all layer rects.
    fn bounds(&self) -> Rect {
        self.outer
            .iter()
            .copied()
            .reduce(|a, b| a.union(b))
            .unwrap_or_default()
    }
}

/// Dismissed cells fading to the background. Purely visual.
#[derive(Default)]
pub struct Fade {
    ghosts: Vec<(Position, BlockColor)>,
    effect: Option<Effect>,
    last_process: Option<Instant>,
}

impl Fade {
    /// Add cells to fade; restarts the effect so old and new ghosts fade together.
    pub fn push(&mut self, position: Position, color: BlockColor) {
        self.ghosts.push((position, color));
        self.effect = None;
        self.last_process = None;
    }

    pub fn is_active(&self) -> bool {
        !self.ghosts.is_empty()
    }

    /// Forget the ghosts once the effect has run its course.
    pub fn finish_if_done(&mut self) {
        if self.effect.as_ref().is_some_and(Effect::done) {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.ghosts.clear();
        self.effect = None;
        self.last_process = None;
    }
}

/// Everything the renderer reads besides the game itself.
pub struct View<'a> {
    pub game: &'a Game,
    pub theme: &'a Theme,
    pub cursor: Position,
    /// Last combo colour reported by the delegate; tints the arena.
    pub combo_color: Option<BlockColor>,
    pub last_increment: Option<u32>,
}

/// Draw the whole screen. Returns where the layers landed, for mouse hit-testing.
pub fn draw(frame: &mut Frame, view: &View, fade: &mut Fade, now: Instant) -> ArenaLayout {
    let area = frame.area();
    let arena = view.game.world().arena();
    let (layout, sidebar) = ArenaLayout::compute(area, arena);

    draw_layers(frame.buffer_mut(), view, &layout);
    draw_sidebar(frame.buffer_mut(), view, sidebar);
    if fade.is_active() {
        apply_fade(frame, view, &layout, fade, now);
    }
    match view.game.status() {
        GameStatus::Paused => draw_pause_overlay(frame.buffer_mut(), view.theme, area),
        GameStatus::GameOver => draw_game_over(frame.buffer_mut(), view, area),
        GameStatus::Idle | GameStatus::Resolving => {}
    }
    layout
}

fn arena_bg(view: &View) -> Color {
    match view.combo_color {
        Some(color) => view.theme.tint(color),
        None => view.theme.bg,
    }
}

fn draw_layers(buf: &mut Buffer, view: &View, layout: &ArenaLayout) {
    let theme = view.theme;
    let world = view.game.world();
    let bg = arena_bg(view);

    for (z, outer) in layout.outer.iter().enumerate() {
        let z = z as i32;
        let border = if z == view.cursor.z {
            theme.title
        } else {
            theme.div_line
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border).bg(theme.bg))
            .title(Span::styled(format!(" z{z} "), Style::default().fg(border)))
            .render(*outer, buf);

        for y in 0..layout.height {
            for x in 0..layout.width {
                let position = Position::new(x, y, z);
                let Some(rect) = layout.cell_rect(position) else {
                    continue;
                };
                let (symbol, style) = match world.query_position(position) {
                    Some(block) => {
                        let fg = if block.is_lit() {
                            theme.lit_color(block.color())
                        } else {
                            theme.block_color(block.color())
                        };
                        ("██", Style::default().fg(fg).bg(bg))
                    }
                    None if position == view.cursor => {
                        ("[]", Style::default().fg(theme.inactive_fg).bg(bg))
                    }
                    None => ("  ", Style::default().bg(bg)),
                };
                buf.set_stringn(rect.x, rect.y, symbol, rect.width as usize, style);
            }
        }
    }
}

/// Paint ghosts on empty cells and fade them to the background (TachyonFX).
fn apply_fade(frame: &mut Frame, view: &View, layout: &ArenaLayout, fade: &mut Fade, now: Instant) {
    let delta = fade
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    fade.last_process = Some(now);

    let world = view.game.world();
    let mut cells = HashSet::new();
    for (position, color) in &fade.ghosts {
        if world.query_position(*position).is_some() {
            continue;
        }
        let Some(rect) = layout.cell_rect(*position) else {
            continue;
        };
        let style = Style::default().fg(view.theme.block_color(*color));
        frame
            .buffer_mut()
            .set_stringn(rect.x, rect.y, "██", rect.width as usize, style);
        for x in rect.x..rect.x + rect.width {
            cells.insert((x, rect.y));
        }
    }

    let bounds = layout.bounds();
    if fade.effect.is_none() {
        let filter = CellFilter::PositionFn(ref_count(move |pos: ScreenPos| {
            cells.contains(&(pos.x, pos.y))
        }));
        let bg = arena_bg(view);
        let effect = fx::fade_to(bg, bg, (FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(bounds);
        fade.effect = Some(effect);
    }
    if let Some(effect) = fade.effect.as_mut() {
        frame.render_effect(effect, bounds, TfxDuration::from_millis(delta_ms));
    }
}

fn draw_sidebar(buf: &mut Buffer, view: &View, area: Rect) {
    let theme = view.theme;
    let game = view.game;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Score
            Constraint::Length(3), // Colours
            Constraint::Length(6), // Status
            Constraint::Min(8),    // Keys
        ])
        .split(area);

    let boxed = |title: &'static str| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Span::styled(title, title_style))
    };

    let arena = game.world().arena();
    let last = view
        .last_increment
        .map(|n| format!("+{n}"))
        .unwrap_or_default();
    let score_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(game.score().to_string(), fg_style),
            Span::styled(format!(" {last}"), Style::default().fg(theme.blocks[0])),
        ]),
        Line::from(vec![
            Span::styled("Blocks: ", title_style),
            Span::styled(format!("{}/{}", game.world().len(), arena.volume()), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Combo: ", title_style),
            Span::styled(
                view.combo_color.map(BlockColor::name).unwrap_or("-"),
                view.combo_color
                    .map(|c| Style::default().fg(theme.block_color(c)))
                    .unwrap_or(fg_style),
            ),
        ]),
    ];
    let score_box = boxed(" Score ");
    let inner = score_box.inner(chunks[0]);
    score_box.render(chunks[0], buf);
    Paragraph::new(Text::from(score_lines)).render(inner, buf);

    let colours_box = boxed(" Colours ");
    let inner = colours_box.inner(chunks[1]);
    colours_box.render(chunks[1], buf);
    draw_colour_strip(buf, theme, inner);

    let secs = game.uniform_time() as u64;
    let status = match game.status() {
        GameStatus::Idle => "Playing",
        GameStatus::Paused => "Paused",
        GameStatus::Resolving => "Resolving",
        GameStatus::GameOver => "Game over",
    };
    let status_lines = vec![
        Line::from(vec![
            Span::styled("Time: ", title_style),
            Span::styled(format!("{:02}:{:02}", secs / 60, secs % 60), fg_style),
        ]),
        Line::from(vec![
            Span::styled("State: ", title_style),
            Span::styled(status, fg_style),
        ]),
        Line::from(vec![
            Span::styled("Cursor: ", title_style),
            Span::styled(view.cursor.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Rule: ", title_style),
            Span::styled(format!("{:?}", game.world().neighborhood()), fg_style),
        ]),
    ];
    let status_box = boxed(" Status ");
    let inner = status_box.inner(chunks[2]);
    status_box.render(chunks[2], buf);
    Paragraph::new(Text::from(status_lines)).render(inner, buf);

    let help = Style::default().fg(theme.inactive_fg);
    let key_lines: Vec<Line> = [
        "←↓↑→ / hjkl  Cursor",
        "[ ] / u i    Layer",
        "Space/Enter  Tap",
        "r  x  z      Rotate",
        "p            Pause",
        "n            Restart",
        "q / Esc      Quit",
    ]
    .into_iter()
    .map(|s| Line::from(Span::styled(s, help)))
    .collect();
    let keys_box = boxed(" Keys ");
    let inner = keys_box.inner(chunks[3]);
    keys_box.render(chunks[3], buf);
    Paragraph::new(Text::from(key_lines)).render(inner, buf);
}

/// A row of the six block colours.
fn draw_colour_strip(buf: &mut Buffer, theme: &Theme, area: Rect) {
    let block_w = (area.width / 6).max(1);
    for color in BlockColor::ALL {
        let r = Rect {
            x: area.x + u16::from(color.index()) * block_w,
            y: area.y,
            width: block_w,
            height: area.height.min(1),
        }
        .intersection(area);
        let c = theme.block_color(color);
        Paragraph::new("█".repeat(block_w as usize))
            .style(Style::default().fg(c).bg(c))
            .render(r, buf);
    }
}

fn centered(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn draw_pause_overlay(buf: &mut Buffer, theme: &Theme, area: Rect) {
    let popup = centered(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: Resume    Q: Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Clear.render(popup, buf);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, buf);
}

fn draw_game_over(buf: &mut Buffer, view: &View, area: Rect) {
    let theme = view.theme;
    let game = view.game;
    let popup = centered(area, 30, 9);
    let reason = match game.game_over_reason() {
        Some(GameOverReason::Cleared) => " Arena cleared ",
        Some(GameOverReason::Overflow) => " Stack overflow ",
        None => "",
    };
    let secs = game.uniform_time() as u64;
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(Span::styled(reason, Style::default().fg(theme.title))),
        Line::from(Span::styled(
            format!(" Score: {} ", game.score()),
            Style::default().fg(theme.main_fg).bold(),
        )),
        Line::from(Span::styled(
            format!(" Time: {:02}:{:02} ", secs / 60, secs % 60),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " N: Restart    Q: Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Clear.render(popup, buf);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Blockbuster ", theme.title)),
        )
        .render(popup, buf);
}
