//! Blockbuster: tap same-coloured cubes in a 3D arena, in the terminal.

mod app;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use blockbuster::{GameConfig, GameOverPolicy, Neighborhood};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.verbose)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = args.game_config();
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// Plain-text log file, only when asked for; stdout belongs to the TUI.
fn init_logging(path: Option<&std::path::Path>, verbose: bool) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .init();
    Ok(())
}

/// Tap-to-clear coloured cube puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "blockbuster",
    version,
    about = "Tap-to-clear coloured cube puzzle in the terminal. Clear same-coloured groups; the rest falls.",
    long_about = "Blockbuster is a terminal puzzle over a 3D arena of coloured cubes.\n\n\
        Tap a cube to clear it together with every same-coloured cube connected to it. \
        Columns then settle to the floor. New cubes keep dropping in; the game ends when \
        the arena is cleared or a column reaches the fill limit.\n\n\
        The arena is drawn one z layer per panel (x across, y up).\n\n\
        CONTROLS:\n  Arrows / hjkl  Cursor      [ ] or u i  Layer      Space/Enter  Tap\n  \
        r  Rotate about Y     x / z  Rotate about X / Z\n  p  Pause     n  Restart after game over     q / Esc  Quit\n\n\
        Left click taps the cube under the mouse. Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Arena width (x).
    #[arg(long, default_value = "5", value_name = "N", value_parser = extent_parser())]
    pub width: u16,

    /// Arena height (y, up).
    #[arg(long, default_value = "8", value_name = "N", value_parser = extent_parser())]
    pub height: u16,

    /// Arena depth (z, one panel per layer).
    #[arg(long, default_value = "5", value_name = "N", value_parser = extent_parser())]
    pub depth: u16,

    /// Which neighbours join a combo: orthogonal (faces), edges (+ edge diagonals), full (+ corners).
    #[arg(short, long, default_value = "orthogonal")]
    pub neighborhood: Neighborhood,

    /// When the game ends: empty (arena cleared), overflow (a column reaches the fill limit), or both.
    #[arg(short, long, default_value = "empty-or-overflow")]
    pub game_over: GameOverPolicy,

    /// Column height that ends the game under the overflow policy. Defaults to the arena height.
    #[arg(long, value_name = "N")]
    pub fill_limit: Option<u16>,

    /// Points for tapping a lone block.
    #[arg(long, default_value = "1", value_name = "N")]
    pub single_block_score: u32,

    /// Blocks dropped into the arena at start and on restart.
    #[arg(long, default_value = "40", value_name = "N")]
    pub initial_blocks: usize,

    /// Number of block colours in play (1-6).
    #[arg(long, default_value = "4", value_name = "N")]
    pub colors: u8,

    /// Milliseconds between spawned blocks. 0 disables spawning.
    #[arg(long, default_value = "2500", value_name = "MS")]
    pub spawn_ms: u64,

    /// Random seed for colours and landing columns.
    #[arg(long, default_value = "0", value_name = "N")]
    pub seed: u64,

    /// Target frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable the dismiss fade.
    #[arg(long)]
    pub no_animation: bool,

    /// Write logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log at debug level instead of info.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Largest accepted arena extent on any axis.
const MAX_EXTENT: u16 = 64;

fn extent_parser() -> clap::builder::RangedI64ValueParser<u16> {
    clap::value_parser!(u16).range(1..=i64::from(MAX_EXTENT))
}

impl Args {
    fn game_config(&self) -> GameConfig {
        let mut config = GameConfig {
            neighborhood: self.neighborhood,
            game_over: self.game_over,
            single_block_score: self.single_block_score,
            ..GameConfig::default()
        }
        .with_arena(self.width, self.height, self.depth);
        if let Some(limit) = self.fill_limit {
            config.fill_limit = limit;
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["blockbuster"]);
        let config = args.game_config();
        assert_eq!(config, GameConfig::default());
        assert_eq!(args.palette, Palette::Normal);
        assert_eq!(args.spawn_ms, 2500);
    }

    #[test]
    fn test_arena_and_policy_flags() {
        let args = Args::parse_from([
            "blockbuster",
            "--width",
            "3",
            "--height",
            "6",
            "--depth",
            "2",
            "--neighborhood",
            "diagonal",
            "--game-over",
            "overflow",
            "--fill-limit",
            "4",
        ]);
        let config = args.game_config();
        assert_eq!((config.width, config.height, config.depth), (3, 6, 2));
        assert_eq!(config.neighborhood, Neighborhood::Full);
        assert_eq!(config.game_over, GameOverPolicy::Overflow);
        assert_eq!(config.fill_limit, 4);
    }

    #[test]
    fn test_arena_extents_are_bounded() {
        for bad in ["0", "65", "2048"] {
            assert!(Args::try_parse_from(["blockbuster", "--depth", bad]).is_err());
        }
        let args = Args::try_parse_from(["blockbuster", "--width", "64"]).unwrap();
        assert_eq!(args.game_config().width, MAX_EXTENT);
    }
}
