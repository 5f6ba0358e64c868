//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use blockbuster::BlockColor;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Block palette and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Block colours, indexed by `BlockColor::index`: green, yellow, red, blue, magenta, cyan.
    pub blocks: [Color; 6],
    /// Arena background.
    pub bg: Color,
    /// Layer borders.
    pub div_line: Color,
    /// Text (score, clock).
    pub main_fg: Color,
    /// Highlight / titles / selected layer.
    pub title: Color,
    /// Secondary text (key help, empty cursor cell).
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

/// Parse a hex literal known to be valid at compile time.
fn hex(s: &str) -> Color {
    parse_hex(s).unwrap_or(Color::Reset)
}

impl Theme {
    /// One Dark defaults.
    pub fn onedark_default() -> Self {
        Self {
            blocks: [
                hex("#98C379"), // green
                hex("#E5C07B"), // yellow
                hex("#E06C75"), // red
                hex("#61AFEF"), // blue
                hex("#C678DD"), // magenta
                hex("#56B6C2"), // cyan
            ],
            bg: hex("#31353F"),
            div_line: hex("#3F444F"),
            main_fg: hex("#ABB2BF"),
            title: hex("#E5C07B"),
            inactive_fg: hex("#5C6370"),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override block colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.blocks = [
                    hex("#00FF00"),
                    hex("#FFFF00"),
                    hex("#FF0000"),
                    hex("#0088FF"),
                    hex("#FF00FF"),
                    hex("#00FFFF"),
                ];
            }
            crate::Palette::Colorblind => {
                // avoid red/green pairs
                self.blocks = [
                    hex("#0077BB"),
                    hex("#EE7733"),
                    hex("#009988"),
                    hex("#CC3311"),
                    hex("#EE3377"),
                    hex("#BBBB00"),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let fallback = Self::onedark_default();
        Self {
            blocks: [
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(fallback.blocks[0]),
                get("title").or_else(|| get("cpu_mid")).unwrap_or(fallback.blocks[1]),
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(fallback.blocks[2]),
                get("cpu_box").unwrap_or(fallback.blocks[3]),
                get("net_box").unwrap_or(fallback.blocks[4]),
                get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(fallback.blocks[5]),
            ],
            bg: get("meter_bg").unwrap_or(fallback.bg),
            div_line: get("div_line").unwrap_or(fallback.div_line),
            main_fg: get("main_fg").unwrap_or(fallback.main_fg),
            title: get("title").unwrap_or(fallback.title),
            inactive_fg: get("inactive_fg").unwrap_or(fallback.inactive_fg),
        }
    }

    #[inline]
    pub fn block_color(&self, color: BlockColor) -> Color {
        self.blocks[color.index() as usize % 6]
    }

    /// Brighter variant for lit blocks.
    pub fn lit_color(&self, color: BlockColor) -> Color {
        scale(self.block_color(color), 1.25)
    }

    /// Darker variant used to tint the arena after a combo.
    pub fn tint(&self, color: BlockColor) -> Color {
        scale(self.block_color(color), 0.35)
    }
}

fn scale(color: Color, factor: f32) -> Color {
    match color {
        Color::Rgb(r, g, b) => Color::Rgb(
            (r as f32 * factor).min(255.0) as u8,
            (g as f32 * factor).min(255.0) as u8,
            (b as f32 * factor).min(255.0) as u8,
        ),
        other => other,
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("theme[") {
            if let Some(end) = stripped.find(']') {
                let key = stripped[..end].trim();
                let rest = stripped[end + 1..].trim();
                if let Some(eq) = rest.find('=') {
                    let value = rest[eq + 1..]
                        .trim()
                        .trim_matches('"')
                        .trim_matches('\'')
                        .to_string();
                    if !value.is_empty() {
                        map.insert(key.to_string(), value);
                    }
                }
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(|| ThemeError::InvalidHex(s.to_string()))
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(ThemeError::InvalidHex(s.to_string())),
    };
    Ok(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GG0000").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn test_from_map_overrides_block_colors() {
        let map = parse_theme_file("theme[cpu_box]='#0000FF'\n# comment\ntheme[main_fg]=\"#FFF\"");
        let t = Theme::from_map(&map);
        assert_eq!(t.block_color(BlockColor::Blue), Color::Rgb(0, 0, 255));
        assert_eq!(t.main_fg, Color::Rgb(255, 255, 255));
        assert_eq!(t.block_color(BlockColor::Green), Theme::onedark_default().blocks[0]);
    }

    #[test]
    fn test_lit_color_is_brighter() {
        let t = Theme::default();
        match (t.block_color(BlockColor::Red), t.lit_color(BlockColor::Red)) {
            (Color::Rgb(r0, _, _), Color::Rgb(r1, _, _)) => assert!(r1 > r0),
            other => panic!("unexpected colours {other:?}"),
        }
    }
}
