//! Game configuration: arena extents and the rule knobs (combo neighbourhood, game-over policy, scoring).

use clap::ValueEnum;

/// Which cells count as adjacent when growing a combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Neighborhood {
    /// 6 face neighbours.
    #[default]
    Orthogonal,

    /// 18: faces and edges.
    #[value(alias = "edge")]
    Edges,

    /// 26: faces, edges and corners.
    #[value(alias = "diagonal")]
    Full,
}

impl Neighborhood {
    /// Largest number of non-zero axis steps allowed in one hop.
    fn max_axes(self) -> u32 {
        match self {
            Self::Orthogonal => 1,
            Self::Edges => 2,
            Self::Full => 3,
        }
    }

    /// Unit offsets (dx, dy, dz) in a fixed order.
    pub fn offsets(self) -> impl Iterator<Item = (i32, i32, i32)> {
        let max = self.max_axes();
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).filter_map(move |dz| {
                    let axes = [dx, dy, dz].iter().filter(|d| **d != 0).count() as u32;
                    (axes > 0 && axes <= max).then_some((dx, dy, dz))
                })
            })
        })
    }
}

/// When a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GameOverPolicy {
    /// The last block was cleared.
    Empty,
    /// Some column reached the fill limit.
    Overflow,
    #[default]
    EmptyOrOverflow,
}

impl GameOverPolicy {
    pub fn on_empty(self) -> bool {
        matches!(self, Self::Empty | Self::EmptyOrOverflow)
    }

    pub fn on_overflow(self) -> bool {
        matches!(self, Self::Overflow | Self::EmptyOrOverflow)
    }
}

/// Options that shape a session. Built from CLI args by the shell, or directly in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub neighborhood: Neighborhood,
    pub game_over: GameOverPolicy,
    /// Column height that ends the game under an overflow policy. Clamped to the arena height.
    pub fill_limit: u16,
    /// Score for a tap that removes a lone block (no combo).
    pub single_block_score: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 5,
            height: 8,
            depth: 5,
            neighborhood: Neighborhood::Orthogonal,
            game_over: GameOverPolicy::EmptyOrOverflow,
            fill_limit: 8,
            single_block_score: 1,
        }
    }
}

impl GameConfig {
    pub fn with_arena(mut self, width: u16, height: u16, depth: u16) -> Self {
        self.width = width;
        self.height = height;
        self.depth = depth;
        self.fill_limit = height;
        self
    }

    pub fn effective_fill_limit(&self) -> usize {
        self.fill_limit.clamp(1, self.height.max(1)) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Neighborhood::Orthogonal, 6)]
    #[case(Neighborhood::Edges, 18)]
    #[case(Neighborhood::Full, 26)]
    fn test_neighborhood_sizes(#[case] n: Neighborhood, #[case] expected: usize) {
        assert_eq!(n.offsets().count(), expected);
        assert!(n.offsets().all(|o| o != (0, 0, 0)));
    }

    #[test]
    fn test_orthogonal_is_axis_aligned() {
        for (dx, dy, dz) in Neighborhood::Orthogonal.offsets() {
            assert_eq!(dx.abs() + dy.abs() + dz.abs(), 1);
        }
    }

    #[test]
    fn test_fill_limit_clamped_to_height() {
        let mut c = GameConfig::default().with_arena(3, 4, 3);
        assert_eq!(c.effective_fill_limit(), 4);
        c.fill_limit = 99;
        assert_eq!(c.effective_fill_limit(), 4);
        c.fill_limit = 0;
        assert_eq!(c.effective_fill_limit(), 1);
    }
}
