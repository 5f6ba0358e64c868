//! Spawner: seeded choice of colour and landing column for new blocks.

use crate::block::{BlockColor, Column};
use crate::world::World;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct Spawner {
    rng: StdRng,
    /// Number of palette colours in play (1..=6).
    colors: usize,
}

impl Spawner {
    pub fn new(seed: u64, colors: u8) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            colors: (colors as usize).clamp(1, BlockColor::ALL.len()),
        }
    }

    pub fn colors(&self) -> usize {
        self.colors
    }

    pub fn next_color(&mut self) -> BlockColor {
        BlockColor::ALL[self.rng.gen_range(0..self.colors)]
    }

    /// Independent spawner seeded from this one, for handing to another thread or action.
    pub fn fork(&mut self) -> Self {
        Self::new(self.rng.r#gen(), self.colors as u8)
    }

    /// A colour and a column whose top is below `ceiling`. `None` when no column has room.
    pub fn pick(&mut self, world: &World, ceiling: usize) -> Option<(BlockColor, Column)> {
        let open: Vec<Column> = world
            .arena()
            .columns()
            .filter(|c| world.column_top(*c) < ceiling)
            .collect();
        let column = *open.choose(&mut self.rng)?;
        Some((self.next_color(), column))
    }

    /// Drop up to `count` blocks, never stacking a column past `ceiling`. Returns how many landed.
    pub fn fill(&mut self, world: &mut World, count: usize, ceiling: usize) -> usize {
        let mut placed = 0;
        for _ in 0..count {
            let Some((color, column)) = self.pick(world, ceiling) else {
                break;
            };
            if world.add_block_with_color(color, column).is_ok() {
                placed += 1;
            }
        }
        placed
    }
}
