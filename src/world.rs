//! World: the live block set indexed by grid position, combo search, gather-up and rotation.

use crate::block::{Block, BlockColor, BlockId, Column, Position};
use crate::config::{GameConfig, Neighborhood};
use crate::error::WorldError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Bounded box of valid positions: 0..width, 0..height, 0..depth. y=0 is the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arena {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
}

impl Arena {
    pub fn new(width: u16, height: u16, depth: u16) -> Self {
        Self {
            width: i32::from(width),
            height: i32::from(height),
            depth: i32::from(depth),
        }
    }

    #[inline]
    pub fn contains(&self, p: Position) -> bool {
        (0..self.width).contains(&p.x) && (0..self.height).contains(&p.y) && (0..self.depth).contains(&p.z)
    }

    #[inline]
    pub fn contains_column(&self, c: Column) -> bool {
        (0..self.width).contains(&c.x) && (0..self.depth).contains(&c.z)
    }

    /// All columns, x-major.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        (0..self.width).flat_map(move |x| (0..self.depth).map(move |z| Column::new(x, z)))
    }

    /// Number of positions. Saturates instead of overflowing on huge extents.
    pub fn volume(&self) -> usize {
        let extent = |n: i32| usize::try_from(n).unwrap_or(0);
        extent(self.width)
            .saturating_mul(extent(self.height))
            .saturating_mul(extent(self.depth))
    }
}

/// Rotation axis through the arena centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Change notifications for the renderer, drained with [`World::take_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    Created {
        id: BlockId,
        color: BlockColor,
        position: Position,
    },
    Dismissed {
        id: BlockId,
        color: BlockColor,
        position: Position,
    },
    Moved {
        id: BlockId,
        from: Position,
        to: Position,
    },
}

/// Owns every live block. At most one block per position; `blocks` and `ids` always agree.
#[derive(Debug)]
pub struct World {
    arena: Arena,
    neighborhood: Neighborhood,
    blocks: BTreeMap<Position, Block>,
    ids: HashMap<BlockId, Position>,
    events: Vec<WorldEvent>,
    next_id: u64,
}

impl World {
    pub fn new(arena: Arena, neighborhood: Neighborhood) -> Self {
        Self {
            arena,
            neighborhood,
            blocks: BTreeMap::new(),
            ids: HashMap::new(),
            events: Vec::new(),
            next_id: 1,
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(
            Arena::new(config.width, config.height, config.depth),
            config.neighborhood,
        )
    }

    #[inline]
    pub fn arena(&self) -> Arena {
        self.arena
    }

    #[inline]
    pub fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The only way blocks enter the world.
    pub fn create_block(&mut self, color: BlockColor, position: Position) -> Result<Block, WorldError> {
        if !self.arena.contains(position) {
            return Err(WorldError::OutOfBounds(position));
        }
        if self.blocks.contains_key(&position) {
            return Err(WorldError::PositionOccupied(position));
        }
        let id = BlockId(self.next_id);
        self.next_id += 1;
        let block = Block::new(id, color, position);
        self.blocks.insert(position, block.clone());
        self.ids.insert(id, position);
        self.events.push(WorldEvent::Created { id, color, position });
        debug!(%id, color = color.name(), %position, "block created");
        Ok(block)
    }

    /// Drop a block onto a column: it lands on top of whatever the column already holds.
    pub fn add_block_with_color(&mut self, color: BlockColor, column: Column) -> Result<Block, WorldError> {
        if !self.arena.contains_column(column) {
            return Err(WorldError::OutOfBounds(column.at_height(0)));
        }
        let top = self.column_top(column);
        if top >= self.arena.height as usize {
            return Err(WorldError::ColumnFull {
                x: column.x,
                z: column.z,
            });
        }
        self.create_block(color, column.at_height(top as i32))
    }

    /// Remove a block and return it dead. Unknown or already-removed ids are a no-op.
    pub fn remove_block(&mut self, id: BlockId) -> Option<Block> {
        let position = self.ids.remove(&id)?;
        let mut block = self.blocks.remove(&position)?;
        block.kill();
        self.events.push(WorldEvent::Dismissed {
            id,
            color: block.color(),
            position,
        });
        debug!(%id, %position, "block removed");
        Some(block)
    }

    /// Occupant of `position`, if any. Positions outside the arena are simply empty.
    #[inline]
    pub fn query_position(&self, position: Position) -> Option<&Block> {
        self.blocks.get(&position)
    }

    /// Like [`World::query_position`] but rejects positions outside the arena.
    pub fn checked_query(&self, position: Position) -> Result<Option<&Block>, WorldError> {
        if !self.arena.contains(position) {
            return Err(WorldError::OutOfBounds(position));
        }
        Ok(self.blocks.get(&position))
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.ids.get(&id).and_then(|p| self.blocks.get(p))
    }

    /// Renderer highlight toggle. Returns false if the block is gone.
    pub fn set_lit(&mut self, id: BlockId, lit: bool) -> bool {
        match self.ids.get(&id).and_then(|p| self.blocks.get_mut(p)) {
            Some(block) => {
                block.set_lit(lit);
                true
            }
            None => false,
        }
    }

    /// Light the block at `target` and unlight every other one. True if something is lit.
    pub fn light_only(&mut self, target: Option<Position>) -> bool {
        let mut lit = false;
        for (position, block) in &mut self.blocks {
            let on = Some(*position) == target;
            block.set_lit(on);
            lit |= on;
        }
        lit
    }

    /// Same-colour group connected to the block at `origin` (inclusive), sorted.
    /// Empty if `origin` is unoccupied.
    pub fn combo_at(&self, origin: Position) -> Vec<Position> {
        let color = match self.blocks.get(&origin) {
            Some(b) => b.color(),
            None => return Vec::new(),
        };
        let mut visited = BTreeSet::from([origin]);
        let mut stack = vec![origin];
        while let Some(p) = stack.pop() {
            for (dx, dy, dz) in self.neighborhood.offsets() {
                let n = p.offset(dx, dy, dz);
                if visited.contains(&n) {
                    continue;
                }
                if self.blocks.get(&n).is_some_and(|b| b.color() == color) {
                    visited.insert(n);
                    stack.push(n);
                }
            }
        }
        visited.into_iter().collect()
    }

    /// Remove the whole combo at `origin` as one batch. Does not gather.
    pub fn remove_combo(&mut self, origin: Position) -> Vec<Block> {
        let members = self.combo_at(origin);
        let ids: Vec<BlockId> = members
            .iter()
            .filter_map(|p| self.blocks.get(p).map(Block::id))
            .collect();
        ids.into_iter().filter_map(|id| self.remove_block(id)).collect()
    }

    /// Settle every column so blocks stack from the floor with no gaps.
    /// Blocks keep their order within a column; blocks already in place do not move.
    /// Returns how many blocks moved.
    pub fn gather_up(&mut self) -> usize {
        let mut columns: BTreeMap<Column, Vec<Block>> = BTreeMap::new();
        for block in self.blocks.values() {
            columns.entry(block.position().column()).or_default().push(block.clone());
        }

        let mut gathered = BTreeMap::new();
        let mut moved = 0;
        for (column, mut stack) in columns {
            stack.sort_by_key(|b| b.position().y);
            for (y, mut block) in stack.into_iter().enumerate() {
                let from = block.position();
                let to = column.at_height(y as i32);
                if from != to {
                    block.set_position(to);
                    self.ids.insert(block.id(), to);
                    self.events.push(WorldEvent::Moved {
                        id: block.id(),
                        from,
                        to,
                    });
                    moved += 1;
                }
                gathered.insert(to, block);
            }
        }
        self.blocks = gathered;
        if moved > 0 {
            debug!(moved, "gathered up");
        }
        moved
    }

    /// Rotate every block by `quarter_turns` * 90° about `axis` through the arena centre.
    /// The two extents across the axis must match. Does not gather.
    pub fn rotate(&mut self, axis: Axis, quarter_turns: i32) -> Result<(), WorldError> {
        let Arena { width, height, depth } = self.arena;
        let square = match axis {
            Axis::X => height == depth,
            Axis::Y => width == depth,
            Axis::Z => width == height,
        };
        if !square {
            return Err(WorldError::NonSquareRotation(axis));
        }
        let turns = quarter_turns.rem_euclid(4);
        if turns == 0 || self.blocks.is_empty() {
            return Ok(());
        }

        let turn = |p: Position| -> Position {
            match axis {
                Axis::X => Position::new(p.x, depth - 1 - p.z, p.y),
                Axis::Y => Position::new(depth - 1 - p.z, p.y, p.x),
                Axis::Z => Position::new(height - 1 - p.y, p.x, p.z),
            }
        };

        let mut rotated = BTreeMap::new();
        for (from, mut block) in std::mem::take(&mut self.blocks) {
            let mut to = from;
            for _ in 0..turns {
                to = turn(to);
            }
            if to != from {
                block.set_position(to);
                self.ids.insert(block.id(), to);
                self.events.push(WorldEvent::Moved {
                    id: block.id(),
                    from,
                    to,
                });
            }
            rotated.insert(to, block);
        }
        self.blocks = rotated;
        debug!(?axis, turns, "world rotated");
        Ok(())
    }

    /// One past the highest occupied y in the column (0 when empty).
    pub fn column_top(&self, column: Column) -> usize {
        self.blocks
            .keys()
            .filter(|p| p.column() == column)
            .map(|p| p.y as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// Number of blocks in the column.
    pub fn column_height(&self, column: Column) -> usize {
        self.blocks.keys().filter(|p| p.column() == column).count()
    }

    /// Tallest column top across the arena.
    pub fn max_column_top(&self) -> usize {
        self.blocks.keys().map(|p| p.y as usize + 1).max().unwrap_or(0)
    }

    /// Columns with room for at least one more block.
    pub fn open_columns(&self) -> Vec<Column> {
        let height = self.arena.height as usize;
        self.arena
            .columns()
            .filter(|c| self.column_top(*c) < height)
            .collect()
    }

    /// Owned copy of every live block, in position order.
    pub fn block_set(&self) -> Vec<Block> {
        self.blocks.values().cloned().collect()
    }

    /// Owned copy of every occupied position.
    pub fn position_set(&self) -> BTreeSet<Position> {
        self.blocks.keys().copied().collect()
    }

    /// Drain pending renderer events in the order they happened.
    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Kill and drop every block. Ids keep counting up.
    pub fn reset(&mut self) {
        let count = self.blocks.len();
        for (position, mut block) in std::mem::take(&mut self.blocks) {
            block.kill();
            self.events.push(WorldEvent::Dismissed {
                id: block.id(),
                color: block.color(),
                position,
            });
        }
        self.ids.clear();
        debug!(count, "world reset");
    }
}
