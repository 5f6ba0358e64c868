//! Block: one colored cube with identity, grid position, highlight and liveness.

use glam::Vec3;
use std::fmt;

/// Opaque block identity. Allocated by the owning world, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u64);

impl BlockId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Block palette. Discriminants double as the theme colour index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockColor {
    Green,
    Yellow,
    Red,
    Blue,
    Magenta,
    Cyan,
}

impl BlockColor {
    pub const ALL: [Self; 6] = [
        Self::Green,
        Self::Yellow,
        Self::Red,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
    ];

    /// Palette index 0..6, in theme order.
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize) % Self::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
        }
    }
}

/// Discrete grid coordinate. y is up; y=0 is the arena floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Snap a world-space point to the nearest grid cell (cube centres sit on integers).
    pub fn snap(point: Vec3) -> Self {
        let r = point.round();
        Self::new(r.x as i32, r.y as i32, r.z as i32)
    }

    /// Cube centre in world space.
    pub fn to_world(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn column(self) -> Column {
        Column::new(self.x, self.z)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Horizontal (x, z) footprint of a vertical stack of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Column {
    pub x: i32,
    pub z: i32,
}

impl Column {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn at_height(self, y: i32) -> Position {
        Position::new(self.x, y, self.z)
    }
}

/// A coloured cube. Colour and id are fixed at creation; only the world moves or kills it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    color: BlockColor,
    position: Position,
    lit: bool,
    alive: bool,
}

impl Block {
    pub(crate) fn new(id: BlockId, color: BlockColor, position: Position) -> Self {
        Self {
            id,
            color,
            position,
            lit: false,
            alive: true,
        }
    }

    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    pub fn color(&self) -> BlockColor {
        self.color
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    #[inline]
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Highlight flag for the renderer. Game logic never reads it.
    pub fn set_lit(&mut self, lit: bool) {
        self.lit = lit;
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// alive -> dead, once. Returns false if it was already dead.
    pub(crate) fn kill(&mut self) -> bool {
        std::mem::replace(&mut self.alive, false)
    }
}
