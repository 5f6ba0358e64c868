//! World errors: rejected placements and queries. None of them are fatal.

use crate::block::Position;
use crate::world::Axis;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("position {0} is already occupied")]
    PositionOccupied(Position),
    #[error("position {0} is outside the arena")]
    OutOfBounds(Position),
    #[error("column ({x}, {z}) is full")]
    ColumnFull { x: i32, z: i32 },
    #[error("arena is not square across the {0:?} axis")]
    NonSquareRotation(Axis),
}
