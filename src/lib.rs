//! Blockbuster core: coloured cubes in a 3D arena, tap-to-clear combos, column gather-up.
//!
//! [`World`] owns the blocks and their position index. [`Game`] drives it from taps and reports
//! score, combo colour and game over to a [`GameDelegate`]. Mutations coming from other threads
//! go through an [`ActionQueue`] so they apply one at a time, in order.

pub mod action_queue;
pub mod block;
pub mod config;
pub mod error;
pub mod game;
pub mod spawner;
pub mod world;

pub use action_queue::{ActionQueue, ActionSender, DrainReport, Finalize};
pub use block::{Block, BlockColor, BlockId, Column, Position};
pub use config::{GameConfig, GameOverPolicy, Neighborhood};
pub use error::WorldError;
pub use game::{
    ChannelDelegate, Game, GameDelegate, GameEvent, GameOverReason, GameStatus, TapOutcome,
};
pub use spawner::Spawner;
pub use world::{Arena, Axis, World, WorldEvent};
