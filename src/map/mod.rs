//! Terrain, sprites and navigation on the player-centred grid.

pub mod direction;
pub mod pathfinding;
pub mod render;
pub mod sprites;
pub mod terrain;
pub mod tileset;
