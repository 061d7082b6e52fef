//! Owned snapshots of everything a caller may read from the engine.

use image::RgbaImage;

use crate::constants::SPRITE_COUNT;
use crate::emulator::engine::{CollisionArea, Engine, GameArea, Sprite};
use crate::map::direction::Direction;
use crate::map::pathfinding::NavigationGrid;
use crate::map::render::render_collision_map;
use crate::map::sprites::SpriteSet;
use crate::map::terrain::{facing_direction, TerrainGrid, ValidMoves};
use crate::map::tileset::Tileset;

/// A copy of the engine's readable surfaces, taken between two ticks.
///
/// Frames never alias engine memory; every reading derived from one frame describes
/// the same instant.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Total frames the engine had advanced when this was captured.
    pub number: u64,
    pub screen: RgbaImage,
    pub sprites: Vec<Sprite>,
    pub game_area: GameArea,
    pub collision: CollisionArea,
    pub tilemap: GameArea,
    pub memory: Vec<u8>,
}

impl Frame {
    pub fn capture<E: Engine>(engine: &E, number: u64) -> Self {
        Self {
            number,
            screen: engine.screen(),
            sprites: (0..SPRITE_COUNT).map(|index| engine.sprite(index)).collect(),
            game_area: engine.game_area(),
            collision: engine.game_area_collision(),
            tilemap: engine.background_tilemap(),
            memory: engine.memory().to_vec(),
        }
    }

    pub fn terrain(&self) -> TerrainGrid {
        TerrainGrid::from_collision(&self.collision)
    }

    pub fn sprite_set(&self) -> SpriteSet {
        SpriteSet::from_sprites(&self.sprites)
    }

    pub fn facing(&self) -> Option<Direction> {
        facing_direction(&self.game_area)
    }

    pub fn valid_moves(&self) -> ValidMoves {
        self.terrain().valid_moves()
    }

    /// The ASCII collision map, or `None` when the player sprite is not visible.
    pub fn collision_map(&self) -> Option<String> {
        let facing = self.facing()?;
        Some(render_collision_map(&self.terrain(), &self.sprite_set(), facing))
    }

    pub fn navigation(&self, tileset: Option<Tileset>) -> NavigationGrid {
        NavigationGrid::new(self.terrain(), self.sprite_set(), self.tilemap, tileset)
    }
}
