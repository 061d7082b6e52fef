//! ASCII rendering of the player-centred collision map.

use crate::constants::{GRID_COLS, GRID_ROWS, PLAYER_CELL};
use crate::map::direction::Direction;
use crate::map::sprites::SpriteSet;
use crate::map::terrain::TerrainGrid;

const WALL: char = '█';
const PATH: char = '·';
const SPRITE: char = 'S';

/// Renders the 9x10 grid inside a border, followed by a legend.
///
/// The player cell shows the facing arrow and takes precedence over sprites, which take
/// precedence over terrain.
pub fn render_collision_map(terrain: &TerrainGrid, sprites: &SpriteSet, facing: Direction) -> String {
    let border = format!("+{}+", "-".repeat(GRID_COLS));
    let mut lines = Vec::with_capacity(GRID_ROWS + 8);
    lines.push(border.clone());

    for row in 0..GRID_ROWS {
        let mut line = String::with_capacity(GRID_COLS * 3 + 2);
        line.push('|');
        for col in 0..GRID_COLS {
            let cell = if (row, col) == PLAYER_CELL {
                facing.arrow()
            } else if sprites.contains(col as i32, row as i32) {
                SPRITE
            } else if terrain.is_wall((row, col)) {
                WALL
            } else {
                PATH
            };
            line.push(cell);
        }
        line.push('|');
        lines.push(line);
    }
    lines.push(border);

    lines.push(String::new());
    lines.push("Legend:".to_string());
    lines.push(format!("{WALL} - Wall/Obstacle"));
    lines.push(format!("{PATH} - Path/Walkable"));
    lines.push(format!("{SPRITE} - Sprite"));

    let arrows = Direction::DIRECTIONS
        .iter()
        .map(|dir| dir.arrow().to_string())
        .collect::<Vec<_>>()
        .join("/");
    lines.push(format!("{arrows} - Player (facing direction)"));

    lines.join("\n")
}
