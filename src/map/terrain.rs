//! The player-centred passability grid and the readings derived from it.

use pathfinding::matrix::Matrix;
use smallvec::SmallVec;

use crate::constants::{GAME_AREA_COLS, GAME_AREA_ROWS, GRID_COLS, GRID_ROWS, PLAYER_CELL};
use crate::emulator::engine::{CollisionArea, GameArea};
use crate::map::direction::Direction;

/// Valid moves from the player's cell, in reporting order.
pub type ValidMoves = SmallVec<[Direction; 4]>;

/// A 9x10 grid of passability values centred on the player.
///
/// Each cell reduces a 2x2 block of the raw 18x20 collision buffer. A cell is passable
/// when the block's mean is nonzero; since raw values are unsigned, the grid stores block
/// sums and compares them against zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerrainGrid {
    cells: Matrix<u16>,
}

impl TerrainGrid {
    /// Downsamples a raw collision buffer by 2x2 blocks.
    pub fn from_collision(area: &CollisionArea) -> Self {
        let mut cells = Matrix::new(GRID_ROWS, GRID_COLS, 0u16);
        for (row, line) in area.iter().enumerate().take(GAME_AREA_ROWS) {
            for (col, &value) in line.iter().enumerate().take(GAME_AREA_COLS) {
                cells[(row / 2, col / 2)] += u16::from(value);
            }
        }
        Self { cells }
    }

    /// Builds a grid directly from per-cell passability.
    pub fn from_passability(passable: &[[bool; GRID_COLS]; GRID_ROWS]) -> Self {
        let mut cells = Matrix::new(GRID_ROWS, GRID_COLS, 0u16);
        for (row, line) in passable.iter().enumerate() {
            for (col, &open) in line.iter().enumerate() {
                cells[(row, col)] = if open { 4 } else { 0 };
            }
        }
        Self { cells }
    }

    /// Whether `(row, col)` lies inside the grid.
    pub fn in_bounds(row: i32, col: i32) -> bool {
        (0..GRID_ROWS as i32).contains(&row) && (0..GRID_COLS as i32).contains(&col)
    }

    /// The averaged terrain value of a cell.
    pub fn mean(&self, (row, col): (usize, usize)) -> f32 {
        f32::from(self.cells[(row, col)]) / 4.0
    }

    pub fn is_passable(&self, cell: (usize, usize)) -> bool {
        self.cells[cell] != 0
    }

    pub fn is_wall(&self, cell: (usize, usize)) -> bool {
        !self.is_passable(cell)
    }

    /// Directions whose neighbouring cell is passable.
    ///
    /// Sprites are not considered here; they only matter to pathfinding.
    pub fn valid_moves(&self) -> ValidMoves {
        let center = (PLAYER_CELL.0 as i32, PLAYER_CELL.1 as i32);
        Direction::DIRECTIONS
            .into_iter()
            .filter(|dir| {
                let (row, col) = dir.step(center);
                Self::in_bounds(row, col) && self.is_passable((row as usize, col as usize))
            })
            .collect()
    }
}

/// Detects which way the player sprite faces by scanning for its 2x2 tile pattern.
///
/// Returns `None` when no known pattern is on screen (menus, transitions, battles).
pub fn facing_direction(area: &GameArea) -> Option<Direction> {
    for row in 0..GAME_AREA_ROWS - 1 {
        for col in 0..GAME_AREA_COLS - 1 {
            let block = [area[row][col], area[row][col + 1], area[row + 1][col], area[row + 1][col + 1]];
            let direction = match block {
                [0, 1, 2, 3] => Direction::Down,
                [4, 5, 6, 7] => Direction::Up,
                [9, 8, 11, 10] => Direction::Right,
                [8, 9, 10, 11] => Direction::Left,
                _ => continue,
            };
            return Some(direction);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_area() -> GameArea {
        [[0x180; GAME_AREA_COLS]; GAME_AREA_ROWS]
    }

    #[test]
    fn test_downsample_partial_block_is_passable() {
        let mut area: CollisionArea = [[0; GAME_AREA_COLS]; GAME_AREA_ROWS];
        area[3][5] = 1;

        let grid = TerrainGrid::from_collision(&area);
        assert!(grid.is_passable((1, 2)));
        assert_eq!(grid.mean((1, 2)), 0.25);
        assert!(grid.is_wall((0, 0)));
    }

    #[test]
    fn test_facing_direction_patterns() {
        let patterns = [
            ([0, 1, 2, 3], Direction::Down),
            ([4, 5, 6, 7], Direction::Up),
            ([9, 8, 11, 10], Direction::Right),
            ([8, 9, 10, 11], Direction::Left),
        ];

        for (tiles, expected) in patterns {
            let mut area = blank_area();
            area[8][8] = tiles[0];
            area[8][9] = tiles[1];
            area[9][8] = tiles[2];
            area[9][9] = tiles[3];
            assert_eq!(facing_direction(&area), Some(expected));
        }
    }

    #[test]
    fn test_facing_direction_missing() {
        assert_eq!(facing_direction(&blank_area()), None);
    }
}
