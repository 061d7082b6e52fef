//! A* navigation over the terrain grid.

use std::fmt;

use ::pathfinding::prelude::{astar, bfs, bfs_reach};
use serde::Serialize;
use smallvec::SmallVec;
use strum_macros::AsRefStr;
use tracing::{debug, trace};

use crate::constants::PLAYER_CELL;
use crate::emulator::engine::GameArea;
use crate::map::direction::Direction;
use crate::map::sprites::SpriteSet;
use crate::map::terrain::TerrainGrid;
use crate::map::tileset::{can_move_between_tiles, Tileset};

type Cell = (usize, usize);

/// How a path search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PathOutcome {
    /// The target was reached over walkable cells.
    Reached,
    /// The target itself is a wall; the path ends on it.
    WallTarget,
    /// The path ends next to a wall target, with a final step onto it.
    AdjacentToWall,
    /// The target is unreachable; the path leads to the closest reachable cell.
    ClosestReachable,
    /// Nothing closer than the player's own cell is reachable.
    Unreachable,
    /// The target lies outside the grid. No search was performed.
    InvalidCoordinates,
}

impl PathOutcome {
    pub fn is_success(self) -> bool {
        self == PathOutcome::Reached
    }

    /// Outcomes that still produce a usable path toward the target.
    pub fn is_partial(self) -> bool {
        matches!(
            self,
            PathOutcome::WallTarget | PathOutcome::AdjacentToWall | PathOutcome::ClosestReachable
        )
    }
}

/// The result of [`NavigationGrid::find_path`]: an outcome plus the moves to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathResult {
    pub outcome: PathOutcome,
    pub moves: Vec<Direction>,
    #[serde(skip)]
    target: (i32, i32),
}

impl PathResult {
    fn new(outcome: PathOutcome, moves: Vec<Direction>, target: (i32, i32)) -> Self {
        Self { outcome, moves, target }
    }

    /// The result for a target outside the grid.
    pub fn invalid_coordinates(row: i32, col: i32) -> Self {
        Self::new(PathOutcome::InvalidCoordinates, Vec::new(), (row, col))
    }

    /// A caller-facing status line describing the outcome.
    pub fn message(&self) -> String {
        let (row, col) = self.target;
        match self.outcome {
            PathOutcome::Reached => format!("Success: Found path to target at ({row}, {col})."),
            PathOutcome::WallTarget => "Partial Success: Your target location is a wall. In case this is intentional, attempting to navigate there.".to_string(),
            PathOutcome::AdjacentToWall => {
                format!("Success: Found path to position adjacent to wall at ({row}, {col}).")
            }
            PathOutcome::ClosestReachable => "Partial Success: Could not reach the exact target, but found a path to the closest reachable point.".to_string(),
            PathOutcome::Unreachable => "Failure: No path is visible to the chosen location. You may need to explore a totally different path to get where you're trying to go.".to_string(),
            PathOutcome::InvalidCoordinates => "Invalid target coordinates".to_string(),
        }
    }
}

impl fmt::Display for PathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Everything a path search needs, captured from a single frame.
#[derive(Debug, Clone)]
pub struct NavigationGrid {
    pub terrain: TerrainGrid,
    pub sprites: SpriteSet,
    /// Background tile indices, used for tile-pair rules.
    pub tiles: GameArea,
    /// The active tileset; `None` disables tile-pair rules.
    pub tileset: Option<Tileset>,
}

impl NavigationGrid {
    pub fn new(terrain: TerrainGrid, sprites: SpriteSet, tiles: GameArea, tileset: Option<Tileset>) -> Self {
        Self {
            terrain,
            sprites,
            tiles,
            tileset,
        }
    }

    /// Searches for moves from the player's cell to `(row, col)`.
    ///
    /// Walls and sprites block movement except on the target itself. A wall target is
    /// considered reached as soon as the search stands next to it. When the target cannot
    /// be reached, the path leads to the reachable cell closest to it instead.
    pub fn find_path(&self, row: i32, col: i32) -> PathResult {
        let target_coords = (row, col);
        if !TerrainGrid::in_bounds(row, col) {
            return PathResult::invalid_coordinates(row, col);
        }

        let start: Cell = PLAYER_CELL;
        let target: Cell = (row as usize, col as usize);
        let target_is_wall = self.terrain.is_wall(target);

        // A wall target is never entered by the search; the final step onto it is appended.
        let successors = |&cell: &Cell| -> SmallVec<[Cell; 4]> {
            Direction::DIRECTIONS
                .into_iter()
                .filter_map(|direction| self.neighbor(cell, direction, target))
                .filter(|&next| !(target_is_wall && next == target))
                .collect()
        };

        let found = astar(
            &start,
            |cell| successors(cell).into_iter().map(|next| (next, 1usize)),
            |&cell| manhattan(cell, target),
            |&cell| cell == target || (target_is_wall && manhattan(cell, target) == 1),
        );

        if let Some((cells, _)) = found {
            let mut moves = moves_along(&cells);
            let last = cells.last().copied().unwrap_or(start);
            let outcome = if last == target {
                if target_is_wall {
                    PathOutcome::WallTarget
                } else {
                    PathOutcome::Reached
                }
            } else {
                moves.push(Direction::between(last, target));
                PathOutcome::AdjacentToWall
            };
            trace!(?outcome, steps = moves.len(), "Path search finished");
            return PathResult::new(outcome, moves, target_coords);
        }

        // Ties keep the cell reached first, so the player's own cell wins over equally distant ones.
        let closest = bfs_reach(start, successors)
            .min_by_key(|&cell| manhattan(cell, target))
            .unwrap_or(start);
        if closest != start {
            if let Some(cells) = bfs(&start, successors, |&cell| cell == closest) {
                let moves = moves_along(&cells);
                debug!(?closest, steps = moves.len(), "Target unreachable, using closest cell");
                return PathResult::new(PathOutcome::ClosestReachable, moves, target_coords);
            }
        }

        PathResult::new(PathOutcome::Unreachable, Vec::new(), target_coords)
    }

    /// The cell one step from `current`, if moving there is allowed.
    fn neighbor(&self, current: Cell, direction: Direction, target: Cell) -> Option<Cell> {
        let (row, col) = direction.step((current.0 as i32, current.1 as i32));
        if !TerrainGrid::in_bounds(row, col) {
            return None;
        }
        let next = (row as usize, col as usize);

        let blocked = self.terrain.is_wall(next) || self.sprites.contains(col, row);
        if blocked && next != target {
            return None;
        }

        if let Some(tileset) = self.tileset {
            if !can_move_between_tiles(self.tile_at(current), self.tile_at(next), tileset) {
                return None;
            }
        }

        Some(next)
    }

    /// The bottom-left background tile of a cell's 2x2 block.
    fn tile_at(&self, (row, col): Cell) -> u16 {
        self.tiles[row * 2 + 1][col * 2]
    }
}

fn manhattan(a: Cell, b: Cell) -> usize {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

/// The moves that walk a path of adjacent cells, start included.
fn moves_along(cells: &[Cell]) -> Vec<Direction> {
    cells.windows(2).map(|pair| Direction::between(pair[0], pair[1])).collect()
}
