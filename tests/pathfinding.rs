use pokegym::constants::{GAME_AREA_COLS, GAME_AREA_ROWS, GRID_COLS, GRID_ROWS, PLAYER_CELL};
use pokegym::emulator::engine::GameArea;
use pokegym::map::direction::Direction;
use pokegym::map::pathfinding::{NavigationGrid, PathOutcome};
use pokegym::map::sprites::SpriteSet;
use pokegym::map::terrain::TerrainGrid;
use pokegym::map::tileset::Tileset;
use pretty_assertions::assert_eq;
use speculoos::prelude::*;

fn open_grid() -> [[bool; GRID_COLS]; GRID_ROWS] {
    [[true; GRID_COLS]; GRID_ROWS]
}

fn grid_with_walls(walls: &[(usize, usize)]) -> NavigationGrid {
    let mut passable = open_grid();
    for &(row, col) in walls {
        passable[row][col] = false;
    }
    NavigationGrid::new(
        TerrainGrid::from_passability(&passable),
        SpriteSet::default(),
        [[0; GAME_AREA_COLS]; GAME_AREA_ROWS],
        None,
    )
}

/// Follows `moves` from the player's cell and returns every cell visited, start included.
fn walk(moves: &[Direction]) -> Vec<(i32, i32)> {
    let mut cell = (PLAYER_CELL.0 as i32, PLAYER_CELL.1 as i32);
    let mut visited = vec![cell];
    for direction in moves {
        cell = direction.step(cell);
        visited.push(cell);
    }
    visited
}

#[test]
fn test_path_to_own_cell_is_empty() {
    let result = grid_with_walls(&[]).find_path(4, 4);
    assert_eq!(result.outcome, PathOutcome::Reached);
    assert_that(&result.moves.is_empty()).is_true();
    assert_eq!(result.message(), "Success: Found path to target at (4, 4).");
}

#[test]
fn test_straight_path() {
    let result = grid_with_walls(&[]).find_path(4, 7);
    assert_eq!(result.outcome, PathOutcome::Reached);
    assert_eq!(result.moves, vec![Direction::Right; 3]);
}

#[test]
fn test_path_length_is_manhattan_on_open_grid() {
    let result = grid_with_walls(&[]).find_path(0, 0);
    assert_eq!(result.outcome, PathOutcome::Reached);
    assert_eq!(result.moves.len(), 8);
    assert_eq!(walk(&result.moves).last(), Some(&(0, 0)));
}

#[test]
fn test_out_of_bounds_targets() {
    let grid = grid_with_walls(&[]);
    for (row, col) in [(9, 0), (-1, 3), (0, 10), (100, -100)] {
        let result = grid.find_path(row, col);
        assert_eq!(result.outcome, PathOutcome::InvalidCoordinates);
        assert_that(&result.moves.is_empty()).is_true();
        assert_eq!(result.to_string(), "Invalid target coordinates");
    }
}

#[test]
fn test_adjacent_wall_target_takes_one_step() {
    let result = grid_with_walls(&[(4, 5)]).find_path(4, 5);
    assert_eq!(result.outcome, PathOutcome::AdjacentToWall);
    assert_eq!(result.moves, vec![Direction::Right]);
    assert_eq!(
        result.message(),
        "Success: Found path to position adjacent to wall at (4, 5)."
    );
}

#[test]
fn test_distant_wall_target_stops_next_to_it() {
    let result = grid_with_walls(&[(2, 4)]).find_path(2, 4);
    assert_eq!(result.outcome, PathOutcome::AdjacentToWall);
    assert_eq!(result.moves, vec![Direction::Up, Direction::Up]);
    assert_that(&result.outcome.is_partial()).is_true();
}

#[test]
fn test_walls_are_routed_around() {
    // A wall segment directly between the player and the target
    let result = grid_with_walls(&[(3, 4), (3, 3), (3, 5)]).find_path(2, 4);
    assert_eq!(result.outcome, PathOutcome::Reached);
    assert_eq!(result.moves.len(), 6);

    let visited = walk(&result.moves);
    assert_eq!(visited.last(), Some(&(2, 4)));
    for wall in [(3, 3), (3, 4), (3, 5)] {
        assert_that(&visited.contains(&wall)).is_false();
    }
}

#[test]
fn test_enclosed_target_gives_closest_reachable() {
    // (0, 0) is open but boxed in by walls on both sides
    let result = grid_with_walls(&[(0, 1), (1, 0), (1, 1)]).find_path(0, 0);
    assert_eq!(result.outcome, PathOutcome::ClosestReachable);
    assert_that(&result.outcome.is_success()).is_false();

    let end = *walk(&result.moves).last().unwrap();
    assert_eq!(end.0.abs() + end.1.abs(), 2);
    assert_eq!(
        result.message(),
        "Partial Success: Could not reach the exact target, but found a path to the closest reachable point."
    );
}

#[test]
fn test_boxed_in_player_is_unreachable() {
    let result = grid_with_walls(&[(3, 4), (5, 4), (4, 3), (4, 5)]).find_path(0, 0);
    assert_eq!(result.outcome, PathOutcome::Unreachable);
    assert_that(&result.moves.is_empty()).is_true();
    assert_that(&result.message().starts_with("Failure:")).is_true();
}

#[test]
fn test_sprites_block_intermediate_cells() {
    let mut grid = grid_with_walls(&[]);
    grid.sprites = SpriteSet::from_iter([(5, 4)]);

    let result = grid.find_path(4, 6);
    assert_eq!(result.outcome, PathOutcome::Reached);
    assert_eq!(result.moves.len(), 4);

    let visited = walk(&result.moves);
    assert_that(&visited.contains(&(4, 5))).is_false();
    assert_eq!(visited.last(), Some(&(4, 6)));
}

#[test]
fn test_sprite_target_is_reachable() {
    let mut grid = grid_with_walls(&[]);
    grid.sprites = SpriteSet::from_iter([(5, 4)]);

    let result = grid.find_path(4, 5);
    assert_eq!(result.outcome, PathOutcome::Reached);
    assert_eq!(result.moves, vec![Direction::Right]);
}

fn ledge_tiles() -> GameArea {
    let mut tiles = [[0; GAME_AREA_COLS]; GAME_AREA_ROWS];
    // Bottom-left tiles of cells (4, 4) and (4, 5)
    tiles[9][8] = 304;
    tiles[9][10] = 302;
    tiles
}

#[test]
fn test_tile_pairs_block_direct_step() {
    let mut grid = grid_with_walls(&[]);
    grid.tiles = ledge_tiles();
    grid.tileset = Some(Tileset::Forest);

    let result = grid.find_path(4, 5);
    assert_eq!(result.outcome, PathOutcome::Reached);
    assert_eq!(result.moves.len(), 3);
    assert_that(&(result.moves[0] != Direction::Right)).is_true();
}

#[test]
fn test_tile_pairs_need_a_matching_tileset() {
    let mut grid = grid_with_walls(&[]);
    grid.tiles = ledge_tiles();

    for tileset in [None, Some(Tileset::Overworld)] {
        grid.tileset = tileset;
        assert_eq!(grid.find_path(4, 5).moves, vec![Direction::Right]);
    }
}

#[test]
fn test_wall_target_path_ends_on_the_wall() {
    let result = grid_with_walls(&[(0, 0)]).find_path(0, 0);
    assert_eq!(result.outcome, PathOutcome::AdjacentToWall);
    assert_eq!(result.moves.len(), 8);

    let visited = walk(&result.moves);
    assert_eq!(visited.last(), Some(&(0, 0)));
    // Only the final step enters the wall
    assert_eq!(visited.iter().filter(|&&cell| cell == (0, 0)).count(), 1);
}

#[test]
fn test_enclosed_wall_target_gives_closest_reachable() {
    // The wall target sits behind a second row of walls
    let result = grid_with_walls(&[(0, 0), (0, 1), (1, 0), (1, 1), (0, 2), (2, 0)]).find_path(0, 0);
    assert_eq!(result.outcome, PathOutcome::ClosestReachable);

    let end = *walk(&result.moves).last().unwrap();
    assert_eq!(end.0 + end.1, 3);
}
