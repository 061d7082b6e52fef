use glam::IVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A cardinal movement direction on the terrain grid.
///
/// Grid coordinates are `(row, column)`; as a vector, `x` is the column and `y` is the row,
/// so `Up` decreases the row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Order in which valid moves are reported.
    pub const DIRECTIONS: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn as_ivec2(&self) -> IVec2 {
        (*self).into()
    }

    /// Applies this direction to a `(row, col)` cell, without bounds checking.
    pub fn step(&self, (row, col): (i32, i32)) -> (i32, i32) {
        let offset = self.as_ivec2();
        (row + offset.y, col + offset.x)
    }

    /// The direction that moves from `from` to an orthogonally adjacent `to`.
    ///
    /// Rows are compared first, mirroring how paths are reconstructed.
    pub fn between(from: (usize, usize), to: (usize, usize)) -> Direction {
        if to.0 > from.0 {
            Direction::Down
        } else if to.0 < from.0 {
            Direction::Up
        } else if to.1 > from.1 {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    /// Arrow used for the player on the collision map.
    pub fn arrow(&self) -> char {
        match self {
            Direction::Up => '↑',
            Direction::Down => '↓',
            Direction::Left => '←',
            Direction::Right => '→',
        }
    }
}

impl From<Direction> for IVec2 {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Up => -IVec2::Y,
            Direction::Down => IVec2::Y,
            Direction::Left => -IVec2::X,
            Direction::Right => IVec2::X,
        }
    }
}
