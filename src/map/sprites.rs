//! Grid cells occupied by non-player sprites.

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{GRID_COLS, GRID_ROWS, SCREEN_HEIGHT, SCREEN_WIDTH, SPRITE_HEIGHT};
use crate::emulator::engine::Sprite;

/// `(column, row)` cells of the terrain grid that hold a standing sprite.
///
/// Characters are drawn as a stack of 8-pixel hardware sprites. Only stacks are counted:
/// when two sprite rows sit exactly one sprite height apart, each column present in both
/// rows contributes the cell of the lower sprite, so a tall character occupies one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpriteSet {
    cells: BTreeSet<(i32, i32)>,
}

impl SpriteSet {
    /// Derives the occupied cells from a sprite table. Entries that are not on screen are ignored.
    pub fn from_sprites(sprites: &[Sprite]) -> Self {
        // Screen y -> grid column -> grid row
        let mut by_y: BTreeMap<i32, BTreeMap<i32, i32>> = BTreeMap::new();
        for sprite in sprites.iter().filter(|s| s.on_screen) {
            let (col, row) = grid_cell(sprite);
            by_y.entry(sprite.y).or_default().insert(col, row);
        }

        let rows: Vec<(&i32, &BTreeMap<i32, i32>)> = by_y.iter().collect();
        let mut cells = BTreeSet::new();
        for pair in rows.windows(2) {
            let [(top_y, top), (bottom_y, bottom)] = pair else {
                continue;
            };
            if **bottom_y - **top_y != SPRITE_HEIGHT {
                continue;
            }
            for (col, row) in bottom.iter() {
                if top.contains_key(col) {
                    cells.insert((*col, *row));
                }
            }
        }

        Self { cells }
    }

    /// Whether `(col, row)` is occupied.
    pub fn contains(&self, col: i32, row: i32) -> bool {
        self.cells.contains(&(col, row))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.cells.iter().copied()
    }
}

impl FromIterator<(i32, i32)> for SpriteSet {
    fn from_iter<I: IntoIterator<Item = (i32, i32)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Maps a sprite's pixel position onto the terrain grid, truncating toward zero.
fn grid_cell(sprite: &Sprite) -> (i32, i32) {
    let col = (f64::from(sprite.x) / f64::from(SCREEN_WIDTH) * GRID_COLS as f64) as i32;
    let row = (f64::from(sprite.y) / f64::from(SCREEN_HEIGHT) * GRID_ROWS as f64) as i32;
    (col, row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(x: i32, y: i32) -> Sprite {
        Sprite { x, y, on_screen: true }
    }

    #[test]
    fn test_stacked_sprites_count_once() {
        let set = SpriteSet::from_sprites(&[sprite(96, 32), sprite(104, 32), sprite(96, 40), sprite(104, 40)]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![(6, 2)]);
    }

    #[test]
    fn test_lone_sprite_is_ignored() {
        let set = SpriteSet::from_sprites(&[sprite(96, 32)]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_off_screen_sprites_are_ignored() {
        let hidden = Sprite {
            x: 96,
            y: 40,
            on_screen: false,
        };
        let set = SpriteSet::from_sprites(&[sprite(96, 32), hidden]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_rows_further_apart_do_not_merge() {
        let set = SpriteSet::from_sprites(&[sprite(96, 32), sprite(96, 48)]);
        assert!(set.is_empty());
    }
}
