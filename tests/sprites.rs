mod common;

use common::{emulator, fast_config, rom};
use pokegym::emulator::engine::Sprite;
use pokegym::map::sprites::SpriteSet;
use pokegym::Button;
use pretty_assertions::assert_eq;
use speculoos::prelude::*;

fn character(col: i32, row: i32) -> Vec<Sprite> {
    let (x, y) = (col * 16, row * 16);
    [(0, 0), (8, 0), (0, 8), (8, 8)]
        .into_iter()
        .map(|(dx, dy)| Sprite {
            x: x + dx,
            y: y + dy,
            on_screen: true,
        })
        .collect()
}

#[test]
fn test_characters_map_to_their_cells() {
    let mut table = character(5, 0);
    table.extend(character(2, 7));
    table.extend(character(9, 8));

    let set = SpriteSet::from_sprites(&table);
    assert_eq!(set.len(), 3);
    for (col, row) in [(5, 0), (2, 7), (9, 8)] {
        assert_that(&set.contains(col, row)).is_true();
    }
}

#[test]
fn test_characters_side_by_side() {
    let mut table = character(3, 2);
    table.extend(character(4, 2));

    let set = SpriteSet::from_sprites(&table);
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![(3, 2), (4, 2)]);
}

#[test]
fn test_empty_table() {
    let table = vec![Sprite::default(); 40];
    assert_that(&SpriteSet::from_sprites(&table).is_empty()).is_true();
}

#[test]
fn test_emulator_reports_standing_character() {
    let emulator = emulator(fast_config(rom("sprites"), false));
    emulator.initialize().unwrap();

    let sprites = emulator.sprites().unwrap();
    assert_eq!(sprites.iter().collect::<Vec<_>>(), vec![(5, 0)]);

    // Walking right scrolls the character one column left
    emulator.press_buttons(&[Button::Right], false).unwrap();
    let sprites = emulator.sprites().unwrap();
    assert_eq!(sprites.iter().collect::<Vec<_>>(), vec![(4, 0)]);
}
