//! Tilesets and the tile-pair rules that block movement between otherwise walkable tiles.

use phf::phf_map;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, FromRepr};

/// The graphics tileset a map is drawn with, as stored in game memory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, FromRepr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Tileset {
    Overworld = 0,
    #[strum(serialize = "REDS_HOUSE_1")]
    #[serde(rename = "REDS_HOUSE_1")]
    RedsHouse1,
    Mart,
    Forest,
    #[strum(serialize = "REDS_HOUSE_2")]
    #[serde(rename = "REDS_HOUSE_2")]
    RedsHouse2,
    Dojo,
    Pokecenter,
    Gym,
    House,
    ForestGate,
    Museum,
    Underground,
    Gate,
    Ship,
    ShipPort,
    Cemetery,
    Interior,
    Cavern,
    Lobby,
    Mansion,
    Lab,
    Club,
    Facility,
    Plateau,
}

impl Tileset {
    /// Looks up a tileset by its in-memory identifier.
    pub fn from_id(id: u8) -> Option<Tileset> {
        Tileset::from_repr(id)
    }
}

/// Tile pairs that cannot be crossed, keyed by tileset name. Land and water pairs share one table.
///
/// These are ledges and shorelines that look flat on the passability grid.
static TILE_PAIR_COLLISIONS: phf::Map<&'static str, &'static [(u16, u16)]> = phf_map! {
    "CAVERN" => &[(288, 261), (321, 261), (298, 261), (261, 289), (276, 261)],
    "FOREST" => &[
        (304, 302),
        (338, 302),
        (341, 302),
        (342, 302),
        (288, 302),
        (350, 302),
        (351, 302),
        (276, 302),
        (328, 302),
    ],
};

/// Whether the player may step between two adjacent background tiles.
///
/// The check is symmetric: a pair listed in either order blocks movement both ways.
pub fn can_move_between_tiles(from: u16, to: u16, tileset: Tileset) -> bool {
    let Some(pairs) = TILE_PAIR_COLLISIONS.get(tileset.as_ref()) else {
        return true;
    };

    !pairs
        .iter()
        .any(|&(a, b)| (from == a && to == b) || (from == b && to == a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tileset_from_id() {
        assert_eq!(Tileset::from_id(0), Some(Tileset::Overworld));
        assert_eq!(Tileset::from_id(3), Some(Tileset::Forest));
        assert_eq!(Tileset::from_id(17), Some(Tileset::Cavern));
        assert_eq!(Tileset::from_id(24), None);
    }

    #[test]
    fn test_tileset_names() {
        assert_eq!(Tileset::Cavern.as_ref(), "CAVERN");
        assert_eq!(Tileset::RedsHouse1.as_ref(), "REDS_HOUSE_1");
        assert_eq!(Tileset::ShipPort.to_string(), "SHIP_PORT");
    }

    #[test]
    fn test_tile_pairs_block_both_ways() {
        assert!(!can_move_between_tiles(304, 302, Tileset::Forest));
        assert!(!can_move_between_tiles(302, 304, Tileset::Forest));
        assert!(!can_move_between_tiles(261, 289, Tileset::Cavern));
        assert!(!can_move_between_tiles(289, 261, Tileset::Cavern));
    }

    #[test]
    fn test_tile_pairs_are_tileset_specific() {
        assert!(can_move_between_tiles(304, 302, Tileset::Cavern));
        assert!(can_move_between_tiles(304, 302, Tileset::Overworld));
        assert!(can_move_between_tiles(1, 2, Tileset::Forest));
    }
}
