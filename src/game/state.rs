//! Game-state snapshots handed back to callers after every action.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::constants::{PLACEHOLDER_PLAYER_NAME, PLACEHOLDER_RIVAL_NAME, UNSET_NAME};
use crate::emulator::frame::Frame;
use crate::error::{DecodeError, PokegymResult};
use crate::map::direction::Direction;
use crate::map::tileset::Tileset;

/// Facts decoded from raw game memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFacts {
    pub player_name: String,
    pub rival_name: String,
    pub money: u32,
    pub location: String,
    pub coordinates: (u8, u8),
    pub badges: Vec<String>,
    pub items: Vec<(String, u8)>,
    pub dialog: Option<String>,
    pub tileset: Option<Tileset>,
    pub party: Vec<Pokemon>,
}

/// Decodes game memory into [`MemoryFacts`].
///
/// Byte-level layouts belong to the implementation; the bridge only needs the decoded facts.
pub trait MemoryReader: Send + Sync {
    fn read(&self, memory: &[u8]) -> Result<MemoryFacts, DecodeError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hp {
    pub current: u16,
    pub max: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonMove {
    pub name: String,
    pub pp: u8,
}

/// One member of the player's party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    pub nickname: String,
    pub species: String,
    pub level: u8,
    pub hp: Hp,
    pub types: Vec<String>,
    pub moves: Vec<PokemonMove>,
    /// `None` when healthy.
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    pub name: String,
    pub rival_name: String,
    pub money: u32,
    pub location: String,
    pub coordinates: (u8, u8),
    pub badges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryItem {
    pub item: String,
    pub quantity: u8,
}

/// Structured facts for one instant: decoded memory plus the derived valid moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub player: PlayerInfo,
    pub valid_moves: Vec<Direction>,
    pub inventory: Vec<InventoryItem>,
    pub dialog: Option<String>,
    pub pokemons: Vec<Pokemon>,
}

impl MemoryInfo {
    /// Combines decoded facts with the valid moves of the same frame.
    pub fn new(facts: MemoryFacts, valid_moves: Vec<Direction>) -> Self {
        Self {
            player: PlayerInfo {
                name: display_name(facts.player_name, PLACEHOLDER_PLAYER_NAME),
                rival_name: display_name(facts.rival_name, PLACEHOLDER_RIVAL_NAME),
                money: facts.money,
                location: facts.location,
                coordinates: facts.coordinates,
                badges: facts.badges,
            },
            valid_moves,
            inventory: facts
                .items
                .into_iter()
                .map(|(item, quantity)| InventoryItem { item, quantity })
                .collect(),
            dialog: facts.dialog.filter(|text| !text.is_empty()),
            pokemons: facts.party,
        }
    }
}

fn display_name(name: String, placeholder: &str) -> String {
    if name == placeholder {
        UNSET_NAME.to_string()
    } else {
        name
    }
}

/// An immutable snapshot returned after every action.
#[derive(Debug, Clone)]
pub struct GameState {
    memory: MemoryInfo,
    screenshot: RgbaImage,
    frame: u64,
}

impl GameState {
    /// Assembles a state where every field comes from the same frame.
    pub fn from_frame(frame: &Frame, reader: &dyn MemoryReader) -> PokegymResult<Self> {
        let facts = reader.read(&frame.memory)?;
        Ok(Self {
            memory: MemoryInfo::new(facts, frame.valid_moves().into_vec()),
            screenshot: frame.screen.clone(),
            frame: frame.number,
        })
    }

    pub fn memory_info(&self) -> &MemoryInfo {
        &self.memory
    }

    pub fn player(&self) -> &PlayerInfo {
        &self.memory.player
    }

    pub fn location(&self) -> &str {
        &self.memory.player.location
    }

    pub fn coordinates(&self) -> (u8, u8) {
        self.memory.player.coordinates
    }

    pub fn party(&self) -> &[Pokemon] {
        &self.memory.pokemons
    }

    pub fn valid_moves(&self) -> &[Direction] {
        &self.memory.valid_moves
    }

    pub fn screenshot(&self) -> &RgbaImage {
        &self.screenshot
    }

    /// Engine frame number the snapshot was taken at.
    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    /// Encodes the screenshot as PNG, scaled up by an integer factor with nearest-neighbour sampling.
    pub fn screenshot_png(&self, upscale: u32) -> PokegymResult<Vec<u8>> {
        let image = if upscale > 1 {
            image::imageops::resize(
                &self.screenshot,
                self.screenshot.width() * upscale,
                self.screenshot.height() * upscale,
                FilterType::Nearest,
            )
        } else {
            self.screenshot.clone()
        };

        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        Ok(bytes.into_inner())
    }
}

impl PartialEq for GameState {
    /// Snapshots compare by their decoded facts; screens are not compared pixel by pixel.
    fn eq(&self, other: &Self) -> bool {
        self.memory == other.memory
    }
}
