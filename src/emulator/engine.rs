//! The emulation engine collaborator.
//!
//! The bridge never emulates hardware itself. It drives an [`Engine`] implementation and only
//! relies on the surface described here: frame ticks, button edges, speed control, opaque
//! state (de)serialization, and read accessors for the screen, sprite table, game-area
//! buffers and memory.

use std::io::{Read, Write};
use std::path::PathBuf;

use image::RgbaImage;

use crate::constants::{GAME_AREA_COLS, GAME_AREA_ROWS};
use crate::error::EngineError;
use crate::input::Button;

/// Raw tile indices covering the visible game area, one per 8x8 tile.
pub type GameArea = [[u16; GAME_AREA_COLS]; GAME_AREA_ROWS];

/// Raw collision values covering the visible game area; zero means blocked.
pub type CollisionArea = [[u8; GAME_AREA_COLS]; GAME_AREA_ROWS];

/// How an engine instance should be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub rom_path: PathBuf,
    /// Run without opening a window.
    pub headless: bool,
    /// Enable audio output. Ignored when headless.
    pub sound: bool,
}

/// One entry of the hardware sprite table, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sprite {
    pub x: i32,
    pub y: i32,
    pub on_screen: bool,
}

/// A handheld emulation engine.
///
/// Implementations are assumed to be non-reentrant and possibly not safe to move between
/// threads once running, which is why the streaming worker constructs the instance on its
/// own thread via [`Engine::open`] and never hands it out.
pub trait Engine: Sized {
    /// Constructs an instance for the given ROM.
    fn open(options: &EngineOptions) -> Result<Self, EngineError>;

    /// Advances one frame. Returns `false` once the engine has nothing left to run.
    fn tick(&mut self) -> bool;

    fn button_press(&mut self, button: Button);

    fn button_release(&mut self, button: Button);

    /// Sets the playback speed multiplier; zero runs unthrottled.
    fn set_emulation_speed(&mut self, speed: u32);

    /// Writes the engine's internal state as an opaque blob.
    fn save_state(&mut self, sink: &mut dyn Write) -> Result<(), EngineError>;

    /// Restores internal state from a blob produced by [`Engine::save_state`].
    fn load_state(&mut self, source: &mut dyn Read) -> Result<(), EngineError>;

    /// A copy of the current screen.
    fn screen(&self) -> RgbaImage;

    /// The sprite table entry at `index`.
    fn sprite(&self, index: usize) -> Sprite;

    /// Tile indices of the visible game area.
    fn game_area(&self) -> GameArea;

    /// Collision values of the visible game area.
    fn game_area_collision(&self) -> CollisionArea;

    /// The background tilemap underneath the visible game area.
    fn background_tilemap(&self) -> GameArea;

    /// The full addressable memory.
    fn memory(&self) -> &[u8];

    /// Releases the instance. The default simply drops it.
    fn stop(self) {}
}
