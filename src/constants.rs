//! This module contains all the constants shared by the emulator bridge.

use std::time::Duration;

/// The width of the handheld's screen, in pixels.
pub const SCREEN_WIDTH: u32 = 160;
/// The height of the handheld's screen, in pixels.
pub const SCREEN_HEIGHT: u32 = 144;

/// Rows in the raw game-area buffers (one entry per 8x8 tile).
pub const GAME_AREA_ROWS: usize = 18;
/// Columns in the raw game-area buffers (one entry per 8x8 tile).
pub const GAME_AREA_COLS: usize = 20;

/// Rows in the downsampled terrain grid (one cell per 16x16 walking tile).
pub const GRID_ROWS: usize = 9;
/// Columns in the downsampled terrain grid.
pub const GRID_COLS: usize = 10;

/// The player's cell in the terrain grid. The view scrolls around the player, so this never changes.
pub const PLAYER_CELL: (usize, usize) = (4, 4);

/// Number of entries in the hardware sprite table.
pub const SPRITE_COUNT: usize = 40;
/// Height of a single hardware sprite, in pixels.
pub const SPRITE_HEIGHT: i32 = 8;

/// Frames run at unthrottled speed right after the engine is constructed.
pub const WARMUP_TICKS: u32 = 60;
/// Default number of frames a button is held down.
pub const DEFAULT_HOLD_FRAMES: u32 = 10;
/// Frames waited after a button release when further input is expected to matter.
pub const LONG_WAIT_FRAMES: u32 = 120;
/// Frames waited between button presses otherwise.
pub const SHORT_WAIT_FRAMES: u32 = 10;

/// Maximum number of step records kept by a game session.
pub const HISTORY_CAPACITY: usize = 1024;

/// Lock priority for shutdown and state loads. Lower numbers are serviced first.
pub const PRIORITY_URGENT: u32 = 1;
/// Lock priority for routine caller commands.
pub const PRIORITY_ROUTINE: u32 = 5;
/// Lock priority used by the worker's own loop.
pub const PRIORITY_WORKER: u32 = 10;

/// Upper bound on how long `start` waits for the worker to finish warming up.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on how long `stop` waits for the worker thread to exit.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on the "queue clear" wait that precedes a read.
pub const DEFAULT_QUEUE_CLEAR_TIMEOUT: Duration = Duration::from_secs(1);
/// Pause after the queue clears and before a read, letting the frame settle.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Names the game uses before the player or rival has been named.
pub const PLACEHOLDER_PLAYER_NAME: &str = "NINTEN";
pub const PLACEHOLDER_RIVAL_NAME: &str = "SONY";
/// Reported in place of a placeholder name.
pub const UNSET_NAME: &str = "Not yet set";
