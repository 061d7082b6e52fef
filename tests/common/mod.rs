#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use image::{Rgba, RgbaImage};
use pokegym::config::EmulatorConfig;
use pokegym::constants::{GAME_AREA_COLS, GAME_AREA_ROWS, GRID_COLS, GRID_ROWS, SCREEN_HEIGHT, SCREEN_WIDTH};
use pokegym::emulator::engine::{CollisionArea, Engine, EngineOptions, GameArea, Sprite};
use pokegym::error::{DecodeError, EngineError};
use pokegym::game::state::{Hp, MemoryFacts, MemoryReader, Pokemon, PokemonMove};
use pokegym::map::direction::Direction;
use pokegym::map::tileset::Tileset;
use pokegym::{Button, Emulator};
use serde::{Deserialize, Serialize};

pub const PLAYER_Y_ADDR: usize = 0xD361;
pub const PLAYER_X_ADDR: usize = 0xD362;
pub const MAP_ID_ADDR: usize = 0xD35E;
pub const TILESET_ADDR: usize = 0xD367;
const MEMORY_SIZE: usize = 0x10000;

/// `#` wall, `.` floor, `N` a standing character, `P` the player's start.
pub const WORLD: [&str; 20] = [
    "####################",
    "#..................#",
    "#..................#",
    "#.....#####........#",
    "#..................#",
    "#..................#",
    "#..........N.......#",
    "#..................#",
    "#..................#",
    "#..................#",
    "#.........P........#",
    "#..................#",
    "#.......#..........#",
    "#..................#",
    "#..................#",
    "#..................#",
    "#..................#",
    "#..................#",
    "#..................#",
    "####################",
];

pub const START: (usize, usize) = (10, 10);

/// Filler for background tiles the player sprite never uses.
const FLOOR_TILE: u16 = 0x180;

static LIVE: LazyLock<Mutex<HashMap<PathBuf, usize>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// Number of engines currently open for `rom`.
pub fn live_instances(rom: impl AsRef<Path>) -> usize {
    LIVE.lock().unwrap().get(rom.as_ref()).copied().unwrap_or(0)
}

/// A rom name unique to the calling test, so instance counts do not collide.
pub fn rom(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.gb"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    row: usize,
    col: usize,
    facing: Direction,
    frame: u64,
}

/// A deterministic stand-in engine: a small grid world with a movable player.
///
/// Rom names select behaviour: `missing` fails to open, `slow` takes 300ms to open,
/// `faulty` panics when Select is pressed, `blind` panics reading the screen once Start
/// has been pressed, `ending` stops after 200 frames.
pub struct GridEngine {
    rom: PathBuf,
    walls: Vec<Vec<bool>>,
    npcs: Vec<(usize, usize)>,
    tiles: HashMap<(usize, usize), u16>,
    row: usize,
    col: usize,
    facing: Direction,
    frame: u64,
    speed: u32,
    max_frames: Option<u64>,
    faulty: bool,
    blind: bool,
    blinded: bool,
    memory: Vec<u8>,
}

impl GridEngine {
    fn world_cell(&self, grid_row: usize, grid_col: usize) -> Option<(usize, usize)> {
        let row = (self.row + grid_row).checked_sub(4)?;
        let col = (self.col + grid_col).checked_sub(4)?;
        (row < self.walls.len() && col < self.walls[row].len()).then_some((row, col))
    }

    fn passable(&self, (row, col): (usize, usize)) -> bool {
        !self.walls[row][col] && !self.npcs.contains(&(row, col))
    }

    fn sync_memory(&mut self) {
        self.memory[PLAYER_Y_ADDR] = self.row as u8;
        self.memory[PLAYER_X_ADDR] = self.col as u8;
    }

    fn try_move(&mut self, direction: Direction) {
        self.facing = direction;
        let (row, col) = direction.step((self.row as i32, self.col as i32));
        let target = (row as usize, col as usize);
        if self.passable(target) {
            self.row = target.0;
            self.col = target.1;
            self.sync_memory();
        }
    }
}

impl Engine for GridEngine {
    fn open(options: &EngineOptions) -> Result<Self, EngineError> {
        let name = options.rom_path.to_string_lossy().to_string();
        if name.contains("missing") {
            return Err(EngineError::RomLoad {
                path: options.rom_path.clone(),
                reason: "missing rom".to_string(),
            });
        }
        if name.contains("slow") {
            thread::sleep(Duration::from_millis(300));
        }

        let mut walls = Vec::new();
        let mut npcs = Vec::new();
        for (row, line) in WORLD.iter().enumerate() {
            walls.push(line.chars().map(|c| c == '#').collect());
            for (col, c) in line.chars().enumerate() {
                if c == 'N' {
                    npcs.push((row, col));
                }
            }
        }

        let mut memory = vec![0; MEMORY_SIZE];
        memory[MAP_ID_ADDR] = 0;
        memory[TILESET_ADDR] = if name.contains("forest") { Tileset::Forest as u8 } else { Tileset::Overworld as u8 };

        let mut engine = Self {
            rom: options.rom_path.clone(),
            walls,
            npcs,
            tiles: HashMap::new(),
            row: START.0,
            col: START.1,
            facing: Direction::Down,
            frame: 0,
            speed: 1,
            max_frames: name.contains("ending").then_some(200),
            faulty: name.contains("faulty"),
            blind: name.contains("blind"),
            blinded: false,
            memory,
        };
        engine.sync_memory();
        if name.contains("forest") {
            // A ledge between the player's cell and the one to its right.
            engine.tiles.insert((START.0, START.1), 304);
            engine.tiles.insert((START.0, START.1 + 1), 302);
        }

        *LIVE.lock().unwrap().entry(engine.rom.clone()).or_default() += 1;
        Ok(engine)
    }

    fn tick(&mut self) -> bool {
        self.frame += 1;
        if self.speed > 0 {
            thread::sleep(Duration::from_micros(20));
        }
        self.max_frames.is_none_or(|max| self.frame < max)
    }

    fn button_press(&mut self, button: Button) {
        if button == Button::Select && self.faulty {
            panic!("select is wired to nothing");
        }
        if button == Button::Start && self.blind {
            self.blinded = true;
        }
    }

    fn button_release(&mut self, button: Button) {
        if let Some(direction) = button.direction() {
            self.try_move(direction);
        }
    }

    fn set_emulation_speed(&mut self, speed: u32) {
        self.speed = speed;
    }

    fn save_state(&mut self, sink: &mut dyn Write) -> Result<(), EngineError> {
        let snapshot = Snapshot {
            row: self.row,
            col: self.col,
            facing: self.facing,
            frame: self.frame,
        };
        let bytes = serde_json::to_vec(&snapshot).map_err(|err| EngineError::InvalidState(err.to_string()))?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    fn load_state(&mut self, source: &mut dyn Read) -> Result<(), EngineError> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|err| EngineError::InvalidState(err.to_string()))?;
        self.row = snapshot.row;
        self.col = snapshot.col;
        self.facing = snapshot.facing;
        self.sync_memory();
        Ok(())
    }

    fn screen(&self) -> RgbaImage {
        if self.blinded {
            panic!("screen buffer unmapped");
        }
        let marker = Rgba([self.row as u8, self.col as u8, self.facing as u8, 255]);
        RgbaImage::from_pixel(SCREEN_WIDTH, SCREEN_HEIGHT, marker)
    }

    fn sprite(&self, index: usize) -> Sprite {
        let mut sprites = Vec::new();
        for grid_row in 0..GRID_ROWS {
            for grid_col in 0..GRID_COLS {
                let Some(cell) = self.world_cell(grid_row, grid_col) else {
                    continue;
                };
                if !self.npcs.contains(&cell) {
                    continue;
                }
                let (x, y) = (grid_col as i32 * 16, grid_row as i32 * 16);
                for (dy, dx) in [(0, 0), (0, 8), (8, 0), (8, 8)] {
                    sprites.push(Sprite {
                        x: x + dx,
                        y: y + dy,
                        on_screen: true,
                    });
                }
            }
        }
        sprites.get(index).copied().unwrap_or_default()
    }

    fn game_area(&self) -> GameArea {
        let mut area = [[FLOOR_TILE; GAME_AREA_COLS]; GAME_AREA_ROWS];
        let tiles = match self.facing {
            Direction::Down => [0, 1, 2, 3],
            Direction::Up => [4, 5, 6, 7],
            Direction::Right => [9, 8, 11, 10],
            Direction::Left => [8, 9, 10, 11],
        };
        area[8][8] = tiles[0];
        area[8][9] = tiles[1];
        area[9][8] = tiles[2];
        area[9][9] = tiles[3];
        area
    }

    fn game_area_collision(&self) -> CollisionArea {
        let mut area = [[0; GAME_AREA_COLS]; GAME_AREA_ROWS];
        for (row, line) in area.iter_mut().enumerate() {
            for (col, value) in line.iter_mut().enumerate() {
                let open = self
                    .world_cell(row / 2, col / 2)
                    .is_some_and(|(r, c)| !self.walls[r][c]);
                *value = u8::from(open);
            }
        }
        area
    }

    fn background_tilemap(&self) -> GameArea {
        let mut area = [[FLOOR_TILE; GAME_AREA_COLS]; GAME_AREA_ROWS];
        for grid_row in 0..GRID_ROWS {
            for grid_col in 0..GRID_COLS {
                if let Some(tile) = self.world_cell(grid_row, grid_col).and_then(|cell| self.tiles.get(&cell)) {
                    area[grid_row * 2 + 1][grid_col * 2] = *tile;
                }
            }
        }
        area
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }
}

impl Drop for GridEngine {
    fn drop(&mut self) {
        if let Some(count) = LIVE.lock().unwrap().get_mut(&self.rom) {
            *count -= 1;
        }
    }
}

/// Decodes the few addresses [`GridEngine`] maintains.
pub struct GridReader;

impl MemoryReader for GridReader {
    fn read(&self, memory: &[u8]) -> Result<MemoryFacts, DecodeError> {
        let byte = |addr: usize| memory.get(addr).copied().ok_or(DecodeError::AddressOutOfRange(addr));
        let location = match byte(MAP_ID_ADDR)? {
            0 => "PALLET TOWN".to_string(),
            value => return Err(DecodeError::InvalidValue { field: "map", value }),
        };

        Ok(MemoryFacts {
            player_name: "RED".to_string(),
            rival_name: "SONY".to_string(),
            money: 3000,
            location,
            coordinates: (byte(PLAYER_X_ADDR)?, byte(PLAYER_Y_ADDR)?),
            badges: vec![],
            items: vec![("POTION".to_string(), 1)],
            dialog: None,
            tileset: Tileset::from_id(byte(TILESET_ADDR)?),
            party: vec![Pokemon {
                nickname: "SQUIRTLE".to_string(),
                species: "SQUIRTLE".to_string(),
                level: 5,
                hp: Hp { current: 19, max: 19 },
                types: vec!["WATER".to_string()],
                moves: vec![
                    PokemonMove {
                        name: "TACKLE".to_string(),
                        pp: 35,
                    },
                    PokemonMove {
                        name: "TAIL WHIP".to_string(),
                        pp: 30,
                    },
                ],
                status: None,
            }],
        })
    }
}

/// A config with short timeouts and no settle delay.
pub fn fast_config(rom: impl Into<PathBuf>, streaming: bool) -> EmulatorConfig {
    let mut config = EmulatorConfig::new(rom).streaming(streaming);
    config.startup_timeout_ms = 5_000;
    config.stop_timeout_ms = 2_000;
    config.queue_clear_timeout_ms = 200;
    config.settle_delay_ms = 1;
    config.hold_frames = 2;
    config.long_wait_frames = 4;
    config.short_wait_frames = 1;
    config
}

pub fn emulator(config: EmulatorConfig) -> Emulator<GridEngine> {
    Emulator::new(config, Arc::new(GridReader))
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A scratch directory removed on drop.
pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub fn new(name: &str) -> Self {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let path = std::env::temp_dir().join(format!("pokegym-{name}-{}-{nanos}", std::process::id()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
