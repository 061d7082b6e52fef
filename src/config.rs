use std::path::PathBuf;
use std::time::Duration;

use figment::{providers::Env, Figment};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_HOLD_FRAMES, DEFAULT_QUEUE_CLEAR_TIMEOUT, DEFAULT_SETTLE_DELAY, DEFAULT_STARTUP_TIMEOUT, DEFAULT_STOP_TIMEOUT,
    LONG_WAIT_FRAMES, SHORT_WAIT_FRAMES, WARMUP_TICKS,
};
use crate::emulator::engine::EngineOptions;
use crate::error::PokegymResult;

/// How the emulator is started and driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorConfig {
    pub rom_path: PathBuf,
    pub headless: bool,
    pub sound: bool,
    /// Run the engine on a dedicated worker thread instead of inline under a mutex
    pub streaming: bool,
    pub warmup_ticks: u32,
    pub startup_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub queue_clear_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub hold_frames: u32,
    pub long_wait_frames: u32,
    pub short_wait_frames: u32,
    /// Playback speed once warm-up completes, streaming mode
    pub streaming_speed: u32,
    /// Playback speed once warm-up completes, traditional mode
    pub traditional_speed: u32,
}

impl EmulatorConfig {
    pub fn new(rom_path: impl Into<PathBuf>) -> Self {
        Self {
            rom_path: rom_path.into(),
            ..Self::default()
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            rom_path: self.rom_path.clone(),
            headless: self.headless,
            sound: self.sound,
        }
    }

    /// The speed the engine settles at after warm-up, for the configured mode.
    pub fn steady_speed(&self) -> u32 {
        if self.streaming {
            self.streaming_speed
        } else {
            self.traditional_speed
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn queue_clear_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_clear_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            rom_path: default_rom_path(),
            headless: true,
            sound: false,
            streaming: false,
            warmup_ticks: WARMUP_TICKS,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT.as_millis() as u64,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT.as_millis() as u64,
            queue_clear_timeout_ms: DEFAULT_QUEUE_CLEAR_TIMEOUT.as_millis() as u64,
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            hold_frames: DEFAULT_HOLD_FRAMES,
            long_wait_frames: LONG_WAIT_FRAMES,
            short_wait_frames: SHORT_WAIT_FRAMES,
            streaming_speed: 1,
            traditional_speed: 5,
        }
    }
}

/// Where session data lives and how often it is autosaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub base_dir: PathBuf,
    /// Steps between autosaves
    pub autosave_interval: u64,
    pub autosave_filename: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            autosave_interval: default_autosave_interval(),
            autosave_filename: default_autosave_filename(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawConfig")]
pub struct Config {
    pub emulator: EmulatorConfig,
    pub session: SessionConfig,
}

/// Flat configuration as read from `POKEGYM_*` environment variables
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_rom_path")]
    rom_path: PathBuf,
    #[serde(default = "default_true")]
    headless: bool,
    #[serde(default)]
    sound: bool,
    #[serde(default)]
    streaming: bool,
    #[serde(default = "default_warmup_ticks")]
    warmup_ticks: u32,
    #[serde(default = "default_startup_timeout_ms")]
    startup_timeout_ms: u64,
    #[serde(default = "default_stop_timeout_ms")]
    stop_timeout_ms: u64,
    #[serde(default = "default_queue_clear_timeout_ms")]
    queue_clear_timeout_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    settle_delay_ms: u64,
    #[serde(default = "default_hold_frames")]
    hold_frames: u32,
    #[serde(default = "default_long_wait_frames")]
    long_wait_frames: u32,
    #[serde(default = "default_short_wait_frames")]
    short_wait_frames: u32,
    #[serde(default = "default_streaming_speed")]
    streaming_speed: u32,
    #[serde(default = "default_traditional_speed")]
    traditional_speed: u32,

    // Sessions
    #[serde(default = "default_base_dir")]
    base_dir: PathBuf,
    #[serde(default = "default_autosave_interval")]
    autosave_interval: u64,
    #[serde(default = "default_autosave_filename")]
    autosave_filename: String,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Config {
            emulator: EmulatorConfig {
                rom_path: raw.rom_path,
                headless: raw.headless,
                sound: raw.sound,
                streaming: raw.streaming,
                warmup_ticks: raw.warmup_ticks,
                startup_timeout_ms: raw.startup_timeout_ms,
                stop_timeout_ms: raw.stop_timeout_ms,
                queue_clear_timeout_ms: raw.queue_clear_timeout_ms,
                settle_delay_ms: raw.settle_delay_ms,
                hold_frames: raw.hold_frames,
                long_wait_frames: raw.long_wait_frames,
                short_wait_frames: raw.short_wait_frames,
                streaming_speed: raw.streaming_speed,
                traditional_speed: raw.traditional_speed,
            },
            session: SessionConfig {
                base_dir: raw.base_dir,
                autosave_interval: raw.autosave_interval.max(1),
                autosave_filename: raw.autosave_filename,
            },
        }
    }
}

fn default_rom_path() -> PathBuf {
    PathBuf::from("pokemon.gb")
}

fn default_true() -> bool {
    true
}

fn default_warmup_ticks() -> u32 {
    WARMUP_TICKS
}

fn default_startup_timeout_ms() -> u64 {
    DEFAULT_STARTUP_TIMEOUT.as_millis() as u64
}

fn default_stop_timeout_ms() -> u64 {
    DEFAULT_STOP_TIMEOUT.as_millis() as u64
}

fn default_queue_clear_timeout_ms() -> u64 {
    DEFAULT_QUEUE_CLEAR_TIMEOUT.as_millis() as u64
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY.as_millis() as u64
}

fn default_hold_frames() -> u32 {
    DEFAULT_HOLD_FRAMES
}

fn default_long_wait_frames() -> u32 {
    LONG_WAIT_FRAMES
}

fn default_short_wait_frames() -> u32 {
    SHORT_WAIT_FRAMES
}

fn default_streaming_speed() -> u32 {
    1
}

fn default_traditional_speed() -> u32 {
    5
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("gameplay_sessions")
}

fn default_autosave_interval() -> u64 {
    50
}

fn default_autosave_filename() -> String {
    "autosave.state".to_string()
}

/// Loads configuration from `POKEGYM_*` environment variables, falling back to defaults.
pub fn load_config() -> PokegymResult<Config> {
    let config = Figment::new().merge(Env::prefixed("POKEGYM_")).extract()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_environment() {
        Jail::expect_with(|_jail| {
            let config = load_config().unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.emulator.settle_delay(), Duration::from_millis(100));
            assert_eq!(config.session.autosave_interval, 50);
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("POKEGYM_ROM_PATH", "red.gb");
            jail.set_env("POKEGYM_STREAMING", "true");
            jail.set_env("POKEGYM_STOP_TIMEOUT_MS", "250");
            jail.set_env("POKEGYM_AUTOSAVE_INTERVAL", "0");

            let config = load_config().unwrap();
            assert_eq!(config.emulator.rom_path, PathBuf::from("red.gb"));
            assert!(config.emulator.streaming);
            assert_eq!(config.emulator.steady_speed(), 1);
            assert_eq!(config.emulator.stop_timeout(), Duration::from_millis(250));
            assert_eq!(config.session.autosave_interval, 1);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("POKEGYM_HOLD_FRAMES", "many");
            assert!(load_config().is_err());
            Ok(())
        });
    }
}
