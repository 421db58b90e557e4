// Configuration loading and parsing (game.toml, runtime.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::participant::DEFAULT_STALE_AFTER_SECS;
use crate::settings::GameSettings;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Settings for rooms this client hosts.
    pub game: GameSettings,
    pub scheduler: SchedulerConfig,
    pub db_path: String,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// game.toml
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[game]` table in game.toml.
#[derive(Debug, Clone, Deserialize)]
struct GameFile {
    #[serde(default)]
    game: GameSettings,
}

// ---------------------------------------------------------------------------
// runtime.toml
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct RuntimeFile {
    #[serde(default)]
    scheduler: SchedulerConfig,
    database: DatabaseSection,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

/// Polling cadence of a draft client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Authoritative state observation. At most one second.
    pub poll_interval_ms: u64,
    /// Countdown refresh and self-autopick check. At most 250 ms.
    pub tick_interval_ms: u64,
    /// How often a waiting client checks for an overdue turn.
    pub autopick_check_interval_ms: u64,
    pub lobby_poll_interval_ms: u64,
    pub heartbeat_interval_secs: u64,
    /// Participants silent for longer than this are treated as gone.
    pub stale_after_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 800,
            tick_interval_ms: 200,
            autopick_check_interval_ms: 2000,
            lobby_poll_interval_ms: 1500,
            heartbeat_interval_secs: 20,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS as u64,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn autopick_check_interval(&self) -> Duration {
        Duration::from_millis(self.autopick_check_interval_ms)
    }

    pub fn lobby_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lobby_poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_after_secs as i64)
    }
}

/// CSV sources for the weekly stat import.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub player_stats: String,
    pub team_stats: String,
    pub schedule: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/game.toml` (optional; the
/// built-in game defaults apply without it) and `config/runtime.toml`,
/// relative to `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- game.toml (optional) ---
    let game_path = config_dir.join("game.toml");
    let game = if game_path.exists() {
        let text = read_file(&game_path)?;
        let file: GameFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: game_path.clone(),
            source: e,
        })?;
        file.game
    } else {
        GameSettings::default()
    };

    // --- runtime.toml (required) ---
    let runtime_path = config_dir.join("runtime.toml");
    let runtime_text = read_file(&runtime_path)?;
    let runtime: RuntimeFile =
        toml::from_str(&runtime_text).map_err(|e| ConfigError::ParseError {
            path: runtime_path.clone(),
            source: e,
        })?;

    let config = Config {
        game,
        scheduler: runtime.scheduler,
        db_path: runtime.database.path,
        data_paths: runtime.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        if target.exists() {
            continue;
        }
        std::fs::copy(&path, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {} to {}: {e}", path.display(), target.display()),
        })?;
        copied.push(target);
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    config.game.validate()?;

    let s = &config.scheduler;
    let bounds: &[(&str, u64, u64)] = &[
        ("scheduler.poll_interval_ms", s.poll_interval_ms, 1000),
        ("scheduler.tick_interval_ms", s.tick_interval_ms, 250),
        ("scheduler.autopick_check_interval_ms", s.autopick_check_interval_ms, 60_000),
        ("scheduler.lobby_poll_interval_ms", s.lobby_poll_interval_ms, 60_000),
    ];
    for (field, value, max) in bounds {
        if *value == 0 || value > max {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: format!("must be between 1 and {max}, got {value}"),
            });
        }
    }

    if s.heartbeat_interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "scheduler.heartbeat_interval_secs".into(),
            message: "must be greater than 0".into(),
        });
    }
    if s.stale_after_secs <= s.heartbeat_interval_secs {
        return Err(ConfigError::ValidationError {
            field: "scheduler.stale_after_secs".into(),
            message: format!(
                "must exceed heartbeat_interval_secs ({}), got {}",
                s.heartbeat_interval_secs, s.stale_after_secs
            ),
        });
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}
