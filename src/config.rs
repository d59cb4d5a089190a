// Configuration loading and parsing (pointdeck.toml).
//
// The config file is looked up in the working directory first, then in the
// platform config directory. A missing file yields the defaults; a present
// but broken file is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Config file name searched for in the working directory and the platform
/// config dir.
pub const CONFIG_FILE_NAME: &str = "pointdeck.toml";

/// Floor for poll periods; anything faster would hammer the server for no
/// visible benefit.
const MIN_POLL_MS: u64 = 250;

/// Assembled application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the estimation server.
    pub server_url: String,
    /// Poll period for the live room view.
    pub room_poll: Duration,
    /// Poll period for the lobby's room list.
    pub lobby_poll: Duration,
    /// Directory for the log file.
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: "http://localhost:8080".to_string(),
            room_poll: Duration::from_millis(1500),
            lobby_poll: Duration::from_millis(3000),
            log_dir: PathBuf::from("logs"),
        }
    }
}

// ---------------------------------------------------------------------------
// pointdeck.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    poll: PollSection,
    #[serde(default)]
    log: LogSection,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerSection {
    url: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            url: Config::default().server_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PollSection {
    #[serde(default = "default_room_poll_ms")]
    room_ms: u64,
    #[serde(default = "default_lobby_poll_ms")]
    lobby_ms: u64,
}

fn default_room_poll_ms() -> u64 {
    1500
}

fn default_lobby_poll_ms() -> u64 {
    3000
}

impl Default for PollSection {
    fn default() -> Self {
        PollSection {
            room_ms: default_room_poll_ms(),
            lobby_ms: default_lobby_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LogSection {
    #[serde(default = "default_log_dir")]
    dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LogSection {
    fn default() -> Self {
        LogSection {
            dir: default_log_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load the configuration, falling back to defaults when no file exists.
pub fn load_config() -> Result<Config, ConfigError> {
    match find_config_file() {
        Some(path) => load_from_path(&path),
        None => Ok(Config::default()),
    }
}

/// Load and validate a specific config file.
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    assemble(file)
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    let dirs = ProjectDirs::from("", "", "pointdeck")?;
    let candidate = dirs.config_dir().join(CONFIG_FILE_NAME);
    candidate.is_file().then_some(candidate)
}

fn assemble(file: ConfigFile) -> Result<Config, ConfigError> {
    let config = Config {
        server_url: file.server.url.trim_end_matches('/').to_string(),
        room_poll: Duration::from_millis(file.poll.room_ms),
        lobby_poll: Duration::from_millis(file.poll.lobby_ms),
        log_dir: file.log.dir,
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if !config.server_url.starts_with("http://") && !config.server_url.starts_with("https://") {
        return Err(ConfigError::ValidationError {
            field: "server.url".to_string(),
            message: format!("must start with http:// or https://, got '{}'", config.server_url),
        });
    }
    for (field, period) in [
        ("poll.room_ms", config.room_poll),
        ("poll.lobby_ms", config.lobby_poll),
    ] {
        if period < Duration::from_millis(MIN_POLL_MS) {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: format!("must be at least {MIN_POLL_MS}ms"),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
