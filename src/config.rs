//! Application-level configuration loading: store location, trial delays and the default player.

use std::{env, fs, io::ErrorKind, ops::RangeInclusive, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::player_store::file::FileStoreConfig,
    state::{
        player::DEFAULT_PLAYER_NAME,
        trial::{DEFAULT_MAX_DELAY_SECS, DEFAULT_MIN_DELAY_SECS},
    },
    validation::validate_player_name,
};

/// Default location on disk where the game looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/reflex.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "REFLEX_CONFIG_PATH";
/// Player file used when the configuration does not name one.
const DEFAULT_STORE_PATH: &str = "players.json";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration.
pub struct AppConfig {
    store_path: PathBuf,
    min_delay_secs: u64,
    max_delay_secs: u64,
    default_player: String,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        store = %config.store_path.display(),
                        min_delay_secs = config.min_delay_secs,
                        max_delay_secs = config.max_delay_secs,
                        "loaded config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Decode a JSON document. Missing fields take their defaults; invalid values are
    /// replaced by their defaults with a warning.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Where players are persisted, honouring the store path environment override.
    pub fn store_config(&self) -> FileStoreConfig {
        FileStoreConfig::from_env_or(self.store_path.clone())
    }

    /// Inclusive range trial delays are drawn from, in whole seconds.
    pub fn delay_range(&self) -> RangeInclusive<u64> {
        self.min_delay_secs..=self.max_delay_secs
    }

    /// Name of the player seeded into an empty store.
    pub fn default_player(&self) -> &str {
        &self.default_player
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            min_delay_secs: DEFAULT_MIN_DELAY_SECS,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            default_player: DEFAULT_PLAYER_NAME.to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    store_path: Option<PathBuf>,
    min_delay_secs: Option<u64>,
    max_delay_secs: Option<u64>,
    default_player: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();

        let store_path = value
            .store_path
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or(defaults.store_path);

        let min_delay_secs = value.min_delay_secs.unwrap_or(defaults.min_delay_secs);
        let max_delay_secs = value.max_delay_secs.unwrap_or(defaults.max_delay_secs);
        let (min_delay_secs, max_delay_secs) = if min_delay_secs > max_delay_secs {
            warn!(
                min_delay_secs,
                max_delay_secs, "min delay exceeds max delay; using default delays"
            );
            (defaults.min_delay_secs, defaults.max_delay_secs)
        } else {
            (min_delay_secs, max_delay_secs)
        };

        let default_player = match value.default_player {
            Some(name) => {
                let name = name.trim();
                match validate_player_name(name) {
                    Ok(()) => name.to_owned(),
                    Err(err) => {
                        warn!(error = %err, "invalid default player name; using built-in default");
                        defaults.default_player.clone()
                    }
                }
            }
            None => defaults.default_player.clone(),
        };

        Self {
            store_path,
            min_delay_secs,
            max_delay_secs,
            default_player,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
