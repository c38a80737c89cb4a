use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::DEFAULT_MAX_SAMPLING_ATTEMPTS;

/// Tunables that shape how a single session builds its trials.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub experiment_name: String,
    pub cell_padding: f64,
    pub max_sampling_attempts: usize,
    pub instructions: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            experiment_name: "tangram_reference".to_string(),
            cell_padding: 0.0,
            max_sampling_attempts: DEFAULT_MAX_SAMPLING_ATTEMPTS,
            instructions: None,
        }
    }
}

/// Process-level configuration read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub catalog_path: PathBuf,
    pub seed: Option<u64>,
    pub game: GameConfig,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl ServerConfig {
    /// Build the configuration from `TANGRAM_*` environment variables.
    ///
    /// Unset variables fall back to defaults; set-but-malformed ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = GameConfig::default();

        let bind_addr = env::var("TANGRAM_BIND_ADDR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "127.0.0.1:9001".to_string());
        let catalog_path = env::var("TANGRAM_CATALOG_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("assets/object_set.json"));
        let experiment_name = env::var("TANGRAM_EXPERIMENT_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.experiment_name);
        let instructions = env::var("TANGRAM_INSTRUCTIONS")
            .ok()
            .filter(|v| !v.is_empty());

        let seed = parse_var::<u64>("TANGRAM_SEED")?;
        let cell_padding = parse_var::<f64>("TANGRAM_CELL_PADDING")?.unwrap_or(defaults.cell_padding);
        let max_sampling_attempts = parse_var::<usize>("TANGRAM_MAX_SAMPLING_ATTEMPTS")?
            .unwrap_or(defaults.max_sampling_attempts);

        if cell_padding < 0.0 || !cell_padding.is_finite() {
            return Err(ConfigError {
                key: "TANGRAM_CELL_PADDING",
                value: cell_padding.to_string(),
            });
        }
        if max_sampling_attempts == 0 {
            return Err(ConfigError {
                key: "TANGRAM_MAX_SAMPLING_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            catalog_path,
            seed,
            game: GameConfig {
                experiment_name,
                cell_padding,
                max_sampling_attempts,
                instructions,
            },
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError { key, value }),
        _ => Ok(None),
    }
}
