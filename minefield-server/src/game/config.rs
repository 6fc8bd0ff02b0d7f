//! Round Configuration
//!
//! Tunable constants for every round. Read once at startup and shared
//! read-only with the hub afterwards.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Largest board side accepted from configuration.
pub const MAX_BOARD_SIZE: usize = 256;

/// Longest pause between rounds accepted from configuration.
pub const MAX_RESTART_DELAY: Duration = Duration::from_secs(86_400);

/// Game constants for all rounds of this process.
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Side length N of the N×N board.
    pub board_size: usize,
    /// Independent per-cell probability of a mine, in [0, 1].
    pub mine_probability: f64,
    /// Base points per revealed cell (adjacent mine count is added on top).
    pub reveal_reward: u32,
    /// Points subtracted on a mine hit (score floors at 0).
    pub mine_hit_penalty: u32,
    /// Pause between a round ending and the next board.
    pub restart_delay: Duration,
    /// Base seed for board generation; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            board_size: 32,
            mine_probability: 0.15,
            reveal_reward: 1,
            mine_hit_penalty: 10,
            restart_delay: Duration::from_secs(30),
            seed: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Environment variable could not be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value found.
        value: String,
    },
    /// Board size outside 1..=MAX_BOARD_SIZE.
    #[error("board size must be between 1 and 256, got {0}")]
    BoardSize(usize),
    /// Mine probability outside [0, 1].
    #[error("mine probability must be within [0, 1], got {0}")]
    MineProbability(f64),
    /// Restart delay longer than MAX_RESTART_DELAY.
    #[error("restart delay must be at most 86400 seconds, got {0}")]
    RestartDelay(u64),
}

impl GameConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            board_size: env_or("MINEFIELD_BOARD_SIZE", defaults.board_size)?,
            mine_probability: env_or("MINEFIELD_MINE_PROBABILITY", defaults.mine_probability)?,
            reveal_reward: env_or("MINEFIELD_REVEAL_REWARD", defaults.reveal_reward)?,
            mine_hit_penalty: env_or("MINEFIELD_MINE_HIT_PENALTY", defaults.mine_hit_penalty)?,
            restart_delay: Duration::from_secs(env_or(
                "MINEFIELD_RESTART_DELAY_SECS",
                defaults.restart_delay.as_secs(),
            )?),
            seed: env_opt("MINEFIELD_SEED")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_size == 0 || self.board_size > MAX_BOARD_SIZE {
            return Err(ConfigError::BoardSize(self.board_size));
        }
        if !(0.0..=1.0).contains(&self.mine_probability) {
            return Err(ConfigError::MineProbability(self.mine_probability));
        }
        if self.restart_delay > MAX_RESTART_DELAY {
            return Err(ConfigError::RestartDelay(self.restart_delay.as_secs()));
        }
        Ok(())
    }
}

/// Parse an optional environment variable.
pub(crate) fn env_opt<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}

/// Parse an environment variable or use the default when unset.
pub(crate) fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(env_opt(name)?.unwrap_or(default))
}
