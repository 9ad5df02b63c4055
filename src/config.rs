//! Configuration for the game, the environment and the Q-learning agent.
//!
//! Every struct has sensible defaults and can be loaded (partially) from JSON.

use crate::error::{Result, SnakeError};
use crate::pos::Grid;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reward assigned by the controller on each tick outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub apple: f64,
    pub collision: f64,
    pub time_penalty: f64,
}

impl RewardConfig {
    /// Reward for a step taken after the episode already ended.
    pub const NO_REWARD: f64 = 0.0;

    pub fn new(apple: f64, collision: f64, time_penalty: f64) -> Self {
        Self {
            apple,
            collision,
            time_penalty,
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            apple: 10.0,
            collision: -100.0,
            time_penalty: -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Width of the board in cells
    pub width: i32,
    /// Height of the board in cells
    pub height: i32,
    pub rewards: RewardConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            rewards: RewardConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.width, self.height)
    }

    /// Dimensions must be even and at least 4 so the centred coordinate range
    /// holds exactly `width * height` cells and the starting snake fits.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if value < 4 || value % 2 != 0 {
                return Err(SnakeError::InvalidConfig(format!(
                    "{name} must be an even number >= 4, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub game: GameConfig,
    /// Episode step cap, independent of in-game collisions
    pub max_steps: usize,
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            max_steps: 1000,
            seed: None,
        }
    }
}

/// Hyperparameters of the tabular Q-learning agent.
///
/// The field order is the order in which they are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearningConfig {
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub min_epsilon: f64,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.95,
            epsilon: 0.1,
            epsilon_decay: 0.995,
            min_epsilon: 0.01,
        }
    }
}

impl QLearningConfig {
    pub fn new(alpha: f64, gamma: f64, epsilon: f64) -> Self {
        Self {
            alpha,
            gamma,
            epsilon,
            ..Default::default()
        }
    }
}

/// Top-level configuration file accepted by the command line front-end
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub env: EnvConfig,
    pub agent: QLearningConfig,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|e| SnakeError::file_access(path, e))?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.env.game.validate()?;
        Ok(config)
    }
}
