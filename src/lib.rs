//! Toroidal snake game with a reinforcement-learning interface and a tabular
//! Q-learning agent.
//!
//! [`game::Game`] is the simulation, [`env::SnakeEnv`] exposes it through the
//! [`env::Environment`] contract, and [`qlearn::QLearningAgent`] learns to play
//! it through the [`agent::Agent`] contract.

pub mod agent;
pub mod apple;
pub mod compare;
pub mod config;
pub mod draw;
pub mod env;
pub mod error;
pub mod game;
pub mod pos;
pub mod qlearn;
pub mod snake;

pub use agent::{Agent, EpisodeStats, RandomAgent, Report};
pub use config::{EnvConfig, GameConfig, QLearningConfig, RewardConfig, RunConfig};
pub use env::{ACTION_SIZE, EnvInfo, Environment, SnakeEnv, StateVector};
pub use error::{Result, SnakeError};
pub use game::{Game, GameStatus, STATE_SIZE};
pub use qlearn::QLearningAgent;
