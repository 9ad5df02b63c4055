use crate::env::{ACTION_SIZE, Environment};
use crate::error::{Result, SnakeError};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one finished episode
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub reward: f64,
    pub length: usize,
    pub score: u32,
}

/// Per-episode results of a training or evaluation run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Report {
    pub episodes: Vec<EpisodeStats>,
}

impl Report {
    pub fn push(&mut self, stats: EpisodeStats) {
        self.episodes.push(stats);
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn average_reward(&self) -> f64 {
        self.mean(|e| e.reward)
    }

    pub fn average_length(&self) -> f64 {
        self.mean(|e| e.length as f64)
    }

    pub fn average_score(&self) -> f64 {
        self.mean(|e| f64::from(e.score))
    }

    pub fn best_score(&self) -> u32 {
        self.episodes.iter().map(|e| e.score).max().unwrap_or(0)
    }

    /// Averages over the last `n` episodes: `(reward, length)`.
    pub fn recent_averages(&self, n: usize) -> (f64, f64) {
        let start = self.episodes.len().saturating_sub(n);
        let recent = Report {
            episodes: self.episodes[start..].to_vec(),
        };
        (recent.average_reward(), recent.average_length())
    }

    pub fn extend(&mut self, other: Report) {
        self.episodes.extend(other.episodes);
    }

    fn mean(&self, f: impl Fn(&EpisodeStats) -> f64) -> f64 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.iter().map(f).sum::<f64>() / self.episodes.len() as f64
    }
}

/// An RL agent acting in an [`Environment`].
///
/// Only action selection is mandatory. Learning agents override `update`;
/// agents without a persistent model report `Unsupported` from `save`/`load`.
pub trait Agent {
    fn name(&self) -> &str;

    fn select_action(&mut self, state: &[f64]) -> usize;

    fn update(
        &mut self,
        _state: &[f64],
        _action: usize,
        _reward: f64,
        _next_state: &[f64],
        _done: bool,
    ) {
    }

    fn train(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<Report> {
        run_episodes(self, env, episodes, true)
    }

    fn evaluate(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<Report> {
        run_episodes(self, env, episodes, false)
    }

    fn save(&self, _path: &Path) -> Result<()> {
        Err(SnakeError::Unsupported("save"))
    }

    fn load(&mut self, _path: &Path) -> Result<()> {
        Err(SnakeError::Unsupported("load"))
    }

    fn set_learning_rate(&mut self, _lr: f64) {}

    fn set_epsilon(&mut self, _epsilon: f64) {}
}

/// Play one episode to completion. With `learn` set, every transition is fed
/// back through [`Agent::update`].
pub fn run_episode<A: Agent + ?Sized>(
    agent: &mut A,
    env: &mut dyn Environment,
    learn: bool,
) -> Result<EpisodeStats> {
    let mut state = env.reset();
    let mut stats = EpisodeStats::default();

    while !env.is_done() {
        let action = agent.select_action(&state);
        let (next_state, reward) = env.step(action)?;
        if learn {
            let done = env.is_done();
            agent.update(&state, action, reward, &next_state, done);
        }
        state = next_state;
        stats.reward += reward;
        stats.length += 1;
    }

    stats.score = env.info().map_or(0, |info| info.score);
    Ok(stats)
}

pub fn run_episodes<A: Agent + ?Sized>(
    agent: &mut A,
    env: &mut dyn Environment,
    episodes: usize,
    learn: bool,
) -> Result<Report> {
    let mut report = Report::default();
    for _ in 0..episodes {
        report.push(run_episode(agent, env, learn)?);
    }
    Ok(report)
}

/// Uniformly random baseline
#[derive(Debug, Clone)]
pub struct RandomAgent {
    rng: SmallRng,
}

impl Default for RandomAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomAgent {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "Random"
    }

    fn select_action(&mut self, _state: &[f64]) -> usize {
        self.rng.gen_range(0..ACTION_SIZE)
    }
}
