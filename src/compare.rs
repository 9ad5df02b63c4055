//! Parallel evaluation over independent environments.
//!
//! Each rayon worker owns its own `SnakeEnv` and its own agent; nothing is
//! shared between workers and results are merged only at the end.

use crate::agent::{Agent, RandomAgent, Report, run_episode};
use crate::config::EnvConfig;
use crate::env::SnakeEnv;
use crate::error::Result;
use crate::qlearn::QLearningAgent;
use rayon::prelude::*;
use tracing::info;

/// Run `episodes` greedy (non-learning) episodes across the rayon pool.
/// `make_agent` is called once per worker. With a seeded config, episode `i`
/// uses seed `seed + i`.
pub fn evaluate_parallel<A, F>(config: EnvConfig, episodes: usize, make_agent: F) -> Result<Report>
where
    A: Agent,
    F: Fn() -> A + Sync + Send,
{
    let episodes = (0..episodes)
        .into_par_iter()
        .map_init(make_agent, |agent, i| {
            let mut env = SnakeEnv::new(EnvConfig {
                seed: config.seed.map(|s| s.wrapping_add(i as u64)),
                ..config
            });
            run_episode(agent, &mut env, false)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Report { episodes })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub random: Report,
    pub q_learning: Report,
}

impl Comparison {
    /// Relative gain of the Q-learning average score over the random one, in
    /// percent. `None` when the random baseline scored nothing.
    pub fn improvement(&self) -> Option<f64> {
        let base = self.random.average_score();
        if base == 0.0 {
            return None;
        }
        Some((self.q_learning.average_score() - base) / base * 100.0)
    }
}

/// Random baseline vs. a trained table, both played greedily on fresh boards.
pub fn compare_agents(
    config: EnvConfig,
    episodes: usize,
    trained: &QLearningAgent,
) -> Result<Comparison> {
    let random = evaluate_parallel(config, episodes, RandomAgent::new)?;
    let q_learning = evaluate_parallel(config, episodes, || {
        let mut agent = trained.clone();
        agent.set_epsilon(0.0);
        agent
    })?;
    info!(
        random = random.average_score(),
        q_learning = q_learning.average_score(),
        "agent comparison finished"
    );
    Ok(Comparison { random, q_learning })
}
