//! Tabular Q-learning.
//!
//! States are bucketed by rounding every feature to two decimals and joining
//! them into a string key. The table is sparse: unseen `(state, action)` pairs
//! read as `0.0` and are only materialised when updated.
//!
//! Text persistence format (whitespace separated):
//!
//! ```text
//! alpha gamma epsilon epsilon_decay min_epsilon
//! state_count
//! state_key action_count      (once per state)
//! action value                (action_count times)
//! ```

use crate::agent::{Agent, Report, run_episode};
use crate::config::QLearningConfig;
use crate::env::{ACTION_SIZE, Environment};
use crate::error::{Result, SnakeError};
use ahash::AHashMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Decimal places kept per feature in a state key.
pub const KEY_PRECISION: usize = 2;

pub fn state_key(state: &[f64]) -> String {
    let mut key = String::with_capacity(state.len() * 6);
    for (i, v) in state.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(&format!("{v:.prec$}", prec = KEY_PRECISION));
    }
    key
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QTable {
    entries: AHashMap<String, BTreeMap<usize, f64>>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains_state(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str, action: usize) -> f64 {
        self.entries
            .get(key)
            .and_then(|actions| actions.get(&action))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn values(&self, key: &str) -> [f64; ACTION_SIZE] {
        std::array::from_fn(|a| self.get(key, a))
    }

    /// `max_a Q[key][a]`; an unseen state is worth `0.0`.
    pub fn max_value(&self, key: &str) -> f64 {
        if !self.entries.contains_key(key) {
            return 0.0;
        }
        self.values(key)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Greedy action; ties go to the lowest index.
    pub fn best_action(&self, key: &str) -> usize {
        let values = self.values(key);
        let mut best = 0;
        for a in 1..ACTION_SIZE {
            if values[a] > values[best] {
                best = a;
            }
        }
        best
    }

    /// Mutable slot for `(key, action)`, created as `0.0` on first access.
    pub fn entry(&mut self, key: &str, action: usize) -> &mut f64 {
        self.entries
            .entry(key.to_owned())
            .or_default()
            .entry(action)
            .or_insert(0.0)
    }

    pub fn set(&mut self, key: &str, action: usize, value: f64) {
        *self.entry(key, action) = value;
    }

    /// Stored entries ordered by state key.
    pub fn sorted(&self) -> Vec<(&str, &BTreeMap<usize, f64>)> {
        let mut states: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        states.sort_unstable_by(|a, b| a.0.cmp(b.0));
        states
    }

    /// Every materialised `(state, action, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, f64)> {
        self.entries
            .iter()
            .flat_map(|(k, actions)| actions.iter().map(move |(&a, &v)| (k.as_str(), a, v)))
    }
}

/// Borrowed view written by [`QLearningAgent::save_snapshot`].
#[derive(Serialize)]
struct SnapshotRef<'a> {
    params: &'a QLearningConfig,
    table: &'a QTable,
}

#[derive(Deserialize)]
struct Snapshot {
    params: QLearningConfig,
    table: QTable,
}

#[derive(Debug, Clone)]
pub struct QLearningAgent {
    params: QLearningConfig,
    table: QTable,
    rng: SmallRng,
    total_steps: u64,
    exploration_steps: u64,
}

impl Default for QLearningAgent {
    fn default() -> Self {
        Self::new(QLearningConfig::default())
    }
}

impl QLearningAgent {
    pub fn new(params: QLearningConfig) -> Self {
        Self::with_rng(params, SmallRng::from_entropy())
    }

    pub fn with_seed(params: QLearningConfig, seed: u64) -> Self {
        Self::with_rng(params, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(params: QLearningConfig, rng: SmallRng) -> Self {
        Self {
            params,
            table: QTable::new(),
            rng,
            total_steps: 0,
            exploration_steps: 0,
        }
    }

    pub fn params(&self) -> &QLearningConfig {
        &self.params
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn epsilon(&self) -> f64 {
        self.params.epsilon
    }

    pub fn set_discount_factor(&mut self, gamma: f64) {
        self.params.gamma = gamma;
    }

    pub fn set_epsilon_decay(&mut self, decay: f64) {
        self.params.epsilon_decay = decay;
    }

    pub fn set_min_epsilon(&mut self, min_epsilon: f64) {
        self.params.min_epsilon = min_epsilon;
    }

    pub fn q_value(&self, key: &str, action: usize) -> f64 {
        self.table.get(key, action)
    }

    pub fn q_value_for(&self, state: &[f64], action: usize) -> f64 {
        self.table.get(&state_key(state), action)
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn exploration_steps(&self) -> u64 {
        self.exploration_steps
    }

    /// Fraction of selections that explored.
    pub fn exploration_rate(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.exploration_steps as f64 / self.total_steps as f64
        }
    }

    /// Multiply epsilon by the decay factor, floored at `min_epsilon`.
    pub fn decay_epsilon(&mut self) {
        let p = &mut self.params;
        p.epsilon = p.min_epsilon.max(p.epsilon * p.epsilon_decay);
    }

    /// Human-readable dump of the first `limit` states in key order.
    pub fn summary(&self, limit: usize) -> String {
        let mut out = format!("Q-table: {} states (showing up to {limit})\n", self.table.len());
        for (key, actions) in self.table.sorted().into_iter().take(limit) {
            out.push_str(&format!("State: {key}\n"));
            for (action, value) in actions {
                out.push_str(&format!("  Action {action}: {value:.4}\n"));
            }
        }
        out
    }

    pub fn to_text(&self) -> String {
        let p = &self.params;
        let mut out = format!(
            "{} {} {} {} {}\n{}\n",
            p.alpha,
            p.gamma,
            p.epsilon,
            p.epsilon_decay,
            p.min_epsilon,
            self.table.len()
        );
        for (key, actions) in self.table.sorted() {
            out.push_str(&format!("{key} {}\n", actions.len()));
            for (action, value) in actions {
                out.push_str(&format!("{action} {value}\n"));
            }
        }
        out
    }

    /// Replace hyperparameters and table from the text format. On error the
    /// agent is left untouched.
    pub fn load_text(&mut self, text: &str) -> Result<()> {
        let (params, table) = parse_text(text)?;
        self.params = params;
        self.table = table;
        Ok(())
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = SnapshotRef {
            params: &self.params,
            table: &self.table,
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| SnakeError::Snapshot(e.to_string()))?;
        fs::write(path, bytes).map_err(|e| SnakeError::file_access(path, e))?;
        info!(path = %path.display(), states = self.table.len(), "saved Q-table snapshot");
        Ok(())
    }

    pub fn load_snapshot(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path).map_err(|e| SnakeError::file_access(path, e))?;
        let (snapshot, _): (Snapshot, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| SnakeError::Snapshot(e.to_string()))?;
        self.params = snapshot.params;
        self.table = snapshot.table;
        info!(path = %path.display(), states = self.table.len(), "loaded Q-table snapshot");
        Ok(())
    }

    fn evaluate_greedy(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<Report> {
        let mut report = Report::default();
        for episode in 0..episodes {
            let stats = run_episode(self, env, false)?;
            info!(
                episode = episode + 1,
                reward = stats.reward,
                length = stats.length,
                score = stats.score,
                "evaluation episode"
            );
            report.push(stats);
        }
        info!(
            avg_reward = report.average_reward(),
            avg_length = report.average_length(),
            avg_score = report.average_score(),
            "evaluation completed"
        );
        Ok(report)
    }
}

impl Agent for QLearningAgent {
    fn name(&self) -> &str {
        "Q-Learning"
    }

    fn select_action(&mut self, state: &[f64]) -> usize {
        self.total_steps += 1;
        if self.rng.r#gen::<f64>() < self.params.epsilon {
            self.exploration_steps += 1;
            self.rng.gen_range(0..ACTION_SIZE)
        } else {
            self.table.best_action(&state_key(state))
        }
    }

    fn update(&mut self, state: &[f64], action: usize, reward: f64, next_state: &[f64], done: bool) {
        let next_max = if done {
            0.0
        } else {
            self.table.max_value(&state_key(next_state))
        };
        let (alpha, gamma) = (self.params.alpha, self.params.gamma);
        let q = self.table.entry(&state_key(state), action);
        let target = reward + gamma * next_max;
        *q += alpha * (target - *q);
    }

    fn train(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<Report> {
        info!(episodes, "training Q-learning agent");
        let mut report = Report::default();
        for episode in 0..episodes {
            let stats = run_episode(self, env, true)?;
            debug!(episode = episode + 1, reward = stats.reward, length = stats.length, "episode finished");
            report.push(stats);
            self.decay_epsilon();

            if (episode + 1) % 100 == 0 {
                let (avg_reward, avg_length) = report.recent_averages(100);
                info!(
                    episode = episode + 1,
                    avg_reward,
                    avg_length,
                    epsilon = self.params.epsilon,
                    states = self.table.len(),
                    "training progress"
                );
            }
        }
        info!(
            exploration_rate = self.exploration_rate() * 100.0,
            states = self.table.len(),
            "training completed"
        );
        Ok(report)
    }

    /// Greedy rollouts without learning; epsilon is restored afterwards.
    fn evaluate(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<Report> {
        info!(episodes, "evaluating Q-learning agent");
        let saved = self.params.epsilon;
        self.params.epsilon = 0.0;
        let result = self.evaluate_greedy(env, episodes);
        self.params.epsilon = saved;
        result
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text()).map_err(|e| SnakeError::file_access(path, e))?;
        info!(path = %path.display(), states = self.table.len(), "saved Q-learning agent");
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| SnakeError::file_access(path, e))?;
        self.load_text(&text)?;
        info!(path = %path.display(), states = self.table.len(), "loaded Q-learning agent");
        Ok(())
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.alpha = lr;
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.params.epsilon = epsilon;
    }
}

/// Line reader that tracks 1-based line numbers for error messages.
struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.lines().enumerate(),
            last: 0,
        }
    }

    /// Next non-blank line split into exactly `n` fields.
    fn fields(&mut self, n: usize, what: &str) -> Result<(usize, Vec<&'a str>)> {
        for (idx, line) in self.inner.by_ref() {
            self.last = idx + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != n {
                return Err(SnakeError::parse(
                    self.last,
                    format!("expected {n} fields ({what}), found {}", fields.len()),
                ));
            }
            return Ok((self.last, fields));
        }
        Err(SnakeError::parse(
            self.last + 1,
            format!("unexpected end of file, expected {what}"),
        ))
    }

    fn has_more(&mut self) -> Option<usize> {
        self.inner
            .by_ref()
            .find(|(_, line)| !line.trim().is_empty())
            .map(|(idx, _)| idx + 1)
    }
}

fn parse_num<T: std::str::FromStr>(line: usize, field: &str, what: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| SnakeError::parse(line, format!("invalid {what}: {field:?}")))
}

fn parse_text(text: &str) -> Result<(QLearningConfig, QTable)> {
    let mut lines = Lines::new(text);

    let (line, f) = lines.fields(5, "alpha gamma epsilon epsilon_decay min_epsilon")?;
    let params = QLearningConfig {
        alpha: parse_num(line, f[0], "alpha")?,
        gamma: parse_num(line, f[1], "gamma")?,
        epsilon: parse_num(line, f[2], "epsilon")?,
        epsilon_decay: parse_num(line, f[3], "epsilon_decay")?,
        min_epsilon: parse_num(line, f[4], "min_epsilon")?,
    };

    let (line, f) = lines.fields(1, "state count")?;
    let state_count: usize = parse_num(line, f[0], "state count")?;

    let mut table = QTable::new();
    for _ in 0..state_count {
        let (line, f) = lines.fields(2, "state_key action_count")?;
        let key = f[0];
        let action_count: usize = parse_num(line, f[1], "action count")?;
        if action_count > ACTION_SIZE {
            return Err(SnakeError::parse(
                line,
                format!("action count {action_count} exceeds {ACTION_SIZE}"),
            ));
        }
        for _ in 0..action_count {
            let (line, f) = lines.fields(2, "action value")?;
            let action: usize = parse_num(line, f[0], "action")?;
            if action >= ACTION_SIZE {
                return Err(SnakeError::parse(line, format!("action {action} out of range")));
            }
            let value: f64 = parse_num(line, f[1], "value")?;
            table.set(key, action, value);
        }
    }

    if let Some(line) = lines.has_more() {
        return Err(SnakeError::parse(line, "trailing data after last state"));
    }
    Ok((params, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::env::SnakeEnv;
    use crate::game::STATE_SIZE;

    fn agent(alpha: f64, gamma: f64, epsilon: f64) -> QLearningAgent {
        QLearningAgent::with_seed(QLearningConfig::new(alpha, gamma, epsilon), 17)
    }

    fn state(fill: f64) -> Vec<f64> {
        vec![fill; STATE_SIZE]
    }

    #[test]
    fn test_state_key_rounds_to_two_decimals() {
        assert_eq!(state_key(&[0.123, -0.5, 1.0]), "0.12,-0.50,1.00");
        assert_eq!(state_key(&[0.121, 0.124]), state_key(&[0.12, 0.12]));
        assert_ne!(state_key(&[0.12]), state_key(&[0.13]));
        assert_eq!(state_key(&state(0.0)).split(',').count(), STATE_SIZE);
    }

    #[test]
    fn test_terminal_update_is_exact() {
        let mut a = agent(0.5, 0.9, 0.0);
        let s = state(0.1);
        let s2 = state(0.2);
        a.update(&s, 0, 10.0, &s2, true);
        assert_eq!(a.q_value_for(&s, 0), 5.0);
        assert_eq!(a.q_value_for(&s, 1), 0.0);
        // The next state is never materialised by an update.
        assert!(!a.table().contains_state(&state_key(&s2)));
    }

    #[test]
    fn test_update_bootstraps_from_next_state() {
        let mut a = agent(0.5, 0.5, 0.0);
        let s = state(0.1);
        let s2 = state(0.2);
        a.update(&s2, 3, 10.0, &s, true); // Q[s2][3] = 5
        a.update(&s, 1, -1.0, &s2, false);
        // target = -1 + 0.5 * 5 = 1.5; Q = 0.5 * 1.5
        assert_eq!(a.q_value_for(&s, 1), 0.75);
    }

    #[test]
    fn test_max_over_next_state_counts_missing_actions_as_zero() {
        let mut table = QTable::new();
        table.set("s", 2, -4.0);
        assert_eq!(table.max_value("s"), 0.0);
        assert_eq!(table.max_value("unseen"), 0.0);
        table.set("s", 0, 3.0);
        assert_eq!(table.max_value("s"), 3.0);
    }

    #[test]
    fn test_greedy_ties_pick_lowest_action() {
        let mut a = agent(0.1, 0.9, 0.0);
        let s = state(0.3);
        assert_eq!(a.select_action(&s), 0);

        let key = state_key(&s);
        a.table.set(&key, 0, -1.0);
        assert_eq!(a.select_action(&s), 1);

        a.table.set(&key, 2, 2.0);
        a.table.set(&key, 3, 2.0);
        assert_eq!(a.select_action(&s), 2);
        assert_eq!(a.exploration_steps(), 0);
    }

    #[test]
    fn test_full_exploration_is_uniform_over_actions() {
        let mut a = agent(0.1, 0.9, 1.0);
        let s = state(0.0);
        let mut counts = [0; ACTION_SIZE];
        for _ in 0..400 {
            counts[a.select_action(&s)] += 1;
        }
        assert!(counts.iter().all(|&c| c > 50), "{counts:?}");
        assert_eq!(a.exploration_rate(), 1.0);
    }

    #[test]
    fn test_epsilon_decays_per_episode_with_floor() {
        let mut env = SnakeEnv::new(EnvConfig {
            max_steps: 20,
            seed: Some(3),
            ..Default::default()
        });
        let mut a = agent(0.1, 0.95, 0.5);
        a.set_epsilon_decay(0.5);
        a.set_min_epsilon(0.1);

        a.train(&mut env, 1).unwrap();
        assert_eq!(a.epsilon(), 0.25);
        a.train(&mut env, 1).unwrap();
        assert_eq!(a.epsilon(), 0.125);
        a.train(&mut env, 3).unwrap();
        assert_eq!(a.epsilon(), 0.1);
    }

    #[test]
    fn test_evaluate_is_greedy_and_does_not_learn() {
        let mut env = SnakeEnv::new(EnvConfig {
            max_steps: 30,
            seed: Some(4),
            ..Default::default()
        });
        let mut a = agent(0.1, 0.95, 0.7);
        let report = a.evaluate(&mut env, 3).unwrap();
        assert_eq!(report.len(), 3);
        assert!(a.table().is_empty());
        assert_eq!(a.exploration_steps(), 0);
        assert_eq!(a.epsilon(), 0.7);
    }

    #[test]
    fn test_training_fills_table() {
        let mut env = SnakeEnv::new(EnvConfig {
            max_steps: 50,
            seed: Some(5),
            ..Default::default()
        });
        let mut a = agent(0.1, 0.95, 0.3);
        let report = a.train(&mut env, 10).unwrap();
        assert_eq!(report.len(), 10);
        assert!(!a.table().is_empty());
        assert!(a.total_steps() > 0);
    }

    #[test]
    fn test_text_format_layout() {
        let mut a = agent(0.5, 0.9, 0.25);
        a.table.set("k2", 3, -1.5);
        a.table.set("k1", 0, 5.0);
        a.table.set("k1", 2, 0.125);
        let text = a.to_text();
        assert_eq!(
            text,
            "0.5 0.9 0.25 0.995 0.01\n2\nk1 2\n0 5\n2 0.125\nk2 1\n3 -1.5\n"
        );
    }

    #[test]
    fn test_load_replaces_instead_of_merging() {
        let mut a = agent(0.1, 0.9, 0.1);
        a.table.set("old", 1, 9.0);
        a.load_text("0.2 0.8 0.05 0.99 0.02\n1\nnew 1\n2 4.5\n").unwrap();
        assert_eq!(a.table().len(), 1);
        assert_eq!(a.q_value("old", 1), 0.0);
        assert_eq!(a.q_value("new", 2), 4.5);
        assert_eq!(a.params().alpha, 0.2);
        assert_eq!(a.params().min_epsilon, 0.02);
    }

    #[test]
    fn test_malformed_text_is_rejected_and_agent_untouched() {
        let mut a = agent(0.1, 0.9, 0.1);
        a.table.set("keep", 0, 1.0);

        for (text, line) in [
            ("", 1),
            ("0.1 0.9\n", 1),
            ("0.1 0.9 0.1 0.995 0.01\nabc\n", 2),
            ("0.1 0.9 0.1 0.995 0.01\n2\ns 1\n0 1.0\n", 5),
            ("0.1 0.9 0.1 0.995 0.01\n1\ns 1\n7 1.0\n", 4),
            ("0.1 0.9 0.1 0.995 0.01\n1\ns 1\n0 x\n", 4),
            ("0.1 0.9 0.1 0.995 0.01\n0\nextra 1\n", 3),
        ] {
            match a.load_text(text) {
                Err(SnakeError::Parse { line: got, .. }) => assert_eq!(got, line, "{text:?}"),
                other => panic!("expected parse error for {text:?}, got {other:?}"),
            }
        }
        assert_eq!(a.q_value("keep", 0), 1.0);
        assert_eq!(a.params().alpha, 0.1);
    }

    #[test]
    fn test_missing_file_is_a_file_access_error() {
        let mut a = QLearningAgent::default();
        let err = a.load(Path::new("/no/such/q_table.txt")).unwrap_err();
        assert!(matches!(err, SnakeError::FileAccess { .. }));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.bin");
        let mut a = agent(0.3, 0.8, 0.2);
        a.table.set("a,b", 1, 0.1 + 0.2);
        a.table.set("c", 3, -7.25);
        a.save_snapshot(&path).unwrap();

        let mut b = QLearningAgent::default();
        b.load_snapshot(&path).unwrap();
        assert_eq!(b.params(), a.params());
        assert_eq!(b.table(), a.table());
    }

    #[test]
    fn test_summary_lists_states_in_key_order() {
        let mut a = agent(0.1, 0.9, 0.1);
        a.table.set("b", 0, 1.0);
        a.table.set("a", 1, 2.0);
        let summary = a.summary(1);
        assert!(summary.contains("State: a"));
        assert!(summary.contains("Action 1: 2.0000"));
        assert!(!summary.contains("State: b"));
    }
}
