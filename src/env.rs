use crate::config::{EnvConfig, RewardConfig};
use crate::draw::Renderer;
use crate::error::{Result, SnakeError};
use crate::game::{Game, GameStatus, STATE_SIZE};
use crate::pos::Dir;

/// Number of discrete actions: Up, Down, Left, Right.
pub const ACTION_SIZE: usize = 4;

pub type StateVector = Vec<f64>;

/// Diagnostics reported by an environment after (or during) an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvInfo {
    pub score: u32,
    pub high_score: u32,
    pub steps: usize,
    pub length: usize,
}

impl EnvInfo {
    /// `[score, high_score, steps, length]`
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            f64::from(self.score),
            f64::from(self.high_score),
            self.steps as f64,
            self.length as f64,
        ]
    }
}

/// Discrete-action RL environment contract.
pub trait Environment {
    fn reset(&mut self) -> StateVector;

    /// Apply `action`, returning the next state and the reward.
    fn step(&mut self, action: usize) -> Result<(StateVector, f64)>;

    fn is_done(&self) -> bool;

    fn action_space_size(&self) -> usize;

    fn state_space_size(&self) -> usize;

    fn action_space(&self) -> Vec<usize> {
        (0..self.action_space_size()).collect()
    }

    fn set_seed(&mut self, _seed: u64) {}

    fn info(&self) -> Option<EnvInfo> {
        None
    }
}

/// The snake game behind the [`Environment`] contract.
#[derive(Debug)]
pub struct SnakeEnv {
    game: Game,
    step_count: usize,
    max_steps: usize,
}

impl Default for SnakeEnv {
    fn default() -> Self {
        Self::new(EnvConfig::default())
    }
}

impl SnakeEnv {
    pub fn new(config: EnvConfig) -> Self {
        let game = match config.seed {
            Some(seed) => Game::with_seed(config.game, seed),
            None => Game::new(config.game),
        };
        Self {
            game,
            step_count: 0,
            max_steps: config.max_steps,
        }
    }

    /// Override the reward scale used by the underlying game.
    pub fn set_reward_structure(&mut self, apple: f64, collision: f64, time_penalty: f64) {
        self.game
            .set_rewards(RewardConfig::new(apple, collision, time_penalty));
    }

    pub fn rewards(&self) -> RewardConfig {
        self.game.rewards()
    }

    pub fn set_max_steps(&mut self, max_steps: usize) {
        self.max_steps = max_steps;
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn steps(&self) -> usize {
        self.step_count
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn state(&self) -> StateVector {
        self.game.state_vector()
    }

    pub fn render(&self, renderer: &mut dyn Renderer) {
        self.game.render(renderer);
    }
}

impl Environment for SnakeEnv {
    fn reset(&mut self) -> StateVector {
        self.game.reset();
        self.step_count = 0;
        self.state()
    }

    fn step(&mut self, action: usize) -> Result<(StateVector, f64)> {
        let dir = Dir::from_action(action).ok_or(SnakeError::InvalidAction {
            action,
            action_space: ACTION_SIZE,
        })?;

        let ticked = self.game.status() == GameStatus::Playing;
        self.game.perform_action(dir);
        self.step_count += 1;

        let reward = if ticked {
            self.game.reward()
        } else {
            RewardConfig::NO_REWARD
        };
        Ok((self.state(), reward))
    }

    fn is_done(&self) -> bool {
        self.game.is_game_over() || self.step_count >= self.max_steps
    }

    fn action_space_size(&self) -> usize {
        ACTION_SIZE
    }

    fn state_space_size(&self) -> usize {
        STATE_SIZE
    }

    fn set_seed(&mut self, seed: u64) {
        self.game.reseed(seed);
    }

    fn info(&self) -> Option<EnvInfo> {
        Some(EnvInfo {
            score: self.game.score(),
            high_score: self.game.high_score(),
            steps: self.step_count,
            length: self.game.snake().len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apple::Apple;
    use crate::pos::Pos;
    use crate::snake::Snake;

    fn env() -> SnakeEnv {
        SnakeEnv::new(EnvConfig {
            seed: Some(11),
            ..Default::default()
        })
    }

    #[test]
    fn test_spaces() {
        let env = env();
        assert_eq!(env.action_space_size(), 4);
        assert_eq!(env.state_space_size(), 17);
        assert_eq!(env.action_space(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_reset_returns_state() {
        let mut env = env();
        let state = env.reset();
        assert_eq!(state.len(), STATE_SIZE);
        assert_eq!(env.steps(), 0);
        assert!(!env.is_done());
    }

    #[test]
    fn test_invalid_action_rejected_without_side_effects() {
        let mut env = env();
        env.reset();
        let before = env.state();
        let err = env.step(4).unwrap_err();
        assert!(matches!(
            err,
            SnakeError::InvalidAction {
                action: 4,
                action_space: 4
            }
        ));
        assert_eq!(env.steps(), 0);
        assert_eq!(env.state(), before);
    }

    #[test]
    fn test_step_cap_ends_episode() {
        let mut env = env();
        env.set_max_steps(5);
        env.reset();
        // Going up forever on an empty board never collides.
        for i in 0..5 {
            assert!(!env.is_done(), "done early at step {i}");
            env.step(0).unwrap();
        }
        assert!(!env.game().is_game_over());
        assert!(env.is_done());
    }

    #[test]
    fn test_reward_structure_threads_into_game() {
        let mut env = env();
        env.set_reward_structure(5.0, -50.0, -0.5);
        env.reset();
        let grid = env.game().grid();
        env.game_mut()
            .set_scene(Snake::new(grid), Apple::at(Pos::new(-3, -3)));
        let (_, reward) = env.step(3).unwrap();
        assert_eq!(reward, -0.5);
        assert_eq!(env.rewards().apple, 5.0);
    }

    #[test]
    fn test_step_after_game_over_gives_no_reward() {
        let mut env = env();
        env.reset();
        env.game_mut().set_status(GameStatus::GameOver);
        let (_, reward) = env.step(0).unwrap();
        assert_eq!(reward, 0.0);
        assert_eq!(env.steps(), 1);
        assert!(env.is_done());
    }

    #[test]
    fn test_set_seed_reproduces_apple_placement() {
        let mut a = SnakeEnv::new(EnvConfig {
            seed: Some(1),
            ..Default::default()
        });
        let mut b = SnakeEnv::new(EnvConfig {
            seed: Some(2),
            ..Default::default()
        });
        a.set_seed(99);
        b.set_seed(99);
        a.reset();
        b.reset();
        assert_eq!(a.game().apple().position(), b.game().apple().position());

        for _ in 0..5 {
            for env in [&mut a, &mut b] {
                let snake = env.game().snake().clone();
                let ahead = env.game().grid().wrap(snake.head().offset(Dir::Right));
                env.game_mut().set_scene(snake, Apple::at(ahead));
                let (_, reward) = env.step(3).unwrap();
                assert_eq!(reward, 10.0);
            }
            assert_eq!(a.game().apple().position(), b.game().apple().position());
        }
        assert_eq!(a.info().unwrap().score, 5);
    }

    #[test]
    fn info_reports_real_snake_length() {
        // Length used to be a hard-coded 10 in this slot.
        let mut env = env();
        env.reset();
        let grid = env.game().grid();
        env.game_mut()
            .set_scene(Snake::new(grid), Apple::at(Pos::new(1, 0)));
        env.step(3).unwrap();
        let info = env.info().unwrap();
        assert_eq!(info.length, 3);
        assert_eq!(info.score, 1);
        assert_eq!(info.steps, 1);
        // High score only moves when an episode ends.
        assert_eq!(info.to_vec(), vec![1.0, 0.0, 1.0, 3.0]);
    }
}
