use crate::apple::Apple;
use crate::config::{GameConfig, RewardConfig};
use crate::draw::Renderer;
use crate::pos::{Dir, Grid};
use crate::snake::Snake;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::fmt;
use tracing::debug;

/// Length of the feature vector produced by [`Game::state_vector`]:
/// head (2), apple (2), direction one-hot (4), wall distances (4),
/// adjacent obstacles (4), length (1).
pub const STATE_SIZE: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Playing,
    Paused,
    GameOver,
    Help,
}

/// What happened on the last tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Collision,
    AppleEaten,
    Moved,
}

pub type RewardCallback = Box<dyn FnMut(f64)>;

/// Game controller: owns the snake and the apple and advances the simulation.
pub struct Game {
    config: GameConfig,
    snake: Snake,
    apple: Apple,
    dir: Dir,
    status: GameStatus,
    score: u32,
    high_score: u32,
    speed: u32,
    last_reward: f64,
    last_outcome: Option<TickOutcome>,
    rng: SmallRng,
    reward_callback: Option<RewardCallback>,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("config", &self.config)
            .field("snake", &self.snake)
            .field("apple", &self.apple)
            .field("dir", &self.dir)
            .field("status", &self.status)
            .field("score", &self.score)
            .field("high_score", &self.high_score)
            .field("last_reward", &self.last_reward)
            .finish_non_exhaustive()
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: SmallRng) -> Self {
        let grid = config.grid();
        let mut g = Self {
            config,
            snake: Snake::new(grid),
            apple: Apple::new(grid),
            dir: Dir::Right,
            status: GameStatus::Playing,
            score: 0,
            high_score: 0,
            speed: 1,
            last_reward: RewardConfig::NO_REWARD,
            last_outcome: None,
            rng,
            reward_callback: None,
        };
        g.reset();
        g
    }

    /// Reseed apple placement. Takes effect from the next placement.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Start a new episode. The high score is kept.
    pub fn reset(&mut self) {
        self.snake.reset();
        self.place_apple();
        self.status = GameStatus::Playing;
        self.score = 0;
        self.dir = Dir::Right;
        self.last_reward = RewardConfig::NO_REWARD;
        self.last_outcome = None;
    }

    /// Advance one tick if playing; otherwise do nothing.
    pub fn step(&mut self) {
        if self.status == GameStatus::Playing {
            self.update_game_logic();
        }
    }

    /// Queue `dir` and tick. Returns whether the game is still playing; no tick
    /// happens unless the game is playing.
    pub fn perform_action(&mut self, dir: Dir) -> bool {
        if self.status != GameStatus::Playing {
            return false;
        }
        self.set_direction(dir);
        self.update_game_logic();
        self.status == GameStatus::Playing
    }

    /// Reversals into the neck and `Dir::None` are ignored.
    pub fn set_direction(&mut self, dir: Dir) {
        if dir == Dir::None || self.dir.is_opposite(dir) {
            return;
        }
        self.dir = dir;
    }

    pub fn direction(&self) -> Dir {
        self.dir
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Game over is terminal: only [`Game::reset`] leaves it.
    pub fn set_status(&mut self, status: GameStatus) {
        if self.status != GameStatus::GameOver {
            self.status = status;
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.status == GameStatus::GameOver
    }

    /// PLAYING <-> PAUSED; any other state is left alone.
    pub fn toggle_pause(&mut self) {
        self.status = match self.status {
            GameStatus::Playing => GameStatus::Paused,
            GameStatus::Paused => GameStatus::Playing,
            other => other,
        };
    }

    /// Ignored once the game is over.
    pub fn show_help(&mut self) {
        if self.status != GameStatus::GameOver {
            self.status = GameStatus::Help;
        }
    }

    pub fn hide_help(&mut self) {
        if self.status == GameStatus::Help {
            self.status = GameStatus::Playing;
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn update_high_score(&mut self) {
        self.high_score = self.high_score.max(self.score);
    }

    pub fn game_speed(&self) -> u32 {
        self.speed
    }

    pub fn set_game_speed(&mut self, speed: u32) {
        self.speed = speed.max(1);
    }

    /// Reward assigned by the last tick.
    pub fn reward(&self) -> f64 {
        self.last_reward
    }

    pub fn last_outcome(&self) -> Option<TickOutcome> {
        self.last_outcome
    }

    pub fn rewards(&self) -> RewardConfig {
        self.config.rewards
    }

    pub fn set_rewards(&mut self, rewards: RewardConfig) {
        self.config.rewards = rewards;
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn grid(&self) -> Grid {
        self.snake.grid()
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn apple(&self) -> &Apple {
        &self.apple
    }

    /// Test and scripting hook: replace the snake and apple in place.
    pub fn set_scene(&mut self, snake: Snake, apple: Apple) {
        self.snake = snake;
        self.apple = apple;
    }

    pub fn register_reward_callback(&mut self, callback: impl FnMut(f64) + 'static) {
        self.reward_callback = Some(Box::new(callback));
    }

    /// Normalised feature vector of length [`STATE_SIZE`].
    pub fn state_vector(&self) -> Vec<f64> {
        let grid = self.grid();
        let (w, h) = (f64::from(grid.width), f64::from(grid.height));
        let (half_w, half_h) = (f64::from(grid.width / 2), f64::from(grid.height / 2));
        let head = self.snake.head();
        let apple = self.apple.position();
        let (hx, hy) = (f64::from(head.x), f64::from(head.y));

        let mut state = Vec::with_capacity(STATE_SIZE);
        state.extend([hx / w, hy / h]);
        state.extend([f64::from(apple.x) / w, f64::from(apple.y) / h]);
        let current = self.dir.index();
        state.extend((0..4).map(|i| if current == Some(i) { 1.0 } else { 0.0 }));
        state.extend([
            (hx + half_w) / w,
            (half_w - hx) / w,
            (hy + half_h) / h,
            (half_h - hy) / h,
        ]);
        state.extend(Dir::MOVES.iter().map(|&d| {
            if self.snake.occupies(grid.wrap(head.offset(d))) {
                1.0
            } else {
                0.0
            }
        }));
        state.push(self.snake.len() as f64 / grid.area() as f64);
        debug_assert_eq!(state.len(), STATE_SIZE);
        state
    }

    /// Hand the current frame to a renderer. The help overlay replaces the
    /// board; the other overlays are drawn over it.
    pub fn render(&self, renderer: &mut dyn Renderer) {
        renderer.clear();
        if self.status == GameStatus::Help {
            renderer.draw_help();
        } else {
            renderer.draw_snake(&self.snake, self.dir);
            renderer.draw_apple(&self.apple);
            renderer.draw_score(self.score, self.high_score);
            match self.status {
                GameStatus::Paused => renderer.draw_paused(),
                GameStatus::GameOver => renderer.draw_game_over(),
                _ => {}
            }
        }
        renderer.present();
    }

    fn place_apple(&mut self) {
        let occupied = self.snake.occupied_positions();
        self.apple
            .generate_new_position(self.grid(), &occupied, &mut self.rng);
    }

    fn update_game_logic(&mut self) {
        let moved = self.snake.move_head(self.dir);

        if !moved || self.snake.check_self_collision() {
            self.status = GameStatus::GameOver;
            self.update_high_score();
            debug!(score = self.score, "snake collided with itself");
            self.assign_reward(TickOutcome::Collision);
            return;
        }

        if self.apple.is_at(self.snake.head()) {
            self.score += 1;
            self.snake.grow();
            self.place_apple();
            self.assign_reward(TickOutcome::AppleEaten);
        } else {
            self.assign_reward(TickOutcome::Moved);
        }
    }

    fn assign_reward(&mut self, outcome: TickOutcome) {
        let rewards = self.config.rewards;
        self.last_reward = match outcome {
            TickOutcome::Collision => rewards.collision,
            TickOutcome::AppleEaten => rewards.apple,
            TickOutcome::Moved => rewards.time_penalty,
        };
        self.last_outcome = Some(outcome);
        if let Some(callback) = self.reward_callback.as_mut() {
            callback(self.last_reward);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::Pos;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn game() -> Game {
        Game::with_seed(GameConfig::default(), 42)
    }

    #[test]
    fn test_reset() {
        let g = game();
        assert_eq!(g.status(), GameStatus::Playing);
        assert_eq!(g.score(), 0);
        assert_eq!(g.direction(), Dir::Right);
        assert_eq!(g.snake().len(), 2);
        assert!(!g.snake().occupies(g.apple().position()));
    }

    #[test]
    fn test_time_penalty_on_plain_move() {
        let mut g = game();
        g.set_scene(Snake::new(g.grid()), Apple::at(Pos::new(-3, -3)));
        g.step();
        assert_eq!(g.reward(), -1.0);
        assert_eq!(g.last_outcome(), Some(TickOutcome::Moved));
        assert_eq!(g.snake().head(), Pos::new(1, 0));
        assert_eq!(g.snake().len(), 2);
    }

    #[test]
    fn test_apple_eaten() {
        let mut g = game();
        g.set_scene(Snake::new(g.grid()), Apple::at(Pos::new(1, 0)));
        g.step();
        assert_eq!(g.reward(), 10.0);
        assert_eq!(g.score(), 1);
        assert_eq!(g.snake().len(), 3);
        assert!(!g.snake().occupies(g.apple().position()));
        assert_eq!(g.status(), GameStatus::Playing);
    }

    #[test]
    fn test_collision_ends_game() {
        let mut g = game();
        let grid = g.grid();
        // Head at (1,1) heading down into (1,0), which is part of the body.
        let body = [Pos::new(1, 1), Pos::new(0, 1), Pos::new(0, 0), Pos::new(1, 0), Pos::new(2, 0)];
        g.set_scene(Snake::from_body(grid, body), Apple::at(Pos::new(-4, -4)));
        g.set_direction(Dir::Down);
        g.step();
        assert_eq!(g.status(), GameStatus::GameOver);
        assert_eq!(g.reward(), -100.0);
        assert!(g.is_game_over());

        // Game over is terminal until reset.
        let before = g.snake().clone();
        g.step();
        assert_eq!(g.snake(), &before);
        assert!(!g.perform_action(Dir::Up));
    }

    #[test]
    fn test_high_score_survives_reset() {
        let mut g = game();
        g.set_scene(Snake::new(g.grid()), Apple::at(Pos::new(1, 0)));
        g.step();
        assert_eq!(g.score(), 1);

        let body = [Pos::new(1, 1), Pos::new(0, 1), Pos::new(0, 0), Pos::new(1, 0), Pos::new(2, 0)];
        g.set_scene(Snake::from_body(g.grid(), body), Apple::at(Pos::new(-4, -4)));
        g.set_direction(Dir::Down);
        g.step();
        assert!(g.is_game_over());
        assert_eq!(g.high_score(), 1);
        g.reset();
        assert_eq!(g.score(), 0);
        assert_eq!(g.high_score(), 1);
    }

    #[test]
    fn test_reversal_is_ignored() {
        let mut g = game();
        assert_eq!(g.direction(), Dir::Right);
        g.set_direction(Dir::Left);
        assert_eq!(g.direction(), Dir::Right);
        g.set_direction(Dir::Up);
        assert_eq!(g.direction(), Dir::Up);
        g.set_direction(Dir::None);
        assert_eq!(g.direction(), Dir::Up);
    }

    #[test]
    fn test_pause_and_help_block_ticks() {
        let mut g = game();
        let head = g.snake().head();
        g.toggle_pause();
        assert_eq!(g.status(), GameStatus::Paused);
        g.step();
        assert_eq!(g.snake().head(), head);
        g.toggle_pause();
        assert_eq!(g.status(), GameStatus::Playing);

        g.show_help();
        g.step();
        assert_eq!(g.snake().head(), head);
        g.toggle_pause();
        assert_eq!(g.status(), GameStatus::Help);
        g.hide_help();
        assert_eq!(g.status(), GameStatus::Playing);
    }

    #[test]
    fn test_game_over_survives_help_and_status_changes() {
        let mut g = game();
        let grid = g.grid();
        let body = [Pos::new(1, 1), Pos::new(0, 1), Pos::new(0, 0), Pos::new(1, 0), Pos::new(2, 0)];
        g.set_scene(Snake::from_body(grid, body), Apple::at(Pos::new(-4, -4)));
        g.set_direction(Dir::Down);
        g.step();
        assert_eq!(g.status(), GameStatus::GameOver);

        g.show_help();
        g.hide_help();
        assert_eq!(g.status(), GameStatus::GameOver);
        g.set_status(GameStatus::Playing);
        assert_eq!(g.status(), GameStatus::GameOver);

        let head = g.snake().head();
        g.step();
        assert_eq!(g.snake().head(), head);

        g.reset();
        assert_eq!(g.status(), GameStatus::Playing);
    }

    #[test]
    fn test_reward_callback_sees_every_tick() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut g = game();
        g.register_reward_callback(move |r| sink.borrow_mut().push(r));
        g.set_scene(Snake::new(g.grid()), Apple::at(Pos::new(2, 0)));
        g.step();
        g.step();
        assert_eq!(*seen.borrow(), vec![-1.0, 10.0]);
    }

    #[test]
    fn test_custom_rewards_are_used() {
        let mut config = GameConfig::default();
        config.rewards = RewardConfig::new(1.0, -5.0, -0.1);
        let mut g = Game::with_seed(config, 3);
        g.set_scene(Snake::new(g.grid()), Apple::at(Pos::new(1, 0)));
        g.step();
        assert_eq!(g.reward(), 1.0);
        g.set_scene(Snake::new(g.grid()), Apple::at(Pos::new(-4, 4)));
        g.step();
        assert_eq!(g.reward(), -0.1);
    }

    #[test]
    fn test_state_vector_layout() {
        let mut g = game();
        g.set_scene(Snake::new(g.grid()), Apple::at(Pos::new(2, -3)));
        let s = g.state_vector();
        assert_eq!(s.len(), STATE_SIZE);
        assert_eq!(&s[0..4], &[0.0, 0.0, 0.2, -0.3]);
        assert_eq!(&s[4..8], &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(&s[8..12], &[0.5, 0.5, 0.5, 0.5]);
        // Only the cell to the left of the head is occupied.
        assert_eq!(&s[12..16], &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(s[16], 0.02);
        assert!(s.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_game_speed_floor() {
        let mut g = game();
        g.set_game_speed(0);
        assert_eq!(g.game_speed(), 1);
        g.set_game_speed(4);
        assert_eq!(g.game_speed(), 4);
    }
}
