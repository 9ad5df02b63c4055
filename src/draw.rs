//! Rendering collaborators.
//!
//! The game hands each frame to a [`Renderer`]; nothing in the simulation
//! depends on how (or whether) it is drawn.

use crate::apple::Apple;
use crate::pos::{Dir, Grid, Pos};
use crate::snake::Snake;

pub trait Renderer {
    fn clear(&mut self);
    /// Body is head first; `dir` is the current heading of the head.
    fn draw_snake(&mut self, snake: &Snake, dir: Dir);
    fn draw_apple(&mut self, apple: &Apple);
    fn draw_score(&mut self, score: u32, high_score: u32);
    fn draw_paused(&mut self);
    fn draw_game_over(&mut self);
    fn draw_help(&mut self);
    fn present(&mut self);
}

/// Draws nothing. Used for training.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessRenderer;

impl Renderer for HeadlessRenderer {
    fn clear(&mut self) {}
    fn draw_snake(&mut self, _snake: &Snake, _dir: Dir) {}
    fn draw_apple(&mut self, _apple: &Apple) {}
    fn draw_score(&mut self, _score: u32, _high_score: u32) {}
    fn draw_paused(&mut self) {}
    fn draw_game_over(&mut self) {}
    fn draw_help(&mut self) {}
    fn present(&mut self) {}
}

const EMPTY: char = '·';
const APPLE: char = '●';
const BODY: char = '■';

const HELP_TEXT: [&str; 5] = [
    "Controls:",
    "  ↑/W Up  │ ↓/S Down │ ←/A Left │ →/D Right",
    "  P Pause │ R Restart │ H Help │ Esc Quit",
    "Eat apples to grow. The board wraps around;",
    "running into your own body ends the game.",
];

/// Plain-text renderer. Each presented frame is kept in [`ConsoleRenderer::frame`]
/// and optionally echoed to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleRenderer {
    grid: Grid,
    cells: Vec<Vec<char>>,
    footer: Vec<String>,
    overlay: Option<&'static str>,
    help: bool,
    frame: String,
    echo: bool,
}

impl ConsoleRenderer {
    pub fn new(grid: Grid) -> Self {
        let mut r = Self {
            grid,
            cells: Vec::new(),
            footer: Vec::new(),
            overlay: None,
            help: false,
            frame: String::new(),
            echo: false,
        };
        r.clear();
        r
    }

    /// Print every presented frame.
    pub fn stdout(grid: Grid) -> Self {
        Self {
            echo: true,
            ..Self::new(grid)
        }
    }

    /// The last presented frame.
    pub fn frame(&self) -> &str {
        &self.frame
    }

    fn cell_mut(&mut self, p: Pos) -> Option<&mut char> {
        if !self.grid.is_valid(p) {
            return None;
        }
        // Row 0 is the top of the board (largest y).
        let row = (self.grid.max_y() - 1 - p.y) as usize;
        let col = (p.x - self.grid.min_x()) as usize;
        self.cells.get_mut(row)?.get_mut(col)
    }

    fn head_char(dir: Dir) -> char {
        match dir {
            Dir::Up => '▲',
            Dir::Down => '▼',
            Dir::Left => '◄',
            Dir::Right => '►',
            Dir::None => '◆',
        }
    }
}

impl Renderer for ConsoleRenderer {
    fn clear(&mut self) {
        let (w, h) = (self.grid.width.max(0) as usize, self.grid.height.max(0) as usize);
        self.cells = vec![vec![EMPTY; w]; h];
        self.footer.clear();
        self.overlay = None;
        self.help = false;
    }

    fn draw_snake(&mut self, snake: &Snake, dir: Dir) {
        // Tail first so the head wins on overlap.
        for &p in snake.body().iter().skip(1).rev() {
            if let Some(c) = self.cell_mut(p) {
                *c = BODY;
            }
        }
        if !snake.is_empty() {
            if let Some(c) = self.cell_mut(snake.head()) {
                *c = Self::head_char(dir);
            }
        }
    }

    fn draw_apple(&mut self, apple: &Apple) {
        if let Some(c) = self.cell_mut(apple.position()) {
            if *c == EMPTY {
                *c = APPLE;
            }
        }
    }

    fn draw_score(&mut self, score: u32, high_score: u32) {
        self.footer.push(format!("Score: {score}  │  High score: {high_score}"));
    }

    fn draw_paused(&mut self) {
        self.overlay = Some("PAUSED");
    }

    fn draw_game_over(&mut self) {
        self.overlay = Some("GAME OVER");
    }

    fn draw_help(&mut self) {
        self.help = true;
    }

    fn present(&mut self) {
        let mut lines = Vec::with_capacity(self.cells.len() + 8);
        if self.help {
            lines.extend(HELP_TEXT.iter().map(|l| l.to_string()));
        } else {
            let width = self.cells.first().map_or(0, Vec::len);
            lines.push(format!("╔{}╗", "═".repeat(width)));
            for row in &self.cells {
                lines.push(format!("║{}║", row.iter().collect::<String>()));
            }
            lines.push(format!("╚{}╝", "═".repeat(width)));
            lines.extend(self.footer.iter().cloned());
            if let Some(text) = self.overlay {
                lines.push(text.to_string());
            }
        }
        self.frame = lines.join("\n");
        if self.echo {
            println!("{}\n", self.frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::Game;

    #[test]
    fn test_console_frame_shows_entities() {
        let grid = Grid::new(4, 4);
        let mut r = ConsoleRenderer::new(grid);
        let snake = Snake::new(grid);
        r.clear();
        r.draw_snake(&snake, Dir::Right);
        r.draw_apple(&Apple::at(Pos::new(1, 1)));
        r.draw_score(3, 7);
        r.present();

        let lines: Vec<&str> = r.frame().lines().collect();
        assert_eq!(lines[0], "╔════╗");
        // y = 1 row, apple at x = 1
        assert_eq!(lines[1], "║···●║");
        // y = 0 row: body at x = -1, head at x = 0
        assert_eq!(lines[2], "║·■►·║");
        assert_eq!(lines[5], "╚════╝");
        assert_eq!(lines[6], "Score: 3  │  High score: 7");
    }

    #[test]
    fn test_game_over_overlay() {
        let mut g = Game::with_seed(GameConfig::new(4, 4), 1);
        g.set_status(crate::game::GameStatus::GameOver);
        let mut r = ConsoleRenderer::new(g.grid());
        g.render(&mut r);
        assert!(r.frame().ends_with("GAME OVER"));
    }

    #[test]
    fn test_help_replaces_board() {
        let mut g = Game::with_seed(GameConfig::new(4, 4), 1);
        g.show_help();
        let mut r = ConsoleRenderer::new(g.grid());
        g.render(&mut r);
        assert!(r.frame().starts_with("Controls:"));
        assert!(!r.frame().contains('╔'));
    }
}
