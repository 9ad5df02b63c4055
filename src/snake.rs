use crate::pos::{Dir, Grid, Pos};
use ahash::AHashSet;
use std::collections::VecDeque;

/// The snake body, head first.
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    grid: Grid,
    body: VecDeque<Pos>,
}

impl Snake {
    /// A fresh two-segment snake: head at the origin, tail one cell to its left.
    pub fn new(grid: Grid) -> Self {
        let mut snake = Self {
            grid,
            body: VecDeque::with_capacity(grid.area()),
        };
        snake.reset();
        snake
    }

    /// Build a snake from explicit segments (head first). Segments are wrapped
    /// onto the board but otherwise taken as given, duplicates included.
    pub fn from_body(grid: Grid, body: impl IntoIterator<Item = Pos>) -> Self {
        Self {
            grid,
            body: body.into_iter().map(|p| grid.wrap(p)).collect(),
        }
    }

    pub fn reset(&mut self) {
        self.body.clear();
        self.body.push_back(Pos::new(0, 0));
        self.body.push_back(self.grid.wrap(Pos::new(-1, 0)));
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Prepend the wrapped next head and drop the tail. Returns `false` only
    /// when the body is empty.
    pub fn move_head(&mut self, dir: Dir) -> bool {
        let Some(&head) = self.body.front() else {
            return false;
        };
        self.body.push_front(self.grid.wrap(head.offset(dir)));
        self.body.pop_back();
        true
    }

    /// Append one segment past the tail, continuing the direction of the last
    /// two segments. Called after `move_head`, so the net effect is +1 length.
    pub fn grow(&mut self) {
        let n = self.body.len();
        let new_tail = match n {
            0 => return,
            1 => {
                let only = self.body[0];
                Pos::new(only.x - 1, only.y)
            }
            _ => {
                let last = self.body[n - 1];
                let before = self.body[n - 2];
                Pos::new(2 * last.x - before.x, 2 * last.y - before.y)
            }
        };
        self.body.push_back(self.grid.wrap(new_tail));
    }

    pub fn check_self_collision(&self) -> bool {
        let mut segments = self.body.iter();
        match segments.next() {
            Some(head) => segments.any(|p| p == head),
            None => false,
        }
    }

    pub fn occupies(&self, p: Pos) -> bool {
        self.body.contains(&p)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Head position; the origin for an (unreachable) empty body.
    pub fn head(&self) -> Pos {
        self.body.front().copied().unwrap_or(Pos::new(0, 0))
    }

    pub fn body(&self) -> &VecDeque<Pos> {
        &self.body
    }

    pub fn available_positions(&self) -> AHashSet<Pos> {
        self.grid.cells().filter(|&p| !self.occupies(p)).collect()
    }

    pub fn occupied_positions(&self) -> AHashSet<Pos> {
        self.body.iter().copied().collect()
    }
}
