//! Grid geometry: positions, directions and the toroidal board.
//!
//! The board is centred on the origin. For a `W x H` grid the valid
//! coordinates are `x in [-W/2, W/2 - 1]` and `y in [-H/2, H/2 - 1]`, with `y`
//! growing upwards.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Unwrapped neighbour in `dir`; `Dir::None` returns `self`.
    pub fn offset(self, dir: Dir) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Movement direction. `None` is the RL "no-op" and never moves the snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Dir {
    /// The four movement directions in action-index order.
    pub const MOVES: [Dir; 4] = [Dir::Up, Dir::Down, Dir::Left, Dir::Right];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::Up => (0, 1),
            Dir::Down => (0, -1),
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
            Dir::None => (0, 0),
        }
    }

    pub fn opposite(self) -> Dir {
        match self {
            Dir::Up => Dir::Down,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
            Dir::None => Dir::None,
        }
    }

    pub fn is_opposite(self, other: Dir) -> bool {
        self != Dir::None && self.opposite() == other
    }

    /// Action index (0..4) of a movement direction.
    pub fn index(self) -> Option<usize> {
        Self::MOVES.iter().position(|&d| d == self)
    }

    pub fn from_action(action: usize) -> Option<Dir> {
        Self::MOVES.get(action).copied()
    }
}

/// Dimensions of the toroidal board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(10, 10)
    }
}

impl Grid {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn min_x(&self) -> i32 {
        -self.width / 2
    }

    /// Exclusive upper bound on x.
    pub fn max_x(&self) -> i32 {
        self.width / 2
    }

    pub fn min_y(&self) -> i32 {
        -self.height / 2
    }

    /// Exclusive upper bound on y.
    pub fn max_y(&self) -> i32 {
        self.height / 2
    }

    pub fn area(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    pub fn is_valid(&self, p: Pos) -> bool {
        (self.min_x()..self.max_x()).contains(&p.x) && (self.min_y()..self.max_y()).contains(&p.y)
    }

    /// Single-step wrap: each axis may be at most one cell out of range.
    /// This is not a modulo; larger displacements are not normalised.
    pub fn wrap(&self, p: Pos) -> Pos {
        Pos::new(
            wrap_axis(p.x, self.min_x(), self.max_x()),
            wrap_axis(p.y, self.min_y(), self.max_y()),
        )
    }

    /// All cells, x-major then y.
    pub fn cells(&self) -> impl Iterator<Item = Pos> + use<> {
        let (min_y, max_y) = (self.min_y(), self.max_y());
        (self.min_x()..self.max_x()).flat_map(move |x| (min_y..max_y).map(move |y| Pos::new(x, y)))
    }
}

fn wrap_axis(v: i32, lo: i32, hi: i32) -> i32 {
    if v < lo {
        hi - 1
    } else if v >= hi {
        lo
    } else {
        v
    }
}
