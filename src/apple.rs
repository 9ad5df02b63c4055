use crate::pos::{Grid, Pos};
use ahash::AHashSet;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::warn;

/// Where the apple lands when no free cell is left.
pub const FALLBACK_POSITION: Pos = Pos::new(0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Apple {
    pos: Pos,
}

impl Apple {
    /// Apple parked in the top-right cell until the first placement.
    pub fn new(grid: Grid) -> Self {
        Self {
            pos: Pos::new(grid.max_x() - 1, grid.max_y() - 1),
        }
    }

    pub fn at(pos: Pos) -> Self {
        Self { pos }
    }

    /// Draw uniformly among valid cells not in `forbidden`. A full board falls
    /// back to [`FALLBACK_POSITION`] instead of failing.
    pub fn generate_new_position<R: Rng + ?Sized>(
        &mut self,
        grid: Grid,
        forbidden: &AHashSet<Pos>,
        rng: &mut R,
    ) {
        let candidates: Vec<Pos> = grid
            .cells()
            .filter(|p| grid.is_valid(*p) && !forbidden.contains(p))
            .collect();
        self.pos = match candidates.choose(rng) {
            Some(&p) => p,
            None => {
                warn!("no free cell for the apple, falling back to {FALLBACK_POSITION:?}");
                FALLBACK_POSITION
            }
        };
    }

    pub fn is_at(&self, p: Pos) -> bool {
        self.pos == p
    }

    pub fn position(&self) -> Pos {
        self.pos
    }
}
