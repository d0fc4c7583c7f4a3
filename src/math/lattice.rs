//! Row-major (time, state) working table for the dynamic-programming passes.

use std::ops::{Index, IndexMut};

use ndarray::{Array2, ArrayView1, ArrayViewMut1};

use crate::error::{HmmError, Result};

/// A `T x N` table addressed as `(t, state)`.
///
/// Used for alpha, beta, delta, gamma (`f64`) and for Viterbi backpointers
/// (`Option<usize>`, `None` marking the start of a path).
#[derive(Clone, Debug, PartialEq)]
pub struct Lattice<T> {
    cells: Array2<T>,
}

impl<T: Clone> Lattice<T> {
    pub fn new(n_steps: usize, n_states: usize, fill: T) -> Self {
        Self {
            cells: Array2::from_elem((n_steps, n_states), fill),
        }
    }

    /// Resizes to `(n_steps, n_states)` and overwrites every cell with `fill`.
    ///
    /// The allocation is kept when the shape is unchanged, so a lattice can be
    /// reused across sequences of equal length without stale values leaking.
    pub fn reshape(&mut self, n_steps: usize, n_states: usize, fill: T) {
        if self.cells.dim() == (n_steps, n_states) {
            self.cells.fill(fill);
        } else {
            self.cells = Array2::from_elem((n_steps, n_states), fill);
        }
    }

    pub fn get(&self, t: usize, state: usize) -> Result<T> {
        self.cells
            .get((t, state))
            .cloned()
            .ok_or_else(|| self.out_of_bounds(t, state))
    }

    pub fn set(&mut self, t: usize, state: usize, value: T) -> Result<()> {
        if t >= self.n_steps() || state >= self.n_states() {
            return Err(self.out_of_bounds(t, state));
        }
        self.cells[[t, state]] = value;
        Ok(())
    }
}

impl<T> Lattice<T> {
    pub fn n_steps(&self) -> usize {
        self.cells.nrows()
    }

    pub fn n_states(&self) -> usize {
        self.cells.ncols()
    }

    pub fn row(&self, t: usize) -> ArrayView1<'_, T> {
        self.cells.row(t)
    }

    pub fn row_mut(&mut self, t: usize) -> ArrayViewMut1<'_, T> {
        self.cells.row_mut(t)
    }

    pub fn as_array(&self) -> &Array2<T> {
        &self.cells
    }

    pub fn into_array(self) -> Array2<T> {
        self.cells
    }

    fn out_of_bounds(&self, t: usize, state: usize) -> HmmError {
        if t >= self.n_steps() {
            HmmError::InvalidIndex {
                index: t,
                len: self.n_steps(),
            }
        } else {
            HmmError::StateOutOfRange {
                state,
                n_states: self.n_states(),
            }
        }
    }
}

impl<T> Index<(usize, usize)> for Lattice<T> {
    type Output = T;

    fn index(&self, (t, state): (usize, usize)) -> &T {
        &self.cells[[t, state]]
    }
}

impl<T> IndexMut<(usize, usize)> for Lattice<T> {
    fn index_mut(&mut self, (t, state): (usize, usize)) -> &mut T {
        &mut self.cells[[t, state]]
    }
}
