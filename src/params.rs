use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{HmmError, Result};

/// Model parameters `(Pi, A, B)`, all stored as natural-log probabilities.
///
/// `pi` has length `N`, `a` is `N x N` (`a[[i, j]] = ln P(j | i)`) and `b` is
/// `N x M` (`b[[i, k]] = ln P(symbol k | state i)`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterSet")]
pub struct ParameterSet {
    pi: Array1<f64>,
    a: Array2<f64>,
    b: Array2<f64>,
}

/// Unchecked wire form; deserialization goes through [`ParameterSet::new`].
#[derive(Deserialize)]
struct RawParameterSet {
    pi: Array1<f64>,
    a: Array2<f64>,
    b: Array2<f64>,
}

impl TryFrom<RawParameterSet> for ParameterSet {
    type Error = HmmError;

    fn try_from(raw: RawParameterSet) -> Result<Self> {
        Self::new(raw.pi, raw.a, raw.b)
    }
}

impl ParameterSet {
    /// Builds a parameter set from log-probabilities, checking dimensions only.
    pub fn new(pi: Array1<f64>, a: Array2<f64>, b: Array2<f64>) -> Result<Self> {
        let params = Self { pi, a, b };
        params.validate()?;
        Ok(params)
    }

    /// Builds a parameter set from linear-space probabilities.
    pub fn from_linear(pi: Array1<f64>, a: Array2<f64>, b: Array2<f64>) -> Result<Self> {
        Self::new(pi.mapv(f64::ln), a.mapv(f64::ln), b.mapv(f64::ln))
    }

    /// Uniform Pi, A and B; the default starting point for Baum-Welch.
    pub fn uniform(n_states: usize, n_symbols: usize) -> Result<Self> {
        if n_states == 0 || n_symbols == 0 {
            return Err(HmmError::MalformedModel(format!(
                "cannot build a model with {} states and {} symbols",
                n_states, n_symbols
            )));
        }
        let ln_state = -(n_states as f64).ln();
        let ln_symbol = -(n_symbols as f64).ln();
        Ok(Self {
            pi: Array1::from_elem(n_states, ln_state),
            a: Array2::from_elem((n_states, n_states), ln_state),
            b: Array2::from_elem((n_states, n_symbols), ln_symbol),
        })
    }

    /// Random row-stochastic parameters.
    pub fn random<R: Rng>(n_states: usize, n_symbols: usize, rng: &mut R) -> Result<Self> {
        let mut params = Self::uniform(n_states, n_symbols)?;
        params.pi = random_log_row(n_states, rng);
        for i in 0..n_states {
            params.a.row_mut(i).assign(&random_log_row(n_states, rng));
            params.b.row_mut(i).assign(&random_log_row(n_symbols, rng));
        }
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.pi.len();
        if n == 0 || self.a.nrows() == 0 || self.b.nrows() == 0 {
            return Err(HmmError::MalformedModel(
                "pi, state matrix, or emission matrix is empty".to_string(),
            ));
        }
        if self.a.nrows() != self.a.ncols() {
            return Err(HmmError::MalformedModel(format!(
                "state matrix is not square: {} x {}",
                self.a.nrows(),
                self.a.ncols()
            )));
        }
        if self.a.nrows() != n {
            return Err(HmmError::MalformedModel(format!(
                "|pi| != |states|: {} != {}",
                n,
                self.a.nrows()
            )));
        }
        if self.b.nrows() != n {
            return Err(HmmError::MalformedModel(format!(
                "|pi| != |emission rows|: {} != {}",
                n,
                self.b.nrows()
            )));
        }
        if self.b.ncols() == 0 {
            return Err(HmmError::MalformedModel(
                "emission matrix has no symbols".to_string(),
            ));
        }
        Ok(())
    }

    /// Empties the model so it can be reloaded or retrained from scratch.
    pub fn clear(&mut self) {
        self.pi = Array1::zeros(0);
        self.a = Array2::zeros((0, 0));
        self.b = Array2::zeros((0, 0));
    }

    pub fn is_empty(&self) -> bool {
        self.pi.is_empty()
    }

    pub fn n_states(&self) -> usize {
        self.pi.len()
    }

    pub fn n_symbols(&self) -> usize {
        self.b.ncols()
    }

    pub fn pi(&self) -> &Array1<f64> {
        &self.pi
    }

    pub fn a(&self) -> &Array2<f64> {
        &self.a
    }

    pub fn b(&self) -> &Array2<f64> {
        &self.b
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Array1<f64>, &mut Array2<f64>, &mut Array2<f64>) {
        (&mut self.pi, &mut self.a, &mut self.b)
    }

    /// Linear-space copies of `(Pi, A, B)`.
    pub fn to_linear(&self) -> (Array1<f64>, Array2<f64>, Array2<f64>) {
        (self.pi.mapv(f64::exp), self.a.mapv(f64::exp), self.b.mapv(f64::exp))
    }

    /// True when Pi and every row of A and B sum to one within `tol`.
    pub fn is_row_stochastic(&self, tol: f64) -> bool {
        sums_to_one(self.pi.view(), tol)
            && self.a.outer_iter().all(|row| sums_to_one(row, tol))
            && self.b.outer_iter().all(|row| sums_to_one(row, tol))
    }

    /// Rejects empty sequences and symbol ids outside `[0, M)`.
    pub fn check_observations(&self, observations: &[usize]) -> Result<()> {
        if observations.is_empty() {
            return Err(HmmError::EmptySequence);
        }
        let n_symbols = self.n_symbols();
        match observations.iter().find(|&&o| o >= n_symbols) {
            Some(&symbol) => Err(HmmError::SymbolOutOfRange { symbol, n_symbols }),
            None => Ok(()),
        }
    }

    /// Log-probability of `observations` jointly with one specific state path.
    pub fn path_log_prob(&self, observations: &[usize], path: &[usize]) -> Result<f64> {
        self.check_observations(observations)?;
        if path.is_empty() || path.len() > observations.len() {
            return Err(HmmError::InvalidIndex {
                index: path.len(),
                len: observations.len(),
            });
        }
        if let Some(&state) = path.iter().find(|&&s| s >= self.n_states()) {
            return Err(HmmError::StateOutOfRange {
                state,
                n_states: self.n_states(),
            });
        }

        let mut acc = self.pi[path[0]] + self.b[[path[0], observations[0]]];
        for t in 1..path.len() {
            acc += self.a[[path[t - 1], path[t]]] + self.b[[path[t], observations[t]]];
        }
        Ok(acc)
    }
}

fn sums_to_one(row: ArrayView1<'_, f64>, tol: f64) -> bool {
    (row.iter().map(|v| v.exp()).sum::<f64>() - 1.0).abs() <= tol
}

fn random_log_row<R: Rng>(len: usize, rng: &mut R) -> Array1<f64> {
    // Bounded away from zero so every entry stays finite in log space.
    let raw: Vec<f64> = (0..len).map(|_| rng.gen_range(0.05..1.0)).collect();
    let total: f64 = raw.iter().sum();
    Array1::from_iter(raw.into_iter().map(|v| (v / total).ln()))
}
