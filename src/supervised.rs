//! Frequency-count estimation from fully labeled `(state, symbol)` sequences.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{HmmError, Result};
use crate::math::{ln_normalize_rows, LOG_ZERO};
use crate::params::ParameterSet;

/// How the initial-state vector is estimated. Counting adjacent pairs does not
/// determine Pi, so the caller picks one of these explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PiEstimate {
    /// `1 / N` for every state.
    Uniform,
    /// All mass on the state of the first labeled pair.
    FirstState,
    /// Relative frequency of each state over the whole sequence.
    StateFrequency,
}

#[derive(Clone, Copy, Debug)]
pub struct SupervisedTrainer {
    n_states: usize,
    n_symbols: usize,
    pi_estimate: PiEstimate,
}

impl SupervisedTrainer {
    pub fn new(n_states: usize, n_symbols: usize, pi_estimate: PiEstimate) -> Self {
        Self {
            n_states,
            n_symbols,
            pi_estimate,
        }
    }

    /// Counts transitions and emissions in `labeled` and row-normalizes them.
    ///
    /// Pairs never seen get `-inf`; there is no smoothing. A state that never
    /// transitions anywhere ends up with an all `-inf` row in A.
    pub fn train(&self, labeled: &[(usize, usize)]) -> Result<ParameterSet> {
        if labeled.is_empty() {
            return Err(HmmError::EmptySequence);
        }
        if self.n_states == 0 || self.n_symbols == 0 {
            return Err(HmmError::MalformedModel(format!(
                "cannot train a model with {} states and {} symbols",
                self.n_states, self.n_symbols
            )));
        }
        for &(state, symbol) in labeled {
            if state >= self.n_states {
                return Err(HmmError::StateOutOfRange {
                    state,
                    n_states: self.n_states,
                });
            }
            if symbol >= self.n_symbols {
                return Err(HmmError::SymbolOutOfRange {
                    symbol,
                    n_symbols: self.n_symbols,
                });
            }
        }

        let mut transitions = Array2::<f64>::zeros((self.n_states, self.n_states));
        let mut emissions = Array2::<f64>::zeros((self.n_states, self.n_symbols));
        let mut visits = Array1::<f64>::zeros(self.n_states);

        let (first_state, first_symbol) = labeled[0];
        emissions[[first_state, first_symbol]] += 1.0;
        visits[first_state] += 1.0;
        for pair in labeled.windows(2) {
            let (prev_state, _) = pair[0];
            let (state, symbol) = pair[1];
            transitions[[prev_state, state]] += 1.0;
            emissions[[state, symbol]] += 1.0;
            visits[state] += 1.0;
        }

        let (a, idle_states) = ln_normalize_rows(&transitions);
        if !idle_states.is_empty() {
            tracing::warn!(states = ?idle_states, "states with no outgoing transitions");
        }
        let (b, unseen_states) = ln_normalize_rows(&emissions);
        if !unseen_states.is_empty() {
            tracing::warn!(states = ?unseen_states, "states never observed in training data");
        }

        let pi = match self.pi_estimate {
            PiEstimate::Uniform => Array1::from_elem(self.n_states, -(self.n_states as f64).ln()),
            PiEstimate::FirstState => {
                let mut pi = Array1::from_elem(self.n_states, LOG_ZERO);
                pi[first_state] = 0.0;
                pi
            }
            PiEstimate::StateFrequency => {
                let total = (labeled.len() as f64).ln();
                visits.mapv(|c| if c > 0.0 { c.ln() - total } else { LOG_ZERO })
            }
        };

        tracing::trace!(
            pairs = labeled.len(),
            n_states = self.n_states,
            n_symbols = self.n_symbols,
            "supervised estimate complete"
        );
        ParameterSet::new(pi, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn repeating_pattern() -> Vec<(usize, usize)> {
        // States A,A,B,B repeating; A emits 0/1, B emits 2.
        let mut seq = Vec::new();
        for _ in 0..25 {
            seq.extend_from_slice(&[(0, 0), (0, 1), (1, 2), (1, 2)]);
        }
        seq
    }

    #[test]
    fn recovers_even_transition_probabilities() {
        let params = SupervisedTrainer::new(2, 3, PiEstimate::Uniform)
            .train(&repeating_pattern())
            .unwrap();
        let (_, a, _) = params.to_linear();
        // 100 pairs give 99 transitions: A->A 25, A->B 25, B->B 25, B->A 24.
        assert_abs_diff_eq!(a[[0, 0]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(a[[0, 1]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(a[[1, 1]], 25.0 / 49.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a[[1, 0]], 24.0 / 49.0, epsilon = 1e-12);
    }

    #[test]
    fn exact_halves_on_closed_cycle() {
        // Closing the cycle with a final A makes every count equal.
        let mut seq = repeating_pattern();
        seq.push((0, 0));
        let params = SupervisedTrainer::new(2, 3, PiEstimate::Uniform)
            .train(&seq)
            .unwrap();
        let (_, a, _) = params.to_linear();
        for &(i, j) in &[(0, 0), (0, 1), (1, 1), (1, 0)] {
            assert_abs_diff_eq!(a[[i, j]], 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn unseen_pairs_are_zero_probability() {
        let params = SupervisedTrainer::new(2, 3, PiEstimate::Uniform)
            .train(&repeating_pattern())
            .unwrap();
        assert_eq!(params.b()[[0, 2]], LOG_ZERO);
        assert_eq!(params.b()[[1, 0]], LOG_ZERO);
        assert_abs_diff_eq!(params.b()[[1, 2]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(params.b()[[0, 0]].exp(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn pi_follows_requested_rule() {
        let seq = vec![(1, 0), (0, 0), (0, 1), (0, 1)];

        let uniform = SupervisedTrainer::new(2, 2, PiEstimate::Uniform)
            .train(&seq)
            .unwrap();
        assert_abs_diff_eq!(uniform.pi()[0].exp(), 0.5, epsilon = 1e-12);

        let first = SupervisedTrainer::new(2, 2, PiEstimate::FirstState)
            .train(&seq)
            .unwrap();
        assert_eq!(first.pi()[0], LOG_ZERO);
        assert_eq!(first.pi()[1], 0.0);

        let freq = SupervisedTrainer::new(2, 2, PiEstimate::StateFrequency)
            .train(&seq)
            .unwrap();
        assert_abs_diff_eq!(freq.pi()[0].exp(), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(freq.pi()[1].exp(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn rejects_ids_outside_the_model() {
        let trainer = SupervisedTrainer::new(2, 2, PiEstimate::Uniform);
        assert!(matches!(
            trainer.train(&[(0, 0), (2, 1)]),
            Err(HmmError::StateOutOfRange { state: 2, .. })
        ));
        assert!(matches!(
            trainer.train(&[(0, 5)]),
            Err(HmmError::SymbolOutOfRange { symbol: 5, .. })
        ));
        assert!(matches!(trainer.train(&[]), Err(HmmError::EmptySequence)));
    }
}
