use crate::error::{HmmError, Result};
use crate::math::{Lattice, LOG_ZERO};
use crate::params::ParameterSet;

/// Most probable state path for an observation prefix.
#[derive(Clone, Debug)]
pub struct ViterbiPath {
    /// `ln P(o_0..o_up_to, path)` of the returned path.
    pub log_prob: f64,
    /// State ids for `t = 0..=up_to`.
    pub states: Vec<usize>,
    pub delta: Lattice<f64>,
    /// Backpointers; row 0 is all `None`.
    pub psi: Lattice<Option<usize>>,
}

#[derive(Clone, Copy, Debug)]
pub struct ViterbiDecoder<'a> {
    params: &'a ParameterSet,
}

impl<'a> ViterbiDecoder<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params }
    }

    /// Decodes the full sequence.
    pub fn decode_all(&self, observations: &[usize]) -> Result<ViterbiPath> {
        let last = observations.len().saturating_sub(1);
        self.decode(observations, last)
    }

    /// Decodes `observations[..=up_to]`.
    ///
    /// Ties resolve to the lowest state id, so the output is reproducible for
    /// fixed parameters.
    pub fn decode(&self, observations: &[usize], up_to: usize) -> Result<ViterbiPath> {
        self.params.check_observations(observations)?;
        if up_to >= observations.len() {
            return Err(HmmError::InvalidIndex {
                index: up_to,
                len: observations.len(),
            });
        }

        let n = self.params.n_states();
        let pi = self.params.pi();
        let a = self.params.a();
        let b = self.params.b();

        let mut delta = Lattice::new(observations.len(), n, LOG_ZERO);
        let mut psi: Lattice<Option<usize>> = Lattice::new(observations.len(), n, None);

        for i in 0..n {
            delta[(0, i)] = pi[i] + b[[i, observations[0]]];
        }

        for t in 1..=up_to {
            let symbol = observations[t];
            for j in 0..n {
                let (best_state, best_score) =
                    argmax((0..n).map(|i| delta[(t - 1, i)] + a[[i, j]]));
                delta[(t, j)] = best_score + b[[j, symbol]];
                psi[(t, j)] = Some(best_state);
            }
        }

        let (last_state, log_prob) = argmax(delta.row(up_to).iter().copied());

        let mut states = vec![0; up_to + 1];
        states[up_to] = last_state;
        for t in (0..up_to).rev() {
            states[t] = psi[(t + 1, states[t + 1])].unwrap_or(0);
        }

        Ok(ViterbiPath {
            log_prob,
            states,
            delta,
            psi,
        })
    }
}

// First index holding the maximum wins; an all `-inf` input yields index 0.
fn argmax(scores: impl Iterator<Item = f64>) -> (usize, f64) {
    let mut best = (0, LOG_ZERO);
    for (idx, score) in scores.enumerate() {
        if idx == 0 || score > best.1 {
            best = (idx, score);
        }
    }
    best
}
