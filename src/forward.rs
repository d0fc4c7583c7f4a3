use crate::error::{HmmError, Result};
use crate::math::{log_sum_exp, max_value, Lattice, LOG_ZERO};
use crate::params::ParameterSet;

/// Result of a forward pass.
#[derive(Clone, Debug)]
pub struct ForwardPass {
    /// `alpha[(t, j)] = ln P(o_0..o_t, state_t = j)`; rows past `up_to` are unset.
    pub alpha: Lattice<f64>,
    pub log_likelihood: f64,
    pub up_to: usize,
}

/// Forward algorithm over a borrowed, read-only parameter set.
///
/// All working storage is owned by the call (or by the caller through
/// [`ForwardEngine::compute_into`]), so one `ParameterSet` can be scored
/// against from many threads at once.
#[derive(Clone, Copy, Debug)]
pub struct ForwardEngine<'a> {
    params: &'a ParameterSet,
}

impl<'a> ForwardEngine<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params }
    }

    /// Runs the forward recursion through row `up_to` and returns
    /// `ln P(o_0..o_up_to)` along with the alpha lattice.
    ///
    /// Requires `0 < up_to < observations.len()`.
    pub fn compute(&self, observations: &[usize], up_to: usize) -> Result<ForwardPass> {
        let mut alpha = Lattice::new(0, 0, LOG_ZERO);
        let log_likelihood = self.compute_into(observations, up_to, &mut alpha)?;
        Ok(ForwardPass {
            alpha,
            log_likelihood,
            up_to,
        })
    }

    /// Same as [`compute`](Self::compute) but fills a caller-owned lattice,
    /// reshaping it to `observations.len() x N`.
    pub fn compute_into(
        &self,
        observations: &[usize],
        up_to: usize,
        alpha: &mut Lattice<f64>,
    ) -> Result<f64> {
        if up_to == 0 || up_to >= observations.len() {
            return Err(HmmError::InvalidIndex {
                index: up_to,
                len: observations.len(),
            });
        }
        self.params.check_observations(observations)?;

        let n = self.params.n_states();
        let pi = self.params.pi();
        let a = self.params.a();
        let b = self.params.b();

        alpha.reshape(observations.len(), n, LOG_ZERO);
        for i in 0..n {
            alpha[(0, i)] = pi[i] + b[[i, observations[0]]];
        }

        let mut terms = vec![LOG_ZERO; n];
        for t in 1..=up_to {
            let symbol = observations[t];
            for j in 0..n {
                for i in 0..n {
                    terms[i] = alpha[(t - 1, i)] + a[[i, j]];
                }
                alpha[(t, j)] = log_sum_exp(&terms, max_value(&terms)) + b[[j, symbol]];
            }
        }

        let last = alpha.row(up_to).to_vec();
        Ok(log_sum_exp(&last, max_value(&last)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backward::BackwardEngine;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn stamp() -> ParameterSet {
        ParameterSet::from_linear(
            array![0.6, 0.4],
            array![[0.7, 0.3], [0.4, 0.6]],
            array![[0.1, 0.4, 0.5], [0.7, 0.2, 0.1]],
        )
        .unwrap()
    }

    #[test]
    fn matches_stamp_reference_probability() {
        let params = stamp();
        let engine = ForwardEngine::new(&params);
        let pass = engine.compute(&[0, 1, 0, 2], 3).unwrap();
        assert_abs_diff_eq!(pass.log_likelihood.exp(), 0.0096296, epsilon = 1e-6);
    }

    #[test]
    fn prefix_likelihood_uses_only_completed_rows() {
        let params = stamp();
        let engine = ForwardEngine::new(&params);
        let pass = engine.compute(&[0, 1, 0, 2], 1).unwrap();
        // P(o_0 = 0, o_1 = 1) summed by hand over the four two-step paths.
        let expected = 0.6 * 0.1 * (0.7 * 0.4 + 0.3 * 0.2) + 0.4 * 0.7 * (0.4 * 0.4 + 0.6 * 0.2);
        assert_abs_diff_eq!(pass.log_likelihood.exp(), expected, epsilon = 1e-12);
        assert_eq!(pass.alpha.n_steps(), 4);
        assert_eq!(pass.alpha[(3, 0)], LOG_ZERO);
    }

    #[test]
    fn rejects_out_of_range_time_index() {
        let params = stamp();
        let engine = ForwardEngine::new(&params);
        assert!(matches!(
            engine.compute(&[0, 1], 0),
            Err(HmmError::InvalidIndex { index: 0, len: 2 })
        ));
        assert!(matches!(
            engine.compute(&[0, 1], 2),
            Err(HmmError::InvalidIndex { index: 2, len: 2 })
        ));
        assert!(matches!(
            engine.compute(&[0, 7], 1),
            Err(HmmError::SymbolOutOfRange { symbol: 7, .. })
        ));
    }

    #[test]
    fn impossible_sequence_scores_negative_infinity() {
        let params = ParameterSet::from_linear(
            array![1.0, 0.0],
            array![[1.0, 0.0], [0.0, 1.0]],
            array![[1.0, 0.0], [0.0, 1.0]],
        )
        .unwrap();
        let pass = ForwardEngine::new(&params).compute(&[0, 1], 1).unwrap();
        assert_eq!(pass.log_likelihood, LOG_ZERO);
        assert!(pass.alpha.row(1).iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn reused_lattice_matches_fresh_lattice() {
        let params = stamp();
        let engine = ForwardEngine::new(&params);
        let mut alpha = Lattice::new(0, 0, LOG_ZERO);

        let longer = [2, 2, 2, 2, 2, 2];
        engine.compute_into(&longer, 5, &mut alpha).unwrap();
        let reused = engine.compute_into(&[0, 1, 0, 2], 3, &mut alpha).unwrap();
        let fresh = engine.compute(&[0, 1, 0, 2], 3).unwrap();

        assert_eq!(reused, fresh.log_likelihood);
        assert_eq!(&alpha, &fresh.alpha);
    }

    proptest! {
        #[test]
        fn forward_and_backward_agree(seed in any::<u64>(), n in 1usize..5, m in 1usize..5, len in 2usize..30) {
            let mut rng = StdRng::seed_from_u64(seed);
            let params = ParameterSet::random(n, m, &mut rng).unwrap();
            let obs: Vec<usize> = (0..len).map(|_| rng.gen_range(0..m)).collect();

            let fwd = ForwardEngine::new(&params).compute(&obs, len - 1).unwrap();
            let bwd = BackwardEngine::new(&params).compute(&obs).unwrap();

            prop_assert!((fwd.log_likelihood - bwd.log_likelihood).abs() < 1e-9);
        }
    }
}
