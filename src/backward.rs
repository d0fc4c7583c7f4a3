use crate::error::Result;
use crate::math::{log_sum_exp, max_value, Lattice, LOG_ZERO};
use crate::params::ParameterSet;

/// Result of a backward pass.
#[derive(Clone, Debug)]
pub struct BackwardPass {
    /// `beta[(t, i)] = ln P(o_{t+1}..o_{T-1} | state_t = i)`.
    pub beta: Lattice<f64>,
    /// `ln P(O)`, terminated with Pi and the first emission.
    pub log_likelihood: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct BackwardEngine<'a> {
    params: &'a ParameterSet,
}

impl<'a> BackwardEngine<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params }
    }

    pub fn compute(&self, observations: &[usize]) -> Result<BackwardPass> {
        let mut beta = Lattice::new(0, 0, LOG_ZERO);
        let log_likelihood = self.compute_into(observations, &mut beta)?;
        Ok(BackwardPass {
            beta,
            log_likelihood,
        })
    }

    /// Fills a caller-owned beta lattice over the whole sequence and returns
    /// `ln sum_i Pi[i] * B[i][o_0] * beta[0][i]`.
    pub fn compute_into(&self, observations: &[usize], beta: &mut Lattice<f64>) -> Result<f64> {
        self.params.check_observations(observations)?;

        let n = self.params.n_states();
        let t_len = observations.len();
        let pi = self.params.pi();
        let a = self.params.a();
        let b = self.params.b();

        beta.reshape(t_len, n, LOG_ZERO);
        beta.row_mut(t_len - 1).fill(0.0);

        let mut terms = vec![LOG_ZERO; n];
        for t in (0..t_len - 1).rev() {
            let symbol = observations[t + 1];
            for i in 0..n {
                for j in 0..n {
                    terms[j] = a[[i, j]] + b[[j, symbol]] + beta[(t + 1, j)];
                }
                beta[(t, i)] = log_sum_exp(&terms, max_value(&terms));
            }
        }

        for i in 0..n {
            terms[i] = pi[i] + b[[i, observations[0]]] + beta[(0, i)];
        }
        Ok(log_sum_exp(&terms, max_value(&terms)))
    }
}
