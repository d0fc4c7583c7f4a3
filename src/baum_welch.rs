//! Unsupervised re-estimation of `(Pi, A, B)` by expectation-maximization.
//!
//! One observation sequence is trained at a time. Each iteration runs the
//! forward and backward passes, builds the log-space `xi` and `gamma`
//! statistics, and re-estimates the parameters in place. The loop stops once
//! the log-likelihood improves by less than `epsilon`, after
//! `max_iterations` updates, or when the optional deadline passes.

use std::time::{Duration, Instant};

use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::backward::BackwardEngine;
use crate::error::{HmmError, Result};
use crate::forward::ForwardEngine;
use crate::math::{log_sum_exp, max_value, Lattice, LOG_ZERO};
use crate::params::ParameterSet;

/// Stopping rule for [`BaumWelchTrainer`]. Both bounds are required.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBaumWelchConfig")]
pub struct BaumWelchConfig {
    /// Stop when `|ll_k - ll_{k-1}| < epsilon`.
    pub epsilon: f64,
    /// Upper bound on the number of parameter updates.
    pub max_iterations: usize,
    pub deadline: Option<Duration>,
}

#[derive(Deserialize)]
struct RawBaumWelchConfig {
    epsilon: f64,
    max_iterations: usize,
    #[serde(default)]
    deadline: Option<Duration>,
}

impl TryFrom<RawBaumWelchConfig> for BaumWelchConfig {
    type Error = HmmError;

    fn try_from(raw: RawBaumWelchConfig) -> Result<Self> {
        let config = Self {
            epsilon: raw.epsilon,
            max_iterations: raw.max_iterations,
            deadline: raw.deadline,
        };
        config.validate()?;
        Ok(config)
    }
}

impl BaumWelchConfig {
    pub fn new(epsilon: f64, max_iterations: usize) -> Self {
        Self {
            epsilon,
            max_iterations,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(HmmError::InvalidConfig(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        if self.max_iterations == 0 {
            return Err(HmmError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Converged,
    MaxIterations,
    Deadline,
}

#[derive(Clone, Debug)]
pub struct TrainingReport {
    /// Number of parameter updates applied.
    pub iterations: usize,
    /// Log-likelihood before each update, followed by the final one.
    pub log_likelihoods: Vec<f64>,
    pub stop_reason: StopReason,
}

impl TrainingReport {
    pub fn final_log_likelihood(&self) -> f64 {
        self.log_likelihoods.last().copied().unwrap_or(LOG_ZERO)
    }

    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }
}

/// Baum-Welch trainer. Owns the alpha/beta/xi/gamma buffers and reuses them
/// across iterations and across calls with sequences of the same length.
#[derive(Clone, Debug)]
pub struct BaumWelchTrainer {
    config: BaumWelchConfig,
    alpha: Lattice<f64>,
    beta: Lattice<f64>,
    // (t, i, j) for t in 0..T-1
    xi: Array3<f64>,
    gamma: Lattice<f64>,
    scratch: Vec<f64>,
}

impl BaumWelchTrainer {
    pub fn new(config: BaumWelchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            alpha: Lattice::new(0, 0, LOG_ZERO),
            beta: Lattice::new(0, 0, LOG_ZERO),
            xi: Array3::from_elem((0, 0, 0), LOG_ZERO),
            gamma: Lattice::new(0, 0, LOG_ZERO),
            scratch: Vec::new(),
        })
    }

    pub fn config(&self) -> &BaumWelchConfig {
        &self.config
    }

    /// `ln P(state_t = i, state_{t+1} = j | O)` from the last E-step.
    pub fn xi(&self) -> &Array3<f64> {
        &self.xi
    }

    /// `ln P(state_t = i | O)` from the last E-step.
    pub fn gamma(&self) -> &Lattice<f64> {
        &self.gamma
    }

    /// Trains `params` in place on `observations` (at least two symbols).
    pub fn train(
        &mut self,
        params: &mut ParameterSet,
        observations: &[usize],
    ) -> Result<TrainingReport> {
        params.validate()?;
        params.check_observations(observations)?;
        if observations.len() < 2 {
            return Err(HmmError::InvalidIndex {
                index: 1,
                len: observations.len(),
            });
        }

        let started = Instant::now();
        let mut log_likelihoods: Vec<f64> = Vec::with_capacity(self.config.max_iterations + 1);
        let mut iterations = 0;

        let stop_reason = loop {
            let ll = self.expectation(params, observations)?;
            tracing::debug!(
                iteration = iterations,
                log_likelihood = ll,
                "baum-welch e-step"
            );

            if let Some(&prev) = log_likelihoods.last() {
                if (ll - prev).abs() < self.config.epsilon {
                    log_likelihoods.push(ll);
                    break StopReason::Converged;
                }
            }
            log_likelihoods.push(ll);

            if iterations >= self.config.max_iterations {
                break StopReason::MaxIterations;
            }
            if let Some(deadline) = self.config.deadline {
                if started.elapsed() >= deadline {
                    break StopReason::Deadline;
                }
            }

            self.maximize(params, observations);
            iterations += 1;
        };

        let report = TrainingReport {
            iterations,
            log_likelihoods,
            stop_reason,
        };
        tracing::info!(
            iterations = report.iterations,
            log_likelihood = report.final_log_likelihood(),
            reason = ?report.stop_reason,
            "baum-welch finished"
        );
        Ok(report)
    }

    /// Forward, backward, then xi and gamma. Returns `ln P(O | params)`.
    fn expectation(&mut self, params: &ParameterSet, observations: &[usize]) -> Result<f64> {
        let t_len = observations.len();
        let n = params.n_states();

        let forward = ForwardEngine::new(params);
        let ll = forward.compute_into(observations, t_len - 1, &mut self.alpha)?;
        let backward = BackwardEngine::new(params);
        backward.compute_into(observations, &mut self.beta)?;
        if !ll.is_finite() {
            // Nothing to re-estimate from a sequence the model cannot emit.
            return Err(HmmError::DegenerateDistribution);
        }

        if self.xi.dim() != (t_len - 1, n, n) {
            self.xi = Array3::from_elem((t_len - 1, n, n), LOG_ZERO);
        }
        self.gamma.reshape(t_len, n, LOG_ZERO);

        let a = params.a();
        let b = params.b();
        for t in 0..t_len - 1 {
            let symbol = observations[t + 1];
            let mut xi_t = self.xi.index_axis_mut(Axis(0), t);
            for i in 0..n {
                for j in 0..n {
                    xi_t[[i, j]] =
                        self.alpha[(t, i)] + a[[i, j]] + b[[j, symbol]] + self.beta[(t + 1, j)];
                }
            }

            self.scratch.clear();
            self.scratch.extend(xi_t.iter().copied());
            let norm = log_sum_exp(&self.scratch, max_value(&self.scratch));
            if !norm.is_finite() {
                return Err(HmmError::DegenerateDistribution);
            }
            xi_t.mapv_inplace(|v| v - norm);

            for i in 0..n {
                self.scratch.clear();
                self.scratch.extend(xi_t.row(i).iter().copied());
                self.gamma[(t, i)] = log_sum_exp(&self.scratch, max_value(&self.scratch));
            }
        }

        // The last step has no successor; its marginal comes from alpha * beta.
        for i in 0..n {
            self.gamma[(t_len - 1, i)] =
                self.alpha[(t_len - 1, i)] + self.beta[(t_len - 1, i)] - ll;
        }

        Ok(ll)
    }

    fn maximize(&mut self, params: &mut ParameterSet, observations: &[usize]) {
        let t_len = observations.len();
        let n = params.n_states();
        let m = params.n_symbols();
        let (pi, a, b) = params.parts_mut();

        for i in 0..n {
            pi[i] = self.gamma[(0, i)];
        }

        for i in 0..n {
            self.scratch.clear();
            let departures = (0..t_len - 1).map(|t| self.gamma[(t, i)]);
            self.scratch.extend(departures);
            let expected_departures = log_sum_exp(&self.scratch, max_value(&self.scratch));
            if expected_departures == LOG_ZERO {
                // State never visited before the last step: keep its row.
                continue;
            }
            for j in 0..n {
                self.scratch.clear();
                let moves = (0..t_len - 1).map(|t| self.xi[[t, i, j]]);
                self.scratch.extend(moves);
                a[[i, j]] =
                    log_sum_exp(&self.scratch, max_value(&self.scratch)) - expected_departures;
            }
        }

        for i in 0..n {
            self.scratch.clear();
            self.scratch.extend((0..t_len).map(|t| self.gamma[(t, i)]));
            let expected_visits = log_sum_exp(&self.scratch, max_value(&self.scratch));
            if expected_visits == LOG_ZERO {
                continue;
            }
            for k in 0..m {
                self.scratch.clear();
                self.scratch.extend(
                    observations
                        .iter()
                        .enumerate()
                        .filter(|&(_, &o)| o == k)
                        .map(|(t, _)| self.gamma[(t, i)]),
                );
                // No smoothing: a symbol never seen in state i gets -inf.
                b[[i, k]] = log_sum_exp(&self.scratch, max_value(&self.scratch)) - expected_visits;
            }
        }
    }
}
