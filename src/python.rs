use ndarray::Array1;
use numpy::{IntoPyArray, PyArray1, PyArray2};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::backward::BackwardEngine;
use crate::baum_welch::{BaumWelchConfig, BaumWelchTrainer};
use crate::error::HmmError;
use crate::forward::ForwardEngine;
use crate::math::log_sum_exp_all;
use crate::model_file::{read_model, to_array, write_model, HmmModel, OutputSpace};
use crate::params::ParameterSet;
use crate::supervised::{PiEstimate, SupervisedTrainer};
use crate::viterbi::ViterbiDecoder;
use crate::vocab::SymbolTable;

impl From<HmmError> for PyErr {
    fn from(err: HmmError) -> PyErr {
        match err {
            HmmError::Io(e) => PyIOError::new_err(e.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

#[pyclass(name = "DiscreteHmm")]
#[derive(Clone, Debug)]
pub struct PyDiscreteHmm {
    model: HmmModel,
}

#[pymethods]
impl PyDiscreteHmm {
    /// Uniformly initialized, unlabeled model.
    #[new]
    fn new(n_states: usize, n_symbols: usize) -> PyResult<Self> {
        let params = ParameterSet::uniform(n_states, n_symbols)?;
        Ok(Self {
            model: HmmModel::new(SymbolTable::new(), SymbolTable::new(), params)?,
        })
    }

    #[staticmethod]
    fn uniform(n_states: usize, n_symbols: usize) -> PyResult<Self> {
        Self::new(n_states, n_symbols)
    }

    #[staticmethod]
    fn from_file(path: &str) -> PyResult<Self> {
        Ok(Self {
            model: read_model(path)?,
        })
    }

    #[staticmethod]
    #[pyo3(signature = (states, symbols, n_states, n_symbols, pi_rule="uniform"))]
    fn train_supervised(
        states: Vec<usize>,
        symbols: Vec<usize>,
        n_states: usize,
        n_symbols: usize,
        pi_rule: &str,
    ) -> PyResult<Self> {
        if states.len() != symbols.len() {
            let msg = "states and symbols must be same length";
            return Err(PyValueError::new_err(msg));
        }
        let pi_estimate = match pi_rule {
            "uniform" => PiEstimate::Uniform,
            "first_state" => PiEstimate::FirstState,
            "state_frequency" => PiEstimate::StateFrequency,
            other => {
                let msg = format!("unknown pi rule {:?}", other);
                return Err(PyValueError::new_err(msg));
            }
        };
        let pairs: Vec<(usize, usize)> = states.into_iter().zip(symbols).collect();
        let trainer = SupervisedTrainer::new(n_states, n_symbols, pi_estimate);
        let params = trainer.train(&pairs)?;
        Ok(Self {
            model: HmmModel::new(SymbolTable::new(), SymbolTable::new(), params)?,
        })
    }

    #[pyo3(signature = (path, log_space=true))]
    fn save(&self, path: &str, log_space: bool) -> PyResult<()> {
        let space = if log_space {
            OutputSpace::Log
        } else {
            OutputSpace::Linear
        };
        write_model(path, &self.model, space)?;
        Ok(())
    }

    #[getter]
    fn n_states(&self) -> usize {
        self.model.params.n_states()
    }

    #[getter]
    fn n_symbols(&self) -> usize {
        self.model.params.n_symbols()
    }

    #[pyo3(signature = (observations, up_to=None))]
    fn forward(&self, observations: Vec<usize>, up_to: Option<usize>) -> PyResult<f64> {
        let up_to = up_to.unwrap_or(observations.len().saturating_sub(1));
        let engine = ForwardEngine::new(&self.model.params);
        let pass = engine.compute(&observations, up_to)?;
        Ok(pass.log_likelihood)
    }

    #[pyo3(signature = (observations, up_to=None))]
    fn forward_lattice<'py>(
        &self,
        py: Python<'py>,
        observations: Vec<usize>,
        up_to: Option<usize>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let up_to = up_to.unwrap_or(observations.len().saturating_sub(1));
        let engine = ForwardEngine::new(&self.model.params);
        let pass = engine.compute(&observations, up_to)?;
        Ok(pass.alpha.into_array().into_pyarray_bound(py))
    }

    fn backward(&self, observations: Vec<usize>) -> PyResult<f64> {
        let engine = BackwardEngine::new(&self.model.params);
        let pass = engine.compute(&observations)?;
        Ok(pass.log_likelihood)
    }

    #[pyo3(signature = (observations, up_to=None))]
    fn viterbi(
        &self,
        observations: Vec<usize>,
        up_to: Option<usize>,
    ) -> PyResult<(f64, Vec<usize>)> {
        let up_to = up_to.unwrap_or(observations.len().saturating_sub(1));
        let decoder = ViterbiDecoder::new(&self.model.params);
        let best = decoder.decode(&observations, up_to)?;
        Ok((best.log_prob, best.states))
    }

    #[pyo3(signature = (observations, epsilon, max_iterations))]
    fn baum_welch(
        &mut self,
        py: Python<'_>,
        observations: Vec<usize>,
        epsilon: f64,
        max_iterations: usize,
    ) -> PyResult<Py<PyDict>> {
        let config = BaumWelchConfig::new(epsilon, max_iterations);
        let mut trainer = BaumWelchTrainer::new(config)?;
        let report = trainer.train(&mut self.model.params, &observations)?;

        let out = PyDict::new_bound(py);
        out.set_item("iterations", report.iterations)?;
        out.set_item("log_likelihoods", report.log_likelihoods.clone())?;
        out.set_item("converged", report.converged())?;
        Ok(out.unbind())
    }

    /// `(pi, a, b)` as numpy arrays of log-probabilities.
    fn parameters<'py>(
        &self,
        py: Python<'py>,
    ) -> (
        Bound<'py, PyArray1<f64>>,
        Bound<'py, PyArray2<f64>>,
        Bound<'py, PyArray2<f64>>,
    ) {
        let params = &self.model.params;
        (
            params.pi().clone().into_pyarray_bound(py),
            params.a().clone().into_pyarray_bound(py),
            params.b().clone().into_pyarray_bound(py),
        )
    }

    fn snapshot(&self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        let params = &self.model.params;
        let d = PyDict::new_bound(py);
        d.set_item("states", self.model.states.labels().to_vec())?;
        d.set_item("symbols", self.model.symbols.labels().to_vec())?;
        d.set_item("pi", params.pi().to_vec())?;
        d.set_item("a", rows(params.a()))?;
        d.set_item("b", rows(params.b()))?;
        Ok(d.unbind())
    }

    fn restore(&mut self, snapshot: &Bound<'_, PyDict>) -> PyResult<()> {
        let pi: Vec<f64> = required(snapshot, "pi")?;
        let a: Vec<Vec<f64>> = required(snapshot, "a")?;
        let b: Vec<Vec<f64>> = required(snapshot, "b")?;
        let states: Vec<String> = optional(snapshot, "states")?.unwrap_or_default();
        let symbols: Vec<String> = optional(snapshot, "symbols")?.unwrap_or_default();

        let params = ParameterSet::new(Array1::from(pi), to_array(a)?, to_array(b)?)?;
        self.model = HmmModel::new(
            SymbolTable::from_labels(states),
            SymbolTable::from_labels(symbols),
            params,
        )?;
        Ok(())
    }
}

#[pyfunction]
#[pyo3(name = "log_sum_exp")]
pub(crate) fn py_log_sum_exp(values: Vec<f64>) -> f64 {
    log_sum_exp_all(&values)
}

fn rows(matrix: &ndarray::Array2<f64>) -> Vec<Vec<f64>> {
    matrix.outer_iter().map(|row| row.to_vec()).collect()
}

fn required<'py, T: FromPyObject<'py>>(d: &Bound<'py, PyDict>, key: &str) -> PyResult<T> {
    match optional(d, key)? {
        Some(value) => Ok(value),
        None => Err(PyValueError::new_err(format!("snapshot missing {:?}", key))),
    }
}

fn optional<'py, T>(d: &Bound<'py, PyDict>, key: &str) -> PyResult<Option<T>>
where
    T: FromPyObject<'py>,
{
    match d.get_item(key)? {
        Some(v) => Ok(Some(v.extract::<T>()?)),
        None => Ok(None),
    }
}
