//! Discrete-state, discrete-observation hidden Markov models.
//!
//! Parameters live in natural-log space ([`ParameterSet`]). Sequences are
//! scored with [`ForwardEngine`] / [`BackwardEngine`], decoded with
//! [`ViterbiDecoder`], and parameters are estimated either by counting
//! ([`SupervisedTrainer`]) or by Baum-Welch ([`BaumWelchTrainer`]).
//!
//! ```
//! use discrete_hmm::{ForwardEngine, ParameterSet, ViterbiDecoder};
//! use ndarray::array;
//!
//! let params = ParameterSet::from_linear(
//!     array![0.6, 0.4],
//!     array![[0.7, 0.3], [0.4, 0.6]],
//!     array![[0.1, 0.4, 0.5], [0.7, 0.2, 0.1]],
//! )?;
//! let obs = [0, 1, 0, 2];
//! let total = ForwardEngine::new(&params).compute(&obs, 3)?.log_likelihood;
//! let best = ViterbiDecoder::new(&params).decode(&obs, 3)?;
//! assert!(best.log_prob <= total);
//! # Ok::<(), discrete_hmm::HmmError>(())
//! ```

mod backward;
mod baum_welch;
mod dataset;
mod error;
mod forward;
pub mod math;
mod model_file;
mod params;
#[cfg(feature = "python")]
mod python;
mod supervised;
mod viterbi;
mod vocab;

pub use backward::{BackwardEngine, BackwardPass};
pub use baum_welch::{BaumWelchConfig, BaumWelchTrainer, StopReason, TrainingReport};
pub use dataset::{read_unlabeled, read_unlabeled_path, LabeledDataset, Vocabulary};
pub use error::{HmmError, Result};
pub use forward::{ForwardEngine, ForwardPass};
pub use math::Lattice;
pub use model_file::{parse_model, read_model, render_model, write_model, HmmModel, OutputSpace};
pub use params::ParameterSet;
pub use supervised::{PiEstimate, SupervisedTrainer};
pub use viterbi::{ViterbiDecoder, ViterbiPath};
pub use vocab::SymbolTable;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn discrete_hmm(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyDiscreteHmm>()?;
    m.add_function(wrap_pyfunction!(python::py_log_sum_exp, m)?)?;
    Ok(())
}
