pub mod lattice;
pub mod log_space;

pub use lattice::Lattice;
pub use log_space::{
    checked_log_sum_exp, ln_normalize_rows, log_sum_exp, log_sum_exp_all, max_value, LOG_ZERO,
};
