use thiserror::Error;

/// Errors surfaced by the HMM engine and its file collaborators.
#[derive(Debug, Error)]
pub enum HmmError {
    /// A time index fell outside the observation sequence.
    #[error("time index {index} out of bounds for sequence of length {len}")]
    InvalidIndex { index: usize, len: usize },

    /// Pi/A/B dimensions disagree, A is not square, or the model is empty.
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// Log-sum-exp over a vector whose linear-space mass collapsed to zero.
    #[error("degenerate distribution: linear-space sum is zero")]
    DegenerateDistribution,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("symbol id {symbol} out of range for {n_symbols} symbols")]
    SymbolOutOfRange { symbol: usize, n_symbols: usize },

    #[error("state id {state} out of range for {n_states} states")]
    StateOutOfRange { state: usize, n_states: usize },

    #[error("observation sequence is empty")]
    EmptySequence,

    #[error("malformed dataset at line {line}: {reason}")]
    MalformedDataset { line: usize, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, HmmError>;
