//! Line-oriented text model format.
//!
//! ```text
//! # comment
//! X=<symbol>,<symbol>,...
//! Z=<state>,<state>,...
//! A=<a11>,<a12>;<a21>,<a22>
//! B=<b11>,<b12>,<b13>;<b21>,<b22>,<b23>
//! Pi=<pi1>,<pi2>
//! Space=log
//! ```
//!
//! Fields may appear in any order. Without a `Space` line values in `[0, 1]`
//! are linear probabilities and are converted with `ln`; anything else is taken
//! as already logged. Files written in log space carry `Space=log` so that a
//! log value of `0` is not read back as a linear zero.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{HmmError, Result};
use crate::params::ParameterSet;
use crate::vocab::SymbolTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputSpace {
    /// Natural-log values, exactly as held in memory.
    Log,
    /// Re-exponentiated probabilities.
    Linear,
}

/// Parameters together with the state and symbol labels they are indexed by.
#[derive(Clone, Debug, PartialEq)]
pub struct HmmModel {
    pub states: SymbolTable,
    pub symbols: SymbolTable,
    pub params: ParameterSet,
}

impl HmmModel {
    /// Pairs `params` with labels; empty tables mean "unlabeled".
    pub fn new(states: SymbolTable, symbols: SymbolTable, params: ParameterSet) -> Result<Self> {
        params.validate()?;
        if !states.is_empty() && states.len() != params.n_states() {
            return Err(HmmError::MalformedModel(format!(
                "{} state labels for {} states",
                states.len(),
                params.n_states()
            )));
        }
        if !symbols.is_empty() && symbols.len() != params.n_symbols() {
            return Err(HmmError::MalformedModel(format!(
                "{} symbol labels for {} symbols",
                symbols.len(),
                params.n_symbols()
            )));
        }
        Ok(Self {
            states,
            symbols,
            params,
        })
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.symbols.clear();
        self.params.clear();
    }
}

pub fn read_model(path: impl AsRef<Path>) -> Result<HmmModel> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_model(&text)
}

pub fn write_model(path: impl AsRef<Path>, model: &HmmModel, space: OutputSpace) -> Result<()> {
    fs::write(path.as_ref(), render_model(model, space))?;
    Ok(())
}

pub fn parse_model(text: &str) -> Result<HmmModel> {
    let mut states = SymbolTable::new();
    let mut symbols = SymbolTable::new();
    let mut a: Vec<Vec<f64>> = Vec::new();
    let mut b: Vec<Vec<f64>> = Vec::new();
    let mut pi: Vec<f64> = Vec::new();
    let mut log_space = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            HmmError::MalformedModel(format!("line {}: expected <field>=<values>", idx + 1))
        })?;
        let value = value.trim();
        match key.trim() {
            "X" => symbols = SymbolTable::from_labels(split_labels(value)),
            "Z" => states = SymbolTable::from_labels(split_labels(value)),
            "A" => a = parse_matrix(value, idx + 1)?,
            "B" => b = parse_matrix(value, idx + 1)?,
            "Pi" => pi = parse_row(value, idx + 1)?,
            "Space" => {
                log_space = match value {
                    "log" => true,
                    "linear" => false,
                    other => {
                        return Err(HmmError::MalformedModel(format!(
                            "line {}: unknown value space {:?}",
                            idx + 1,
                            other
                        )))
                    }
                }
            }
            other => tracing::warn!(line = idx + 1, key = other, "ignoring unknown model field"),
        }
    }

    let convert = |v: f64| {
        if !log_space && (0.0..=1.0).contains(&v) {
            v.ln()
        } else {
            v
        }
    };
    let pi = Array1::from_iter(pi.into_iter().map(convert));
    let a = to_array(a)?.mapv(convert);
    let b = to_array(b)?.mapv(convert);

    let params = ParameterSet::new(pi, a, b)?;
    tracing::trace!(
        n_states = params.n_states(),
        n_symbols = params.n_symbols(),
        log_space,
        "model parsed"
    );
    HmmModel::new(states, symbols, params)
}

pub fn render_model(model: &HmmModel, space: OutputSpace) -> String {
    let params = &model.params;
    let mut lines = Vec::new();
    if space == OutputSpace::Log {
        lines.push("Space=log".to_string());
    }
    if !model.symbols.is_empty() {
        lines.push(format!("X={}", model.symbols.labels().join(",")));
    }
    if !model.states.is_empty() {
        lines.push(format!("Z={}", model.states.labels().join(",")));
    }
    lines.push(format!("A={}", format_matrix(params.a(), space)));
    lines.push(format!("B={}", format_matrix(params.b(), space)));
    lines.push(format!("Pi={}", format_row(params.pi().view(), space)));
    lines.join("\n") + "\n"
}

fn format_row(row: ArrayView1<'_, f64>, space: OutputSpace) -> String {
    row.iter()
        .map(|&v| match space {
            OutputSpace::Log => v.to_string(),
            OutputSpace::Linear => v.exp().to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn format_matrix(matrix: &Array2<f64>, space: OutputSpace) -> String {
    matrix
        .outer_iter()
        .map(|row| format_row(row, space))
        .collect::<Vec<_>>()
        .join(";")
}

fn split_labels(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_row(value: &str, line: usize) -> Result<Vec<f64>> {
    value
        .split(',')
        .map(|tok| {
            tok.trim().parse::<f64>().map_err(|_| {
                HmmError::MalformedModel(format!("line {}: bad number {:?}", line, tok.trim()))
            })
        })
        .collect()
}

fn parse_matrix(value: &str, line: usize) -> Result<Vec<Vec<f64>>> {
    value.split(';').map(|row| parse_row(row, line)).collect()
}

pub(crate) fn to_array(rows: Vec<Vec<f64>>) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(HmmError::MalformedModel("ragged matrix rows".to_string()));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| HmmError::MalformedModel(e.to_string()))
}
