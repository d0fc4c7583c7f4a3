//! Loaders for tab-delimited training corpora.
//!
//! Labeled files hold one `<state label>\t<symbol>` example per line; the
//! engine only ever sees the interned ids.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{HmmError, Result};
use crate::vocab::SymbolTable;

/// An ordered `(state id, symbol id)` sequence with its vocabularies.
#[derive(Clone, Debug, Default)]
pub struct LabeledDataset {
    pub states: SymbolTable,
    pub symbols: SymbolTable,
    pub pairs: Vec<(usize, usize)>,
}

impl LabeledDataset {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Reads with fresh vocabularies.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut dataset = Self::default();
        dataset.extend_from_reader(reader)?;
        Ok(dataset)
    }

    /// Appends examples, interning into the existing vocabularies.
    pub fn extend_from_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if skip_line(line) {
                continue;
            }
            let Some((state, symbol)) = line.split_once('\t') else {
                let reason = format!("missing tab separator in {:?}", line);
                return Err(malformed(idx, reason));
            };
            if state.is_empty() || symbol.is_empty() {
                return Err(malformed(idx, "empty label or symbol"));
            }
            let state_id = self.states.intern(state);
            let symbol_id = self.symbols.intern(symbol);
            self.pairs.push((state_id, symbol_id));
        }
        tracing::trace!(
            pairs = self.pairs.len(),
            states = self.states.len(),
            symbols = self.symbols.len(),
            "labeled dataset loaded"
        );
        Ok(())
    }

    pub fn symbol_ids(&self) -> Vec<usize> {
        self.pairs.iter().map(|&(_, symbol)| symbol).collect()
    }

    pub fn state_ids(&self) -> Vec<usize> {
        self.pairs.iter().map(|&(state, _)| state).collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.symbols.clear();
        self.pairs.clear();
    }
}

/// Whether unknown symbols may be added to the vocabulary while reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vocabulary {
    Grow,
    Frozen,
}

/// Reads a bare symbol sequence for unsupervised training.
///
/// Each line is either `<symbol>` or a labeled `<state>\t<symbol>` line whose
/// label is ignored. With [`Vocabulary::Frozen`], a symbol missing from
/// `symbols` is an error.
pub fn read_unlabeled<R: BufRead>(
    reader: R,
    symbols: &mut SymbolTable,
    vocabulary: Vocabulary,
) -> Result<Vec<usize>> {
    let mut sequence = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if skip_line(line) {
            continue;
        }
        let symbol = match line.split_once('\t') {
            Some((_, symbol)) => symbol,
            None => line,
        };
        let id = match vocabulary {
            Vocabulary::Grow => symbols.intern(symbol),
            Vocabulary::Frozen => match symbols.id(symbol) {
                Some(id) => id,
                None => return Err(malformed(idx, format!("unknown symbol {:?}", symbol))),
            },
        };
        sequence.push(id);
    }
    tracing::trace!(
        len = sequence.len(),
        symbols = symbols.len(),
        "unlabeled sequence loaded"
    );
    Ok(sequence)
}

pub fn read_unlabeled_path(
    path: impl AsRef<Path>,
    symbols: &mut SymbolTable,
    vocabulary: Vocabulary,
) -> Result<Vec<usize>> {
    let file = File::open(path.as_ref())?;
    read_unlabeled(BufReader::new(file), symbols, vocabulary)
}

fn skip_line(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}

// `idx` is the zero-based line index from `enumerate`.
fn malformed(idx: usize, reason: impl Into<String>) -> HmmError {
    HmmError::MalformedDataset {
        line: idx + 1,
        reason: reason.into(),
    }
}
