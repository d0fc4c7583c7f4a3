use std::collections::HashMap;

/// Bidirectional label <-> id map. Ids are dense and assigned in first-seen
/// order, so they index rows/columns of the parameter matrices directly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    ids: HashMap<String, usize>,
    labels: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for label in labels {
            table.intern(label.as_ref());
        }
        table
    }

    /// Returns the id of `label`, assigning the next free id if it is new.
    pub fn intern(&mut self, label: &str) -> usize {
        if let Some(&id) = self.ids.get(label) {
            return id;
        }
        let id = self.labels.len();
        self.ids.insert(label.to_string(), id);
        self.labels.push(label.to_string());
        id
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.labels.clear();
    }
}
