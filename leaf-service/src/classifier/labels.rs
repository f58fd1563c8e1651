use super::ClassifierError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Plant species identifier, e.g. `"Ocimum Tenuiflorum (Tulsi)"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Class names in model output order. Index `i` names output `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    pub fn new<I, S>(names: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<Label> = names.into_iter().map(|n| Label(n.into())).collect();

        if labels.is_empty() {
            return Err(ClassifierError::Labels(
                "class name list is empty".to_string(),
            ));
        }

        if let Some(idx) = labels.iter().position(|l| l.0.trim().is_empty()) {
            return Err(ClassifierError::Labels(format!(
                "class name at index {} is blank",
                idx
            )));
        }

        Ok(Self { labels })
    }

    /// Load a JSON array of class names, e.g. `["Alpinia Galanga (Rasna)", ...]`.
    pub fn from_json_file(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::Labels(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json_str(&raw)
            .map_err(|e| ClassifierError::Labels(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ClassifierError> {
        let names: Vec<String> = serde_json::from_str(raw)
            .map_err(|e| ClassifierError::Labels(format!("invalid class name list: {}", e)))?;
        Self::new(names)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}
