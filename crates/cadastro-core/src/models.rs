use serde::{Deserialize, Serialize};

/// One selectable search result, a person record from `/pessoas`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    #[serde(rename = "nome")]
    pub label: String,
}

impl Candidate {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.label, self.id)
    }
}
