//! Corpus identifiers and retrieved passages.

use serde::{Deserialize, Serialize};

/// One of the two fixed source documents retrieval runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
    Constitution,
    PenalCode,
}

impl Corpus {
    pub const ALL: [Corpus; 2] = [Corpus::Constitution, Corpus::PenalCode];

    /// Tool id the reasoning loop exposes to the model.
    pub fn tool_id(&self) -> &'static str {
        match self {
            Self::Constitution => "constitution_search",
            Self::PenalCode => "penal_code_search",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Constitution => "Constitution of India",
            Self::PenalCode => "Bharatiya Nyaya Sanhita, 2023",
        }
    }

    /// Tool description shown to the model in the reasoning prompt.
    pub fn tool_description(&self) -> &'static str {
        match self {
            Self::Constitution => {
                "Returns relevant excerpts from the Constitution of India \
                 using semantic search over the input query"
            }
            Self::PenalCode => {
                "Returns relevant excerpts from the Bharatiya Nyaya Sanhita, 2023, \
                 the penal code stating the criminal laws of India, \
                 using semantic search over the input query"
            }
        }
    }

    /// Resolve a tool name emitted by the model back to its corpus.
    /// Tolerates surrounding whitespace and case drift.
    pub fn from_tool_id(id: &str) -> Option<Corpus> {
        let id = id.trim().to_ascii_lowercase();
        Corpus::ALL.iter().copied().find(|c| c.tool_id() == id)
    }
}

/// A retrieved text excerpt with corpus provenance. Produced only by a
/// [`Retriever`](crate::capability::Retriever); read-only downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub corpus: Corpus,
    pub text: String,
}

impl Passage {
    pub fn new(corpus: Corpus, text: impl Into<String>) -> Self {
        Self {
            corpus,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_id_round_trip() {
        for corpus in Corpus::ALL {
            assert_eq!(Corpus::from_tool_id(corpus.tool_id()), Some(corpus));
        }
    }

    #[test]
    fn test_from_tool_id_tolerates_case_and_whitespace() {
        assert_eq!(
            Corpus::from_tool_id("  Constitution_Search \n"),
            Some(Corpus::Constitution)
        );
        assert_eq!(Corpus::from_tool_id("penal_code_search"), Some(Corpus::PenalCode));
        assert_eq!(Corpus::from_tool_id("web_search"), None);
    }
}
