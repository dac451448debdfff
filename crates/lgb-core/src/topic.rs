//! Topic relevance filter
//!
//! Stateless keyword gate applied to inbound text before anything is sent to
//! the AI backend.

use serde::{Deserialize, Serialize};

/// Keyword policy deciding whether a message is on-topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TopicFilter {
    /// Every message passes
    #[default]
    Disabled,
    /// Case-insensitive substring match on a single keyword
    Substring { keyword: String },
    /// Whole message (trimmed, case-insensitive) must equal one of the keywords
    Keywords { keywords: Vec<String> },
    /// Case-insensitive substring match on any of the keywords
    AnyOf { keywords: Vec<String> },
}

impl TopicFilter {
    /// Build an `AnyOf` filter from a comma-separated list.
    ///
    /// Blank entries are dropped; an empty list disables filtering.
    pub fn from_keyword_list(list: &str) -> Self {
        let keywords: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if keywords.is_empty() {
            Self::Disabled
        } else {
            Self::AnyOf { keywords }
        }
    }

    /// Whether filtering is active at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Test `text` against the filter
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Disabled => true,
            Self::Substring { keyword } => {
                !keyword.is_empty() && text.to_lowercase().contains(&keyword.to_lowercase())
            }
            Self::Keywords { keywords } => {
                let normalized = text.trim().to_lowercase();
                keywords.iter().any(|k| k.to_lowercase() == normalized)
            }
            Self::AnyOf { keywords } => {
                let lowered = text.to_lowercase();
                keywords
                    .iter()
                    .filter(|k| !k.is_empty())
                    .any(|k| lowered.contains(&k.to_lowercase()))
            }
        }
    }
}
