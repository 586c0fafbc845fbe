use serde::{Deserialize, Serialize};

/// Bounds for the report context handed to the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContextConfig {
    /// Highlight lines kept in the digest (oldest dropped first)
    pub max_highlights: usize,

    /// Reports fetched from the store per chat request; all of them are counted
    pub recent_window: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_highlights: 8,
            recent_window: 20,
        }
    }
}
