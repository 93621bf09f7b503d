//! Intent categories used to route a prompt to a model family.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of intent categories.
///
/// Declaration order is the tie-break order used by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentCategory {
    Coding,
    Reasoning,
    Creative,
    Research,
    Math,
    General,
}

impl IntentCategory {
    /// All categories, in tie-break order.
    pub const ALL: [IntentCategory; 6] = [
        IntentCategory::Coding,
        IntentCategory::Reasoning,
        IntentCategory::Creative,
        IntentCategory::Research,
        IntentCategory::Math,
        IntentCategory::General,
    ];

    /// Categories that have keyword patterns (everything but `General`).
    pub const SCORED: [IntentCategory; 5] = [
        IntentCategory::Coding,
        IntentCategory::Reasoning,
        IntentCategory::Creative,
        IntentCategory::Research,
        IntentCategory::Math,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntentCategory::Coding => "coding",
            IntentCategory::Reasoning => "reasoning",
            IntentCategory::Creative => "creative",
            IntentCategory::Research => "research",
            IntentCategory::Math => "math",
            IntentCategory::General => "general",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown intent category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for IntentCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        IntentCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
