//! Keyword pattern table for intent detection.
//!
//! Phrases are matched as case-insensitive substrings of the prompt. Every
//! phrase here must be lowercase.

use switchyard_catalog::IntentCategory;

pub const HIGH_WEIGHT: f64 = 0.5;
pub const MEDIUM_WEIGHT: f64 = 0.3;
pub const LOW_WEIGHT: f64 = 0.1;

/// Three tiers of phrases for one category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryPatterns {
    pub category: IntentCategory,
    pub high: &'static [&'static str],
    pub medium: &'static [&'static str],
    pub low: &'static [&'static str],
}

/// One entry per scored category, in tie-break order.
pub static PATTERNS: [CategoryPatterns; 5] = [
    CategoryPatterns {
        category: IntentCategory::Coding,
        high: &[
            "function",
            "implement",
            "python",
            "javascript",
            "typescript",
            "rust code",
            "code",
            "debug",
            "refactor",
            "compile",
            "stack trace",
            "unit test",
            "sql query",
            "api endpoint",
            "regex",
        ],
        medium: &[
            "class",
            "method",
            "variable",
            "script",
            "library",
            "framework",
            "bug",
            "error message",
            "syntax",
            "git",
            "docker",
            "database",
        ],
        low: &["program", "software", "developer", "terminal", "install"],
    },
    CategoryPatterns {
        category: IntentCategory::Reasoning,
        high: &[
            "step by step",
            "reason through",
            "think through",
            "logic puzzle",
            "pros and cons",
            "explain why",
            "analyze",
            "analyse",
            "trade-off",
            "tradeoff",
        ],
        medium: &[
            "explain",
            "compare",
            "evaluate",
            "deduce",
            "infer",
            "implications",
            "argument",
            "decide",
        ],
        low: &["why", "should i", "reason", "consider"],
    },
    CategoryPatterns {
        category: IntentCategory::Creative,
        high: &[
            "write a story",
            "short story",
            "poem",
            "haiku",
            "fiction",
            "song lyrics",
            "screenplay",
            "creative writing",
        ],
        medium: &[
            "story",
            "character",
            "plot",
            "narrative",
            "imagine",
            "lyrics",
            "metaphor",
            "brainstorm",
        ],
        low: &["creative", "describe", "dream", "whimsical"],
    },
    CategoryPatterns {
        category: IntentCategory::Research,
        high: &[
            "research",
            "literature review",
            "find sources",
            "cite sources",
            "latest developments",
            "state of the art",
            "what is known about",
        ],
        medium: &[
            "summarize",
            "summarise",
            "overview",
            "history of",
            "sources",
            "studies",
            "background on",
        ],
        low: &["information", "facts", "learn about", "article"],
    },
    CategoryPatterns {
        category: IntentCategory::Math,
        high: &[
            "calculate",
            "equation",
            "integral",
            "derivative",
            "prove that",
            "solve for",
            "theorem",
            "matrix",
        ],
        medium: &[
            "probability",
            "algebra",
            "geometry",
            "statistics",
            "sum of",
            "percentage",
            "formula",
        ],
        low: &["math", "number", "average", "compute"],
    },
];

/// Patterns for `category`, `None` for `General`.
pub fn patterns_for(category: IntentCategory) -> Option<&'static CategoryPatterns> {
    PATTERNS.iter().find(|p| p.category == category)
}
