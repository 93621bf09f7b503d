//! Model selector: keyword-based intent detection plus category routing.
//!
//! ```text
//! prompt --classify--> (category, confidence) --route--> model id
//!                                                   ^
//!                            preferences ───────────┘
//! ```
//!
//! Routing order for a category:
//! 1. the recorded preference, if that model is available
//! 2. the first available model from the catalog's preferred list
//! 3. the catalog's general-purpose model

pub mod patterns;

use std::sync::Arc;

use serde::Serialize;
use switchyard_catalog::{Catalog, IntentCategory};
use tracing::debug;

use crate::error::EngineError;
use crate::preferences::PreferenceStore;
use patterns::{patterns_for, HIGH_WEIGHT, LOW_WEIGHT, MEDIUM_WEIGHT, PATTERNS};

/// Confidence reported when no pattern matches.
pub const GENERAL_CONFIDENCE: f64 = 0.5;

const HIGH_BUCKET: f64 = 0.7;
const MEDIUM_BUCKET: f64 = 0.4;

/// Outcome of intent detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: IntentCategory,
    pub confidence: f64,
    /// Raw scores in tie-break order.
    pub scores: Vec<(IntentCategory, f64)>,
}

impl Classification {
    /// Normalized confidence for any category.
    pub fn confidence_for(&self, category: IntentCategory) -> f64 {
        if category == self.category {
            return self.confidence;
        }
        let max = self.max_score();
        if max == 0.0 {
            return 0.0;
        }
        self.scores
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, s)| s / max)
            .unwrap_or(0.0)
    }

    fn max_score(&self) -> f64 {
        self.scores.iter().map(|(_, s)| *s).fold(0.0, f64::max)
    }
}

/// Why a model was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionSource {
    Preference,
    Routing,
    Fallback,
}

impl SelectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionSource::Preference => "preference",
            SelectionSource::Routing => "routing",
            SelectionSource::Fallback => "fallback",
        }
    }
}

/// A routed model choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub model_id: String,
    pub category: IntentCategory,
    pub confidence: f64,
    pub source: SelectionSource,
}

/// One ranked alternative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub model_id: String,
    pub display_name: String,
    pub category: IntentCategory,
    pub confidence: f64,
}

/// Score `prompt` against the pattern table.
pub fn classify(prompt: &str) -> Classification {
    let lowered = prompt.to_lowercase();
    let scores: Vec<(IntentCategory, f64)> = PATTERNS
        .iter()
        .map(|table| {
            let tier = |phrases: &[&str], weight: f64| {
                phrases.iter().filter(|p| lowered.contains(*p)).count() as f64 * weight
            };
            let score = tier(table.high, HIGH_WEIGHT)
                + tier(table.medium, MEDIUM_WEIGHT)
                + tier(table.low, LOW_WEIGHT);
            (table.category, score)
        })
        .collect();

    let max = scores.iter().map(|(_, s)| *s).fold(0.0, f64::max);
    if max == 0.0 {
        return Classification {
            category: IntentCategory::General,
            confidence: GENERAL_CONFIDENCE,
            scores,
        };
    }

    // First category reaching the max wins ties.
    let (category, best) = scores
        .iter()
        .copied()
        .find(|(_, s)| *s == max)
        .unwrap_or((IntentCategory::General, max));

    Classification {
        category,
        confidence: best / max,
        scores,
    }
}

/// Human sentence describing a classification.
pub fn explain(category: IntentCategory, confidence: f64, prompt: &str) -> String {
    let bucket = if confidence >= HIGH_BUCKET {
        "high"
    } else if confidence >= MEDIUM_BUCKET {
        "medium"
    } else {
        "low"
    };

    let lowered = prompt.to_lowercase();
    let matched: Vec<&str> = patterns_for(category)
        .map(|table| {
            table
                .high
                .iter()
                .copied()
                .filter(|p| lowered.contains(p))
                .take(3)
                .collect()
        })
        .unwrap_or_default();

    let mut sentence = format!(
        "Detected {category} intent with {bucket} confidence ({:.0}%)",
        confidence * 100.0
    );
    if matched.is_empty() {
        sentence.push('.');
    } else {
        sentence.push_str(&format!("; matched: {}.", matched.join(", ")));
    }
    sentence
}

/// Routes prompts to models.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    catalog: Arc<Catalog>,
    preferences: PreferenceStore,
}

impl ModelSelector {
    pub fn new(catalog: Arc<Catalog>, preferences: PreferenceStore) -> Self {
        Self {
            catalog,
            preferences,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn classify(&self, prompt: &str) -> Classification {
        classify(prompt)
    }

    /// Pick a model for `prompt` among `available` ids.
    pub fn select(&self, prompt: &str, available: &[String]) -> Selection {
        let classification = classify(prompt);
        let (model_id, source) = self.route(classification.category, available);
        debug!(
            category = %classification.category,
            confidence = classification.confidence,
            model = %model_id,
            source = source.as_str(),
            "selected model"
        );
        Selection {
            model_id,
            category: classification.category,
            confidence: classification.confidence,
            source,
        }
    }

    /// Model for a category, without classification.
    pub fn route(&self, category: IntentCategory, available: &[String]) -> (String, SelectionSource) {
        let is_available = |id: &str| available.iter().any(|a| a == id);

        let prefs = self.preferences.load_or_default();
        if let Some(preferred) = prefs.preferred_model(category) {
            if is_available(preferred) && self.catalog.contains(preferred) {
                return (preferred.to_string(), SelectionSource::Preference);
            }
            debug!(model = preferred, "preferred model unavailable");
        }

        if let Some(id) = self
            .catalog
            .preferred_for(category)
            .iter()
            .find(|id| is_available(id))
        {
            return (id.clone(), SelectionSource::Routing);
        }

        (
            self.catalog.general_model().to_string(),
            SelectionSource::Fallback,
        )
    }

    /// Top `n` available models, each labeled with its primary category and
    /// that category's confidence for `prompt`.
    pub fn recommendations(
        &self,
        prompt: &str,
        n: usize,
        available: &[String],
    ) -> Vec<Recommendation> {
        let classification = classify(prompt);

        let mut ranked: Vec<(Recommendation, usize)> = self
            .catalog
            .models()
            .iter()
            .filter(|m| available.iter().any(|a| *a == m.id))
            .map(|m| {
                let category = m.primary_category();
                let routing_rank = self
                    .catalog
                    .preferred_for(category)
                    .iter()
                    .position(|id| *id == m.id)
                    .unwrap_or(usize::MAX);
                let rec = Recommendation {
                    model_id: m.id.clone(),
                    display_name: m.display_name.clone(),
                    category,
                    confidence: classification.confidence_for(category),
                };
                (rec, routing_rank)
            })
            .collect();

        // Stable sort keeps catalog order as the last tie-break.
        ranked.sort_by(|(a, ra), (b, rb)| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| ra.cmp(rb))
        });
        ranked.into_iter().take(n).map(|(rec, _)| rec).collect()
    }

    /// Remember `model_id` as the choice for `category`.
    pub fn record_preference(
        &self,
        category: IntentCategory,
        model_id: &str,
    ) -> Result<(), EngineError> {
        if !self.catalog.contains(model_id) {
            return Err(EngineError::UnknownModel(model_id.to_string()));
        }
        self.preferences.record_preference(category, model_id)?;
        Ok(())
    }
}
