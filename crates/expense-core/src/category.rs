//! Categories, classification results and the cheap heuristic matcher.

use serde::{Deserialize, Serialize};

/// Confidence assigned to an exact name or slug match.
const EXACT_MATCH_CONFIDENCE: f64 = 0.99;

/// Confidence assigned when the reply contains a category name.
const CONTAINS_MATCH_CONFIDENCE: f64 = 0.8;

/// A spending category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
        }
    }
}

/// Built-in categories used when a customer has none configured.
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("cat_food", "Comida", "comida"),
        Category::new("cat_transport", "Transporte", "transporte"),
        Category::new("cat_shopping", "Compras", "compras"),
        Category::new("cat_services", "Servicios", "servicios"),
    ]
}

/// Output of a category classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub category_id: Option<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Classification {
    pub fn matched(category_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            category_id: Some(category_id.into()),
            confidence,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            category_id: None,
            confidence: 0.0,
        }
    }

    /// Whether this result clears the given confidence gate.
    ///
    /// A result exactly at the threshold passes.
    pub fn passes(&self, threshold: f64) -> bool {
        self.category_id.is_some() && self.confidence >= threshold
    }
}

/// Match a reply against category names and slugs without calling a model.
///
/// An exact case-insensitive match on name or slug wins first; otherwise the
/// first category whose name appears in the reply is taken.
pub fn heuristic_match(reply: &str, categories: &[Category]) -> Option<Classification> {
    let normalized = reply.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(exact) = categories
        .iter()
        .find(|c| c.name.to_lowercase() == normalized || c.slug.to_lowercase() == normalized)
    {
        return Some(Classification::matched(&exact.id, EXACT_MATCH_CONFIDENCE));
    }

    categories
        .iter()
        .find(|c| normalized.contains(&c.name.to_lowercase()))
        .map(|c| Classification::matched(&c.id, CONTAINS_MATCH_CONFIDENCE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_on_name_or_slug() {
        let categories = default_categories();

        let by_name = heuristic_match("  COMIDA ", &categories).unwrap();
        assert_eq!(by_name.category_id.as_deref(), Some("cat_food"));
        assert_eq!(by_name.confidence, 0.99);

        let by_slug = heuristic_match("transporte", &categories).unwrap();
        assert_eq!(by_slug.category_id.as_deref(), Some("cat_transport"));
    }

    #[test]
    fn test_contains_match() {
        let categories = default_categories();
        let result = heuristic_match("ponlo en compras por favor", &categories).unwrap();
        assert_eq!(result.category_id.as_deref(), Some("cat_shopping"));
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn test_no_match() {
        assert!(heuristic_match("no sé", &default_categories()).is_none());
        assert!(heuristic_match("   ", &default_categories()).is_none());
    }

    #[test]
    fn test_passes_threshold_boundary() {
        assert!(Classification::matched("cat_food", 0.75).passes(0.75));
        assert!(!Classification::matched("cat_food", 0.7499).passes(0.75));
        assert!(!Classification {
            category_id: None,
            confidence: 1.0
        }
        .passes(0.75));
    }
}
