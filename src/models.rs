//! Core data models used throughout Pantry.
//!
//! These types represent the recipes, queries, and scored results that flow
//! through the matching and recommendation pipeline. Field names on the wire
//! follow the JSON contract consumed by the web frontend (`cookingTime`,
//! `match_score`, `ingredient_match_percentage`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::FailureKind;

/// How demanding a recipe is to cook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// A recipe from the corpus. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: u64,
    pub name: String,
    pub ingredients: Vec<String>,
    pub description: String,
    /// Minutes.
    #[serde(rename = "cookingTime")]
    pub cooking_time: u32,
    pub difficulty: Difficulty,
    pub cuisine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Recipe {
    /// Text fed to the embedding provider for this recipe.
    pub fn ingredient_text(&self) -> String {
        self.ingredients.join(", ")
    }
}

/// A normalized ingredient query.
///
/// Elements are trimmed, lowercased and non-empty; duplicates collapse.
/// Backed by a `BTreeSet` so iteration order is independent of input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    ingredients: BTreeSet<String>,
}

impl Query {
    /// Normalize raw ingredient strings into a query.
    ///
    /// Returns `None` when nothing survives normalization.
    pub fn normalize<I, S>(raw: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ingredients: BTreeSet<String> = raw
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if ingredients.is_empty() {
            None
        } else {
            Some(Self { ingredients })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ingredients.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }

    /// Comma-joined form used as embedding input.
    pub fn text(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ingredients.iter().cloned().collect()
    }
}

/// A recipe scored against one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecipe {
    #[serde(flatten)]
    pub recipe: Recipe,
    /// Primary ranking key in `[0, 1]`.
    pub match_score: f64,
    /// Share of the recipe's own ingredients covered by the query, `[0, 100]`.
    pub ingredient_match_percentage: f64,
}

/// Outcome of a single recommendation request.
///
/// Serializes to the public response shape. `failure` is kept off the wire;
/// the HTTP layer uses it to pick a status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub success: bool,
    pub count: usize,
    pub recommendations: Vec<ScoredRecipe>,
    pub query: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

/// Shown instead of an error when matching worked but nothing qualified.
pub const EMPTY_RESULT_MESSAGE: &str = "No matching recipes found. Try different ingredients.";

impl RecommendationResult {
    pub fn success(recommendations: Vec<ScoredRecipe>, query: Vec<String>) -> Self {
        let message = if recommendations.is_empty() {
            Some(EMPTY_RESULT_MESSAGE.to_string())
        } else {
            None
        };
        Self {
            success: true,
            count: recommendations.len(),
            recommendations,
            query,
            error: None,
            message,
            failure: None,
        }
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>, query: Vec<String>) -> Self {
        Self {
            success: false,
            count: 0,
            recommendations: Vec::new(),
            query,
            error: Some(error.into()),
            message: None,
            failure: Some(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe() -> Recipe {
        Recipe {
            id: 7,
            name: "Fried Rice".to_string(),
            ingredients: vec!["rice".to_string(), "egg".to_string()],
            description: "Quick".to_string(),
            cooking_time: 15,
            difficulty: Difficulty::Easy,
            cuisine: "Asian".to_string(),
            directions: None,
            source: None,
        }
    }

    #[test]
    fn test_query_normalizes_and_dedupes() {
        let q = Query::normalize(["  Rice ", "rice", "SOY Sauce", ""]).unwrap();
        assert_eq!(q.to_vec(), vec!["rice", "soy sauce"]);
    }

    #[test]
    fn test_query_normalization_idempotent() {
        let q = Query::normalize(["Chicken", " garlic", "chicken "]).unwrap();
        let again = Query::normalize(q.to_vec()).unwrap();
        assert_eq!(q, again);
    }

    #[test]
    fn test_query_order_independent() {
        let a = Query::normalize(["b", "a", "c"]).unwrap();
        let b = Query::normalize(["c", "b", "a"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.text(), "a, b, c");
    }

    #[test]
    fn test_query_all_blank_is_none() {
        assert!(Query::normalize(["  ", ""]).is_none());
    }

    #[test]
    fn test_scored_recipe_wire_shape() {
        let scored = ScoredRecipe {
            recipe: recipe(),
            match_score: 0.5,
            ingredient_match_percentage: 50.0,
        };
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["cookingTime"], 15);
        assert_eq!(json["difficulty"], "easy");
        assert_eq!(json["match_score"], 0.5);
        assert!(json.get("directions").is_none());
        assert!(json.get("recipe").is_none());
    }

    #[test]
    fn test_empty_success_carries_message() {
        let result = RecommendationResult::success(Vec::new(), vec!["kale".to_string()]);
        assert!(result.success);
        assert_eq!(result.count, 0);
        assert_eq!(result.message.as_deref(), Some(EMPTY_RESULT_MESSAGE));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("failure").is_none());
        assert!(json.get("error").is_none());
    }
}
