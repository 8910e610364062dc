//! Recipe corpus loading.
//!
//! The corpus is a JSON array of recipe records read once at startup and
//! shared read-only as `Arc<RecipeCorpus>`. Records may omit derived
//! metadata (`cookingTime`, `difficulty`, `cuisine`, `description`, `id`);
//! those are filled in on load with the heuristics below so every
//! [`Recipe`] handed to the matcher is complete.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::models::{Difficulty, Recipe};

/// On-disk recipe record. Only `name` and `ingredients` are required.
#[derive(Debug, Deserialize)]
struct RawRecipe {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ingredients: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "cookingTime")]
    cooking_time: Option<u32>,
    #[serde(default)]
    difficulty: Option<Difficulty>,
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    directions: Option<Vec<String>>,
    #[serde(default)]
    source: Option<String>,
}

/// Immutable, validated recipe collection.
#[derive(Debug)]
pub struct RecipeCorpus {
    path: Option<PathBuf>,
    recipes: Vec<Recipe>,
    fingerprint: String,
}

impl RecipeCorpus {
    /// Read and validate a corpus file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Recipe file not found: {}", path.display());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recipe file: {}", path.display()))?;
        let raw: Vec<RawRecipe> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in recipe file: {}", path.display()))?;

        let mut corpus = Self::from_raw(raw)?;
        corpus.path = Some(path.to_path_buf());
        tracing::info!(
            recipes = corpus.len(),
            path = %path.display(),
            "loaded recipe corpus"
        );
        Ok(corpus)
    }

    /// Build a corpus from already-complete recipes (tests, embedders).
    pub fn from_recipes(recipes: Vec<Recipe>) -> Result<Self> {
        if recipes.is_empty() {
            bail!("recipe corpus is empty");
        }
        let mut seen = HashSet::new();
        for (idx, recipe) in recipes.iter().enumerate() {
            if recipe.ingredients.is_empty() {
                bail!("Recipe at index {} missing 'ingredients' field", idx);
            }
            // A blank ingredient is a substring of every query term.
            if let Some(pos) = recipe.ingredients.iter().position(|i| i.trim().is_empty()) {
                bail!("Recipe at index {} has a blank ingredient at position {}", idx, pos);
            }
            if !seen.insert(recipe.id) {
                bail!("Duplicate recipe id {} at index {}", recipe.id, idx);
            }
        }
        let fingerprint = fingerprint(&recipes);
        Ok(Self {
            path: None,
            recipes,
            fingerprint,
        })
    }

    fn from_raw(raw: Vec<RawRecipe>) -> Result<Self> {
        if raw.is_empty() {
            bail!("recipe corpus is empty");
        }
        let mut recipes = Vec::with_capacity(raw.len());
        for (idx, r) in raw.into_iter().enumerate() {
            let ingredients: Vec<String> = r
                .ingredients
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
            if ingredients.is_empty() {
                bail!("Recipe at index {} missing 'ingredients' field", idx);
            }
            let name = r
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Untitled Recipe".to_string());
            let directions = r.directions.filter(|d| !d.is_empty());
            let steps = directions.as_deref().unwrap_or(&[]);

            recipes.push(Recipe {
                id: r.id.unwrap_or(idx as u64 + 1),
                cooking_time: r.cooking_time.unwrap_or_else(|| estimate_cooking_time(steps)),
                difficulty: r
                    .difficulty
                    .unwrap_or_else(|| estimate_difficulty(&ingredients)),
                cuisine: r
                    .cuisine
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| detect_cuisine(&name, &ingredients).to_string()),
                description: r
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| default_description(steps)),
                name,
                ingredients,
                directions,
                source: r.source,
            });
        }
        Self::from_recipes(recipes)
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    /// Source file, when loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Hex SHA-256 over ids and ingredient text; keys the embedding cache.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Recipe counts grouped by cuisine and by difficulty.
    pub fn stats(&self) -> CorpusStats {
        let mut by_cuisine = BTreeMap::new();
        let mut by_difficulty = BTreeMap::new();
        for r in &self.recipes {
            *by_cuisine.entry(r.cuisine.clone()).or_insert(0) += 1;
            *by_difficulty
                .entry(r.difficulty.as_str().to_string())
                .or_insert(0) += 1;
        }
        CorpusStats {
            total: self.recipes.len(),
            by_cuisine,
            by_difficulty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorpusStats {
    pub total: usize,
    pub by_cuisine: BTreeMap<String, usize>,
    pub by_difficulty: BTreeMap<String, usize>,
}

fn fingerprint(recipes: &[Recipe]) -> String {
    let mut hasher = Sha256::new();
    for r in recipes {
        hasher.update(r.id.to_le_bytes());
        for ing in &r.ingredients {
            hasher.update(ing.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([0xffu8]);
    }
    hex::encode(hasher.finalize())
}

/// Minutes, from the number of direction steps.
pub fn estimate_cooking_time(directions: &[String]) -> u32 {
    match directions.len() {
        0..=3 => 15,
        4..=6 => 30,
        7..=10 => 45,
        _ => 60,
    }
}

pub fn estimate_difficulty(ingredients: &[String]) -> Difficulty {
    match ingredients.len() {
        0..=5 => Difficulty::Easy,
        6..=10 => Difficulty::Medium,
        _ => Difficulty::Hard,
    }
}

const CUISINE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Italian",
        &["pasta", "italian", "pizza", "parmesan", "mozzarella", "basil"],
    ),
    (
        "Indian",
        &["curry", "indian", "garam masala", "turmeric", "naan"],
    ),
    (
        "Mexican",
        &["taco", "mexican", "tortilla", "salsa", "cilantro", "jalapeño"],
    ),
    (
        "Asian",
        &["soy sauce", "asian", "stir fry", "wok", "ginger", "sesame"],
    ),
    ("Greek", &["greek", "feta", "mediterranean", "olive"]),
    ("French", &["french", "baguette", "croissant", "brie"]),
    (
        "Thai",
        &["thai", "coconut milk", "lemongrass", "fish sauce"],
    ),
];

/// First cuisine whose keywords appear in the name or ingredients.
pub fn detect_cuisine(name: &str, ingredients: &[String]) -> &'static str {
    let name = name.to_lowercase();
    let joined = ingredients.join(" ").to_lowercase();
    CUISINE_KEYWORDS
        .iter()
        .find(|(_, words)| {
            words
                .iter()
                .any(|w| name.contains(w) || joined.contains(w))
        })
        .map(|(cuisine, _)| *cuisine)
        .unwrap_or("American")
}

fn default_description(directions: &[String]) -> String {
    match directions.first() {
        Some(first) if !first.trim().is_empty() => {
            let trimmed: String = first.chars().take(250).collect();
            if trimmed.len() < first.len() {
                format!("{}...", trimmed)
            } else {
                trimmed
            }
        }
        _ => "A home-style recipe from the collection.".to_string(),
    }
}
