//! `pantry recommend`: rank recipes from the command line.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::corpus::RecipeCorpus;
use crate::models::RecommendationResult;
use crate::service::{RecommendRequest, RecommendationService};

/// Run one query and print it. Returns whether the request succeeded.
pub async fn run_recommend(
    config: &Config,
    ingredients: Vec<String>,
    top_k: Option<usize>,
    min_score: Option<f64>,
    json: bool,
) -> Result<bool> {
    let corpus = Arc::new(RecipeCorpus::load(&config.corpus.path)?);
    let service = RecommendationService::from_config(config, corpus)?;

    let mut request = RecommendRequest::new(ingredients);
    if let Some(k) = top_k {
        request = request.top_k(k);
    }
    if let Some(s) = min_score {
        request = request.min_score(s);
    }

    let result = service.recommend(request).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(result.success)
}

fn print_result(result: &RecommendationResult) {
    if !result.success {
        eprintln!(
            "Error: {}",
            result.error.as_deref().unwrap_or("recommendation failed")
        );
        return;
    }
    if let Some(message) = &result.message {
        println!("{}", message);
        return;
    }

    for (i, r) in result.recommendations.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} ({}, {})",
            i + 1,
            r.match_score,
            r.recipe.name,
            r.recipe.cuisine,
            r.recipe.difficulty.as_str()
        );
        println!("    cooking time: {} min", r.recipe.cooking_time);
        println!("    ingredients matched: {}%", r.ingredient_match_percentage);
        println!("    ingredients: {}", r.recipe.ingredients.join(", "));
        println!("    id: {}", r.recipe.id);
        println!();
    }
}
