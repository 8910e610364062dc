//! `pantry corpus`: summary of the loaded recipe collection.

use anyhow::Result;

use crate::config::Config;
use crate::corpus::RecipeCorpus;
use crate::embedding::cache;

pub fn run_corpus_stats(config: &Config) -> Result<()> {
    let corpus = RecipeCorpus::load(&config.corpus.path)?;
    let stats = corpus.stats();
    let cache_path = cache::cache_path(&config.corpus.path);

    println!("Pantry Recipe Corpus");
    println!("====================");
    println!();
    println!("  File:        {}", config.corpus.path.display());
    println!("  Recipes:     {}", stats.total);
    println!("  Fingerprint: {}", &corpus.fingerprint()[..12]);
    println!(
        "  Embeddings:  {}",
        if cache_path.exists() {
            cache_path.display().to_string()
        } else {
            "not cached".to_string()
        }
    );

    println!();
    println!("  By cuisine:");
    for (cuisine, count) in &stats.by_cuisine {
        println!("    {:<16} {:>6}", cuisine, count);
    }

    println!();
    println!("  By difficulty:");
    for (difficulty, count) in &stats.by_difficulty {
        println!("    {:<16} {:>6}", difficulty, count);
    }
    println!();
    Ok(())
}
