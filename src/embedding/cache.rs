//! On-disk cache for per-recipe embeddings.
//!
//! Stored next to the corpus as `<stem>_embeddings.json`. A cache is only
//! trusted when the model, dimensionality, corpus fingerprint and vector
//! count all match the running configuration; anything else is treated as a
//! miss and recomputed.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{blob_to_vec, vec_to_blob};

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    model: String,
    dims: usize,
    fingerprint: String,
    /// Base64 of little-endian `f32` bytes, one entry per recipe.
    vectors: Vec<String>,
}

/// Cache location for a corpus file.
pub fn cache_path(corpus_path: &Path) -> PathBuf {
    let stem = corpus_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recipes".to_string());
    corpus_path.with_file_name(format!("{}_embeddings.json", stem))
}

/// Identifies which cache contents are valid.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey<'a> {
    pub model: &'a str,
    pub dims: usize,
    pub fingerprint: &'a str,
    pub count: usize,
}

/// Read cached vectors; `Ok(None)` on a miss or a stale cache.
pub fn load(path: &Path, key: &CacheKey<'_>) -> Result<Option<Vec<Vec<f32>>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read embedding cache: {}", path.display()))?;
    let file: CacheFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid embedding cache: {}", path.display()))?;

    if file.model != key.model
        || file.dims != key.dims
        || file.fingerprint != key.fingerprint
        || file.vectors.len() != key.count
    {
        tracing::info!(path = %path.display(), "embedding cache is stale");
        return Ok(None);
    }

    let mut vectors = Vec::with_capacity(file.vectors.len());
    for encoded in &file.vectors {
        let bytes = STANDARD
            .decode(encoded)
            .with_context(|| format!("Corrupt vector in {}", path.display()))?;
        let vec = blob_to_vec(&bytes);
        if vec.len() != key.dims {
            tracing::info!(path = %path.display(), "embedding cache has wrong dimensionality");
            return Ok(None);
        }
        vectors.push(vec);
    }
    Ok(Some(vectors))
}

/// Write vectors to the cache file.
pub fn store(path: &Path, key: &CacheKey<'_>, vectors: &[Vec<f32>]) -> Result<()> {
    let file = CacheFile {
        model: key.model.to_string(),
        dims: key.dims,
        fingerprint: key.fingerprint.to_string(),
        vectors: vectors.iter().map(|v| STANDARD.encode(vec_to_blob(v))).collect(),
    };
    let json = serde_json::to_string(&file)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write embedding cache: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key<'a>(fingerprint: &'a str) -> CacheKey<'a> {
        CacheKey {
            model: "all-minilm-l6-v2",
            dims: 2,
            fingerprint,
            count: 2,
        }
    }

    #[test]
    fn test_cache_path_uses_stem() {
        let p = cache_path(Path::new("/data/recipes.json"));
        assert_eq!(p, PathBuf::from("/data/recipes_embeddings.json"));
    }

    #[test]
    fn test_store_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("recipes_embeddings.json");
        let vectors = vec![vec![1.0, 0.5], vec![-0.25, 2.0]];

        store(&path, &key("abc"), &vectors).unwrap();
        assert_eq!(load(&path, &key("abc")).unwrap(), Some(vectors));
    }

    #[test]
    fn test_stale_fingerprint_is_miss() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("recipes_embeddings.json");
        store(&path, &key("abc"), &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();

        assert_eq!(load(&path, &key("def")).unwrap(), None);
    }

    #[test]
    fn test_missing_file_is_miss() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nothing.json");
        assert_eq!(load(&path, &key("abc")).unwrap(), None);
    }
}
