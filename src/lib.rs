//! # Pantry
//!
//! Ingredient-driven recipe recommendations.
//!
//! Given the ingredients someone has on hand, Pantry scores every recipe in a
//! fixed corpus, keeps the best matches, and reports how much of each recipe
//! the query covers. It runs as a CLI (`pantry recommend`) or as a small HTTP
//! service (`pantry serve`) behind a web frontend.
//!
//! ## Architecture
//!
//! ```text
//!  HTTP / CLI ──▶ RecommendationService ──▶ RetryPolicy ──▶ MatchBackend
//!                 (validate, normalize,                     │
//!                  shape response)          ┌───────────────┴──────────────┐
//!                                           ▼                              ▼
//!                                   InProcessBackend              CommandBackend
//!                                           │                    (pantry worker)
//!                                           ▼                              │
//!                                    MatchingEngine ◀──────────────────────┘
//!                                    Lexical | Embedding scorer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pantry corpus                              # inspect the recipe file
//! pantry recommend chicken rice "soy sauce"  # rank from the CLI
//! pantry embed                               # precompute embeddings
//! pantry serve                               # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Recipes, queries, scored results |
//! | [`error`] | Failure taxonomy |
//! | [`corpus`] | Recipe file loading and metadata inference |
//! | [`embedding`] | Embedding providers and the on-disk vector cache |
//! | [`matching`] | Scoring strategies and ranking |
//! | [`retry`] | Backoff and per-attempt timeout |
//! | [`backend`] | In-process and worker-process execution |
//! | [`service`] | Validation, retries, response shaping |
//! | [`worker`] | stdin/stdout matching worker |
//! | [`server`] | HTTP API |

pub mod backend;
pub mod config;
pub mod corpus;
pub mod embed_cmd;
pub mod embedding;
pub mod error;
pub mod matching;
pub mod models;
pub mod recommend;
pub mod retry;
pub mod server;
pub mod service;
pub mod stats;
pub mod worker;
