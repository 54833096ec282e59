//! Text Embeddings Module
//!
//! Provides deterministic, local embedding generation for similarity checks.
//! No model download, no external calls, no randomness.
//!
//! Supports:
//! - Hash-projection embeddings (100 dimensions by default)
//! - Cosine similarity
//! - A provider trait so a learned model can replace the hash projection

mod hash;

pub use hash::{cosine_similarity, Embedding, EmbeddingProvider, HashEmbedder, DEFAULT_DIMENSIONS};
