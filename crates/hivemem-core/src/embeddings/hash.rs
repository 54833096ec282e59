//! Hash-Projection Embeddings
//!
//! A cheap, deterministic stand-in for a learned embedding model. Every
//! character scatters a weight proportional to its code point into a slot
//! picked by `(code_point * position) mod D`, then the vector is
//! L2-normalized.
//!
//! ## Limitations
//!
//! This is a syntactic proxy, not a semantic one. It rewards texts that share
//! characters at related positions and have similar lengths; paraphrases with
//! different wording score low, and unrelated texts built from the same
//! alphabet can score surprisingly high. Swap in a real model through
//! [`EmbeddingProvider`] when meaning matters.

use crate::consolidation::ConfigError;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default embedding dimensions
pub const DEFAULT_DIMENSIONS: usize = 100;

/// Weight applied to each character's normalized code point
const CHAR_WEIGHT: f32 = 0.1;

/// Code point divisor (byte range)
const CODE_POINT_SCALE: f32 = 255.0;

// ============================================================================
// EMBEDDING TYPE
// ============================================================================

/// A text embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// The embedding vector
    pub vector: Vec<f32>,
    /// Dimensions of the vector
    pub dimensions: usize,
}

impl Embedding {
    /// Create a new embedding from a vector
    pub fn new(vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        Self { vector, dimensions }
    }

    /// Zero vector of the given dimension
    pub fn zeros(dimensions: usize) -> Self {
        Self::new(vec![0.0; dimensions])
    }

    /// Euclidean norm
    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Normalize the embedding vector to unit length (zero vectors are left as-is)
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for x in &mut self.vector {
                *x /= norm;
            }
        }
    }

    /// Check if the embedding is normalized (unit length)
    pub fn is_normalized(&self) -> bool {
        (self.norm() - 1.0).abs() < 0.001
    }

    /// Check if every component is zero
    pub fn is_zero(&self) -> bool {
        self.vector.iter().all(|x| *x == 0.0)
    }
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// Converts text into a fixed-length embedding
///
/// Implementations must be deterministic: equal text, equal vector.
pub trait EmbeddingProvider {
    /// Embed a single text
    fn embed(&self, text: &str) -> Embedding;

    /// Output dimension
    fn dimensions(&self) -> usize;
}

// ============================================================================
// HASH EMBEDDER
// ============================================================================

/// Deterministic hash-projection embedder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

impl HashEmbedder {
    /// Create an embedder with the given output dimension
    pub fn new(dimensions: usize) -> Result<Self, ConfigError> {
        if dimensions == 0 {
            return Err(ConfigError::ZeroDimensions);
        }
        Ok(Self { dimensions })
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Embedding {
        let dims = self.dimensions as u64;
        let mut vector = vec![0.0_f32; self.dimensions];

        for (position, ch) in text.chars().enumerate() {
            let code_point = u64::from(u32::from(ch));
            // (c * i) mod D, reduced first so long texts cannot overflow
            let slot = ((code_point % dims) * (position as u64 % dims)) % dims;
            vector[slot as usize] += (code_point as f32 / CODE_POINT_SCALE) * CHAR_WEIGHT;
        }

        let mut embedding = Embedding::new(vector);
        embedding.normalize();
        embedding
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ============================================================================
// SIMILARITY FUNCTIONS
// ============================================================================

/// Cosine similarity of two vectors, clamped to `[-1, 1]`
///
/// `0.0` when the lengths differ or either vector has zero norm.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 {
        (dot / denominator).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================
