use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_MODEL_ID: &str = "miniLM-L6-v2-local-v1";
pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const LOCAL_HASH_BACKEND: &str = "local-hash-v1";

const MIN_EMBEDDING_DIM: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModelConfig {
    pub model_id: String,
    pub model_name: String,
    pub dimensions: usize,
    pub backend: String,
}

impl EmbeddingModelConfig {
    pub fn resolve(model_id: &str) -> Self {
        let trimmed = model_id.trim();
        if trimmed.is_empty() || trimmed == DEFAULT_MODEL_ID {
            return Self {
                model_id: DEFAULT_MODEL_ID.to_string(),
                model_name: DEFAULT_MODEL_NAME.to_string(),
                dimensions: DEFAULT_EMBEDDING_DIM,
                backend: LOCAL_HASH_BACKEND.to_string(),
            };
        }

        Self {
            model_id: trimmed.to_string(),
            model_name: trimmed.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIM,
            backend: LOCAL_HASH_BACKEND.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingFunction {
    config: EmbeddingModelConfig,
}

impl EmbeddingFunction {
    pub fn new(config: EmbeddingModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmbeddingModelConfig {
        &self.config
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions.max(MIN_EMBEDDING_DIM)
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let dims = self.dimensions();
        let mut vector = vec![0_f32; dims];

        for feature in text_features(text) {
            let hash = stable_hash(&feature);
            let index = (hash % dims as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            let weight = 1.0 + ((hash >> 48) & 0xFF) as f32 / 255.0;
            vector[index] += sign * weight;
        }

        l2_normalize(&mut vector);
        vector
    }
}

pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }

    left.iter()
        .zip(right)
        .map(|(l, r)| f64::from(*l) * f64::from(*r))
        .sum()
}

pub fn encode_embedding_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn decode_embedding_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if expected_dim == 0 || blob.len() != expected_dim.checked_mul(4)? {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect(),
    )
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn text_features(text: &str) -> Vec<String> {
    let words = text
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|ch| ch.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<String>>();

    let mut features = Vec::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn l2_normalize(values: &mut [f32]) {
    let norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>()
        .sqrt() as f32;

    if norm > 0.0 {
        for value in values {
            *value /= norm;
        }
    }
}
