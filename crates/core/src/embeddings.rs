const DEFAULT: usize = 256;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Black-box text embedding. Vectors are compared with [`cosine_similarity`].
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Hashed character trigrams plus whole words, L2-normalised.
///
/// Deterministic and offline; word features keep short product names
/// ("mlimi") from drowning in boilerplate trigrams.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
    pub word_weight: f32,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            word_weight: 2.0,
        }
    }
}

impl CharacterNgramEmbedder {
    fn bucket(&self, token: &str, len: usize) -> usize {
        let mut hash = 1469598103934665603u64;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        (hash % len as u64) as usize
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| word.len() > 2)
        {
            let padded: Vec<char> = format!(" {word} ").chars().collect();
            for window in padded.windows(3) {
                let token = window.iter().collect::<String>();
                let bucket = self.bucket(&token, vector.len());
                vector[bucket] += 1.0;
            }
            let bucket = self.bucket(&format!("w:{word}"), vector.len());
            vector[bucket] += self.word_weight;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }
    let dot: f32 = left.iter().zip(right.iter()).map(|(x, y)| x * y).sum();
    let left_norm: f32 = left.iter().map(|x| x * x).sum::<f32>().sqrt();
    let right_norm: f32 = right.iter().map(|x| x * x).sum::<f32>().sqrt();
    if left_norm < f32::EPSILON || right_norm < f32::EPSILON {
        0.0
    } else {
        f64::from(dot / (left_norm * right_norm))
    }
}

#[cfg(test)]
mod tests {
    use super::{cosine_similarity, CharacterNgramEmbedder, Embedder};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Benefits of the Amayi Angathe account");
        let second = embedder.embed("Benefits of the Amayi Angathe account");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder {
            dimensions: 32,
            ..Default::default()
        };
        assert_eq!(embedder.embed("abc").len(), 32);
    }

    #[test]
    fn related_text_scores_higher() {
        let embedder = CharacterNgramEmbedder::default();
        let query = embedder.embed("mlimi loan requirements");
        let related = embedder.embed("Requirements for the Mlimi loan: national ID, farm lease");
        let unrelated = embedder.embed("Visa gold card travel insurance cover");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn empty_and_mismatched_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
