/// Local embedder: hashed bag of words.
///
/// Each lower-cased word is hashed into one of `dimensions` buckets with a
/// hash-derived sign. Texts that share words end up with a positive cosine
/// similarity, which is enough for offline use and tests.
///
/// Vectors are persisted, so the hash is SHA-256 rather than a hasher whose
/// output may differ between toolchains.
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::Embedder;
use crate::error::Result;

pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for token in tokens(text) {
            let h = token_hash(&token);
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        } else {
            // No tokens: a fixed unit vector keeps cosine distance defined.
            let v = 1.0 / (self.dimensions as f32).sqrt();
            embedding.fill(v);
        }

        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

/// First 8 bytes of the token's SHA-256, big-endian.
fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Lower-cased alphanumeric words. Words with non-ASCII characters also
/// contribute each character, so unsegmented CJK text still overlaps.
fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        if !word.is_ascii() {
            out.extend(word.chars().map(String::from));
        }
        out.push(word);
    }
    out
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_embed_dimensions() {
        let embedder = HashEmbedder::new(384);
        let result = embedder.embed("hello world").await.unwrap();
        assert_eq!(result.len(), 384);
    }

    #[tokio::test]
    async fn test_embed_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[tokio::test]
    async fn test_embed_normalized() {
        let embedder = HashEmbedder::new(384);
        for text in ["test normalization", "", "   "] {
            let vec = embedder.embed(text).await.unwrap();
            let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 0.01, "got {norm} for {text:?}");
        }
    }

    #[tokio::test]
    async fn test_shared_words_are_similar() {
        let embedder = HashEmbedder::new(512);
        let a = embedder.embed("rust ownership and borrowing").await.unwrap();
        let b = embedder.embed("borrowing rules in Rust").await.unwrap();
        let c = embedder.embed("banana smoothie recipe").await.unwrap();
        assert!(cosine(&a, &b) > cosine(&a, &c));
        assert!(cosine(&a, &b) > 0.0);
    }

    #[tokio::test]
    async fn test_embed_batch() {
        let embedder = HashEmbedder::new(128);
        let texts: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let results = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], embedder.embed("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_vectors_are_pinned() {
        let embedder = HashEmbedder::new(8);
        let hello = embedder.embed("hello").await.unwrap();
        assert_eq!(hello, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

        let both = embedder.embed("Hello, world").await.unwrap();
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((both[6] - half).abs() < 1e-6);
        assert!((both[7] - half).abs() < 1e-6);
        assert!(both[..6].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_token_hash_is_sha256_prefix() {
        assert_eq!(token_hash("hello") % 16, 14);
        assert_eq!(token_hash("world") % 16, 15);
        assert_eq!(token_hash("hello") >> 63, 0);
    }

    #[test]
    fn test_tokens_split_cjk() {
        let t = tokens("日本語 Text");
        assert!(t.contains(&"日".to_string()));
        assert!(t.contains(&"text".to_string()));
    }
}
