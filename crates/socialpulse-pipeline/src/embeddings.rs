//! Embedding capabilities: the TEI `/embed` client and the hash fallback.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::ScoringError;
use crate::scoring::Embedder;

/// Maximum number of texts per /embed call.
const BATCH_SIZE: usize = 64;

/// Scales `vector` to unit length in place. A zero vector is left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Deterministic placeholder embedding derived from SHA-256 of `text`.
///
/// Identical text always yields the identical unit vector.
#[must_use]
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = Vec::with_capacity(dimension);
    let mut block = 0u32;
    while vector.len() < dimension {
        let digest = Sha256::new()
            .chain_update(text.as_bytes())
            .chain_update(block.to_le_bytes())
            .finalize();
        for byte in digest {
            if vector.len() == dimension {
                break;
            }
            vector.push(f32::from(byte) / 127.5 - 1.0);
        }
        block += 1;
    }
    l2_normalize(&mut vector);
    vector
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
    truncate: bool,
}

/// TEI HTTP client for sentence embeddings.
pub struct TeiEmbedder {
    client: reqwest::Client,
    base_url: String,
    dimension: usize,
}

impl TeiEmbedder {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, dimension: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
        }
    }
}

#[async_trait]
impl Embedder for TeiEmbedder {
    fn name(&self) -> &str {
        "tei"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "embedding health check failed");
                false
            }
        }
    }

    /// Texts are batched into groups of [`BATCH_SIZE`] (64) per request.
    /// Returns one L2-normalized vector per input text, in the same order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ScoringError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let response = self
                .client
                .post(format!("{}/embed", self.base_url))
                .json(&EmbedRequest {
                    inputs: chunk,
                    truncate: true,
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ScoringError::Tei(format!(
                    "TEI returned status {}",
                    response.status()
                )));
            }

            let embeddings: Vec<Vec<f32>> = response
                .json()
                .await
                .map_err(|e| ScoringError::Tei(format!("TEI response parse error: {e}")))?;

            if embeddings.len() != chunk.len() {
                return Err(ScoringError::Tei(format!(
                    "TEI returned {} embeddings for {} inputs",
                    embeddings.len(),
                    chunk.len()
                )));
            }

            for mut embedding in embeddings {
                if embedding.len() != self.dimension {
                    return Err(ScoringError::Dimension {
                        expected: self.dimension,
                        got: embedding.len(),
                    });
                }
                l2_normalize(&mut embedding);
                all_embeddings.push(embedding);
            }
        }

        Ok(all_embeddings)
    }
}

/// Fallback embedder; never fails.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ScoringError> {
        Ok(texts
            .iter()
            .map(|t| hash_embedding(t, self.dimension))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn hash_embedding_is_deterministic_unit_length() {
        let a = hash_embedding("$AAPL to the moon", 384);
        let b = hash_embedding("$AAPL to the moon", 384);
        let c = hash_embedding("$AAPL to the floor", 384);
        assert_eq!(a.len(), 384);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!((norm(&a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn hash_embedding_handles_odd_dimensions() {
        assert_eq!(hash_embedding("x", 5).len(), 5);
        assert_eq!(hash_embedding("x", 33).len(), 33);
    }

    #[test]
    fn zero_vector_is_left_alone() {
        let mut v = vec![0.0_f32; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[tokio::test]
    async fn tei_embeddings_are_batched_and_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let n = body["inputs"].as_array().unwrap().len();
                ResponseTemplate::new(200).set_body_json(vec![vec![3.0_f32, 4.0_f32]; n])
            })
            .expect(2)
            .mount(&server)
            .await;

        let embedder = TeiEmbedder::new(reqwest::Client::new(), &server.uri(), 2);
        let texts = vec!["post"; 100];
        let embeddings = embedder.embed(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 100);
        assert!((embeddings[0][0] - 0.6).abs() < 1e-6);
        assert!((embeddings[99][1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn wrong_dimension_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![vec![1.0_f32; 3]]))
            .mount(&server)
            .await;

        let embedder = TeiEmbedder::new(reqwest::Client::new(), &server.uri(), 384);
        assert!(matches!(
            embedder.embed(&["one"]).await,
            Err(ScoringError::Dimension {
                expected: 384,
                got: 3
            })
        ));
    }
}
