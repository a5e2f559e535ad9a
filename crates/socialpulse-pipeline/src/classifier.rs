//! TEI (Text Embeddings Inference) sequence-classification client.
//!
//! Serves a binary NEGATIVE/POSITIVE model behind `POST /predict`; the
//! probabilities are mapped by [`binary_classifier_score`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use socialpulse_core::SentimentScore;

use crate::error::ScoringError;
use crate::scorer::{binary_classifier_score, CLASSIFIER_MODEL};
use crate::scoring::SentimentModel;

/// Characters sent to the model; longer posts are truncated.
const MAX_INPUT_CHARS: usize = 1024;

#[derive(Serialize)]
struct PredictRequest<'a> {
    inputs: &'a str,
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    label: String,
    score: f64,
}

/// TEI HTTP client for the sentiment classifier.
pub struct TeiClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl TeiClassifier {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn predict(&self, text: &str) -> Result<Vec<Prediction>, ScoringError> {
        let truncated: String = text.chars().take(MAX_INPUT_CHARS).collect();
        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&PredictRequest {
                inputs: &truncated,
                truncate: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScoringError::Tei(format!(
                "TEI predict returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ScoringError::Tei(format!("TEI predict parse error: {e}")))
    }
}

/// Finds the NEGATIVE and POSITIVE probabilities, case-insensitively.
///
/// `LABEL_0`/`LABEL_1` are accepted as NEGATIVE/POSITIVE for models exported
/// without label names.
fn binary_probabilities(predictions: &[Prediction]) -> Result<(f64, f64), ScoringError> {
    let find = |names: [&str; 2]| {
        predictions
            .iter()
            .find(|p| names.iter().any(|n| p.label.eq_ignore_ascii_case(n)))
            .map(|p| p.score)
    };
    let negative = find(["NEGATIVE", "LABEL_0"]);
    let positive = find(["POSITIVE", "LABEL_1"]);
    match (negative, positive) {
        (Some(n), Some(p)) => Ok((n, p)),
        (Some(n), None) => Ok((n, 1.0 - n)),
        (None, Some(p)) => Ok((1.0 - p, p)),
        (None, None) => Err(ScoringError::Tei(
            "TEI predict response has no NEGATIVE/POSITIVE label".to_string(),
        )),
    }
}

#[async_trait]
impl SentimentModel for TeiClassifier {
    fn name(&self) -> &str {
        CLASSIFIER_MODEL
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
                tracing::debug!(error = %e, "sentiment classifier health check failed");
                false
            }
        }
    }

    async fn score(&self, text: &str) -> Result<SentimentScore, ScoringError> {
        let predictions = self.predict(text).await?;
        let (negative, positive) = binary_probabilities(&predictions)?;
        Ok(binary_classifier_score(negative, positive, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prediction(label: &str, score: f64) -> Prediction {
        Prediction {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn labels_are_matched_case_insensitively() {
        let (n, p) =
            binary_probabilities(&[prediction("positive", 0.7), prediction("Negative", 0.3)])
                .unwrap();
        assert!((n - 0.3).abs() < 1e-9);
        assert!((p - 0.7).abs() < 1e-9);
    }

    #[test]
    fn missing_label_is_inferred_from_the_other() {
        let (n, p) = binary_probabilities(&[prediction("LABEL_1", 0.8)]).unwrap();
        assert!((n - 0.2).abs() < 1e-9);
        assert!((p - 0.8).abs() < 1e-9);
    }

    #[test]
    fn unknown_labels_are_an_error() {
        assert!(binary_probabilities(&[prediction("joy", 0.9)]).is_err());
    }

    #[tokio::test]
    async fn scores_via_predict_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"label": "POSITIVE", "score": 0.9},
                {"label": "NEGATIVE", "score": 0.1}
            ])))
            .mount(&server)
            .await;

        let classifier = TeiClassifier::new(reqwest::Client::new(), &server.uri());
        let score = classifier.score("$AAPL is great").await.unwrap();
        assert!((score.polarity - 0.8).abs() < 1e-9);
        assert_eq!(score.model, CLASSIFIER_MODEL);
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let classifier = TeiClassifier::new(reqwest::Client::new(), &server.uri());
        assert!(matches!(
            classifier.score("text").await,
            Err(ScoringError::Tei(_))
        ));
    }

    #[tokio::test]
    async fn health_check_reflects_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let classifier = TeiClassifier::new(reqwest::Client::new(), &server.uri());
        assert!(classifier.health_check().await);

        let down = TeiClassifier::new(reqwest::Client::new(), "http://127.0.0.1:9");
        assert!(!down.health_check().await);
    }
}
