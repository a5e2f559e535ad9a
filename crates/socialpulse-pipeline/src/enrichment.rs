//! Search-interest enrichment. Strictly additive: any failure means "absent".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socialpulse_core::{EnrichmentResult, Instrument, Window};

use crate::error::EnrichmentError;

/// Fetches search interest for an instrument.
#[async_trait]
pub trait TrendsProvider: Send + Sync {
    async fn interest(
        &self,
        instrument: &Instrument,
        window: Window,
    ) -> Result<EnrichmentResult, EnrichmentError>;
}

/// Client for a trends sidecar exposing
/// `GET {base}/trends?symbol=AAPL&name=Apple%20Inc.&window=24h`.
pub struct HttpTrendsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTrendsProvider {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TrendsProvider for HttpTrendsProvider {
    async fn interest(
        &self,
        instrument: &Instrument,
        window: Window,
    ) -> Result<EnrichmentResult, EnrichmentError> {
        let response = self
            .client
            .get(format!("{}/trends", self.base_url))
            .query(&[
                ("symbol", instrument.symbol.as_str()),
                ("name", instrument.name.as_str()),
                ("window", window.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Upstream(format!(
                "trends sidecar returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EnrichmentError::Upstream(format!("trends response parse error: {e}")))
    }
}

/// The enrichment stage: optional provider, on/off flag, and a time bound.
pub struct Enricher {
    provider: Option<Arc<dyn TrendsProvider>>,
    enabled: bool,
    timeout: Duration,
}

impl Enricher {
    #[must_use]
    pub fn new(
        provider: Option<Arc<dyn TrendsProvider>>,
        enabled: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            enabled,
            timeout,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.provider.is_some()
    }

    /// Returns search interest, or `None` when disabled, failing, or too slow.
    pub async fn enrich(
        &self,
        instrument: &Instrument,
        window: Window,
    ) -> Option<EnrichmentResult> {
        let provider = match (&self.provider, self.enabled) {
            (Some(provider), true) => provider,
            _ => {
                tracing::debug!(symbol = %instrument.symbol, "enrichment disabled");
                return None;
            }
        };

        match tokio::time::timeout(self.timeout, provider.interest(instrument, window)).await {
            Ok(Ok(mut result)) => {
                result
                    .interest_over_time
                    .sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
                Some(result)
            }
            Ok(Err(e)) => {
                tracing::warn!(symbol = %instrument.symbol, error = %e, "enrichment unavailable");
                None
            }
            Err(_) => {
                tracing::warn!(
                    symbol = %instrument.symbol,
                    timeout_secs = self.timeout.as_secs(),
                    "enrichment timed out"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Failing;

    #[async_trait]
    impl TrendsProvider for Failing {
        async fn interest(
            &self,
            _: &Instrument,
            _: Window,
        ) -> Result<EnrichmentResult, EnrichmentError> {
            Err(EnrichmentError::Upstream("nope".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl TrendsProvider for Slow {
        async fn interest(
            &self,
            _: &Instrument,
            _: Window,
        ) -> Result<EnrichmentResult, EnrichmentError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Err(EnrichmentError::Upstream("late".to_string()))
        }
    }

    #[tokio::test]
    async fn disabled_flag_means_absent() {
        let enricher = Enricher::new(Some(Arc::new(Failing)), false, Duration::from_secs(5));
        assert!(!enricher.is_enabled());
        assert!(enricher
            .enrich(&Instrument::unlisted("AAPL"), Window::Hours24)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn provider_failure_means_absent() {
        let enricher = Enricher::new(Some(Arc::new(Failing)), true, Duration::from_secs(5));
        assert!(enricher
            .enrich(&Instrument::unlisted("AAPL"), Window::Hours24)
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let enricher = Enricher::new(Some(Arc::new(Slow)), true, Duration::from_secs(5));
        assert!(enricher
            .enrich(&Instrument::unlisted("AAPL"), Window::Hours24)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn http_provider_parses_and_sorts_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trends"))
            .and(query_param("symbol", "AAPL"))
            .and(query_param("window", "7d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "interest_over_time": [
                    {"timestamp": "2024-05-02T00:00:00Z", "value": 80.0},
                    {"timestamp": "2024-05-01T00:00:00Z", "value": 55.0}
                ],
                "related_queries": ["aapl stock", "apple earnings"],
                "interest_by_region": {"California": 100.0, "Texas": 64.0}
            })))
            .mount(&server)
            .await;

        let provider = HttpTrendsProvider::new(reqwest::Client::new(), &server.uri());
        let enricher = Enricher::new(Some(Arc::new(provider)), true, Duration::from_secs(5));
        let result = enricher
            .enrich(&Instrument::unlisted("AAPL"), Window::Days7)
            .await
            .unwrap();
        assert!((result.interest_over_time[0].value - 55.0).abs() < f64::EPSILON);
        assert_eq!(result.related_queries.len(), 2);
        assert_eq!(result.interest_by_region.len(), 2);
        assert!(result.fetched_at.is_none());
    }

    #[tokio::test]
    async fn http_error_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trends"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let provider = HttpTrendsProvider::new(reqwest::Client::new(), &server.uri());
        assert!(matches!(
            provider.interest(&Instrument::unlisted("AAPL"), Window::Hours24).await,
            Err(EnrichmentError::Upstream(_))
        ));
    }
}
