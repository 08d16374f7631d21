use async_trait::async_trait;
use chrono::Utc;
use reqwest::header;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use crate::core::price::{BASE_ASSET, DailyBar, PriceSource, TRACKED_DAYS, end_of_previous_day};

const APP_USER_AGENT: &str = "btcwatch/0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`PriceSource`] speaking the CryptoCompare min-api protocol.
pub struct CryptoCompareSource {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl CryptoCompareSource {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        CryptoCompareSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header(header::USER_AGENT, APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT);
        if let Some(key) = &self.api_key {
            request = request.header(header::AUTHORIZATION, format!("Apikey {key}"));
        }
        request
    }
}

// The histoday payload nests the bar list one envelope deep:
// {"Data": {"Data": [{...}, ...]}}
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(rename = "Data")]
    data: HistoryEnvelope,
}

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    #[serde(rename = "Data")]
    data: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    time: i64,
    high: f64,
    low: f64,
    open: f64,
    close: f64,
    volumefrom: f64,
    volumeto: f64,
}

impl From<HistoryEntry> for DailyBar {
    fn from(entry: HistoryEntry) -> Self {
        DailyBar {
            time: entry.time,
            open: entry.open,
            high: entry.high,
            low: entry.low,
            close: entry.close,
            volume_from: entry.volumefrom,
            volume_to: entry.volumeto,
        }
    }
}

#[async_trait]
impl PriceSource for CryptoCompareSource {
    #[instrument(
        name = "CurrentRateFetch",
        skip(self),
        fields(currency = %currency)
    )]
    async fn fetch_current_rate(&self, currency: ExchangeCurrency) -> Result<f64, RateError> {
        let url = format!(
            "{}/data/price?fsym={}&tsyms={}",
            self.base_url,
            BASE_ASSET,
            currency.code()
        );
        debug!("Requesting current rate from {}", url);

        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RateError::InvalidResponse(format!(
                "status {} for {}",
                response.status(),
                url
            )));
        }

        let rates: HashMap<String, f64> = response.json().await?;
        rates
            .get(currency.code())
            .copied()
            .ok_or(RateError::CurrencyNotFound(currency))
    }

    #[instrument(
        name = "DailyBarsFetch",
        skip(self),
        fields(currency = %currency)
    )]
    async fn fetch_daily_bars(
        &self,
        currency: ExchangeCurrency,
    ) -> Result<Vec<DailyBar>, RateError> {
        // limit counts from zero on the remote side, so 13 yields 14 bars.
        let to_ts = end_of_previous_day(Utc::now());
        let url = format!(
            "{}/data/v2/histoday?fsym={}&tsym={}&limit={}&toTs={}",
            self.base_url,
            BASE_ASSET,
            currency.code(),
            TRACKED_DAYS - 1,
            to_ts
        );
        debug!("Requesting daily bars from {}", url);

        let response = self.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(RateError::InvalidResponse(format!(
                "status {} for {}",
                response.status(),
                url
            )));
        }

        let history: HistoryResponse = response.json().await?;
        Ok(history.data.data.into_iter().map(DailyBar::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::price::SECONDS_PER_DAY;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(request_path: &str, body: serde_json::Value) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn sample_history(first_day: i64, count: usize) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                json!({
                    "time": first_day + i as i64 * SECONDS_PER_DAY,
                    "high": 42500.0 + i as f64,
                    "low": 41000.0 + i as f64,
                    "open": 41500.0 + i as f64,
                    "close": 42000.0 + i as f64,
                    "volumefrom": 1200.5,
                    "volumeto": 50_000_000.0
                })
            })
            .collect();
        json!({ "Data": { "Data": entries } })
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = create_mock_server("/data/price", json!({"EUR": 39123.45})).await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        let rate = source
            .fetch_current_rate(ExchangeCurrency::Eur)
            .await
            .expect("Failed to fetch rate");
        assert_eq!(rate, 39123.45);
    }

    #[tokio::test]
    async fn test_rate_fetch_sends_expected_query() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/price"))
            .and(query_param("fsym", "BTC"))
            .and(query_param("tsyms", "AUD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"AUD": 61000.0})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        let rate = source
            .fetch_current_rate(ExchangeCurrency::Aud)
            .await
            .unwrap();
        assert_eq!(rate, 61000.0);
    }

    #[tokio::test]
    async fn test_rate_fetch_sends_api_key_header() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/price"))
            .and(header("Authorization", "Apikey test-key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"EUR": 1.0})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = CryptoCompareSource::new(&mock_server.uri(), Some("test-key-1".to_string()));
        source
            .fetch_current_rate(ExchangeCurrency::Eur)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_currency_in_rate_response() {
        let mock_server = create_mock_server("/data/price", json!({"USD": 43000.0})).await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        let result = source.fetch_current_rate(ExchangeCurrency::Eur).await;
        assert!(matches!(result, Err(RateError::CurrencyNotFound(_))));
        assert_eq!(
            result.unwrap_err().to_string(),
            "currency EUR missing from response"
        );
    }

    #[tokio::test]
    async fn test_rate_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/price"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        let result = source.fetch_current_rate(ExchangeCurrency::Eur).await;
        assert!(matches!(result, Err(RateError::InvalidResponse(_))));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("status 500 Internal Server Error")
        );
    }

    #[tokio::test]
    async fn test_rate_malformed_payload() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/price"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        let result = source.fetch_current_rate(ExchangeCurrency::Eur).await;
        assert!(matches!(result, Err(RateError::DecodeFailure(_))));
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_unavailable() {
        // Nothing listens on this port.
        let source = CryptoCompareSource::new("http://127.0.0.1:9", None);
        let result = source.fetch_current_rate(ExchangeCurrency::Eur).await;
        assert!(matches!(result, Err(RateError::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_successful_daily_bars_fetch() {
        let first_day = 1_700_006_400;
        let mock_server =
            create_mock_server("/data/v2/histoday", sample_history(first_day, TRACKED_DAYS)).await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        let bars = source
            .fetch_daily_bars(ExchangeCurrency::Eur)
            .await
            .expect("Failed to fetch bars");

        assert_eq!(bars.len(), TRACKED_DAYS);
        assert_eq!(bars[0].time, first_day);
        assert_eq!(bars[0].open, 41500.0);
        assert_eq!(bars[0].volume_from, 1200.5);
        assert_eq!(bars[0].volume_to, 50_000_000.0);
        assert_eq!(
            bars[TRACKED_DAYS - 1].time - bars[0].time,
            (TRACKED_DAYS as i64 - 1) * SECONDS_PER_DAY
        );
    }

    #[tokio::test]
    async fn test_daily_bars_request_targets_previous_day_window() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v2/histoday"))
            .and(query_param("fsym", "BTC"))
            .and(query_param("tsym", "USD"))
            .and(query_param("limit", "13"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(sample_history(1_700_006_400, 14)),
            )
            .mount(&mock_server)
            .await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        source.fetch_daily_bars(ExchangeCurrency::Usd).await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let query = requests[0].url.query().unwrap_or_default().to_string();
        let to_ts: i64 = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("toTs="))
            .expect("toTs missing from query")
            .parse()
            .expect("toTs not numeric");
        // One second before a UTC day boundary, strictly in the past.
        assert_eq!((to_ts + 1) % SECONDS_PER_DAY, 0);
        assert!(to_ts < Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_daily_bars_empty_envelope_decodes_empty() {
        let mock_server =
            create_mock_server("/data/v2/histoday", json!({"Data": {"Data": []}})).await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        let bars = source.fetch_daily_bars(ExchangeCurrency::Eur).await.unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn test_daily_bars_error_envelope_is_decode_failure() {
        // The remote reports errors as 200 with an empty "Data" object.
        let mock_server = create_mock_server(
            "/data/v2/histoday",
            json!({"Response": "Error", "Message": "limit param out of range", "Data": {}}),
        )
        .await;

        let source = CryptoCompareSource::new(&mock_server.uri(), None);
        let result = source.fetch_daily_bars(ExchangeCurrency::Eur).await;
        assert!(matches!(result, Err(RateError::DecodeFailure(_))));
    }
}
