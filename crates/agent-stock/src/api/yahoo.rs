//! Yahoo Finance market data
//!
//! Price history goes through the `yahoo_finance_api` chart client. Company
//! summaries and recommendation trends come from the quoteSummary endpoint,
//! which needs a session cookie and a matching crumb.

use super::{CompanySummary, MarketData, Period, Quote, RecommendationTrend};
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use yahoo_finance_api as yahoo;

const SUMMARY_MODULES: &str = "price,summaryProfile,summaryDetail,defaultKeyStatistics,financialData";
const PROVIDER: &str = "yahoo";

/// [`MarketData`] backed by Yahoo Finance
pub struct YahooMarketData {
    client: Client,
    connector: yahoo::YahooConnector,
    config: StockConfig,
    crumb: RwLock<Option<String>>,
}

impl YahooMarketData {
    pub fn new(config: StockConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()?;
        let connector = yahoo::YahooConnector::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            connector,
            config,
            crumb: RwLock::new(None),
        })
    }

    /// Current crumb, fetched on first use or after a reset
    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut slot = self.crumb.write().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb().await?;
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    /// Forget `stale` unless another request already replaced it
    async fn reset_crumb(&self, stale: &str) {
        let mut slot = self.crumb.write().await;
        if slot.as_deref() == Some(stale) {
            *slot = None;
        }
    }

    /// Visit the cookie page, then exchange the session cookie for a crumb
    async fn fetch_crumb(&self) -> Result<String> {
        // The cookie page answers with an error status but still sets the cookie.
        if let Err(e) = self.client.get(&self.config.yahoo_cookie_url).send().await {
            warn!(error = %e, "Could not reach Yahoo cookie page");
        }

        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.config.yahoo_base_url))
            .send()
            .await?;
        let status = response.status();
        let crumb = response.text().await?.trim().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StockError::RateLimitExceeded {
                provider: PROVIDER.to_string(),
            });
        }
        if !status.is_success() || crumb.is_empty() || crumb.contains('<') {
            return Err(StockError::ApiError(format!(
                "Could not obtain Yahoo crumb (HTTP {status})"
            )));
        }
        debug!("Obtained Yahoo crumb");
        Ok(crumb)
    }

    /// Fetch quoteSummary `modules` for `symbol` and return the result object
    ///
    /// A rejected crumb (401/403) is refreshed once and the request retried.
    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<Map<String, Value>> {
        let crumb = self.crumb().await?;
        let mut response = self.send_quote_summary(symbol, modules, &crumb).await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            warn!(status = %response.status(), "Yahoo rejected the crumb, refreshing");
            self.reset_crumb(&crumb).await;
            let crumb = self.crumb().await?;
            response = self.send_quote_summary(symbol, modules, &crumb).await?;
        }

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StockError::RateLimitExceeded {
                provider: PROVIDER.to_string(),
            });
        }
        let body = response.text().await?;

        let envelope: QuoteSummaryEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(StockError::ApiError(format!("HTTP {status}: {body}")));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = envelope.quote_summary.error {
            return Err(if error.code.eq_ignore_ascii_case("not found") {
                StockError::InvalidSymbol(symbol.to_string())
            } else {
                StockError::ApiError(format!("{}: {}", error.code, error.description))
            });
        }

        envelope
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| StockError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "empty quoteSummary result".to_string(),
            })
    }

    async fn send_quote_summary(
        &self,
        symbol: &str,
        modules: &str,
        crumb: &str,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(format!(
                "{}/v10/finance/quoteSummary/{symbol}",
                self.config.yahoo_base_url
            ))
            .query(&[("modules", modules), ("crumb", crumb)])
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl MarketData for YahooMarketData {
    #[instrument(skip(self))]
    async fn company_summary(&self, symbol: &str) -> Result<CompanySummary> {
        let result = self.quote_summary(symbol, SUMMARY_MODULES).await?;
        Ok(flatten_modules(result))
    }

    #[instrument(skip(self))]
    async fn price_history(&self, symbol: &str, period: Period) -> Result<Vec<Quote>> {
        let response = self
            .connector
            .get_quote_range(symbol, "1d", period.as_str())
            .await?;
        let quotes = response.quotes()?;
        debug!(bars = quotes.len(), "Fetched price history");

        Ok(quotes
            .iter()
            .map(|q| Quote {
                timestamp: i64::try_from(q.timestamp)
                    .ok()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                open: q.open,
                high: q.high,
                low: q.low,
                close: q.close,
                adjclose: q.adjclose,
                volume: q.volume,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn recommendation_trend(&self, symbol: &str) -> Result<Vec<RecommendationTrend>> {
        let mut result = self.quote_summary(symbol, "recommendationTrend").await?;
        let trend = result
            .remove("recommendationTrend")
            .and_then(|mut module| module.get_mut("trend").map(Value::take))
            .unwrap_or(Value::Array(vec![]));

        Ok(serde_json::from_value(trend)?)
    }
}

/// Merge quoteSummary modules into one flat field map
///
/// Yahoo wraps numbers as `{"raw": 1.5, "fmt": "1.50"}`; the raw value is
/// kept (the formatted one when there is no raw). Empty wrappers are
/// dropped. The first module to provide a field wins.
fn flatten_modules(result: Map<String, Value>) -> CompanySummary {
    let mut summary = Map::new();

    for (_, module) in result {
        let Value::Object(fields) = module else {
            continue;
        };
        for (name, value) in fields {
            if name == "maxAge" || summary.contains_key(&name) {
                continue;
            }
            if let Some(value) = unwrap_field(value) {
                summary.insert(name, value);
            }
        }
    }
    summary
}

fn unwrap_field(value: Value) -> Option<Value> {
    match value {
        Value::Object(mut wrapper) if wrapper.contains_key("raw") || wrapper.contains_key("fmt") => {
            wrapper.remove("raw").or_else(|| wrapper.remove("fmt"))
        }
        Value::Object(map) if map.is_empty() => None,
        Value::Null => None,
        other => Some(other),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryEnvelope {
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<QuoteSummaryError>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryError {
    code: String,
    #[serde(default)]
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn market_for(server: &MockServer) -> YahooMarketData {
        Mock::given(method("GET"))
            .and(path("/cookie"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string("crumb-123"))
            .mount(server)
            .await;

        let config = StockConfig::builder()
            .yahoo_base_url(server.uri())
            .yahoo_cookie_url(format!("{}/cookie", server.uri()))
            .build()
            .unwrap();
        YahooMarketData::new(config).unwrap()
    }

    #[test]
    fn test_flatten_modules() {
        let result = json!({
            "price": {
                "maxAge": 1,
                "longName": "Apple Inc.",
                "regularMarketPrice": {"raw": 227.5, "fmt": "227.50"},
                "currency": "USD"
            },
            "summaryDetail": {
                "regularMarketPrice": {"raw": 1.0},
                "trailingPE": {"raw": 34.2, "fmt": "34.20"},
                "exDividendDate": {"fmt": "2025-02-10"},
                "dividendRate": {}
            }
        });
        let Value::Object(result) = result else {
            unreachable!()
        };

        let summary = flatten_modules(result);
        assert_eq!(summary["longName"], "Apple Inc.");
        assert_eq!(summary["regularMarketPrice"], 227.5);
        assert_eq!(summary["trailingPE"], 34.2);
        assert_eq!(summary["exDividendDate"], "2025-02-10");
        assert!(!summary.contains_key("dividendRate"));
        assert!(!summary.contains_key("maxAge"));
    }

    #[tokio::test]
    async fn test_company_summary_uses_crumb() {
        let server = MockServer::start().await;
        let market = market_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/AAPL"))
            .and(query_param("crumb", "crumb-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteSummary": {
                    "result": [{
                        "price": {"longName": "Apple Inc.", "regularMarketPrice": {"raw": 227.5}},
                        "summaryProfile": {"sector": "Technology"}
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let summary = market.company_summary("AAPL").await.unwrap();
        assert_eq!(summary["sector"], "Technology");
        assert_eq!(summary["regularMarketPrice"], 227.5);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let server = MockServer::start().await;
        let market = market_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/ZZZZ"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "quoteSummary": {
                    "result": null,
                    "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}
                }
            })))
            .mount(&server)
            .await;

        let result = market.company_summary("ZZZZ").await;
        assert!(matches!(result, Err(StockError::InvalidSymbol(s)) if s == "ZZZZ"));
    }

    #[tokio::test]
    async fn test_recommendation_trend() {
        let server = MockServer::start().await;
        let market = market_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/MSFT"))
            .and(query_param("modules", "recommendationTrend"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteSummary": {
                    "result": [{
                        "recommendationTrend": {
                            "trend": [
                                {"period": "0m", "strongBuy": 12, "buy": 30, "hold": 5, "sell": 0, "strongSell": 0},
                                {"period": "-1m", "strongBuy": 11, "buy": 31, "hold": 5, "sell": 1, "strongSell": 0}
                            ],
                            "maxAge": 86400
                        }
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let trend = market.recommendation_trend("MSFT").await.unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].period, "0m");
        assert_eq!(trend[1].sell, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_crumb() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let config = StockConfig::builder()
            .yahoo_base_url(server.uri())
            .yahoo_cookie_url(format!("{}/cookie", server.uri()))
            .build()
            .unwrap();
        let market = YahooMarketData::new(config).unwrap();

        let result = market.company_summary("AAPL").await;
        assert!(matches!(result, Err(StockError::RateLimitExceeded { .. })));
    }

    #[tokio::test]
    async fn test_rejected_crumb_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cookie"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string("crumb-old"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string("crumb-new"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/AAPL"))
            .and(query_param("crumb", "crumb-old"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "finance": {
                    "result": null,
                    "error": {"code": "Unauthorized", "description": "Invalid Crumb"}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/AAPL"))
            .and(query_param("crumb", "crumb-new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteSummary": {
                    "result": [{"price": {"longName": "Apple Inc."}}],
                    "error": null
                }
            })))
            .expect(2)
            .mount(&server)
            .await;

        let config = StockConfig::builder()
            .yahoo_base_url(server.uri())
            .yahoo_cookie_url(format!("{}/cookie", server.uri()))
            .build()
            .unwrap();
        let market = YahooMarketData::new(config).unwrap();

        let summary = market.company_summary("AAPL").await.unwrap();
        assert_eq!(summary["longName"], "Apple Inc.");

        // The refreshed crumb is kept for later requests
        market.company_summary("AAPL").await.unwrap();
    }

    #[test]
    fn test_history_connector_uses_configured_client_settings() {
        let config = StockConfig::builder()
            .request_timeout(std::time::Duration::from_secs(3))
            .user_agent("agent-rs-test/1.0")
            .build()
            .unwrap();

        assert!(YahooMarketData::new(config).is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_price_history() {
        let market = YahooMarketData::new(StockConfig::default()).unwrap();
        let quotes = market
            .price_history("AAPL", Period::OneMonth)
            .await
            .unwrap();
        assert!(!quotes.is_empty());
        assert!(quotes[0].close > 0.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_company_summary() {
        let market = YahooMarketData::new(StockConfig::default()).unwrap();
        let summary = market.company_summary("AAPL").await.unwrap();
        assert!(summary.contains_key("longName"));
    }
}
