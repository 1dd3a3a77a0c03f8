//! Company summary tool

use agent_core::Result as AgentResult;
use agent_llm::tools::schema;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use super::{normalize_ticker, parse_params};
use crate::api::MarketData;
use crate::cache::{CacheKey, StockCache};
use crate::error::StockError;

/// `get_stock_info`: company profile, price and valuation fields
pub struct StockInfoTool {
    market: Arc<dyn MarketData>,
    cache: StockCache,
}

#[derive(Debug, Deserialize)]
struct InfoParams {
    ticker: String,
}

impl StockInfoTool {
    pub fn new(market: Arc<dyn MarketData>, cache: StockCache) -> Self {
        Self { market, cache }
    }
}

#[async_trait]
impl Tool for StockInfoTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        let params: InfoParams = parse_params(params)?;
        let symbol = normalize_ticker(&params.ticker)?;

        let info = self
            .cache
            .get_or_fetch(CacheKey::new(&symbol, "info"), || async {
                let summary = self.market.company_summary(&symbol).await?;
                let mut fields = Map::with_capacity(summary.len() + 1);
                fields.insert("symbol".to_string(), json!(symbol));
                fields.extend(summary);
                Ok::<_, StockError>(Value::Object(fields))
            })
            .await?;

        Ok(info)
    }

    fn name(&self) -> &'static str {
        "get_stock_info"
    }

    fn description(&self) -> &'static str {
        "Get the information of the specified stock: company profile, current price and valuation"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "ticker": schema::string("The ticker of the stock to get the information of"),
            }),
            vec!["ticker"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketData;
    use std::time::Duration;

    fn summary() -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("longName".to_string(), json!("Apple Inc."));
        fields.insert("regularMarketPrice".to_string(), json!(227.5));
        fields
    }

    #[tokio::test]
    async fn test_execute_normalizes_and_caches() {
        let mut market = MockMarketData::new();
        market
            .expect_company_summary()
            .withf(|symbol| symbol.to_string() == "AAPL")
            .times(1)
            .returning(|_| Ok(summary()));

        let tool = StockInfoTool::new(Arc::new(market), StockCache::new(Duration::from_secs(60)));

        let first = tool.execute(json!({"ticker": "aapl"})).await.unwrap();
        assert_eq!(first["symbol"], "AAPL");
        assert_eq!(first["longName"], "Apple Inc.");

        let second = tool.execute(json!({"ticker": " AAPL "})).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_upstream_failure_becomes_processing_error() {
        let mut market = MockMarketData::new();
        market
            .expect_company_summary()
            .returning(|symbol| Err(StockError::InvalidSymbol(symbol.to_string())));

        let tool = StockInfoTool::new(Arc::new(market), StockCache::new(Duration::from_secs(60)));
        let result = tool.execute(json!({"ticker": "ZZZZ"})).await;

        assert!(matches!(
            result,
            Err(agent_core::Error::ProcessingFailed(msg)) if msg == "Invalid symbol: ZZZZ"
        ));
    }

    #[tokio::test]
    async fn test_missing_ticker() {
        let tool = StockInfoTool::new(
            Arc::new(MockMarketData::new()),
            StockCache::new(Duration::from_secs(60)),
        );
        let result = tool.execute(json!({})).await;
        assert!(matches!(result, Err(agent_core::Error::ProcessingFailed(_))));
    }
}
