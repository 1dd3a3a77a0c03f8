//! Analyst recommendation tool

use agent_core::Result as AgentResult;
use agent_llm::tools::schema;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{normalize_ticker, parse_params};
use crate::api::MarketData;
use crate::cache::{CacheKey, StockCache};
use crate::error::StockError;
use crate::table::recommendation_table;

/// `get_stock_recommendation`: analyst rating counts as a markdown table
pub struct StockRecommendationTool {
    market: Arc<dyn MarketData>,
    cache: StockCache,
}

#[derive(Debug, Deserialize)]
struct RecommendationParams {
    ticker: String,
}

impl StockRecommendationTool {
    pub fn new(market: Arc<dyn MarketData>, cache: StockCache) -> Self {
        Self { market, cache }
    }
}

#[async_trait]
impl Tool for StockRecommendationTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        let params: RecommendationParams = parse_params(params)?;
        let symbol = normalize_ticker(&params.ticker)?;

        let table = self
            .cache
            .get_or_fetch(CacheKey::new(&symbol, "recommendation"), || async {
                let trend = self.market.recommendation_trend(&symbol).await?;
                if trend.is_empty() {
                    return Err(StockError::DataUnavailable {
                        symbol: symbol.clone(),
                        reason: "No analyst recommendations".to_string(),
                    });
                }
                Ok::<_, StockError>(Value::String(recommendation_table(&trend)))
            })
            .await?;

        Ok(table)
    }

    fn name(&self) -> &'static str {
        "get_stock_recommendation"
    }

    fn description(&self) -> &'static str {
        "Get the analyst recommendations of the specified stock"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "ticker": schema::string("The ticker of the stock to get the recommendation of"),
            }),
            vec!["ticker"],
        )
    }
}
