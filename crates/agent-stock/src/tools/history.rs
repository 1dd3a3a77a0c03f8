//! Price history tool

use agent_core::Result as AgentResult;
use agent_llm::tools::schema;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{normalize_ticker, parse_params};
use crate::api::{MarketData, Period};
use crate::cache::{CacheKey, StockCache};
use crate::error::StockError;
use crate::table::history_table;

/// `get_stock_history`: daily OHLCV bars as a markdown table
pub struct StockHistoryTool {
    market: Arc<dyn MarketData>,
    cache: StockCache,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    ticker: String,
    period: String,
}

impl StockHistoryTool {
    pub fn new(market: Arc<dyn MarketData>, cache: StockCache) -> Self {
        Self { market, cache }
    }
}

#[async_trait]
impl Tool for StockHistoryTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        let params: HistoryParams = parse_params(params)?;
        let symbol = normalize_ticker(&params.ticker)?;
        let period: Period = params.period.parse()?;

        let key = CacheKey::new(&symbol, "history").with_detail(period.as_str());
        let table = self
            .cache
            .get_or_fetch(key, || async {
                let quotes = self.market.price_history(&symbol, period).await?;
                if quotes.is_empty() {
                    return Err(StockError::DataUnavailable {
                        symbol: symbol.clone(),
                        reason: format!("No price history for period {period}"),
                    });
                }
                Ok::<_, StockError>(Value::String(history_table(&quotes)))
            })
            .await?;

        Ok(table)
    }

    fn name(&self) -> &'static str {
        "get_stock_history"
    }

    fn description(&self) -> &'static str {
        "Get the daily price history of the specified stock over a period"
    }

    fn input_schema(&self) -> Value {
        let periods: Vec<&str> = Period::ALL.iter().map(|p| p.as_str()).collect();
        schema::object(
            json!({
                "ticker": schema::string("The ticker of the stock to get the history of"),
                "period": schema::enumeration("The period of the history to get", &periods),
            }),
            vec!["ticker", "period"],
        )
    }
}
