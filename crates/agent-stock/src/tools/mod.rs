//! Stock tools exposed to the chat model

pub mod history;
pub mod info;
pub mod recommendation;

pub use history::StockHistoryTool;
pub use info::StockInfoTool;
pub use recommendation::StockRecommendationTool;

use crate::api::MarketData;
use crate::cache::CacheManager;
use crate::error::{Result, StockError};
use agent_tools::ToolRegistry;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Register the info, history and recommendation tools
pub fn register_stock_tools(
    registry: &ToolRegistry,
    market: Arc<dyn MarketData>,
    caches: &CacheManager,
) {
    registry.register(Arc::new(StockInfoTool::new(
        Arc::clone(&market),
        caches.fundamental.clone(),
    )));
    registry.register(Arc::new(StockHistoryTool::new(
        Arc::clone(&market),
        caches.realtime.clone(),
    )));
    registry.register(Arc::new(StockRecommendationTool::new(
        market,
        caches.fundamental.clone(),
    )));
}

/// Upper-cased, trimmed ticker; blank tickers are rejected
pub(crate) fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim();
    if ticker.is_empty() || ticker.chars().any(char::is_whitespace) {
        return Err(StockError::InvalidSymbol(raw.to_string()));
    }
    Ok(ticker.to_ascii_uppercase())
}

pub(crate) fn parse_params<T: for<'de> Deserialize<'de>>(params: Value) -> agent_core::Result<T> {
    serde_json::from_value(params)
        .map_err(|e| agent_core::Error::ProcessingFailed(format!("Invalid parameters: {e}")))
}
