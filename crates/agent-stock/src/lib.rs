//! Stock market tools for the chat assistant
//!
//! Three tools backed by Yahoo Finance:
//!
//! - `get_stock_info`: company profile and price summary as JSON
//! - `get_stock_history`: daily OHLCV bars as a markdown table
//! - `get_stock_recommendation`: analyst rating counts as a markdown table
//!
//! Responses are cached with a short TTL for prices and a long one for
//! fundamentals.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_stock::{CacheManager, StockConfig, YahooMarketData, register_stock_tools};
//! use agent_tools::ToolRegistry;
//! use std::sync::Arc;
//!
//! let config = StockConfig::default();
//! let registry = ToolRegistry::new();
//! let market = Arc::new(YahooMarketData::new(config.clone())?);
//! register_stock_tools(&registry, market, &CacheManager::from_config(&config));
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod table;
pub mod tools;

pub use api::{MarketData, Period, Quote, RecommendationTrend, YahooMarketData};
pub use cache::{CacheKey, CacheManager, StockCache};
pub use config::StockConfig;
pub use error::{Result, StockError};
pub use tools::{
    StockHistoryTool, StockInfoTool, StockRecommendationTool, register_stock_tools,
};
