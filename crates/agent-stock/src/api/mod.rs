//! Market data access
//!
//! Tools talk to a [`MarketData`] implementation rather than to Yahoo
//! directly, so they can be exercised against a mock.

pub mod yahoo;

use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub use yahoo::YahooMarketData;

/// History span accepted by [`MarketData::price_history`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Self; 11] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
        Self::FiveYears,
        Self::TenYears,
        Self::YearToDate,
        Self::Max,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
            Self::TenYears => "10y",
            Self::YearToDate => "ytd",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|period| period.as_str() == wanted)
            .ok_or_else(|| StockError::InvalidPeriod(s.to_string()))
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjclose: f64,
    pub volume: u64,
}

/// Analyst rating counts for one period (`0m` = current month, `-1m`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationTrend {
    pub period: String,
    #[serde(default)]
    pub strong_buy: u32,
    #[serde(default)]
    pub buy: u32,
    #[serde(default)]
    pub hold: u32,
    #[serde(default)]
    pub sell: u32,
    #[serde(default)]
    pub strong_sell: u32,
}

/// Flat company profile and price summary, field name to value
pub type CompanySummary = Map<String, Value>;

/// Source of market data for the stock tools
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Company profile, price and valuation fields for `symbol`
    async fn company_summary(&self, symbol: &str) -> Result<CompanySummary>;

    /// Daily bars covering `period`, oldest first
    async fn price_history(&self, symbol: &str, period: Period) -> Result<Vec<Quote>>;

    /// Analyst recommendation counts, most recent period first
    async fn recommendation_trend(&self, symbol: &str) -> Result<Vec<RecommendationTrend>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parsing() {
        assert_eq!("1mo".parse::<Period>().unwrap(), Period::OneMonth);
        assert_eq!(" YTD ".parse::<Period>().unwrap(), Period::YearToDate);
        assert!(matches!(
            "2w".parse::<Period>(),
            Err(StockError::InvalidPeriod(p)) if p == "2w"
        ));
    }

    #[test]
    fn test_period_serializes_as_yahoo_range() {
        for period in Period::ALL {
            let json = serde_json::to_value(period).unwrap();
            assert_eq!(json, period.as_str());
        }
    }

    #[test]
    fn test_recommendation_trend_deserializes_yahoo_shape() {
        let trend: RecommendationTrend = serde_json::from_str(
            r#"{"period":"0m","strongBuy":11,"buy":21,"hold":6,"sell":0,"strongSell":1}"#,
        )
        .unwrap();
        assert_eq!(trend.strong_buy, 11);
        assert_eq!(trend.strong_sell, 1);
    }
}
