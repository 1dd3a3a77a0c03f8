//! Markdown tables for tool output

use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::{ContentArrangement, Table};

use crate::api::{Quote, RecommendationTrend};

/// Render rows as a GitHub-flavored markdown table
pub fn markdown_table<H, R, C>(headers: H, rows: R) -> String
where
    H: IntoIterator,
    H::Item: ToString,
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: ToString,
{
    let mut table = Table::new();
    table
        .load_preset(ASCII_MARKDOWN)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(headers.into_iter().map(|h| h.to_string()).collect::<Vec<_>>());

    for row in rows {
        table.add_row(row.into_iter().map(|cell| cell.to_string()).collect::<Vec<_>>());
    }
    table.to_string()
}

/// Daily bars as `Date | Open | High | Low | Close | Adj Close | Volume`
pub fn history_table(quotes: &[Quote]) -> String {
    markdown_table(
        ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"],
        quotes.iter().map(|q| {
            vec![
                q.timestamp.format("%Y-%m-%d").to_string(),
                format!("{:.2}", q.open),
                format!("{:.2}", q.high),
                format!("{:.2}", q.low),
                format!("{:.2}", q.close),
                format!("{:.2}", q.adjclose),
                q.volume.to_string(),
            ]
        }),
    )
}

/// Recommendation counts per period
pub fn recommendation_table(trend: &[RecommendationTrend]) -> String {
    markdown_table(
        ["period", "strongBuy", "buy", "hold", "sell", "strongSell"],
        trend.iter().map(|t| {
            vec![
                t.period.clone(),
                t.strong_buy.to_string(),
                t.buy.to_string(),
                t.hold.to_string(),
                t.sell.to_string(),
                t.strong_sell.to_string(),
            ]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_markdown_shape() {
        let text = markdown_table(["a", "b"], [vec!["1", "2"], vec!["3", "4"]]);
        let lines: Vec<_> = text.lines().filter(|l| !l.trim().is_empty()).collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with('|') && lines[0].contains('a'));
        assert!(lines[1].chars().all(|c| matches!(c, '|' | '-' | ':' | ' ')));
        assert!(lines[3].contains('4'));
    }

    #[test]
    fn test_history_table() {
        let quotes = vec![Quote {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 7, 14, 30, 0).unwrap(),
            open: 100.0,
            high: 105.256,
            low: 99.5,
            close: 104.0,
            adjclose: 103.9,
            volume: 1_200_000,
        }];

        let text = history_table(&quotes);
        assert!(text.contains("Adj Close"));
        assert!(text.contains("2025-03-07"));
        assert!(text.contains("105.26"));
        assert!(text.contains("1200000"));
    }

    #[test]
    fn test_recommendation_table_keeps_period_order() {
        let row = |period: &str, buy| RecommendationTrend {
            period: period.to_string(),
            strong_buy: 0,
            buy,
            hold: 0,
            sell: 0,
            strong_sell: 0,
        };
        let text = recommendation_table(&[row("0m", 7), row("-1m", 9)]);

        let current = text.find("0m").unwrap();
        let previous = text.find("-1m").unwrap();
        assert!(current < previous);
        assert!(text.contains("strongSell"));
    }
}
