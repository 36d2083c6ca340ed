//! Core data types for dashboard responses.
//!
//! Time-series endpoints are consumed as untyped [`Row`]s (column name → JSON value) because the
//! shaping components select their date/value columns by name. Endpoints with a fixed nested
//! shape (option chains, short-sell snapshots, holding weights) are typed.

use crate::de::{de_f64, de_f64_or_zero, de_opt_f64, de_skip_invalid, de_string_or_number, value_as_f64};
use chrono::{DateTime, NaiveDate};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One raw tabular response row.
pub type Row = serde_json::Map<String, Value>;

/// Column names used by the dashboard API.
pub mod field {
    pub const TRADE_DATE: &str = "trade_date";
    pub const YIELD: &str = "yield";
    pub const YIELD_1Y: &str = "yield_1y";
    pub const YIELD_10Y: &str = "yield_10y";
    pub const YIELD_20Y: &str = "yield_20y";
    pub const ETF_SYMBOL: &str = "etf_symbol";
    pub const STOCK_SYMBOL: &str = "stock_symbol";
    pub const NORMALIZED_PRICE: &str = "normalized_price";
    pub const SHORT_PRICE: &str = "short_price";
    pub const SHORT_AMOUNT: &str = "short_amount";
    pub const TOTAL_AMOUNT: &str = "total_amount";
    pub const STOCK_CODE: &str = "股票代码";
    pub const STOCK_NAME: &str = "股票名称";
}

/// A single dated observation.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TimeSeriesPoint {
    date: NaiveDate,
    value: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }

    /// Parse a point from the named date and value columns of a row.
    ///
    /// Returns `None` if either column is missing, `null` or unparsable.
    pub fn from_row(row: &Row, date_field: &str, value_field: &str) -> Option<Self> {
        Some(Self {
            date: row_date(row, date_field)?,
            value: row_f64(row, value_field)?,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Parse every row that has a valid date and value, preserving input order.
pub fn points_from_rows(rows: &[Row], date_field: &str, value_field: &str) -> Vec<TimeSeriesPoint> {
    rows.iter()
        .filter_map(|row| TimeSeriesPoint::from_row(row, date_field, value_field))
        .collect()
}

/// Read a numeric column, tolerating string-encoded decimals.
pub fn row_f64(row: &Row, field: &str) -> Option<f64> {
    row.get(field).and_then(value_as_f64)
}

/// Read a textual column; numbers are rendered as text (eg/ numeric stock codes).
pub fn row_str(row: &Row, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Read a date column. Strings go through [`parse_trade_date`]; numbers are epoch milliseconds.
pub fn row_date(row: &Row, field: &str) -> Option<NaiveDate> {
    match row.get(field)? {
        Value::String(raw) => parse_trade_date(raw),
        Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|timestamp| timestamp.date_naive()),
        _ => None,
    }
}

/// Parse a trade date, keeping only the calendar day.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD` followed by a time component, RFC 3339 and RFC 2822 /
/// HTTP-date (`Mon, 01 Jan 2024 00:00:00 GMT`) encodings.
pub fn parse_trade_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }

    if let Some(prefix) = raw.get(..10) {
        if matches!(raw.as_bytes().get(10), Some(b'T' | b' ')) {
            if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
                return Some(date);
            }
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|timestamp| timestamp.date_naive())
        .ok()
}

/// Option contract side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum OptionType {
    #[display("CALL")]
    Call,
    #[display("PUT")]
    Put,
    #[display("OTHER")]
    Other,
}

impl From<String> for OptionType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => OptionType::Call,
            "put" | "p" => OptionType::Put,
            _ => OptionType::Other,
        }
    }
}

/// Aggregated volume and open interest for one strike and side within a tenor.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OptionRow {
    #[serde(deserialize_with = "de_f64")]
    pub strike: f64,
    pub option_type: OptionType,
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub total_volume: f64,
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub total_open_interest: f64,
}

impl OptionRow {
    pub fn new(strike: f64, option_type: OptionType, total_volume: f64, total_open_interest: f64) -> Self {
        Self {
            strike,
            option_type,
            total_volume,
            total_open_interest,
        }
    }
}

/// Option maturity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Tenor {
    #[display("Short term")]
    Short,
    #[display("Near term")]
    Near,
    #[display("Far term")]
    Far,
}

impl Tenor {
    pub const ALL: [Tenor; 3] = [Tenor::Short, Tenor::Near, Tenor::Far];
}

/// Option chain snapshot split into tenors (`GET /api/options/data/{symbol}`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OptionChain {
    #[serde(default)]
    pub latest_date: Option<String>,
    #[serde(default, deserialize_with = "de_skip_invalid")]
    pub short_term: Vec<OptionRow>,
    #[serde(default, deserialize_with = "de_skip_invalid")]
    pub near_term: Vec<OptionRow>,
    #[serde(default, deserialize_with = "de_skip_invalid")]
    pub far_term: Vec<OptionRow>,
}

impl OptionChain {
    pub fn tenor(&self, tenor: Tenor) -> &[OptionRow] {
        match tenor {
            Tenor::Short => &self.short_term,
            Tenor::Near => &self.near_term,
            Tenor::Far => &self.far_term,
        }
    }
}

/// Call/put pair of notional values, in units of 100M USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct CallPut {
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub call: f64,
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub put: f64,
}

/// Open-interest notional split between strikes within 10% of spot ("main battle") and the
/// rest ("support") (`GET /api/options/position_value/{symbol}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct PositionValue {
    #[serde(default)]
    pub main_battle: CallPut,
    #[serde(default)]
    pub support: CallPut,
    #[serde(default)]
    pub total: CallPut,
}

/// Current weight of one ETF constituent (`GET /api/etf/info/{symbol}`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HoldingWeight {
    pub stock_symbol: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub weight: Option<f64>,
}

impl HoldingWeight {
    /// Weight formatted as a percentage with 2 decimals, `--` if unknown.
    pub fn weight_label(&self) -> String {
        self.weight
            .map(|weight| format!("{weight:.2}%"))
            .unwrap_or_else(|| "--".to_string())
    }
}

/// One instrument of the latest short-sell snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShortSellRow {
    #[serde(rename = "股票代码", deserialize_with = "de_string_or_number")]
    pub code: String,
    #[serde(rename = "股票名称", default)]
    pub name: String,
    #[serde(rename = "最新价", default, deserialize_with = "de_opt_f64")]
    pub last_price: Option<f64>,
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub short_volume: f64,
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub short_price: f64,
    /// Short-sell turnover, 10k HKD
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub short_amount: f64,
    /// Total turnover, 10k HKD
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub total_amount: f64,
    /// Short-sell share of turnover, percent
    #[serde(default, deserialize_with = "de_f64_or_zero")]
    pub short_ratio: f64,
    #[serde(default)]
    pub trade_date: Option<String>,
}

/// Latest short-sell snapshot (`GET /api/shortsell/latest`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ShortSellSnapshot {
    #[serde(default)]
    pub latest_date: Option<String>,
    #[serde(default, deserialize_with = "de_skip_invalid")]
    pub data: Vec<ShortSellRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_trade_date_formats() {
        struct TestCase {
            input: &'static str,
            expected: Option<NaiveDate>,
        }

        let jan_2 = NaiveDate::from_ymd_opt(2024, 1, 2);

        let tests = vec![
            TestCase {
                // TC0: plain ISO date
                input: "2024-01-02",
                expected: jan_2,
            },
            TestCase {
                // TC1: ISO date with time component
                input: "2024-01-02T00:00:00",
                expected: jan_2,
            },
            TestCase {
                // TC2: ISO date with space separated time
                input: "2024-01-02 15:30:00",
                expected: jan_2,
            },
            TestCase {
                // TC3: HTTP-date as emitted by the server's JSON encoder
                input: "Tue, 02 Jan 2024 00:00:00 GMT",
                expected: jan_2,
            },
            TestCase {
                // TC4: RFC 3339 with offset
                input: "2024-01-02T08:00:00+08:00",
                expected: jan_2,
            },
            TestCase {
                // TC5: garbage
                input: "yesterday",
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_trade_date(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_point_from_row() {
        let valid = row(json!({"trade_date": "2024-01-01", "yield": "4.50"}));
        let null_value = row(json!({"trade_date": "2024-01-01", "yield": null}));
        let epoch_ms = row(json!({"trade_date": 1704067200000i64, "yield": 4.5}));

        assert_eq!(
            TimeSeriesPoint::from_row(&valid, field::TRADE_DATE, field::YIELD),
            Some(TimeSeriesPoint::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 4.5))
        );
        assert_eq!(TimeSeriesPoint::from_row(&null_value, field::TRADE_DATE, field::YIELD), None);
        assert_eq!(
            TimeSeriesPoint::from_row(&epoch_ms, field::TRADE_DATE, field::YIELD).map(|p| p.date()),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn test_option_chain_deserialize() {
        let chain: OptionChain = serde_json::from_value(json!({
            "latest_date": "2025-03-14",
            "short_term": [
                {"strike": 100.0, "option_type": "call", "term": "short", "total_volume": 50, "total_open_interest": 10},
                {"strike": "105", "option_type": "PUT", "total_volume": "7", "total_open_interest": null},
                {"strike": null, "option_type": "put", "total_volume": 1, "total_open_interest": 1}
            ],
            "near_term": []
        }))
        .unwrap();

        assert_eq!(chain.latest_date.as_deref(), Some("2025-03-14"));
        assert_eq!(
            chain.tenor(Tenor::Short),
            &[
                OptionRow::new(100.0, OptionType::Call, 50.0, 10.0),
                OptionRow::new(105.0, OptionType::Put, 7.0, 0.0),
            ]
        );
        assert!(chain.tenor(Tenor::Near).is_empty());
        assert!(chain.tenor(Tenor::Far).is_empty());
    }

    #[test]
    fn test_short_sell_snapshot_deserialize() {
        let snapshot: ShortSellSnapshot = serde_json::from_value(json!({
            "latest_date": "2025-03-14",
            "data": [{
                "股票代码": 700,
                "股票名称": "腾讯控股",
                "最新价": 512.5,
                "short_volume": 1200000,
                "short_price": "510.2",
                "short_amount": 61224.0,
                "total_amount": 480000.0,
                "short_ratio": 12.75,
                "trade_date": "Fri, 14 Mar 2025 00:00:00 GMT"
            }]
        }))
        .unwrap();

        let row = &snapshot.data[0];
        assert_eq!(row.code, "700");
        assert_eq!(row.name, "腾讯控股");
        assert_eq!(row.last_price, Some(512.5));
        assert_eq!(row.short_price, 510.2);
        assert_eq!(row.short_ratio, 12.75);
    }

    #[test]
    fn test_holding_weight_label() {
        let weight = HoldingWeight {
            stock_symbol: "AAPL".to_string(),
            weight: Some(12.3456),
        };
        let unknown = HoldingWeight {
            stock_symbol: "MSFT".to_string(),
            weight: None,
        };
        assert_eq!(weight.weight_label(), "12.35%");
        assert_eq!(unknown.weight_label(), "--");
    }
}
