//! Long-format price rows grouped into one normalized time series per symbol.

use crate::model::{Row, TimeSeriesPoint, row_date, row_f64, row_str};
use chrono::NaiveDate;
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::{HashMap, hash_map::Entry};
use tracing::{debug, warn};

/// Value every rebased series starts at.
pub const REBASE_BASE: f64 = 100.0;

/// Per-group time series in first-seen group order.
///
/// Points inside a group keep encounter order. A date seen twice in one group keeps the
/// position of its first occurrence with the value of the last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedSeries {
    groups: IndexMap<String, Vec<TimeSeriesPoint>>,
}

impl GroupedSeries {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Group keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.groups.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&[TimeSeriesPoint]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TimeSeriesPoint])> {
        self.groups
            .iter()
            .map(|(key, points)| (key.as_str(), points.as_slice()))
    }

    /// Earliest and latest date over every group.
    pub fn date_extent(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.points()
            .map(TimeSeriesPoint::date)
            .minmax()
            .into_option()
    }

    /// Largest value over every group.
    pub fn value_max(&self) -> Option<f64> {
        self.points()
            .map(TimeSeriesPoint::value)
            .max_by(f64::total_cmp)
    }

    /// Smallest value over every group.
    pub fn value_min(&self) -> Option<f64> {
        self.points()
            .map(TimeSeriesPoint::value)
            .min_by(f64::total_cmp)
    }

    /// Copy of one group sorted by date, for line drawing.
    pub fn sorted_by_date(&self, key: &str) -> Vec<TimeSeriesPoint> {
        self.get(key)
            .map(|points| {
                points
                    .iter()
                    .copied()
                    .sorted_by_key(TimeSeriesPoint::date)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First point of a group on or after `date` (bisect-left over the date-sorted group).
    pub fn nearest_at(&self, key: &str, date: NaiveDate) -> Option<TimeSeriesPoint> {
        let sorted = self.sorted_by_date(key);
        let index = sorted.partition_point(|point| point.date() < date);
        sorted.get(index).copied()
    }

    fn points(&self) -> impl Iterator<Item = &TimeSeriesPoint> {
        self.groups.values().flatten()
    }
}

impl FromIterator<(String, TimeSeriesPoint)> for GroupedSeries {
    fn from_iter<I: IntoIterator<Item = (String, TimeSeriesPoint)>>(iter: I) -> Self {
        let mut groups = IndexMap::<String, Vec<TimeSeriesPoint>>::new();
        // date -> position in the group's points, indexed like `groups`
        let mut positions = Vec::<HashMap<NaiveDate, usize>>::new();

        for (key, point) in iter {
            let entry = groups.entry(key);
            let group = entry.index();
            let points = entry.or_default();
            if group == positions.len() {
                positions.push(HashMap::new());
            }

            match positions[group].entry(point.date()) {
                Entry::Occupied(slot) => points[*slot.get()] = point,
                Entry::Vacant(slot) => {
                    slot.insert(points.len());
                    points.push(point);
                }
            }
        }

        Self { groups }
    }
}

/// Group long-format rows into one series per `group_key`.
///
/// Rows with a null, missing, unparsable or non-finite value are dropped before grouping, so
/// no `NaN` ever reaches a series. Rows missing the group key or the date are dropped too.
pub fn normalize(rows: &[Row], group_key: &str, date_field: &str, value_field: &str) -> GroupedSeries {
    let series: GroupedSeries = rows
        .iter()
        .filter_map(|row| {
            let key = row_str(row, group_key)?;
            let point = TimeSeriesPoint::new(row_date(row, date_field)?, row_f64(row, value_field)?);
            Some((key, point))
        })
        .collect();

    let kept: usize = series.groups.values().map(Vec::len).sum();
    if kept < rows.len() {
        debug!(
            dropped = rows.len() - kept,
            groups = series.len(),
            "normalize dropped rows without a usable key, date or value"
        );
    }

    series
}

/// Group rows like [`normalize`], then rebase every group to [`REBASE_BASE`] at its first
/// valid value.
///
/// A group whose first value is zero cannot be rebased and yields no points.
pub fn rebase(rows: &[Row], group_key: &str, date_field: &str, value_field: &str) -> GroupedSeries {
    let grouped = normalize(rows, group_key, date_field, value_field);

    let mut rebased = GroupedSeries::default();
    for (key, points) in grouped.groups {
        let Some(first) = points.first().map(TimeSeriesPoint::value) else {
            continue;
        };
        if first == 0.0 {
            warn!(%key, "cannot rebase series starting at zero");
            continue;
        }

        let scaled = points
            .into_iter()
            .map(|point| TimeSeriesPoint::new(point.date(), point.value() * REBASE_BASE / first))
            .collect();

        rebased.groups.insert(key, scaled);
    }

    rebased
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field;
    use serde_json::json;

    fn rows(value: serde_json::Value) -> Vec<Row> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row.as_object().cloned().unwrap())
            .collect()
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_normalize_filters_null_values() {
        let input = rows(json!([
            {"etf_symbol": "SPY", "trade_date": "2025-01-02", "normalized_price": null},
            {"etf_symbol": "SPY", "trade_date": "2025-01-03", "normalized_price": 101.5}
        ]));

        let series = normalize(&input, field::ETF_SYMBOL, field::TRADE_DATE, field::NORMALIZED_PRICE);

        assert_eq!(series.len(), 1);
        assert_eq!(
            series.get("SPY").unwrap(),
            &[TimeSeriesPoint::new(date("2025-01-03"), 101.5)]
        );
    }

    #[test]
    fn test_normalize_keeps_first_seen_group_order() {
        let input = rows(json!([
            {"etf_symbol": "QQQ", "trade_date": "2025-01-03", "normalized_price": 100.0},
            {"etf_symbol": "SPY", "trade_date": "2025-01-03", "normalized_price": 100.0},
            {"etf_symbol": "QQQ", "trade_date": "2025-01-02", "normalized_price": 99.0},
            {"etf_symbol": "GLD", "trade_date": "2025-01-02", "normalized_price": 98.0}
        ]));

        let series = normalize(&input, field::ETF_SYMBOL, field::TRADE_DATE, field::NORMALIZED_PRICE);

        assert_eq!(series.keys().collect::<Vec<_>>(), vec!["QQQ", "SPY", "GLD"]);
        // encounter order, not date order
        assert_eq!(
            series.get("QQQ").unwrap(),
            &[
                TimeSeriesPoint::new(date("2025-01-03"), 100.0),
                TimeSeriesPoint::new(date("2025-01-02"), 99.0),
            ]
        );
    }

    #[test]
    fn test_normalize_duplicate_date_last_wins() {
        let input = rows(json!([
            {"etf_symbol": "SPY", "trade_date": "2025-01-02", "normalized_price": 100.0},
            {"etf_symbol": "SPY", "trade_date": "2025-01-03", "normalized_price": 101.0},
            {"etf_symbol": "SPY", "trade_date": "2025-01-02", "normalized_price": 100.5}
        ]));

        let series = normalize(&input, field::ETF_SYMBOL, field::TRADE_DATE, field::NORMALIZED_PRICE);

        assert_eq!(
            series.get("SPY").unwrap(),
            &[
                TimeSeriesPoint::new(date("2025-01-02"), 100.5),
                TimeSeriesPoint::new(date("2025-01-03"), 101.0),
            ]
        );
    }

    #[test]
    fn test_normalize_duplicate_dates_across_interleaved_groups() {
        let input = rows(json!([
            {"stock_symbol": "AAPL", "trade_date": "2025-01-02", "normalized_price": 1.0},
            {"stock_symbol": "MSFT", "trade_date": "2025-01-02", "normalized_price": 2.0},
            {"stock_symbol": "AAPL", "trade_date": "2025-01-03", "normalized_price": 3.0},
            {"stock_symbol": "MSFT", "trade_date": "2025-01-02", "normalized_price": 4.0},
            {"stock_symbol": "AAPL", "trade_date": "2025-01-02", "normalized_price": 5.0},
            {"stock_symbol": "MSFT", "trade_date": "2025-01-03", "normalized_price": 6.0}
        ]));

        let series = normalize(&input, field::STOCK_SYMBOL, field::TRADE_DATE, field::NORMALIZED_PRICE);

        assert_eq!(series.keys().collect::<Vec<_>>(), vec!["AAPL", "MSFT"]);
        assert_eq!(
            series.get("AAPL").unwrap(),
            &[
                TimeSeriesPoint::new(date("2025-01-02"), 5.0),
                TimeSeriesPoint::new(date("2025-01-03"), 3.0),
            ]
        );
        assert_eq!(
            series.get("MSFT").unwrap(),
            &[
                TimeSeriesPoint::new(date("2025-01-02"), 4.0),
                TimeSeriesPoint::new(date("2025-01-03"), 6.0),
            ]
        );
    }

    #[test]
    fn test_normalize_never_emits_non_finite_values() {
        let input = rows(json!([
            {"stock_symbol": "AAPL", "trade_date": "2025-01-02", "normalized_price": "NaN"},
            {"stock_symbol": "AAPL", "trade_date": "2025-01-03", "normalized_price": "inf"},
            {"stock_symbol": "AAPL", "trade_date": "2025-01-04", "normalized_price": ""},
            {"stock_symbol": "AAPL", "trade_date": "2025-01-05"},
            {"stock_symbol": null, "trade_date": "2025-01-05", "normalized_price": 1.0},
            {"stock_symbol": "MSFT", "trade_date": "bad", "normalized_price": 1.0},
            {"stock_symbol": "MSFT", "trade_date": "2025-01-06", "normalized_price": "97.25"}
        ]));

        let series = normalize(&input, field::STOCK_SYMBOL, field::TRADE_DATE, field::NORMALIZED_PRICE);

        assert!(!series.contains("AAPL"));
        assert!(series.iter().all(|(_, points)| points.iter().all(|p| p.value().is_finite())));
        assert_eq!(series.get("MSFT").unwrap().len(), 1);
    }

    #[test]
    fn test_grouped_series_helpers() {
        let input = rows(json!([
            {"etf_symbol": "SPY", "trade_date": "2025-01-06", "normalized_price": 103.0},
            {"etf_symbol": "SPY", "trade_date": "2025-01-02", "normalized_price": 100.0},
            {"etf_symbol": "QQQ", "trade_date": "2025-01-03", "normalized_price": 108.0},
            {"etf_symbol": "SPY", "trade_date": "2025-01-03", "normalized_price": 97.0}
        ]));

        let series = normalize(&input, field::ETF_SYMBOL, field::TRADE_DATE, field::NORMALIZED_PRICE);

        assert_eq!(series.date_extent(), Some((date("2025-01-02"), date("2025-01-06"))));
        assert_eq!(series.value_max(), Some(108.0));
        assert_eq!(series.value_min(), Some(97.0));

        let sorted: Vec<_> = series.sorted_by_date("SPY").iter().map(|p| p.date()).collect();
        assert_eq!(sorted, vec![date("2025-01-02"), date("2025-01-03"), date("2025-01-06")]);

        assert_eq!(series.nearest_at("SPY", date("2025-01-04")).map(|p| p.value()), Some(103.0));
        assert_eq!(series.nearest_at("SPY", date("2025-01-03")).map(|p| p.value()), Some(97.0));
        assert_eq!(series.nearest_at("SPY", date("2025-02-01")), None);
        assert_eq!(series.nearest_at("IWM", date("2025-01-01")), None);

        assert_eq!(GroupedSeries::default().date_extent(), None);
        assert_eq!(GroupedSeries::default().value_max(), None);
    }

    #[test]
    fn test_rebase_to_first_value() {
        let input = rows(json!([
            {"stock_symbol": "AAPL", "trade_date": "2025-01-02", "close": null},
            {"stock_symbol": "AAPL", "trade_date": "2025-01-03", "close": 200.0},
            {"stock_symbol": "AAPL", "trade_date": "2025-01-06", "close": 210.0},
            {"stock_symbol": "ZERO", "trade_date": "2025-01-03", "close": 0.0},
            {"stock_symbol": "ZERO", "trade_date": "2025-01-06", "close": 5.0}
        ]));

        let series = rebase(&input, field::STOCK_SYMBOL, field::TRADE_DATE, "close");

        assert_eq!(
            series.get("AAPL").unwrap(),
            &[
                TimeSeriesPoint::new(date("2025-01-03"), 100.0),
                TimeSeriesPoint::new(date("2025-01-06"), 105.0),
            ]
        );
        assert!(!series.contains("ZERO"));
    }
}
