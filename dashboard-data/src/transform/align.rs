//! Inner join of two independently fetched time series on the trade date.

use crate::model::{Row, TimeSeriesPoint, points_from_rows};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use std::collections::HashMap;
use tracing::debug;

/// Decimal places kept by derived series.
pub const DERIVED_PRECISION: u32 = 2;

/// Two parsed series and their date-matched difference (`primary - secondary`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedSeriesPair {
    pub primary: Vec<TimeSeriesPoint>,
    pub secondary: Vec<TimeSeriesPoint>,
    /// Only dates present in both inputs, in primary order.
    pub difference: Vec<TimeSeriesPoint>,
}

impl AlignedSeriesPair {
    /// Number of primary points with no secondary partner.
    pub fn unmatched(&self) -> usize {
        self.primary.len().saturating_sub(self.difference.len())
    }
}

/// Parse both row lists with the given columns and join them on the date.
///
/// Rows without a parsable date or value are dropped before the join.
pub fn align(
    primary_rows: &[Row],
    secondary_rows: &[Row],
    date_field: &str,
    value_field: &str,
) -> AlignedSeriesPair {
    align_points(
        points_from_rows(primary_rows, date_field, value_field),
        points_from_rows(secondary_rows, date_field, value_field),
    )
}

/// Join two parsed series on exact date equality.
///
/// If the secondary series repeats a date, its last value is used.
pub fn align_points(
    primary: Vec<TimeSeriesPoint>,
    secondary: Vec<TimeSeriesPoint>,
) -> AlignedSeriesPair {
    let lookup: HashMap<NaiveDate, f64> = secondary
        .iter()
        .map(|point| (point.date(), point.value()))
        .collect();

    let difference: Vec<TimeSeriesPoint> = primary
        .iter()
        .filter_map(|point| {
            let other = lookup.get(&point.date())?;
            Some(TimeSeriesPoint::new(point.date(), round_derived(point.value() - other)))
        })
        .collect();

    let pair = AlignedSeriesPair {
        primary,
        secondary,
        difference,
    };

    if pair.unmatched() > 0 {
        debug!(
            unmatched = pair.unmatched(),
            matched = pair.difference.len(),
            "aligned series dropped dates missing from the secondary series"
        );
    }

    pair
}

/// Round a derived value to [`DERIVED_PRECISION`] decimals, half away from zero.
pub fn round_derived(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|decimal| {
            decimal.round_dp_with_strategy(DERIVED_PRECISION, RoundingStrategy::MidpointAwayFromZero)
        })
        .and_then(|decimal| decimal.to_f64())
        .unwrap_or(value)
}
