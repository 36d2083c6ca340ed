//! Strike-indexed call/put comparison buckets for diverging bar charts.

use crate::model::{OptionRow, OptionType};
use itertools::Itertools;
use serde::Serialize;
use tracing::warn;

/// Call and put quantities at one strike.
///
/// Put-side fields are stored negated so that puts render below the axis. Use the
/// `*_magnitude` accessors for totals, tooltips or any other numeric use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrikeBucket {
    pub strike: f64,
    pub call_volume: f64,
    pub put_volume: f64,
    pub call_open_interest: f64,
    pub put_open_interest: f64,
}

impl StrikeBucket {
    fn empty(strike: f64) -> Self {
        Self {
            strike,
            call_volume: 0.0,
            put_volume: 0.0,
            call_open_interest: 0.0,
            put_open_interest: 0.0,
        }
    }

    pub fn put_volume_magnitude(&self) -> f64 {
        self.put_volume.abs()
    }

    pub fn put_open_interest_magnitude(&self) -> f64 {
        self.put_open_interest.abs()
    }

    /// Tooltip lines for this strike, with magnitudes restored.
    pub fn tooltip(&self) -> Vec<String> {
        vec![
            format!("Strike: {}", format_strike(self.strike)),
            "Volume".to_string(),
            format!("  CALL {}", format_quantity(self.call_volume)),
            format!("  PUT  {}", format_quantity(self.put_volume_magnitude())),
            "Open interest".to_string(),
            format!("  CALL {}", format_quantity(self.call_open_interest)),
            format!("  PUT  {}", format_quantity(self.put_open_interest_magnitude())),
        ]
    }
}

/// Pivot option rows into one bucket per distinct strike, ascending.
///
/// A strike quoted on one side only gets zeros for the other side. Several rows for the same
/// strike and side (eg/ different expirations inside one tenor) are summed. Rows with an
/// unknown option type still contribute their strike.
pub fn pivot(rows: &[OptionRow]) -> Vec<StrikeBucket> {
    rows.iter()
        .map(|row| row.strike)
        .filter(|strike| strike.is_finite())
        .sorted_by(f64::total_cmp)
        .dedup()
        .map(|strike| {
            rows.iter()
                .filter(|row| row.strike == strike)
                .fold(StrikeBucket::empty(strike), |mut bucket, row| {
                    match row.option_type {
                        OptionType::Call => {
                            bucket.call_volume += row.total_volume;
                            bucket.call_open_interest += row.total_open_interest;
                        }
                        OptionType::Put => {
                            bucket.put_volume -= row.total_volume;
                            bucket.put_open_interest -= row.total_open_interest;
                        }
                        OptionType::Other => {
                            warn!(strike, "ignoring option row with unknown option type");
                        }
                    }
                    bucket
                })
        })
        .collect()
}

/// Chain-level totals computed from bucket magnitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChainTotals {
    pub call_volume: f64,
    pub put_volume: f64,
    pub call_open_interest: f64,
    pub put_open_interest: f64,
}

impl ChainTotals {
    pub fn from_buckets(buckets: &[StrikeBucket]) -> Self {
        buckets.iter().fold(Self::default(), |mut totals, bucket| {
            totals.call_volume += bucket.call_volume;
            totals.put_volume += bucket.put_volume_magnitude();
            totals.call_open_interest += bucket.call_open_interest;
            totals.put_open_interest += bucket.put_open_interest_magnitude();
            totals
        })
    }

    /// Put/call open interest ratio, `None` without call open interest.
    pub fn put_call_ratio(&self) -> Option<f64> {
        (self.call_open_interest > 0.0).then(|| self.put_open_interest / self.call_open_interest)
    }
}

/// Strike label without a trailing `.0` for whole strikes.
pub fn format_strike(strike: f64) -> String {
    if strike.fract() == 0.0 {
        format!("{strike:.0}")
    } else {
        format!("{strike}")
    }
}

/// Quantity with thousands separators, eg/ `1,234,567`.
pub fn format_quantity(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let grouped = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .join(",");
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
