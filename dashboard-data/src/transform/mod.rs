/// Date-keyed inner join of two series with a derived difference.
pub mod align;

/// Grouping of long-format price rows into per-symbol series.
pub mod normalize;

/// Strike pivot of option chain rows.
pub mod pivot;
