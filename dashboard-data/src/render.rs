//! Render-agnostic chart frames and the adapter boundary to a chart backend.

use crate::model::TimeSeriesPoint;
use chrono::{Days, NaiveDate};
use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
pub enum SeriesKind {
    Line,
    Bar,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Deserialize, Serialize)]
pub enum AxisSide {
    Left,
    Right,
}

/// One named series of `(x, y)` points.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub kind: SeriesKind,
    pub axis: AxisSide,
    pub points: Vec<(f64, f64)>,
}

impl ChartSeries {
    pub fn line<S: Into<String>>(name: S, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            kind: SeriesKind::Line,
            axis: AxisSide::Left,
            points,
        }
    }

    pub fn bar<S: Into<String>>(name: S, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            kind: SeriesKind::Bar,
            axis: AxisSide::Left,
            points,
        }
    }

    /// Line over time from dated points.
    pub fn time_line<S: Into<String>>(name: S, points: &[TimeSeriesPoint]) -> Self {
        Self::line(name, time_points(points))
    }

    pub fn on_right_axis(mut self) -> Self {
        self.axis = AxisSide::Right;
        self
    }
}

/// X axis semantics of a frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum XAxis {
    /// `x` is days since 1970-01-01 (see [`time_x`]).
    Time,
    /// `x` is an index into the labels.
    Category(Vec<String>),
}

/// Everything an adapter needs to draw one chart.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChartFrame {
    pub title: String,
    pub x_axis: XAxis,
    pub series: Vec<ChartSeries>,
}

impl ChartFrame {
    pub fn new<S: Into<String>>(title: S, x_axis: XAxis, series: Vec<ChartSeries>) -> Self {
        Self {
            title: title.into(),
            x_axis,
            series,
        }
    }

    /// Explicit placeholder for a panel whose dataset is empty.
    pub fn no_data<S: Into<String>>(title: S) -> Self {
        Self::new(title, XAxis::Time, Vec::new())
    }

    /// Whether no series carries a single point.
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|series| series.points.is_empty())
    }

    /// Min and max `y` over the series on one axis.
    pub fn y_bounds(&self, axis: AxisSide) -> Option<(f64, f64)> {
        bounds(
            self.series
                .iter()
                .filter(|series| series.axis == axis)
                .flat_map(|series| series.points.iter().map(|(_, y)| *y)),
        )
    }

    /// Min and max `x` over every series.
    pub fn x_bounds(&self) -> Option<(f64, f64)> {
        bounds(
            self.series
                .iter()
                .flat_map(|series| series.points.iter().map(|(x, _)| *x)),
        )
    }
}

/// Chart backend boundary. Implementations own drawing only.
pub trait ChartRenderAdapter {
    /// Replace everything currently shown.
    fn set_series(&mut self, frame: ChartFrame);

    fn resize(&mut self, width: u16, height: u16);
}

/// Time axis coordinate of a date.
pub fn time_x(date: NaiveDate) -> f64 {
    date.signed_duration_since(NaiveDate::default()).num_days() as f64
}

/// Inverse of [`time_x`], truncating fractional days.
pub fn date_from_x(x: f64) -> Option<NaiveDate> {
    if !x.is_finite() {
        return None;
    }
    let days = x.trunc() as i64;
    if days >= 0 {
        NaiveDate::default().checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        NaiveDate::default().checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

pub fn time_points(points: &[TimeSeriesPoint]) -> Vec<(f64, f64)> {
    points
        .iter()
        .map(|point| (time_x(point.date()), point.value()))
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, value| match acc {
        None => Some((value, value)),
        Some((min, max)) => Some((min.min(value), max.max(value))),
    })
}
