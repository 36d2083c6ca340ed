//! Ratatui chart adapter.
//!
//! A terminal chart has a single y axis, so right-axis series are rescaled into the left axis
//! bounds and carry their real range in the legend.

use dashboard_data::{
    AxisSide, ChartFrame, ChartRenderAdapter, SeriesKind, XAxis, render::date_from_x,
};
use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, LegendPosition, Paragraph},
};

pub(crate) const C_DIM: Color = Color::Rgb(120, 120, 120);
pub(crate) const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
pub(crate) const C_ACCENT: Color = Color::Rgb(100, 180, 220);

const PALETTE: [Color; 6] = [
    Color::Rgb(100, 180, 220),
    Color::Rgb(220, 100, 100),
    Color::Rgb(100, 220, 100),
    Color::Rgb(180, 180, 100),
    Color::Rgb(200, 130, 220),
    Color::Rgb(220, 160, 90),
];

/// Width below which time labels drop the year.
const COMPACT_WIDTH: u16 = 100;

/// One series as drawn: right-axis points already mapped into the shared y bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub name: String,
    pub kind: SeriesKind,
    pub points: Vec<(f64, f64)>,
}

/// Drawable form of a [`ChartFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    /// Real range of the right axis, when it shares the chart with left-axis series.
    pub right_bounds: Option<[f64; 2]>,
    pub series: Vec<PlotSeries>,
}

impl Plot {
    /// `None` for an empty frame.
    pub fn from_frame(frame: &ChartFrame) -> Option<Self> {
        if frame.is_empty() {
            return None;
        }

        let x_bounds = match &frame.x_axis {
            XAxis::Category(labels) => [-0.5, labels.len() as f64 - 0.5],
            XAxis::Time => {
                let (min, max) = frame.x_bounds()?;
                if min == max { [min - 1.0, max + 1.0] } else { [min, max] }
            }
        };

        let left = frame.y_bounds(AxisSide::Left);
        let right = frame.y_bounds(AxisSide::Right);
        let bars = frame.series.iter().any(|series| series.kind == SeriesKind::Bar);

        // a right axis alone is drawn as the only axis
        let y_bounds = padded(left.or(right)?, bars);
        let right_bounds = left.and(right).map(|bounds| padded(bounds, false));

        let series = frame
            .series
            .iter()
            .filter(|series| !series.points.is_empty())
            .map(|series| match (series.axis, right_bounds) {
                (AxisSide::Right, Some(from)) => PlotSeries {
                    name: format!("{} (R {:.2}..{:.2})", series.name, from[0], from[1]),
                    kind: series.kind,
                    points: series
                        .points
                        .iter()
                        .map(|&(x, y)| (x, rescale(y, from, y_bounds)))
                        .collect(),
                },
                _ => PlotSeries {
                    name: series.name.clone(),
                    kind: series.kind,
                    points: series.points.clone(),
                },
            })
            .collect();

        Some(Self {
            x_bounds,
            y_bounds,
            right_bounds,
            series,
        })
    }
}

/// [`ChartRenderAdapter`] drawing into a ratatui [`Frame`] on demand.
#[derive(Debug, Default)]
pub struct TuiChart {
    frame: Option<ChartFrame>,
    plot: Option<Plot>,
    size: (u16, u16),
}

impl ChartRenderAdapter for TuiChart {
    fn set_series(&mut self, frame: ChartFrame) {
        self.plot = Plot::from_frame(&frame);
        self.frame = Some(frame);
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.size = (width, height);
    }
}

impl TuiChart {
    pub fn frame(&self) -> Option<&ChartFrame> {
        self.frame.as_ref()
    }

    pub fn plot(&self) -> Option<&Plot> {
        self.plot.as_ref()
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn render(&self, f: &mut Frame, area: Rect, placeholder: &str) {
        let title = self
            .frame
            .as_ref()
            .map(|frame| format!(" {} ", frame.title))
            .unwrap_or_default();
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(C_ACCENT));

        let (Some(frame), Some(plot)) = (&self.frame, &self.plot) else {
            let message = if self.frame.is_some() { "No data" } else { placeholder };
            let paragraph = Paragraph::new(Line::from(Span::styled(
                message,
                Style::default().fg(C_DIM),
            )))
            .alignment(Alignment::Center)
            .block(block);
            f.render_widget(paragraph, area);
            return;
        };

        let datasets = plot
            .series
            .iter()
            .enumerate()
            .map(|(index, series)| {
                let (marker, graph_type) = match series.kind {
                    SeriesKind::Line => (Marker::Braille, GraphType::Line),
                    SeriesKind::Bar => (Marker::HalfBlock, GraphType::Bar),
                };
                Dataset::default()
                    .name(series.name.clone())
                    .marker(marker)
                    .graph_type(graph_type)
                    .style(Style::default().fg(PALETTE[index % PALETTE.len()]))
                    .data(&series.points)
            })
            .collect::<Vec<_>>();

        let width = if self.size.0 > 0 { self.size.0 } else { area.width };
        let label_count = usize::from(area.width / 16).clamp(2, 6);

        let x_labels = axis_ticks(plot.x_bounds, label_count)
            .into_iter()
            .map(|x| x_label(&frame.x_axis, x, width < COMPACT_WIDTH))
            .collect::<Vec<_>>();
        let y_labels = axis_ticks(plot.y_bounds, 3)
            .into_iter()
            .map(|y| format!("{y:.2}"))
            .collect::<Vec<_>>();

        let chart = Chart::new(datasets)
            .block(block)
            .x_axis(
                Axis::default()
                    .bounds(plot.x_bounds)
                    .labels(x_labels)
                    .style(Style::default().fg(C_DIM)),
            )
            .y_axis(
                Axis::default()
                    .bounds(plot.y_bounds)
                    .labels(y_labels)
                    .style(Style::default().fg(C_DIM)),
            )
            .legend_position(Some(LegendPosition::TopLeft))
            .style(Style::default().fg(C_BRIGHT));

        f.render_widget(chart, area);
    }
}

fn padded((min, max): (f64, f64), include_zero: bool) -> [f64; 2] {
    let (min, max) = if include_zero {
        (min.min(0.0), max.max(0.0))
    } else {
        (min, max)
    };
    if min == max {
        return [min - 1.0, max + 1.0];
    }
    let margin = (max - min) * 0.05;
    [min - margin, max + margin]
}

fn rescale(value: f64, from: [f64; 2], to: [f64; 2]) -> f64 {
    to[0] + (value - from[0]) / (from[1] - from[0]) * (to[1] - to[0])
}

fn axis_ticks(bounds: [f64; 2], count: usize) -> Vec<f64> {
    let count = count.max(2);
    (0..count)
        .map(|index| bounds[0] + (bounds[1] - bounds[0]) * index as f64 / (count - 1) as f64)
        .collect()
}

fn x_label(axis: &XAxis, x: f64, compact: bool) -> String {
    match axis {
        XAxis::Time => date_from_x(x)
            .map(|date| {
                let format = if compact { "%m-%d" } else { "%Y-%m-%d" };
                date.format(format).to_string()
            })
            .unwrap_or_default(),
        XAxis::Category(labels) => {
            let index = x.round();
            if index < 0.0 {
                return String::new();
            }
            labels.get(index as usize).cloned().unwrap_or_default()
        }
    }
}
