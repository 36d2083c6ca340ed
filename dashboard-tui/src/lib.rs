/// Dashboard TUI - terminal front end of the market dashboards
///
/// This library provides the pieces used by the `market-dashboard` binary:
/// - `TuiChart`: ratatui implementation of the chart render adapter
/// - Table, list and status line widgets for the non-chart panels
/// - `App`: tabs, key bindings and layout over a `dashboard_data::Dashboard`
pub mod app;
pub mod chart;
pub mod widgets;

pub use app::{App, Control, Tab};
pub use chart::{Plot, PlotSeries, TuiChart};
