//! Tabs, key bindings and layout of the terminal dashboard.

use crate::{
    chart::TuiChart,
    widgets::{
        position_lines, render_etf_info, render_position, render_short_sell_table, render_tabs,
        status_line,
    },
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use dashboard_data::{
    ChartId, Dashboard, DashboardConfig, MarketApi, PanelId, model::Tenor,
};
use derive_more::Display;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Paragraph,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Display)]
pub enum Tab {
    #[default]
    Bonds,
    #[display("ETF")]
    Etf,
    Options,
    #[display("Short Sell")]
    ShortSell,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Bonds, Tab::Etf, Tab::Options, Tab::ShortSell];

    pub fn index(self) -> usize {
        match self {
            Tab::Bonds => 0,
            Tab::Etf => 1,
            Tab::Options => 2,
            Tab::ShortSell => 3,
        }
    }

    pub fn next(self) -> Self {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    /// Panels shown on the tab, refreshed together by `r`.
    pub fn panels(self) -> &'static [PanelId] {
        match self {
            Tab::Bonds => &[PanelId::BondSpread, PanelId::UsCurve],
            Tab::Etf => &[
                PanelId::EtfList,
                PanelId::EtfOverview,
                PanelId::EtfHoldings,
                PanelId::EtfInfo,
            ],
            Tab::Options => &[PanelId::Options, PanelId::OptionsPosition],
            Tab::ShortSell => &[PanelId::ShortSellTable, PanelId::ShortSellHistory],
        }
    }

    fn hints(self) -> &'static str {
        match self {
            Tab::Bonds => "1-4/Tab switch  r refresh  q quit",
            Tab::Etf => "←/→ ETF  [/] start -/+1M  r refresh  q quit",
            Tab::Options => "←/→ symbol  r refresh  q quit",
            Tab::ShortSell => "n/p page  ↑/↓ row  Enter history  r refresh  q quit",
        }
    }
}

/// Outcome of a key press.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub tab: Tab,
    pub dashboard: Dashboard<TuiChart>,
}

impl App {
    pub fn new(config: DashboardConfig, api: Arc<dyn MarketApi>) -> Self {
        Self {
            tab: Tab::default(),
            dashboard: Dashboard::new(config, api, |_| TuiChart::default()),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Control {
        if key.kind != KeyEventKind::Press {
            return Control::Continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Control::Quit,
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::Char(digit @ '1'..='4') => {
                let index = digit as usize - '1' as usize;
                self.tab = Tab::ALL[index];
            }
            KeyCode::Char('r') => self.refresh_tab(),
            code => self.handle_tab_key(code),
        }
        Control::Continue
    }

    fn handle_tab_key(&mut self, code: KeyCode) {
        let dashboard = &mut self.dashboard;
        match (self.tab, code) {
            (Tab::Etf, KeyCode::Left) => {
                dashboard.cycle_entity(false);
            }
            (Tab::Etf, KeyCode::Right) => {
                dashboard.cycle_entity(true);
            }
            (Tab::Etf, KeyCode::Char('[')) => {
                dashboard.shift_date_range(-1);
            }
            (Tab::Etf, KeyCode::Char(']')) => {
                dashboard.shift_date_range(1);
            }
            (Tab::Options, KeyCode::Left) => {
                dashboard.cycle_option_symbol(false);
            }
            (Tab::Options, KeyCode::Right) => {
                dashboard.cycle_option_symbol(true);
            }
            (Tab::ShortSell, KeyCode::Char('n')) => {
                dashboard.short_sell_next_page();
            }
            (Tab::ShortSell, KeyCode::Char('p')) => {
                dashboard.short_sell_prev_page();
            }
            (Tab::ShortSell, KeyCode::Up) => dashboard.move_short_sell_cursor(-1),
            (Tab::ShortSell, KeyCode::Down) => dashboard.move_short_sell_cursor(1),
            (Tab::ShortSell, KeyCode::Enter) => dashboard.load_short_sell_history(),
            _ => {}
        }
    }

    /// Re-fetch every panel of the current tab. The short-sell history keeps its charted row.
    pub fn refresh_tab(&mut self) {
        info!(tab = %self.tab, "refreshing tab");
        for &panel in self.tab.panels() {
            self.dashboard.refresh(panel);
        }
    }

    pub fn render(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(f.area());

        let titles = Tab::ALL.map(|tab| tab.to_string());
        let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
        render_tabs(f, chunks[0], &titles, self.tab.index());

        match self.tab {
            Tab::Bonds => self.render_bonds(f, chunks[1]),
            Tab::Etf => self.render_etf(f, chunks[1]),
            Tab::Options => self.render_options(f, chunks[1]),
            Tab::ShortSell => self.render_short_sell(f, chunks[1]),
        }

        let statuses: Vec<_> = self
            .tab
            .panels()
            .iter()
            .map(|&panel| (panel.to_string(), self.dashboard.status(panel)))
            .collect();
        f.render_widget(
            Paragraph::new(status_line(&statuses, self.tab.hints())),
            chunks[2],
        );
    }

    fn chart(&self, f: &mut Frame, chart: ChartId, area: Rect, placeholder: &str) {
        if let Some(adapter) = self.dashboard.chart(chart) {
            adapter.render(f, area, placeholder);
        }
    }

    fn render_bonds(&self, f: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        self.chart(f, ChartId::BondSpread, rows[0], "Loading bond yields...");
        self.chart(f, ChartId::UsCurve, rows[1], "Loading US treasury curve...");
    }

    fn render_etf(&self, f: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(rows[1]);

        self.chart(f, ChartId::EtfOverview, rows[0], "Loading ETF performance...");
        self.chart(f, ChartId::EtfHoldings, bottom[0], "Select an ETF");
        render_etf_info(
            f,
            bottom[1],
            self.dashboard.selection().active_entity.as_deref(),
            self.dashboard.holding_weights(),
        );
    }

    fn render_options(&self, f: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        self.chart(f, ChartId::Options(Tenor::Short), top[0], "Loading option chain...");
        self.chart(f, ChartId::Options(Tenor::Near), top[1], "Loading option chain...");
        self.chart(f, ChartId::Options(Tenor::Far), bottom[0], "Loading option chain...");

        let totals: Vec<_> = Tenor::ALL
            .into_iter()
            .map(|tenor| (tenor, self.dashboard.option_totals(tenor)))
            .collect();
        let position = self.dashboard.position_value();
        render_position(
            f,
            bottom[1],
            self.dashboard.option_symbol(),
            self.dashboard.option_date(),
            position_lines(position.as_ref(), &totals),
        );
    }

    fn render_short_sell(&self, f: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        render_short_sell_table(
            f,
            rows[0],
            self.dashboard.short_sell_table(),
            self.dashboard.short_sell_cursor(),
            self.dashboard.short_sell_date(),
        );
        self.chart(f, ChartId::ShortSellHistory, rows[1], "Enter: load history of the selected row");
    }
}
