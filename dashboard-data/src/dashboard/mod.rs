//! Dashboard orchestration.
//!
//! The [`Dashboard`] owns every panel's state and render adapter. Fetches run as spawned tasks
//! that report back through a channel as [`Delivery`] messages. Deliveries are resolved against
//! the [`RequestCoordinator`] only when applied, so a superseded response can never overwrite a
//! newer one no matter when its task finishes. Selection changes reach the dashboard as
//! [`Command`]s pushed by the subscribed panel listeners.

use crate::{
    client::{MarketApi, OPTION_SYMBOLS},
    config::DashboardConfig,
    coordinator::{FetchOutcome, RequestCoordinator, Ticket},
    error::DataError,
    model::{
        HoldingWeight, OptionChain, PositionValue, Row, ShortSellRow, ShortSellSnapshot, Tenor,
        field,
    },
    pagination::PaginatedTable,
    render::{ChartFrame, ChartRenderAdapter},
    selection::{PanelRole, SelectionState, SelectionSync},
    transform::{
        align::align,
        normalize::normalize,
        pivot::{ChainTotals, pivot},
    },
};
use chrono::{Months, NaiveDate};
use futures::future::join;
use indexmap::IndexMap;
use std::{collections::HashMap, future::Future, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub mod panel;

pub use panel::{ChartId, PanelId, PanelStatus};

/// Decoded response of one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Rows(Vec<Row>),
    Symbols(Vec<String>),
    Weights(Vec<HoldingWeight>),
    Chain(OptionChain),
    Position(PositionValue),
    ShortSell(ShortSellSnapshot),
}

/// Completed fetch of a panel, one response per issued ticket.
#[derive(Debug)]
pub struct Delivery {
    pub panel: PanelId,
    pub responses: Vec<(Ticket, Result<Payload, DataError>)>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Command {
    Refresh(PanelId),
}

/// Row of the short-sell history currently charted.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HistoryTarget {
    pub code: String,
    pub name: String,
}

pub struct Dashboard<A> {
    config: DashboardConfig,
    api: Arc<dyn MarketApi>,
    coordinator: RequestCoordinator,
    selection: SelectionSync,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
    delivery_rx: mpsc::UnboundedReceiver<Delivery>,
    charts: IndexMap<ChartId, A>,
    status: HashMap<PanelId, PanelStatus>,
    etf_symbols: Vec<String>,
    overview_symbols: Vec<String>,
    holding_weights: Vec<HoldingWeight>,
    option_symbol: String,
    option_date: Option<String>,
    option_totals: HashMap<Tenor, ChainTotals>,
    position_value: Option<PositionValue>,
    short_sell: PaginatedTable<ShortSellRow>,
    short_sell_date: Option<String>,
    short_sell_cursor: usize,
    history_target: Option<HistoryTarget>,
}

impl<A> std::fmt::Debug for Dashboard<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("config", &self.config)
            .field("selection", &self.selection)
            .field("status", &self.status)
            .field("option_symbol", &self.option_symbol)
            .finish_non_exhaustive()
    }
}

impl<A> Dashboard<A>
where
    A: ChartRenderAdapter,
{
    /// Build the dashboard with one adapter per [`ChartId`] and subscribe the selection-bound
    /// panels.
    pub fn new<F>(config: DashboardConfig, api: Arc<dyn MarketApi>, mut make_adapter: F) -> Self
    where
        F: FnMut(ChartId) -> A,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();

        let mut selection = SelectionSync::new(config.start_date);
        for panel in PanelId::ALL {
            let binding = panel.binding();
            if binding.role == PanelRole::Standalone {
                continue;
            }
            let tx = command_tx.clone();
            selection.subscribe(move |event| {
                if binding.requires_refetch(event) {
                    let _ = tx.send(Command::Refresh(panel));
                }
            });
        }

        let charts = ChartId::ALL
            .into_iter()
            .map(|chart| (chart, make_adapter(chart)))
            .collect();

        let option_symbol = config.option_symbol.to_uppercase();
        let short_sell = PaginatedTable::new(config.page_size);

        Self {
            config,
            api,
            coordinator: RequestCoordinator::new(),
            selection,
            command_tx,
            command_rx,
            delivery_tx,
            delivery_rx,
            charts,
            status: HashMap::new(),
            etf_symbols: Vec::new(),
            overview_symbols: Vec::new(),
            holding_weights: Vec::new(),
            option_symbol,
            option_date: None,
            option_totals: HashMap::new(),
            position_value: None,
            short_sell,
            short_sell_date: None,
            short_sell_cursor: 0,
            history_target: None,
        }
    }

    /// Request every panel that does not depend on another panel's data.
    pub fn start(&mut self) {
        info!(api_url = %self.config.api_url, "starting dashboard");
        for panel in [
            PanelId::BondSpread,
            PanelId::UsCurve,
            PanelId::EtfList,
            PanelId::EtfOverview,
            PanelId::Options,
            PanelId::OptionsPosition,
            PanelId::ShortSellTable,
        ] {
            self.refresh(panel);
        }
    }

    /// Apply every command and delivery already queued, without waiting. Returns how many
    /// were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            if let Ok(command) = self.command_rx.try_recv() {
                self.handle(command);
            } else if let Ok(delivery) = self.delivery_rx.try_recv() {
                self.apply(delivery);
            } else {
                return handled;
            }
            handled += 1;
        }
    }

    /// Wait for the next command or delivery and apply it.
    pub async fn process_next(&mut self) {
        tokio::select! {
            biased;
            Some(command) = self.command_rx.recv() => self.handle(command),
            Some(delivery) = self.delivery_rx.recv() => self.apply(delivery),
            else => {}
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Refresh(panel) => self.refresh(panel),
        }
    }

    /// Issue a new fetch for `panel`, superseding any fetch of it still in flight.
    pub fn refresh(&mut self, panel: PanelId) {
        let api = Arc::clone(&self.api);
        match panel {
            PanelId::BondSpread => {
                let (primary, secondary) = self.config.bond_regions.clone();
                let tickets = self
                    .coordinator
                    .issue_set(panel.keys(&self.config.bond_regions));
                let tx = self.delivery_tx.clone();
                tokio::spawn(async move {
                    let (primary, secondary) = join(
                        api.bond_yields(&primary),
                        api.bond_yields(&secondary),
                    )
                    .await;
                    let responses = tickets
                        .into_iter()
                        .zip([primary, secondary])
                        .map(|(ticket, result)| (ticket, result.map(Payload::Rows)))
                        .collect();
                    let _ = tx.send(Delivery { panel, responses });
                });
            }
            PanelId::UsCurve => self.spawn_fetch(panel, async move {
                api.us_bond_curve().await.map(Payload::Rows)
            }),
            PanelId::EtfList => self.spawn_fetch(panel, async move {
                api.etf_list().await.map(Payload::Symbols)
            }),
            PanelId::EtfOverview => {
                let start_date = self.selection.date_range_start();
                self.spawn_fetch(panel, async move {
                    api.etf_daily(start_date).await.map(Payload::Rows)
                })
            }
            PanelId::EtfHoldings => {
                let Some(entity) = self.selection.active_entity().map(str::to_string) else {
                    debug!(%panel, "no active ETF to fetch holdings for");
                    return;
                };
                let start_date = self.selection.date_range_start();
                self.spawn_fetch(panel, async move {
                    api.etf_holdings(&entity, start_date)
                        .await
                        .map(Payload::Rows)
                })
            }
            PanelId::EtfInfo => {
                let Some(entity) = self.selection.active_entity().map(str::to_string) else {
                    debug!(%panel, "no active ETF to fetch weights for");
                    return;
                };
                self.spawn_fetch(panel, async move {
                    api.etf_info(&entity).await.map(Payload::Weights)
                })
            }
            PanelId::Options => {
                let symbol = self.option_symbol.clone();
                self.spawn_fetch(panel, async move {
                    api.option_chain(&symbol).await.map(Payload::Chain)
                })
            }
            PanelId::OptionsPosition => {
                let symbol = self.option_symbol.clone();
                self.spawn_fetch(panel, async move {
                    api.position_value(&symbol).await.map(Payload::Position)
                })
            }
            PanelId::ShortSellTable => self.spawn_fetch(panel, async move {
                api.short_sell_latest().await.map(Payload::ShortSell)
            }),
            PanelId::ShortSellHistory => {
                let Some(code) = self.history_target.as_ref().map(|target| target.code.clone())
                else {
                    debug!(%panel, "no short-sell history charted yet");
                    return;
                };
                self.spawn_fetch(panel, async move {
                    api.short_sell_history(&code).await.map(Payload::Rows)
                })
            }
        }
        self.status.insert(panel, PanelStatus::Loading);
    }

    fn spawn_fetch<F>(&self, panel: PanelId, request: F)
    where
        F: Future<Output = Result<Payload, DataError>> + Send + 'static,
    {
        let tickets = self
            .coordinator
            .issue_set(panel.keys(&self.config.bond_regions));
        let tx = self.delivery_tx.clone();
        tokio::spawn(async move {
            let result = request.await;
            let responses = tickets
                .into_iter()
                .map(|ticket| (ticket, result.clone()))
                .collect();
            let _ = tx.send(Delivery { panel, responses });
        });
    }

    /// Resolve a delivery and, if it is current and complete, render it.
    ///
    /// Stale deliveries are dropped. Failures only mark the panel, leaving whatever it showed.
    pub fn apply(&mut self, delivery: Delivery) {
        let Delivery { panel, responses } = delivery;
        match self.coordinator.resolve_set(responses) {
            FetchOutcome::Delivered(payloads) => self.render(panel, payloads),
            FetchOutcome::Stale => {}
            FetchOutcome::Failed(error) => {
                self.status.insert(panel, PanelStatus::Failed(error));
            }
        }
    }

    fn render(&mut self, panel: PanelId, payloads: Vec<Payload>) {
        let status = match (panel, payloads.as_slice()) {
            (PanelId::BondSpread, [Payload::Rows(primary), Payload::Rows(secondary)]) => {
                let pair = align(primary, secondary, field::TRADE_DATE, field::YIELD);
                let frame = panel::bond_spread_frame(&pair, &self.config.bond_regions);
                self.draw(ChartId::BondSpread, frame)
            }
            (PanelId::UsCurve, [Payload::Rows(rows)]) => {
                self.draw(ChartId::UsCurve, panel::us_curve_frame(rows))
            }
            (PanelId::EtfList, [Payload::Symbols(symbols)]) => {
                self.etf_symbols = symbols.clone();
                list_status(&self.etf_symbols)
            }
            (PanelId::EtfOverview, [Payload::Rows(rows)]) => {
                let grouped = normalize(
                    rows,
                    field::ETF_SYMBOL,
                    field::TRADE_DATE,
                    field::NORMALIZED_PRICE,
                );
                self.overview_symbols = grouped.keys().map(str::to_string).collect();
                let status = self.draw(
                    ChartId::EtfOverview,
                    panel::grouped_frame("ETF performance", &grouped),
                );
                self.default_active_entity();
                status
            }
            (PanelId::EtfHoldings, [Payload::Rows(rows)]) => {
                let grouped = normalize(
                    rows,
                    field::STOCK_SYMBOL,
                    field::TRADE_DATE,
                    field::NORMALIZED_PRICE,
                );
                let title = format!("{} holdings", self.selection.active_entity().unwrap_or_default());
                self.draw(ChartId::EtfHoldings, panel::grouped_frame(title, &grouped))
            }
            (PanelId::EtfInfo, [Payload::Weights(weights)]) => {
                self.holding_weights = weights.clone();
                list_status(&self.holding_weights)
            }
            (PanelId::Options, [Payload::Chain(chain)]) => {
                self.option_date = chain.latest_date.clone();
                let mut any = false;
                for tenor in Tenor::ALL {
                    let buckets = pivot(chain.tenor(tenor));
                    any |= !buckets.is_empty();
                    self.option_totals
                        .insert(tenor, ChainTotals::from_buckets(&buckets));
                    let title = format!("{} {}", self.option_symbol, tenor);
                    self.draw(ChartId::Options(tenor), panel::option_frame(title, &buckets));
                }
                if any { PanelStatus::Ready } else { PanelStatus::NoData }
            }
            (PanelId::OptionsPosition, [Payload::Position(position)]) => {
                self.position_value = Some(*position);
                PanelStatus::Ready
            }
            (PanelId::ShortSellTable, [Payload::ShortSell(snapshot)]) => {
                self.short_sell_date = snapshot.latest_date.clone();
                self.short_sell.set_data(snapshot.data.clone());
                self.clamp_short_sell_cursor();
                list_status(self.short_sell.items())
            }
            (PanelId::ShortSellHistory, [Payload::Rows(rows)]) => {
                let title = self
                    .history_target
                    .as_ref()
                    .map(|target| format!("{} {} short selling", target.code, target.name))
                    .unwrap_or_else(|| "Short selling".to_string());
                self.draw(
                    ChartId::ShortSellHistory,
                    panel::short_sell_history_frame(title, rows),
                )
            }
            (panel, payloads) => {
                warn!(%panel, payloads = payloads.len(), "unexpected payload for panel");
                return;
            }
        };

        debug!(%panel, %status, "panel rendered");
        self.status.insert(panel, status);
    }

    fn draw(&mut self, chart: ChartId, frame: ChartFrame) -> PanelStatus {
        let status = PanelStatus::for_frame(&frame);
        if let Some(adapter) = self.charts.get_mut(&chart) {
            adapter.set_series(frame);
        }
        status
    }

    /// Keep the active ETF if the overview still shows it, otherwise select its first symbol.
    fn default_active_entity(&mut self) {
        let keep = self
            .selection
            .active_entity()
            .is_some_and(|entity| self.overview_symbols.iter().any(|symbol| symbol == entity));
        if keep {
            return;
        }
        if let Some(first) = self.overview_symbols.first().cloned() {
            info!(entity = %first, "defaulting active ETF");
            self.selection.set_active_entity(first);
        }
    }

    /// Select an ETF. Detail panels re-fetch through their subscriptions.
    pub fn select_entity<S: Into<String>>(&mut self, entity: S) -> bool {
        self.selection.set_active_entity(entity)
    }

    /// Step through the known ETFs, wrapping at either end.
    pub fn cycle_entity(&mut self, forward: bool) -> bool {
        let symbols = if self.etf_symbols.is_empty() {
            &self.overview_symbols
        } else {
            &self.etf_symbols
        };
        let Some(next) = cycle(symbols, self.selection.active_entity(), forward) else {
            return false;
        };
        self.selection.set_active_entity(next)
    }

    pub fn set_date_range_start(&mut self, date: NaiveDate) -> bool {
        self.selection.set_date_range_start(date)
    }

    /// Move the date range start by whole months (negative moves back).
    pub fn shift_date_range(&mut self, months: i32) -> bool {
        let current = self.selection.date_range_start();
        let shifted = if months >= 0 {
            current.checked_add_months(Months::new(months.unsigned_abs()))
        } else {
            current.checked_sub_months(Months::new(months.unsigned_abs()))
        };
        match shifted {
            Some(date) => self.set_date_range_start(date),
            None => false,
        }
    }

    /// Switch the option chain underlying and re-fetch the option panels.
    pub fn set_option_symbol(&mut self, symbol: &str) -> bool {
        let symbol = symbol.trim().to_uppercase();
        if symbol == self.option_symbol {
            return false;
        }
        self.option_symbol = symbol;
        self.refresh(PanelId::Options);
        self.refresh(PanelId::OptionsPosition);
        true
    }

    pub fn cycle_option_symbol(&mut self, forward: bool) -> bool {
        let symbols: Vec<String> = OPTION_SYMBOLS.iter().map(|s| s.to_string()).collect();
        match cycle(&symbols, Some(self.option_symbol.as_str()), forward) {
            Some(next) => self.set_option_symbol(&next),
            None => false,
        }
    }

    pub fn short_sell_next_page(&mut self) -> bool {
        let moved = self.short_sell.next_page();
        if moved {
            self.short_sell_cursor = 0;
        }
        moved
    }

    pub fn short_sell_prev_page(&mut self) -> bool {
        let moved = self.short_sell.prev_page();
        if moved {
            self.short_sell_cursor = 0;
        }
        moved
    }

    /// Move the row cursor within the visible page.
    pub fn move_short_sell_cursor(&mut self, delta: isize) {
        self.short_sell_cursor = self.short_sell_cursor.saturating_add_signed(delta);
        self.clamp_short_sell_cursor();
    }

    fn clamp_short_sell_cursor(&mut self) {
        let rows = self.short_sell.page_slice().len();
        self.short_sell_cursor = self.short_sell_cursor.min(rows.saturating_sub(1));
    }

    pub fn selected_short_sell(&self) -> Option<&ShortSellRow> {
        self.short_sell.item_on_page(self.short_sell_cursor)
    }

    /// Chart the history of the row under the cursor.
    ///
    /// [`Dashboard::refresh`] of [`PanelId::ShortSellHistory`] re-fetches the charted row instead.
    pub fn load_short_sell_history(&mut self) {
        let Some(row) = self.selected_short_sell() else {
            debug!("no short-sell row selected");
            return;
        };
        self.history_target = Some(HistoryTarget {
            code: row.code.clone(),
            name: row.name.clone(),
        });
        self.refresh(PanelId::ShortSellHistory);
    }

    pub fn resize_all(&mut self, width: u16, height: u16) {
        for adapter in self.charts.values_mut() {
            adapter.resize(width, height);
        }
    }

    pub fn chart(&self, chart: ChartId) -> Option<&A> {
        self.charts.get(&chart)
    }

    pub fn status(&self, panel: PanelId) -> PanelStatus {
        self.status.get(&panel).cloned().unwrap_or_default()
    }

    pub fn selection(&self) -> &SelectionState {
        self.selection.state()
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    pub fn etf_symbols(&self) -> &[String] {
        if self.etf_symbols.is_empty() {
            &self.overview_symbols
        } else {
            &self.etf_symbols
        }
    }

    pub fn holding_weights(&self) -> &[HoldingWeight] {
        &self.holding_weights
    }

    pub fn option_symbol(&self) -> &str {
        &self.option_symbol
    }

    pub fn option_date(&self) -> Option<&str> {
        self.option_date.as_deref()
    }

    pub fn option_totals(&self, tenor: Tenor) -> Option<ChainTotals> {
        self.option_totals.get(&tenor).copied()
    }

    pub fn position_value(&self) -> Option<PositionValue> {
        self.position_value
    }

    pub fn short_sell_table(&self) -> &PaginatedTable<ShortSellRow> {
        &self.short_sell
    }

    pub fn short_sell_date(&self) -> Option<&str> {
        self.short_sell_date.as_deref()
    }

    pub fn short_sell_cursor(&self) -> usize {
        self.short_sell_cursor
    }

    pub fn history_target(&self) -> Option<&HistoryTarget> {
        self.history_target.as_ref()
    }

    /// Handle for pushing commands from outside the dashboard (eg/ a key handler task).
    pub fn commands(&self) -> mpsc::UnboundedSender<Command> {
        self.command_tx.clone()
    }
}

fn list_status<T>(items: &[T]) -> PanelStatus {
    if items.is_empty() {
        PanelStatus::NoData
    } else {
        PanelStatus::Ready
    }
}

/// Neighbour of `current` in `items`, wrapping. Starts at the first item if `current` is unknown.
fn cycle(items: &[String], current: Option<&str>, forward: bool) -> Option<String> {
    let position = current.and_then(|current| items.iter().position(|item| item == current));
    let index = match (position, forward) {
        (None, _) => 0,
        (Some(index), true) => (index + 1) % items.len(),
        (Some(index), false) => (index + items.len() - 1) % items.len(),
    };
    items.get(index).cloned()
}

#[cfg(test)]
mod tests;
