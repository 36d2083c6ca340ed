use super::*;
use crate::render::{AxisSide, time_x};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

/// In-memory [`MarketApi`] answering from scripted JSON bodies keyed by endpoint path.
#[derive(Default)]
struct ScriptedApi {
    responses: Mutex<HashMap<String, Result<Value, DataError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn with(self, path: &str, body: Value) -> Self {
        self.set(path, Ok(body));
        self
    }

    fn delayed(self, path: &str, millis: u64) -> Self {
        self.delays
            .lock()
            .insert(path.to_string(), Duration::from_millis(millis));
        self
    }

    fn set(&self, path: &str, response: Result<Value, DataError>) {
        self.responses.lock().insert(path.to_string(), response);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn respond<T>(&self, path: &str, call: String) -> Result<T, DataError>
    where
        T: DeserializeOwned + Send,
    {
        self.calls.lock().push(call);

        let delay = self.delays.lock().get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().get(path).cloned();
        match response {
            Some(Ok(body)) => serde_json::from_value(body).map_err(|error| DataError::Malformed {
                url: path.to_string(),
                reason: error.to_string(),
            }),
            Some(Err(error)) => Err(error),
            None => Err(DataError::Status {
                status: 404,
                url: path.to_string(),
            }),
        }
    }
}

#[async_trait]
impl MarketApi for ScriptedApi {
    async fn bond_yields(&self, region: &str) -> Result<Vec<Row>, DataError> {
        let path = format!("bonds/{region}");
        self.respond(&path, path.clone()).await
    }

    async fn us_bond_curve(&self) -> Result<Vec<Row>, DataError> {
        self.respond("us_bonds", "us_bonds".to_string()).await
    }

    async fn etf_list(&self) -> Result<Vec<String>, DataError> {
        self.respond("etf/list", "etf/list".to_string()).await
    }

    async fn etf_daily(&self, start_date: NaiveDate) -> Result<Vec<Row>, DataError> {
        self.respond("etf/daily", format!("etf/daily?start_date={start_date}"))
            .await
    }

    async fn etf_holdings(&self, symbol: &str, start_date: NaiveDate) -> Result<Vec<Row>, DataError> {
        let path = format!("etf/holdings/{symbol}");
        self.respond(&path, format!("{path}?start_date={start_date}"))
            .await
    }

    async fn etf_info(&self, symbol: &str) -> Result<Vec<HoldingWeight>, DataError> {
        let path = format!("etf/info/{symbol}");
        self.respond(&path, path.clone()).await
    }

    async fn option_chain(&self, symbol: &str) -> Result<OptionChain, DataError> {
        let path = format!("options/data/{symbol}");
        self.respond(&path, path.clone()).await
    }

    async fn position_value(&self, symbol: &str) -> Result<PositionValue, DataError> {
        let path = format!("options/position_value/{symbol}");
        self.respond(&path, path.clone()).await
    }

    async fn short_sell_latest(&self) -> Result<ShortSellSnapshot, DataError> {
        self.respond("shortsell/latest", "shortsell/latest".to_string())
            .await
    }

    async fn short_sell_history(&self, code: &str) -> Result<Vec<Row>, DataError> {
        let path = format!("shortsell/history/{code}");
        self.respond(&path, path.clone()).await
    }
}

/// Render adapter remembering every frame it was handed.
#[derive(Debug, Default)]
struct RecordingChart {
    frames: Vec<ChartFrame>,
    size: Option<(u16, u16)>,
}

impl RecordingChart {
    fn last(&self) -> Option<&ChartFrame> {
        self.frames.last()
    }
}

impl ChartRenderAdapter for RecordingChart {
    fn set_series(&mut self, frame: ChartFrame) {
        self.frames.push(frame);
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.size = Some((width, height));
    }
}

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn prices(group_field: &str, symbols: &[&str]) -> Value {
    let rows: Vec<Value> = symbols
        .iter()
        .flat_map(|symbol| {
            [("2025-01-02", 100.0), ("2025-01-03", 101.5)]
                .into_iter()
                .map(move |(trade_date, price)| {
                    json!({group_field: symbol, "trade_date": trade_date, "normalized_price": price})
                })
        })
        .collect();
    Value::Array(rows)
}

fn option_chain() -> Value {
    json!({
        "latest_date": "2025-03-14",
        "short_term": [
            {"strike": 100.0, "option_type": "call", "total_volume": 50, "total_open_interest": 10},
            {"strike": 95.0, "option_type": "put", "total_volume": 30, "total_open_interest": 300}
        ],
        "near_term": [
            {"strike": 110.0, "option_type": "call", "total_volume": 5, "total_open_interest": 7}
        ],
        "far_term": []
    })
}

fn short_sell_snapshot(rows: usize) -> Value {
    let data: Vec<Value> = (1..=rows)
        .map(|index| {
            json!({
                "股票代码": format!("{index:05}"),
                "股票名称": format!("Stock {index}"),
                "最新价": 10.0,
                "short_volume": 1000,
                "short_price": 9.9,
                "short_amount": 1.5,
                "total_amount": 12.0,
                "short_ratio": 12.5
            })
        })
        .collect();
    json!({"latest_date": "2025-03-14", "data": data})
}

fn scripted() -> ScriptedApi {
    ScriptedApi::default()
        .with(
            "bonds/US",
            json!([
                {"trade_date": "2024-01-01", "yield": "4.50"},
                {"trade_date": "2024-01-02", "yield": "4.40"}
            ]),
        )
        .with("bonds/JP", json!([{"trade_date": "2024-01-01", "yield": "0.20"}]))
        .with(
            "us_bonds",
            json!([{"trade_date": "2024-01-02", "yield_1y": 4.8, "yield_10y": 3.9, "yield_20y": 4.2}]),
        )
        .with("etf/list", json!(["QQQ", "SPY"]))
        .with("etf/daily", prices("etf_symbol", &["QQQ", "SPY"]))
        .with("etf/holdings/QQQ", prices("stock_symbol", &["NVDA", "MSFT"]))
        .with("etf/holdings/SPY", prices("stock_symbol", &["AAPL"]))
        .with("etf/info/QQQ", json!([{"stock_symbol": "NVDA", "weight": 8.9}]))
        .with("etf/info/SPY", json!([{"stock_symbol": "AAPL", "weight": 7.1}]))
        .with("options/data/SPY", option_chain())
        .with("options/data/QQQ", option_chain())
        .with(
            "options/position_value/SPY",
            json!({"main_battle": {"call": 12.5, "put": 9.0}, "support": {"call": 3.0, "put": 4.0}, "total": {"call": 15.5, "put": 13.0}}),
        )
        .with(
            "options/position_value/QQQ",
            json!({"main_battle": {}, "support": {}, "total": {}}),
        )
        .with("shortsell/latest", short_sell_snapshot(23))
        .with(
            "shortsell/history/00022",
            json!([
                {"trade_date": "2025-03-13", "short_price": 9.8, "short_amount": 1.2, "total_amount": 10.0},
                {"trade_date": "2025-03-14", "short_price": 9.9, "short_amount": 1.5, "total_amount": 12.0}
            ]),
        )
}

fn dashboard(api: &Arc<ScriptedApi>) -> Dashboard<RecordingChart> {
    let api: Arc<dyn MarketApi> = api.clone();
    Dashboard::new(DashboardConfig::default(), api, |_| RecordingChart::default())
}

/// Apply commands and deliveries until nothing arrives for a while (in paused test time).
async fn settle(dashboard: &mut Dashboard<RecordingChart>) {
    while tokio::time::timeout(Duration::from_secs(5), dashboard.process_next())
        .await
        .is_ok()
    {}
}

fn chart(dashboard: &Dashboard<RecordingChart>, chart: ChartId) -> &RecordingChart {
    dashboard.chart(chart).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_start_renders_every_panel() {
    let api = Arc::new(scripted());
    let mut dashboard = dashboard(&api);

    dashboard.start();
    settle(&mut dashboard).await;

    for panel in [
        PanelId::BondSpread,
        PanelId::UsCurve,
        PanelId::EtfList,
        PanelId::EtfOverview,
        PanelId::EtfHoldings,
        PanelId::EtfInfo,
        PanelId::Options,
        PanelId::OptionsPosition,
        PanelId::ShortSellTable,
    ] {
        assert_eq!(dashboard.status(panel), PanelStatus::Ready, "{panel}");
    }

    let spread = chart(&dashboard, ChartId::BondSpread).last().unwrap();
    assert_eq!(spread.series[2].axis, AxisSide::Right);
    assert_eq!(spread.series[2].points, vec![(time_x(date("2024-01-01")), 4.3)]);

    // first symbol of the overview data becomes the active ETF
    assert_eq!(dashboard.selection().active_entity.as_deref(), Some("QQQ"));
    let holdings = chart(&dashboard, ChartId::EtfHoldings).last().unwrap();
    assert_eq!(holdings.title, "QQQ holdings");
    assert_eq!(holdings.series.len(), 2);
    assert_eq!(dashboard.holding_weights()[0].stock_symbol, "NVDA");

    let far = chart(&dashboard, ChartId::Options(Tenor::Far)).last().unwrap();
    assert!(far.is_empty());
    assert_eq!(far.title, "SPY Far term");
    assert_eq!(dashboard.option_totals(Tenor::Short).map(|t| t.put_open_interest), Some(300.0));
    assert_eq!(dashboard.position_value().map(|p| p.total.call), Some(15.5));

    assert_eq!(dashboard.short_sell_table().pagination_summary().to_string(), "1-10 of 23");
    assert_eq!(dashboard.short_sell_date(), Some("2025-03-14"));
    assert_eq!(dashboard.status(PanelId::ShortSellHistory), PanelStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_holdings_response_is_never_rendered() {
    let api = Arc::new(
        scripted()
            .delayed("etf/holdings/SPY", 200)
            .delayed("etf/holdings/QQQ", 10),
    );
    let mut dashboard = dashboard(&api);
    dashboard.start();
    settle(&mut dashboard).await;

    // SPY is requested first but answers last
    assert!(dashboard.select_entity("SPY"));
    dashboard.pump();
    assert!(dashboard.select_entity("QQQ"));
    dashboard.pump();
    settle(&mut dashboard).await;

    assert!(api.calls().iter().any(|call| call.starts_with("etf/holdings/SPY")));

    let holdings = chart(&dashboard, ChartId::EtfHoldings);
    assert!(holdings.frames.iter().all(|frame| frame.title == "QQQ holdings"));
    assert!(
        holdings
            .frames
            .iter()
            .flat_map(|frame| &frame.series)
            .all(|series| series.name != "AAPL")
    );
    assert_eq!(
        dashboard
            .coordinator()
            .generation(&PanelId::EtfHoldings.keys(&dashboard.config().bond_regions)[0]),
        Some(crate::coordinator::FetchGeneration(3))
    );
    assert_eq!(dashboard.holding_weights()[0].stock_symbol, "NVDA");
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_leaves_panel_untouched() {
    let api = Arc::new(scripted());
    api.set(
        "us_bonds",
        Err(DataError::Status {
            status: 500,
            url: "us_bonds".to_string(),
        }),
    );
    let mut dashboard = dashboard(&api);
    dashboard.start();
    settle(&mut dashboard).await;

    assert!(matches!(dashboard.status(PanelId::UsCurve), PanelStatus::Failed(_)));
    assert!(chart(&dashboard, ChartId::UsCurve).frames.is_empty());
    assert_eq!(dashboard.status(PanelId::BondSpread), PanelStatus::Ready);

    // a later failure keeps the last rendered chain
    api.set("options/data/SPY", Err(DataError::Api("no option data".to_string())));
    dashboard.refresh(PanelId::Options);
    settle(&mut dashboard).await;

    assert_eq!(
        dashboard.status(PanelId::Options),
        PanelStatus::Failed(DataError::Api("no option data".to_string()))
    );
    let short = chart(&dashboard, ChartId::Options(Tenor::Short));
    assert_eq!(short.frames.len(), 1);
    assert!(!short.last().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bond_spread_fails_as_a_set() {
    let api = Arc::new(scripted());
    api.set("bonds/JP", Err(DataError::Transport("connection reset".to_string())));
    let mut dashboard = dashboard(&api);

    dashboard.start();
    settle(&mut dashboard).await;

    assert!(matches!(dashboard.status(PanelId::BondSpread), PanelStatus::Failed(_)));
    assert!(chart(&dashboard, ChartId::BondSpread).frames.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bond_spread_with_same_region_twice() {
    let api = Arc::new(scripted());
    let api_dyn: Arc<dyn MarketApi> = api.clone();
    let mut dashboard = Dashboard::new(
        DashboardConfig::default().with_bond_regions("US", "US"),
        api_dyn,
        |_| RecordingChart::default(),
    );

    dashboard.refresh(PanelId::BondSpread);
    settle(&mut dashboard).await;

    assert_eq!(dashboard.status(PanelId::BondSpread), PanelStatus::Ready);
    let spread = chart(&dashboard, ChartId::BondSpread).last().unwrap();
    assert_eq!(spread.title, "US vs US yields");
    assert_eq!(
        spread.series[2].points,
        vec![
            (time_x(date("2024-01-01")), 0.0),
            (time_x(date("2024-01-02")), 0.0)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_date_change_refetches_date_bound_panels() {
    let api = Arc::new(scripted());
    let mut dashboard = dashboard(&api);
    dashboard.start();
    settle(&mut dashboard).await;
    api.clear_calls();

    assert!(dashboard.shift_date_range(1));
    settle(&mut dashboard).await;

    let calls = api.calls();
    assert!(calls.contains(&"etf/daily?start_date=2025-02-01".to_string()));
    assert!(calls.contains(&"etf/holdings/QQQ?start_date=2025-02-01".to_string()));
    assert!(!calls.iter().any(|call| call.starts_with("etf/info")));
    assert!(!calls.iter().any(|call| call.starts_with("bonds")));
    assert_eq!(dashboard.selection().date_range_start, date("2025-02-01"));

    // active ETF still present in the new overview, so it is kept
    assert_eq!(dashboard.selection().active_entity.as_deref(), Some("QQQ"));
}

#[tokio::test(start_paused = true)]
async fn test_entity_change_refetches_details_only() {
    let api = Arc::new(scripted());
    let mut dashboard = dashboard(&api);
    dashboard.start();
    settle(&mut dashboard).await;
    api.clear_calls();

    assert!(dashboard.cycle_entity(true));
    settle(&mut dashboard).await;

    let calls = api.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.contains(&"etf/holdings/SPY?start_date=2025-01-01".to_string()));
    assert!(calls.contains(&"etf/info/SPY".to_string()));
    assert_eq!(chart(&dashboard, ChartId::EtfHoldings).last().unwrap().title, "SPY holdings");
    assert_eq!(dashboard.holding_weights()[0].weight_label(), "7.10%");

    // same entity again is not a change
    assert!(!dashboard.select_entity("SPY"));
}

#[tokio::test(start_paused = true)]
async fn test_short_sell_paging_and_history() {
    let api = Arc::new(scripted());
    let mut dashboard = dashboard(&api);
    dashboard.start();
    settle(&mut dashboard).await;

    assert!(dashboard.short_sell_next_page());
    assert!(dashboard.short_sell_next_page());
    assert!(!dashboard.short_sell_next_page());
    assert_eq!(dashboard.short_sell_table().page_slice().len(), 3);
    assert_eq!(dashboard.short_sell_table().pagination_summary().to_string(), "21-23 of 23");

    dashboard.move_short_sell_cursor(1);
    dashboard.move_short_sell_cursor(5);
    assert_eq!(dashboard.short_sell_cursor(), 2);
    dashboard.move_short_sell_cursor(-1);
    assert_eq!(dashboard.selected_short_sell().map(|row| row.code.as_str()), Some("00022"));

    dashboard.load_short_sell_history();
    settle(&mut dashboard).await;

    let history = chart(&dashboard, ChartId::ShortSellHistory).last().unwrap();
    assert_eq!(history.title, "00022 Stock 22 short selling");
    assert_eq!(history.series.len(), 3);
    assert_eq!(dashboard.status(PanelId::ShortSellHistory), PanelStatus::Ready);

    // refresh re-fetches the charted row, not the one under the moved cursor
    dashboard.move_short_sell_cursor(-1);
    assert_eq!(dashboard.selected_short_sell().map(|row| row.code.as_str()), Some("00021"));
    api.clear_calls();
    dashboard.refresh(PanelId::ShortSellHistory);
    settle(&mut dashboard).await;

    assert_eq!(api.calls(), vec!["shortsell/history/00022".to_string()]);
    assert_eq!(dashboard.history_target().map(|target| target.code.as_str()), Some("00022"));
    let history = chart(&dashboard, ChartId::ShortSellHistory).last().unwrap();
    assert_eq!(history.title, "00022 Stock 22 short selling");

    assert!(dashboard.short_sell_prev_page());
    assert_eq!(dashboard.short_sell_cursor(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_option_symbol_cycling() {
    let api = Arc::new(scripted());
    let mut dashboard = dashboard(&api);
    dashboard.start();
    settle(&mut dashboard).await;

    assert!(dashboard.cycle_option_symbol(true));
    settle(&mut dashboard).await;

    assert_eq!(dashboard.option_symbol(), "QQQ");
    let short = chart(&dashboard, ChartId::Options(Tenor::Short)).last().unwrap();
    assert_eq!(short.title, "QQQ Short term");
    assert_eq!(dashboard.position_value().map(|p| p.total.call), Some(0.0));
    assert!(!dashboard.set_option_symbol("qqq"));
}

#[tokio::test(start_paused = true)]
async fn test_resize_all_reaches_every_adapter() {
    let api = Arc::new(scripted());
    let mut dashboard = dashboard(&api);

    dashboard.resize_all(120, 40);

    for id in ChartId::ALL {
        assert_eq!(chart(&dashboard, id).size, Some((120, 40)), "{id}");
    }
}

#[test]
fn test_cycle() {
    struct TestCase {
        current: Option<&'static str>,
        forward: bool,
        expected: Option<&'static str>,
    }

    let items = vec!["GLD".to_string(), "SPY".to_string(), "QQQ".to_string()];

    let tests = vec![
        TestCase {
            // TC0: forward
            current: Some("GLD"),
            forward: true,
            expected: Some("SPY"),
        },
        TestCase {
            // TC1: forward wraps
            current: Some("QQQ"),
            forward: true,
            expected: Some("GLD"),
        },
        TestCase {
            // TC2: backward wraps
            current: Some("GLD"),
            forward: false,
            expected: Some("QQQ"),
        },
        TestCase {
            // TC3: unknown current starts at the first item
            current: Some("TLT"),
            forward: false,
            expected: Some("GLD"),
        },
        TestCase {
            // TC4: nothing selected
            current: None,
            forward: true,
            expected: Some("GLD"),
        },
    ];

    for (index, test) in tests.into_iter().enumerate() {
        let actual = cycle(&items, test.current, test.forward);
        assert_eq!(actual.as_deref(), test.expected, "TC{} failed", index);
    }

    assert_eq!(cycle(&[], Some("SPY"), true), None);
}
