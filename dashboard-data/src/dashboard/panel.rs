use crate::{
    coordinator::LogicalKey,
    error::DataError,
    model::{Row, Tenor, field, points_from_rows},
    render::{ChartFrame, ChartSeries, XAxis, time_points},
    selection::PanelBinding,
    transform::{
        align::AlignedSeriesPair,
        normalize::GroupedSeries,
        pivot::{StrikeBucket, format_strike},
    },
};
use derive_more::Display;
use itertools::Itertools;

/// Independently fetched dashboard panel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display)]
pub enum PanelId {
    #[display("bond spread")]
    BondSpread,
    #[display("US curve")]
    UsCurve,
    #[display("ETF list")]
    EtfList,
    #[display("ETF overview")]
    EtfOverview,
    #[display("ETF holdings")]
    EtfHoldings,
    #[display("ETF info")]
    EtfInfo,
    #[display("options")]
    Options,
    #[display("position value")]
    OptionsPosition,
    #[display("short sell")]
    ShortSellTable,
    #[display("short sell history")]
    ShortSellHistory,
}

impl PanelId {
    pub const ALL: [PanelId; 10] = [
        PanelId::BondSpread,
        PanelId::UsCurve,
        PanelId::EtfList,
        PanelId::EtfOverview,
        PanelId::EtfHoldings,
        PanelId::EtfInfo,
        PanelId::Options,
        PanelId::OptionsPosition,
        PanelId::ShortSellTable,
        PanelId::ShortSellHistory,
    ];

    /// How the panel reacts to the shared selection.
    ///
    /// The short-sell table drives its history chart through its own row cursor, so both are
    /// standalone here.
    pub fn binding(self) -> PanelBinding {
        match self {
            PanelId::EtfOverview => PanelBinding::master(true),
            PanelId::EtfHoldings => PanelBinding::detail(true),
            PanelId::EtfInfo => PanelBinding::detail(false),
            _ => PanelBinding::STANDALONE,
        }
    }

    /// Staleness scope of the panel's fetches. The bond spread joins two keys.
    pub fn keys(self, bond_regions: &(String, String)) -> Vec<LogicalKey> {
        let key = match self {
            PanelId::BondSpread => {
                return vec![
                    LogicalKey::new(format!("bonds:{}", bond_regions.0)),
                    LogicalKey::new(format!("bonds:{}", bond_regions.1)),
                ];
            }
            PanelId::UsCurve => "us_bonds",
            PanelId::EtfList => "etf:list",
            PanelId::EtfOverview => "etf:daily",
            PanelId::EtfHoldings => "etf_holdings",
            PanelId::EtfInfo => "etf_info",
            PanelId::Options => "options",
            PanelId::OptionsPosition => "options_position",
            PanelId::ShortSellTable => "short_sell:latest",
            PanelId::ShortSellHistory => "short_sell:history",
        };
        vec![LogicalKey::new(key)]
    }
}

/// Chart surface owned by the dashboard, one render adapter each.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display)]
pub enum ChartId {
    #[display("bond spread")]
    BondSpread,
    #[display("US curve")]
    UsCurve,
    #[display("ETF overview")]
    EtfOverview,
    #[display("ETF holdings")]
    EtfHoldings,
    #[display("{_0} options")]
    Options(Tenor),
    #[display("short sell history")]
    ShortSellHistory,
}

impl ChartId {
    pub const ALL: [ChartId; 8] = [
        ChartId::BondSpread,
        ChartId::UsCurve,
        ChartId::EtfOverview,
        ChartId::EtfHoldings,
        ChartId::Options(Tenor::Short),
        ChartId::Options(Tenor::Near),
        ChartId::Options(Tenor::Far),
        ChartId::ShortSellHistory,
    ];
}

/// Load state of a panel, as shown in the status bar.
#[derive(Debug, Clone, Default, PartialEq, Display)]
pub enum PanelStatus {
    #[default]
    #[display("idle")]
    Idle,
    #[display("loading")]
    Loading,
    #[display("ready")]
    Ready,
    #[display("no data")]
    NoData,
    #[display("failed: {_0}")]
    Failed(DataError),
}

impl PanelStatus {
    pub(crate) fn for_frame(frame: &ChartFrame) -> Self {
        if frame.is_empty() {
            PanelStatus::NoData
        } else {
            PanelStatus::Ready
        }
    }
}

/// Both regions' yields plus their spread on the right axis.
///
/// Only a pair with no parsable point on either side is a placeholder.
pub fn bond_spread_frame(pair: &AlignedSeriesPair, regions: &(String, String)) -> ChartFrame {
    let title = format!("{} vs {} yields", regions.0, regions.1);
    if pair.primary.is_empty() && pair.secondary.is_empty() {
        return ChartFrame::no_data(title);
    }

    ChartFrame::new(
        title,
        XAxis::Time,
        vec![
            ChartSeries::time_line(regions.0.as_str(), &pair.primary),
            ChartSeries::time_line(regions.1.as_str(), &pair.secondary),
            ChartSeries::time_line(format!("{}-{}", regions.0, regions.1), &pair.difference)
                .on_right_axis(),
        ],
    )
}

/// 1y, 10y and 20y US treasury yields.
pub fn us_curve_frame(rows: &[Row]) -> ChartFrame {
    let series: Vec<ChartSeries> = [
        ("1Y", field::YIELD_1Y),
        ("10Y", field::YIELD_10Y),
        ("20Y", field::YIELD_20Y),
    ]
    .into_iter()
    .map(|(name, column)| {
        ChartSeries::time_line(name, &points_from_rows(rows, field::TRADE_DATE, column))
    })
    .collect();

    let frame = ChartFrame::new("US treasury yields", XAxis::Time, series);
    if frame.is_empty() {
        ChartFrame::no_data(frame.title)
    } else {
        frame
    }
}

/// One date-sorted line per group.
pub fn grouped_frame<S: Into<String>>(title: S, grouped: &GroupedSeries) -> ChartFrame {
    if grouped.is_empty() {
        return ChartFrame::no_data(title);
    }

    let series = grouped
        .keys()
        .map(|key| ChartSeries::line(key, time_points(&grouped.sorted_by_date(key))))
        .collect();

    ChartFrame::new(title, XAxis::Time, series)
}

/// Diverging call/put bars per strike, volume and open interest side by side.
pub fn option_frame<S: Into<String>>(title: S, buckets: &[StrikeBucket]) -> ChartFrame {
    if buckets.is_empty() {
        return ChartFrame::no_data(title);
    }

    let labels = buckets
        .iter()
        .map(|bucket| format_strike(bucket.strike))
        .collect();

    let bars = |name: &str, value: fn(&StrikeBucket) -> f64| {
        ChartSeries::bar(
            name,
            buckets
                .iter()
                .enumerate()
                .map(|(index, bucket)| (index as f64, value(bucket)))
                .collect(),
        )
    };

    ChartFrame::new(
        title,
        XAxis::Category(labels),
        vec![
            bars("CALL volume", |bucket: &StrikeBucket| bucket.call_volume),
            bars("PUT volume", |bucket: &StrikeBucket| bucket.put_volume),
            bars("CALL open interest", |bucket: &StrikeBucket| bucket.call_open_interest),
            bars("PUT open interest", |bucket: &StrikeBucket| bucket.put_open_interest),
        ],
    )
}

/// Short-sell turnover bars with the average short price on the right axis.
pub fn short_sell_history_frame<S: Into<String>>(title: S, rows: &[Row]) -> ChartFrame {
    let sorted = |column: &str| {
        points_from_rows(rows, field::TRADE_DATE, column)
            .into_iter()
            .sorted_by_key(|point| point.date())
            .collect_vec()
    };

    let frame = ChartFrame::new(
        title,
        XAxis::Time,
        vec![
            ChartSeries::time_line("Short price", &sorted(field::SHORT_PRICE)).on_right_axis(),
            ChartSeries::bar("Short amount", time_points(&sorted(field::SHORT_AMOUNT))),
            ChartSeries::bar("Total amount", time_points(&sorted(field::TOTAL_AMOUNT))),
        ],
    );

    if frame.is_empty() {
        ChartFrame::no_data(frame.title)
    } else {
        frame
    }
}
