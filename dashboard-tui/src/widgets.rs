//! Non-chart panels: tab bar, tables, option position summary and status line.

use crate::chart::{C_ACCENT, C_BRIGHT, C_DIM};
use dashboard_data::{
    PaginatedTable, PanelStatus,
    model::{HoldingWeight, PositionValue, ShortSellRow, Tenor},
    transform::pivot::{ChainTotals, format_quantity},
};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table, Tabs},
};

const C_CALL: Color = Color::Rgb(100, 220, 100);
const C_PUT: Color = Color::Rgb(220, 100, 100);
const C_WARN: Color = Color::Rgb(180, 180, 100);

pub fn render_tabs(f: &mut Frame, area: Rect, titles: &[&str], selected: usize) {
    let titles = titles
        .iter()
        .enumerate()
        .map(|(index, title)| format!(" {} {} ", index + 1, title));
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(C_DIM))
        .highlight_style(Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(tabs, area);
}

/// Constituent weights of the active ETF.
pub fn render_etf_info(f: &mut Frame, area: Rect, entity: Option<&str>, weights: &[HoldingWeight]) {
    let title = match entity {
        Some(entity) => format!(" {entity} weights "),
        None => " Weights ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));

    if weights.is_empty() {
        f.render_widget(placeholder("No holdings").block(block), area);
        return;
    }

    let rows = weights.iter().map(|weight| {
        Row::new([weight.stock_symbol.clone(), weight.weight_label()])
            .style(Style::default().fg(C_BRIGHT))
    });
    let table = Table::new(rows, [Constraint::Fill(1), Constraint::Length(9)])
        .header(Row::new(["Symbol", "Weight"]).style(Style::default().fg(C_DIM)))
        .block(block);
    f.render_widget(table, area);
}

/// Cells of one short-sell table row.
pub fn short_sell_cells(row: &ShortSellRow) -> [String; 7] {
    [
        row.code.clone(),
        row.name.clone(),
        row.last_price
            .map(|price| format!("{price:.2}"))
            .unwrap_or_else(|| "--".to_string()),
        format_quantity(row.short_volume),
        format!("{:.2}", row.short_amount),
        format!("{:.2}", row.total_amount),
        format!("{:.2}%", row.short_ratio),
    ]
}

/// Current page of the short-sell snapshot with the row cursor highlighted.
pub fn render_short_sell_table(
    f: &mut Frame,
    area: Rect,
    table: &PaginatedTable<ShortSellRow>,
    cursor: usize,
    latest_date: Option<&str>,
) {
    let state = table.state();
    let title = format!(
        " Short selling {} | {} | page {}/{} ",
        latest_date.unwrap_or("--"),
        table.pagination_summary(),
        state.current_page,
        state.page_count().max(1),
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));

    if table.is_empty() {
        f.render_widget(placeholder("No short-sell data").block(block), area);
        return;
    }

    let rows = table.page_slice().iter().enumerate().map(|(index, row)| {
        let style = if index == cursor {
            Style::default().fg(Color::Black).bg(C_ACCENT)
        } else {
            Style::default().fg(C_BRIGHT)
        };
        Row::new(short_sell_cells(row)).style(style)
    });
    let widths = [
        Constraint::Length(8),
        Constraint::Fill(1),
        Constraint::Length(9),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(8),
    ];
    let header = Row::new([
        "Code", "Name", "Last", "Short vol", "Short amt", "Total amt", "Ratio",
    ])
    .style(Style::default().fg(C_DIM));

    f.render_widget(Table::new(rows, widths).header(header).block(block), area);
}

/// Call/put notional split and per tenor open interest totals.
pub fn position_lines(
    position: Option<&PositionValue>,
    totals: &[(Tenor, Option<ChainTotals>)],
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match position {
        Some(position) => {
            for (label, split) in [
                ("Main battle", position.main_battle),
                ("Support    ", position.support),
                ("Total      ", position.total),
            ] {
                lines.push(Line::from(vec![
                    Span::styled(format!("{label} "), Style::default().fg(C_DIM)),
                    Span::styled(format!("C {:>10.2}", split.call), Style::default().fg(C_CALL)),
                    Span::raw("  "),
                    Span::styled(format!("P {:>10.2}", split.put), Style::default().fg(C_PUT)),
                ]));
            }
        }
        None => lines.push(Line::from(Span::styled(
            "Position value unavailable",
            Style::default().fg(C_DIM),
        ))),
    }

    lines.push(Line::from(""));

    for (tenor, totals) in totals {
        let Some(totals) = totals else {
            continue;
        };
        let ratio = totals
            .put_call_ratio()
            .map(|ratio| format!("{ratio:.2}"))
            .unwrap_or_else(|| "--".to_string());
        lines.push(Line::from(vec![
            Span::styled(format!("{:<11} ", tenor.to_string()), Style::default().fg(C_DIM)),
            Span::styled(
                format!("OI C {}", format_quantity(totals.call_open_interest)),
                Style::default().fg(C_CALL),
            ),
            Span::raw(" "),
            Span::styled(
                format!("P {}", format_quantity(totals.put_open_interest)),
                Style::default().fg(C_PUT),
            ),
            Span::styled(format!("  P/C {ratio}"), Style::default().fg(C_WARN)),
        ]));
    }

    lines
}

pub fn render_position(
    f: &mut Frame,
    area: Rect,
    symbol: &str,
    latest_date: Option<&str>,
    lines: Vec<Line<'static>>,
) {
    let block = Block::default()
        .title(format!(" {symbol} position {} ", latest_date.unwrap_or("")))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

/// One line: panel statuses on the left, key hints on the right.
pub fn status_line(statuses: &[(String, PanelStatus)], hints: &str) -> Line<'static> {
    let mut spans = Vec::new();
    for (name, status) in statuses {
        let color = match status {
            PanelStatus::Ready => C_CALL,
            PanelStatus::Loading => C_WARN,
            PanelStatus::Failed(_) => C_PUT,
            PanelStatus::Idle | PanelStatus::NoData => C_DIM,
        };
        spans.push(Span::styled(format!("{name}: "), Style::default().fg(C_DIM)));
        spans.push(Span::styled(format!("{status}  "), Style::default().fg(color)));
    }
    spans.push(Span::styled(hints.to_string(), Style::default().fg(C_DIM)));
    Line::from(spans)
}

fn placeholder(message: &str) -> Paragraph<'_> {
    Paragraph::new(Line::from(Span::styled(message, Style::default().fg(C_DIM))))
}
