//! Plain-text views of the dashboard and trade list.

use std::fmt::Write;

use crate::commands::stats::{DashboardStats, EquityCurvePoint};
use crate::models::{AiAnalysis, Trade, round_cents};

const CHART_HEIGHT: usize = 10;
const CHART_MAX_WIDTH: usize = 60;
const RATING_SCALE: usize = 10;

pub fn money(currency: &str, amount: f64) -> String {
    let amount = round_cents(amount);
    if amount < 0.0 {
        format!("-{}{:.2}", currency, amount.abs())
    } else {
        format!("{}{:.2}", currency, amount)
    }
}

fn signed_money(currency: &str, amount: f64) -> String {
    if round_cents(amount) >= 0.0 {
        format!("+{}", money(currency, amount))
    } else {
        money(currency, amount)
    }
}

pub fn profit_factor_label(profit_factor: f64) -> String {
    if profit_factor.is_finite() {
        format!("{:.2}", profit_factor)
    } else {
        "N/A".to_string()
    }
}

pub fn render_dashboard(stats: &DashboardStats, currency: &str) -> String {
    let cards = [
        ("Total P&L", money(currency, stats.total_pnl)),
        ("Win Rate", format!("{:.1}%", stats.win_rate)),
        ("Profit Factor", profit_factor_label(stats.profit_factor)),
        ("Avg. Win", money(currency, stats.avg_win)),
        ("Avg. Loss", money(currency, stats.avg_loss)),
        ("Total Trades", stats.total_trades.to_string()),
    ];

    let mut out = String::from("Performance Dashboard\n");
    for (title, value) in cards {
        let _ = writeln!(out, "  {:<14} {}", title, value);
    }
    out
}

/// Area plot of the cumulative P&L, filled between zero and each point
pub fn render_equity_chart(points: &[EquityCurvePoint], currency: &str) -> String {
    if points.is_empty() {
        return "No trades to chart yet.\n".to_string();
    }

    let columns: Vec<&EquityCurvePoint> = if points.len() > CHART_MAX_WIDTH {
        (0..CHART_MAX_WIDTH)
            .map(|c| &points[(c + 1) * points.len() / CHART_MAX_WIDTH - 1])
            .collect()
    } else {
        points.iter().collect()
    };

    let low = columns.iter().map(|p| p.cumulative_pnl).fold(0.0_f64, f64::min);
    let mut high = columns.iter().map(|p| p.cumulative_pnl).fold(0.0_f64, f64::max);
    if high <= low {
        high = low + 1.0;
    }
    let step = (high - low) / CHART_HEIGHT as f64;

    let top_label = money(currency, high);
    let bottom_label = money(currency, low);
    let gutter = top_label.len().max(bottom_label.len());

    let mut out = String::from("Cumulative P&L\n");
    for row in (0..CHART_HEIGHT).rev() {
        let level = low + (row as f64 + 0.5) * step;
        let label = match row {
            r if r == CHART_HEIGHT - 1 => top_label.as_str(),
            0 => bottom_label.as_str(),
            _ => "",
        };
        let cells: String = columns
            .iter()
            .map(|p| {
                let v = p.cumulative_pnl;
                if (level >= 0.0 && v >= level) || (level < 0.0 && v <= level) {
                    '#'
                } else {
                    ' '
                }
            })
            .collect();
        let _ = writeln!(out, "{:>gutter$} |{}", label, cells, gutter = gutter);
    }

    let first = columns[0].index;
    let last = columns[columns.len() - 1].index;
    let _ = writeln!(out, "{:>gutter$} +{}", "", "-".repeat(columns.len()), gutter = gutter);
    if first == last {
        let _ = writeln!(out, "{:>gutter$}  Trade #{}", "", first, gutter = gutter);
    } else {
        let _ = writeln!(
            out,
            "{:>gutter$}  Trade #{} .. Trade #{}",
            "",
            first,
            last,
            gutter = gutter
        );
    }
    out
}

/// Cards in the order given; callers pass the date-sorted view
pub fn render_trade_list(trades: &[Trade], currency: &str) -> String {
    if trades.is_empty() {
        return "Your journal is empty.\n\
                Log your first trade to get started: trade-journal add (Log First Trade)\n"
            .to_string();
    }

    trades
        .iter()
        .map(|t| render_trade_card(t, currency, false))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_trade_card(trade: &Trade, currency: &str, expanded: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  {}  {}  [{}]",
        trade.pair, trade.direction, trade.date, trade.id
    );
    let _ = writeln!(out, "  Entry {}  Exit {}", trade.entry, trade.exit);
    let _ = writeln!(out, "  P&L {}", signed_money(currency, trade.pnl));
    if let Some(notes) = &trade.notes {
        let _ = writeln!(out, "  Notes: {}", notes);
    }
    if trade.screenshot.is_some() {
        let _ = writeln!(out, "  Screenshot attached");
    }

    if expanded {
        out.push('\n');
        match &trade.analysis {
            Some(analysis) => out.push_str(&render_analysis(analysis)),
            None => out.push_str("  No AI analysis available for this trade.\n"),
        }
    }
    out
}

fn rating_stars(rating: f64) -> String {
    (0..RATING_SCALE)
        .map(|i| if (i as f64) < rating { '*' } else { '.' })
        .collect()
}

fn render_analysis(analysis: &AiAnalysis) -> String {
    let mut out = String::from("  AI Trade Analysis\n");
    let _ = writeln!(
        out,
        "  Overall Rating: {} ({}/10)",
        rating_stars(analysis.overall_rating),
        analysis.overall_rating
    );
    let _ = writeln!(out, "  {}", analysis.summary);

    for (title, items) in [
        ("Strengths", &analysis.strengths),
        ("Weaknesses", &analysis.weaknesses),
        ("Improvements", &analysis.potential_improvements),
    ] {
        let _ = writeln!(out, "  {}:", title);
        for item in items {
            let _ = writeln!(out, "    - {}", item);
        }
    }
    out
}
