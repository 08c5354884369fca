use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::commands::trades::get_stored_trades;
use crate::db::Database;
use crate::error::Result;
use crate::models::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// `f64::INFINITY` when there are wins and no losing magnitude
    pub profit_factor: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
}

/// One point of the cumulative P&L chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurvePoint {
    pub index: usize, // 1-based
    pub cumulative_pnl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    Today,
    Week,
    Month,
    ThreeMonths,
    SixMonths,
    Year,
    #[default]
    All,
}

impl DateRange {
    /// First date included in the range, relative to `today`
    pub fn threshold(&self, today: NaiveDate) -> Option<NaiveDate> {
        let days = match self {
            DateRange::Today => 0,
            DateRange::Week => 7,
            DateRange::Month => 30,
            DateRange::ThreeMonths => 90,
            DateRange::SixMonths => 180,
            DateRange::Year => 365,
            DateRange::All => return None,
        };
        Some(today - Duration::days(days))
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "today" => Ok(DateRange::Today),
            "week" => Ok(DateRange::Week),
            "month" => Ok(DateRange::Month),
            "3months" => Ok(DateRange::ThreeMonths),
            "6months" => Ok(DateRange::SixMonths),
            "year" => Ok(DateRange::Year),
            "all" => Ok(DateRange::All),
            other => Err(format!(
                "Unknown range '{}': expected today, week, month, 3months, 6months, year or all",
                other
            )),
        }
    }
}

/// Keep trades dated on or after the range threshold, preserving stored order
pub fn filter_by_range(trades: &[Trade], range: DateRange, today: NaiveDate) -> Vec<Trade> {
    match range.threshold(today) {
        Some(threshold) => trades.iter().filter(|t| t.date >= threshold).cloned().collect(),
        None => trades.to_vec(),
    }
}

pub fn compute_stats(trades: &[Trade]) -> DashboardStats {
    let total_trades = trades.len();

    let mut wins = 0;
    let mut total_pnl = 0.0;
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    let mut best_trade = f64::NEG_INFINITY;
    let mut worst_trade = f64::INFINITY;

    for trade in trades {
        total_pnl += trade.pnl;
        if trade.is_win() {
            wins += 1;
            gross_profit += trade.pnl;
        } else {
            gross_loss += trade.pnl;
        }
        best_trade = best_trade.max(trade.pnl);
        worst_trade = worst_trade.min(trade.pnl);
    }

    let losses = total_trades - wins;
    let gross_loss = gross_loss.abs();

    let win_rate = if total_trades > 0 {
        (wins as f64 / total_trades as f64) * 100.0
    } else {
        0.0
    };

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    DashboardStats {
        total_trades,
        wins,
        losses,
        win_rate,
        total_pnl,
        gross_profit,
        gross_loss,
        avg_win: if wins > 0 { gross_profit / wins as f64 } else { 0.0 },
        avg_loss: if losses > 0 { gross_loss / losses as f64 } else { 0.0 },
        profit_factor,
        best_trade: if total_trades > 0 { best_trade } else { 0.0 },
        worst_trade: if total_trades > 0 { worst_trade } else { 0.0 },
    }
}

/// Cumulative P&L over the stored order reversed (oldest insert first).
/// This is insertion order, not a sort by trade date.
pub fn equity_curve(trades: &[Trade]) -> Vec<EquityCurvePoint> {
    let mut cumulative_pnl = 0.0;
    trades
        .iter()
        .rev()
        .enumerate()
        .map(|(i, trade)| {
            cumulative_pnl += trade.pnl;
            EquityCurvePoint {
                index: i + 1,
                cumulative_pnl,
            }
        })
        .collect()
}

pub fn get_dashboard_stats(db: &Database, range: DateRange) -> Result<DashboardStats> {
    let trades = get_stored_trades(db)?;
    let today = chrono::Local::now().date_naive();
    Ok(compute_stats(&filter_by_range(&trades, range, today)))
}

pub fn get_equity_curve(db: &Database, range: DateRange) -> Result<Vec<EquityCurvePoint>> {
    let trades = get_stored_trades(db)?;
    let today = chrono::Local::now().date_naive();
    Ok(equity_curve(&filter_by_range(&trades, range, today)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeDirection;

    fn trade_with_pnl(id: &str, pnl: f64) -> Trade {
        Trade {
            id: id.to_string(),
            pair: "EUR/USD".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            direction: TradeDirection::Long,
            entry: 1.0,
            exit: 1.0,
            pnl,
            notes: None,
            screenshot: None,
            analysis: None,
        }
    }

    fn trades(pnls: &[f64]) -> Vec<Trade> {
        pnls.iter()
            .enumerate()
            .map(|(i, p)| trade_with_pnl(&format!("T{}", i), *p))
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_reference_example() {
        let stats = compute_stats(&trades(&[100.0, -50.0, 25.0]));

        assert_eq!(stats.total_trades, 3);
        assert!(approx(stats.total_pnl, 75.0));
        assert!(approx(stats.win_rate, 200.0 / 3.0));
        assert_eq!(format!("{:.1}", stats.win_rate), "66.7");
        assert!(approx(stats.avg_win, 62.5));
        assert!(approx(stats.avg_loss, 50.0));
        assert!(approx(stats.profit_factor, 2.5));
        assert_eq!(stats.best_trade, 100.0);
        assert_eq!(stats.worst_trade, -50.0);
    }

    #[test]
    fn test_empty_collection() {
        let stats = compute_stats(&[]);

        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.total_pnl, 0.0);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.avg_win, 0.0);
        assert_eq!(stats.avg_loss, 0.0);
        assert_eq!(stats.profit_factor, 0.0);
        assert!(stats.profit_factor.is_finite());
        assert_eq!(stats.best_trade, 0.0);
        assert_eq!(stats.worst_trade, 0.0);
    }

    #[test]
    fn test_profit_factor_infinite_only_with_wins_and_no_loss() {
        assert!(compute_stats(&trades(&[10.0, 5.0])).profit_factor.is_infinite());

        // Break-even trades count as losses with zero magnitude
        assert!(compute_stats(&trades(&[10.0, 0.0])).profit_factor.is_infinite());

        // No wins and no loss magnitude
        assert_eq!(compute_stats(&trades(&[0.0, 0.0])).profit_factor, 0.0);

        // Losses only
        assert_eq!(compute_stats(&trades(&[-1.0, -2.0])).profit_factor, 0.0);
    }

    #[test]
    fn test_zero_pnl_is_a_loss() {
        let stats = compute_stats(&trades(&[0.0, 20.0]));
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.win_rate, 50.0);
        assert_eq!(stats.avg_loss, 0.0);
    }

    #[test]
    fn test_win_rate_bounds() {
        let cases: Vec<Vec<f64>> = vec![
            vec![],
            vec![1.0],
            vec![-1.0],
            vec![1.0, -1.0, 0.0, 3.5, -2.25],
            vec![0.0; 7],
        ];
        for pnls in cases {
            let stats = compute_stats(&trades(&pnls));
            assert!((0.0..=100.0).contains(&stats.win_rate), "{:?}", pnls);
        }
    }

    #[test]
    fn test_total_pnl_is_order_independent() {
        let forward = trades(&[12.5, -3.25, 40.0, -0.5]);
        let mut backward = forward.clone();
        backward.reverse();

        let a = compute_stats(&forward).total_pnl;
        let b = compute_stats(&backward).total_pnl;
        assert!(approx(a, b));
        assert!(approx(a, 48.75));
    }

    #[test]
    fn test_equity_curve_reverses_stored_order() {
        // Stored order is newest insert first
        let stored = trades(&[25.0, -50.0, 100.0]);
        let curve = equity_curve(&stored);

        assert_eq!(
            curve,
            vec![
                EquityCurvePoint { index: 1, cumulative_pnl: 100.0 },
                EquityCurvePoint { index: 2, cumulative_pnl: 50.0 },
                EquityCurvePoint { index: 3, cumulative_pnl: 75.0 },
            ]
        );
    }

    #[test]
    fn test_equity_curve_ignores_dates() {
        let mut stored = trades(&[1.0, 2.0]);
        // Newest insert carries the older date
        stored[0].date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

        let curve = equity_curve(&stored);
        assert_eq!(curve[0].cumulative_pnl, 2.0);
        assert_eq!(curve[1].cumulative_pnl, 3.0);
    }

    #[test]
    fn test_equity_curve_empty() {
        assert!(equity_curve(&[]).is_empty());
    }

    #[test]
    fn test_date_range_filter() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let mut stored = trades(&[1.0, 2.0, 3.0]);
        stored[0].date = today;
        stored[1].date = NaiveDate::from_ymd_opt(2025, 6, 25).unwrap();
        stored[2].date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        assert_eq!(filter_by_range(&stored, DateRange::Today, today).len(), 1);
        assert_eq!(filter_by_range(&stored, DateRange::Week, today).len(), 2);
        assert_eq!(filter_by_range(&stored, DateRange::All, today).len(), 3);

        let week = filter_by_range(&stored, DateRange::Week, today);
        assert_eq!(week[0].id, "T0");
    }

    #[test]
    fn test_date_range_parse() {
        assert_eq!("3months".parse::<DateRange>().unwrap(), DateRange::ThreeMonths);
        assert!("fortnight".parse::<DateRange>().is_err());
    }

    #[test]
    fn test_stats_from_database() {
        let db = Database::open_in_memory().unwrap();
        for t in trades(&[100.0, -50.0, 25.0]) {
            crate::commands::trades::create_trade(&db, t).unwrap();
        }

        let stats = get_dashboard_stats(&db, DateRange::All).unwrap();
        assert!(approx(stats.profit_factor, 2.5));

        // Created T0, T1, T2, so the oldest insert (T0, +100) is first
        let curve = get_equity_curve(&db, DateRange::All).unwrap();
        assert_eq!(curve[0].cumulative_pnl, 100.0);
        assert_eq!(curve[2].cumulative_pnl, 75.0);
    }
}
