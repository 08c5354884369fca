//! Trade entry form: raw field input in, validated `TradeDraft` out.

use chrono::NaiveDate;
use std::path::PathBuf;

use crate::assets;
use crate::error::{JournalError, Result};
use crate::models::{Screenshot, Trade, TradeDirection, TradeDraft, round_cents};

/// Field values exactly as the user typed them
#[derive(Debug, Clone, Default)]
pub struct TradeForm {
    pub pair: String,
    pub date: String,
    pub direction: TradeDirection,
    pub entry: String,
    pub exit: String,
    pub pnl: String,
    pub notes: String,
    pub screenshot_path: Option<PathBuf>,
}

impl TradeForm {
    /// Blank form for a new trade, dated today
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today.format("%Y-%m-%d").to_string(),
            ..Default::default()
        }
    }

    /// Pre-filled form for editing an existing trade. No screenshot is selected.
    pub fn from_trade(trade: &Trade) -> Self {
        Self {
            pair: trade.pair.clone(),
            date: trade.date.format("%Y-%m-%d").to_string(),
            direction: trade.direction,
            entry: trade.entry.to_string(),
            exit: trade.exit.to_string(),
            pnl: trade.pnl.to_string(),
            notes: trade.notes.clone().unwrap_or_default(),
            screenshot_path: None,
        }
    }

    pub fn set_pair(&mut self, pair: &str) {
        self.pair = pair.to_uppercase();
    }

    /// P&L implied by the current prices, rounded to cents.
    /// `None` until both prices parse.
    pub fn suggested_pnl(&self) -> Option<f64> {
        let entry = parse_optional_number(&self.entry)?;
        let exit = parse_optional_number(&self.exit)?;
        Some(round_cents(self.direction.pnl(entry, exit)))
    }

    /// Refresh the P&L field from the prices, as when leaving a price field
    pub fn apply_suggested_pnl(&mut self) {
        if let Some(pnl) = self.suggested_pnl() {
            self.pnl = format!("{:.2}", pnl);
        }
    }

    /// Validate every field and build the draft.
    /// The screenshot is returned separately so it can be sent for analysis.
    pub fn submit(&self) -> Result<(TradeDraft, Option<Screenshot>)> {
        let pair = self.pair.trim().to_uppercase();
        if pair.is_empty() {
            return Err(JournalError::validation("pair", "is required"));
        }
        if !assets::is_known(&pair) {
            log::warn!("Pair {} is not in the tradable assets list", pair);
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|e| {
            JournalError::validation("date", format!("'{}' is not YYYY-MM-DD ({})", self.date, e))
        })?;

        let entry = parse_required_number("entry", &self.entry)?;
        let exit = parse_required_number("exit", &self.exit)?;
        let pnl = parse_required_number("pnl", &self.pnl)?;

        let notes = Some(self.notes.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let screenshot = match &self.screenshot_path {
            Some(path) => Some(Screenshot::from_path(path)?),
            None => None,
        };

        let draft = TradeDraft {
            pair,
            date,
            direction: self.direction,
            entry,
            exit,
            pnl,
            notes,
            screenshot: screenshot.as_ref().map(Screenshot::to_data_url),
        };

        Ok((draft, screenshot))
    }
}

fn parse_optional_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_required_number(field: &str, raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(JournalError::validation(field, "is required"));
    }
    parse_optional_number(raw)
        .ok_or_else(|| JournalError::validation(field, format!("'{}' is not a number", raw)))
}
