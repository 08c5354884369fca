use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TradeDirection {
    #[default]
    Long,
    Short,
}

impl TradeDirection {
    /// P&L implied by entry and exit prices for this side of the market
    pub fn pnl(&self, entry: f64, exit: f64) -> f64 {
        match self {
            TradeDirection::Long => exit - entry,
            TradeDirection::Short => entry - exit,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Long => write!(f, "Long"),
            TradeDirection::Short => write!(f, "Short"),
        }
    }
}

impl std::str::FromStr for TradeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(TradeDirection::Long),
            "short" | "sell" => Ok(TradeDirection::Short),
            other => Err(format!("Invalid direction '{}': expected Long or Short", other)),
        }
    }
}

/// Structured review returned by the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub potential_improvements: Vec<String>,
    pub overall_rating: f64, // 1-10, as reported by the model
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub pair: String,
    pub date: NaiveDate,
    pub direction: TradeDirection,
    pub entry: f64,
    pub exit: f64,
    pub pnl: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>, // data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AiAnalysis>,
}

impl Trade {
    /// Build a new trade from a validated draft with a fresh id
    pub fn from_draft(draft: TradeDraft, analysis: AiAnalysis) -> Self {
        Self {
            id: new_trade_id(),
            pair: draft.pair,
            date: draft.date,
            direction: draft.direction,
            entry: draft.entry,
            exit: draft.exit,
            pnl: draft.pnl,
            notes: draft.notes,
            screenshot: draft.screenshot,
            analysis: Some(analysis),
        }
    }

    /// Replace every field except the id
    pub fn replace_with(&self, draft: TradeDraft, analysis: AiAnalysis) -> Self {
        Self {
            id: self.id.clone(),
            pair: draft.pair,
            date: draft.date,
            direction: draft.direction,
            entry: draft.entry,
            exit: draft.exit,
            pnl: draft.pnl,
            notes: draft.notes,
            screenshot: draft.screenshot,
            analysis: Some(analysis),
        }
    }

    /// Bring a trade from outside the form to the stored shape:
    /// trimmed upper-case pair, blank notes dropped
    pub fn normalize(&mut self) {
        self.pair = self.pair.trim().to_uppercase();
        self.notes = self
            .notes
            .take()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// A trade as submitted from the form, before it has an id or an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDraft {
    pub pair: String,
    pub date: NaiveDate,
    pub direction: TradeDirection,
    pub entry: f64,
    pub exit: f64,
    pub pnl: f64,
    pub notes: Option<String>,
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFilters {
    pub pair: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TradeFilters {
    pub fn matches(&self, trade: &Trade) -> bool {
        if let Some(pair) = &self.pair {
            if !trade.pair.contains(&pair.to_uppercase()) {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if trade.date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if trade.date > end {
                return false;
            }
        }
        true
    }
}

/// Round to cents. A result of zero is always `+0.0`.
pub fn round_cents(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

pub fn new_trade_id() -> String {
    format!("TRADE-{}-{}", Utc::now().timestamp_millis(), uuid::Uuid::new_v4())
}
