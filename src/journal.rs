use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::TradeAnalyzer;
use crate::commands::trades;
use crate::db::Database;
use crate::error::{JournalError, Result};
use crate::models::{Screenshot, Trade, TradeDraft};

/// Ties the store to the analysis backend.
/// Trades are only written after their analysis succeeds.
pub struct Journal {
    db: Arc<Database>,
    analyzer: Arc<dyn TradeAnalyzer>,
    in_flight: Mutex<()>,
}

impl Journal {
    pub fn new(db: Arc<Database>, analyzer: Arc<dyn TradeAnalyzer>) -> Self {
        let quota = analyzer.rate_limit();
        log::debug!(
            "Journal using {} analyzer ({} requests/min, burst {})",
            analyzer.name(),
            quota.requests_per_minute,
            quota.burst_size
        );
        Self {
            db,
            analyzer,
            in_flight: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Analyze a draft and persist it, as a new trade or over `editing_id`.
    ///
    /// Fails fast with `AnalysisInProgress` when another save is awaiting its
    /// analysis. On edit, a draft without a screenshot keeps the stored one.
    pub async fn save_trade(
        &self,
        mut draft: TradeDraft,
        mut screenshot: Option<Screenshot>,
        editing_id: Option<&str>,
    ) -> Result<Trade> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| JournalError::AnalysisInProgress)?;

        let existing = match editing_id {
            Some(id) => Some(trades::get_trade(&self.db, id)?),
            None => None,
        };

        if let Some(existing) = &existing {
            if draft.screenshot.is_none() {
                draft.screenshot = existing.screenshot.clone();
                screenshot = existing.screenshot.as_deref().and_then(Screenshot::from_data_url);
            }
        }

        let analysis = self
            .analyzer
            .analyze(&draft, screenshot.as_ref())
            .await
            .map_err(|e| {
                log::error!(
                    "Failed to get {} analysis for {}: {}",
                    self.analyzer.name(),
                    draft.pair,
                    e
                );
                JournalError::AnalysisUnavailable
            })?;

        match existing {
            Some(existing) => trades::update_trade(&self.db, existing.replace_with(draft, analysis)),
            None => trades::create_trade(&self.db, Trade::from_draft(draft, analysis)),
        }
    }

    pub fn delete_trade(&self, id: &str, confirmed: bool) -> Result<bool> {
        delete_if_confirmed(&self.db, id, confirmed)
    }
}

/// Delete only when the user confirmed; returns whether a trade was removed.
/// Needs no analyzer.
pub fn delete_if_confirmed(db: &Database, id: &str, confirmed: bool) -> Result<bool> {
    if !confirmed {
        log::info!("Delete of {} not confirmed, keeping it", id);
        return Ok(false);
    }
    trades::delete_trade(db, id)
}
