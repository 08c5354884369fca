use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;

use crate::db::Database;
use crate::error::{JournalError, Result};
use crate::models::{Trade, TradeFilters};

/// Storage slot holding the whole trade collection
pub const TRADES_KEY: &str = "trades";

/// Read the collection in stored order (newest insert first)
pub fn load_trades(conn: &Connection) -> Result<Vec<Trade>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM kv_store WHERE key = ?",
            [TRADES_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

/// Overwrite the slot with the full collection
pub fn save_trades(conn: &Connection, trades: &[Trade]) -> Result<()> {
    let json = serde_json::to_string(trades)?;
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::params![TRADES_KEY, json, Utc::now().timestamp()],
    )?;
    log::debug!("Persisted {} trades", trades.len());
    Ok(())
}

/// Display order: date descending, ties keep stored order
pub fn sort_for_display(trades: &mut [Trade]) {
    trades.sort_by(|a, b| b.date.cmp(&a.date));
}

pub fn get_trades(db: &Database, filters: Option<&TradeFilters>) -> Result<Vec<Trade>> {
    let conn = db.conn.lock()?;

    let mut trades = load_trades(&conn)?;
    if let Some(f) = filters {
        trades.retain(|t| f.matches(t));
    }
    sort_for_display(&mut trades);

    Ok(trades)
}

/// Collection in stored order, as the statistics engine expects it
pub fn get_stored_trades(db: &Database) -> Result<Vec<Trade>> {
    let conn = db.conn.lock()?;
    load_trades(&conn)
}

pub fn get_trade(db: &Database, id: &str) -> Result<Trade> {
    let conn = db.conn.lock()?;

    load_trades(&conn)?
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| JournalError::NotFound(id.to_string()))
}

pub fn create_trade(db: &Database, trade: Trade) -> Result<Trade> {
    let conn = db.conn.lock()?;

    let mut trades = load_trades(&conn)?;
    if trades.iter().any(|t| t.id == trade.id) {
        return Err(JournalError::DuplicateId(trade.id));
    }

    trades.insert(0, trade.clone());
    save_trades(&conn, &trades)?;

    log::info!("Created trade {} ({})", trade.id, trade.pair);
    Ok(trade)
}

/// Replace the record with the same id, keeping its position in the collection
pub fn update_trade(db: &Database, trade: Trade) -> Result<Trade> {
    let conn = db.conn.lock()?;

    let mut trades = load_trades(&conn)?;
    let slot = trades
        .iter_mut()
        .find(|t| t.id == trade.id)
        .ok_or_else(|| JournalError::NotFound(trade.id.clone()))?;
    *slot = trade.clone();
    save_trades(&conn, &trades)?;

    log::info!("Updated trade {}", trade.id);
    Ok(trade)
}

/// Returns whether a record was removed
pub fn delete_trade(db: &Database, id: &str) -> Result<bool> {
    let conn = db.conn.lock()?;

    let mut trades = load_trades(&conn)?;
    let before = trades.len();
    trades.retain(|t| t.id != id);

    if trades.len() == before {
        log::warn!("Delete requested for unknown trade {}", id);
        return Ok(false);
    }

    save_trades(&conn, &trades)?;
    log::info!("Deleted trade {}", id);
    Ok(true)
}

/// Swap in a whole new collection, rejecting duplicate ids.
/// Takes a connection so callers can group it with other writes.
pub fn replace_all_trades(conn: &Connection, trades: &[Trade]) -> Result<usize> {
    let mut seen = HashSet::new();
    for trade in trades {
        if !seen.insert(trade.id.as_str()) {
            return Err(JournalError::DuplicateId(trade.id.clone()));
        }
    }

    save_trades(conn, trades)?;
    Ok(trades.len())
}
