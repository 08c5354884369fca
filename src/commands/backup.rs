use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::commands::settings::read_settings;
use crate::commands::trades::{load_trades, replace_all_trades};
use crate::db::Database;
use crate::error::Result;
use crate::models::{Settings, Trade};

pub const BACKUP_VERSION: &str = "1.0.0";

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupData {
    pub settings: Settings,
    pub trades: Vec<Trade>,
    pub export_date: String,
    pub version: String,
}

/// Either a full backup or the bare array the browser journal kept in localStorage
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Backup(BackupData),
    Trades(Vec<Trade>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub settings_restored: bool,
    pub trades_imported: usize,
}

/// Export settings and trades as pretty JSON
pub fn export_all_data(db: &Database) -> Result<String> {
    let conn = db.conn.lock()?;

    let backup = BackupData {
        settings: read_settings(&conn)?,
        trades: load_trades(&conn)?,
        export_date: Utc::now().to_rfc3339(),
        version: BACKUP_VERSION.to_string(),
    };

    Ok(serde_json::to_string_pretty(&backup)?)
}

/// Import a backup; the imported trades replace the current collection.
/// Trades and settings are written in one transaction.
pub fn import_all_data(db: &Database, json_data: &str) -> Result<ImportResult> {
    let payload: ImportPayload = serde_json::from_str(json_data)?;

    let (settings, mut trades) = match payload {
        ImportPayload::Backup(backup) => {
            log::info!(
                "Importing backup v{} exported {}",
                backup.version,
                backup.export_date
            );
            (Some(backup.settings), backup.trades)
        }
        ImportPayload::Trades(trades) => (None, trades),
    };
    trades.iter_mut().for_each(Trade::normalize);

    let conn = db.conn.lock()?;
    let tx = conn.unchecked_transaction()?;

    let trades_imported = replace_all_trades(&tx, &trades)?;
    if let Some(s) = &settings {
        tx.execute(
            "UPDATE settings SET currency = ?, analysis_model = ?, analysis_temperature = ?, updated_at = ? WHERE id = 1",
            rusqlite::params![
                s.currency,
                s.analysis_model,
                s.analysis_temperature,
                Utc::now().timestamp(),
            ],
        )?;
    }
    tx.commit()?;

    log::info!("Imported {} trades", trades_imported);

    Ok(ImportResult {
        settings_restored: settings.is_some(),
        trades_imported,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::settings::{get_settings, update_settings};
    use crate::commands::trades::{create_trade, get_stored_trades, get_trade};
    use crate::render;
    use crate::error::JournalError;
    use crate::models::{TradeDirection, UpdateSettingsInput};
    use chrono::NaiveDate;

    fn sample_trade(id: &str, pnl: f64) -> Trade {
        Trade {
            id: id.to_string(),
            pair: "USD/JPY".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
            direction: TradeDirection::Short,
            entry: 152.0,
            exit: 151.0,
            pnl,
            notes: Some("BoJ headline".to_string()),
            screenshot: None,
            analysis: None,
        }
    }

    #[test]
    fn test_export_then_import_into_fresh_db() {
        let source = Database::open_in_memory().unwrap();
        create_trade(&source, sample_trade("first", 10.0)).unwrap();
        create_trade(&source, sample_trade("second", -4.0)).unwrap();
        update_settings(
            &source,
            UpdateSettingsInput {
                currency: Some("£".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let json = export_all_data(&source).unwrap();
        assert!(json.contains("\"version\": \"1.0.0\""));

        let target = Database::open_in_memory().unwrap();
        let result = import_all_data(&target, &json).unwrap();

        assert!(result.settings_restored);
        assert_eq!(result.trades_imported, 2);
        assert_eq!(get_settings(&target).unwrap().currency, "£");
        assert_eq!(get_stored_trades(&target).unwrap(), get_stored_trades(&source).unwrap());
    }

    #[test]
    fn test_import_browser_array() {
        let db = Database::open_in_memory().unwrap();
        let json = r#"[
            {"id": "1718000000001", "pair": "BTC/USD", "date": "2024-06-11", "direction": "Long",
             "entry": 67000, "exit": 68000, "pnl": 1000},
            {"id": "1718000000000", "pair": "EUR/USD", "date": "2024-06-10", "direction": "Short",
             "entry": 1.085, "exit": 1.08, "pnl": 50, "notes": ""}
        ]"#;

        let result = import_all_data(&db, json).unwrap();

        assert!(!result.settings_restored);
        assert_eq!(result.trades_imported, 2);
        let stored = get_stored_trades(&db).unwrap();
        assert_eq!(stored[0].pair, "BTC/USD");
        assert!(stored[1].notes.is_none());
        assert!(!render::render_trade_card(&stored[1], "$", false).contains("Notes:"));
    }

    #[test]
    fn test_import_normalizes_pair_and_notes() {
        let db = Database::open_in_memory().unwrap();
        let json = r#"[{"id": "1", "pair": " gbp/jpy ", "date": "2024-06-12", "direction": "Long",
                        "entry": 190.1, "exit": 190.5, "pnl": 40, "notes": "  news spike  "}]"#;

        import_all_data(&db, json).unwrap();

        let stored = get_trade(&db, "1").unwrap();
        assert_eq!(stored.pair, "GBP/JPY");
        assert_eq!(stored.notes.as_deref(), Some("news spike"));
    }

    #[test]
    fn test_failed_settings_restore_keeps_old_trades() {
        let source = Database::open_in_memory().unwrap();
        create_trade(&source, sample_trade("incoming", 3.0)).unwrap();
        let json = export_all_data(&source).unwrap();

        let target = Database::open_in_memory().unwrap();
        create_trade(&target, sample_trade("existing", 1.0)).unwrap();
        target
            .conn
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE settings")
            .unwrap();

        assert!(import_all_data(&target, &json).is_err());

        let stored = get_stored_trades(&target).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, "existing");
    }

    #[test]
    fn test_import_rejects_garbage() {
        let db = Database::open_in_memory().unwrap();
        create_trade(&db, sample_trade("keep", 1.0)).unwrap();

        let err = import_all_data(&db, "{\"hello\": 1}").unwrap_err();
        assert!(matches!(err, JournalError::SerializationError(_)));
        assert_eq!(get_stored_trades(&db).unwrap().len(), 1);
    }
}
