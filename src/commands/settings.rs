use rusqlite::Connection;

use crate::db::Database;
use crate::error::{JournalError, Result};
use crate::models::{Settings, UpdateSettingsInput};

pub(crate) fn read_settings(conn: &Connection) -> Result<Settings> {
    let settings = conn.query_row(
        "SELECT id, currency, analysis_model, analysis_temperature, created_at, updated_at FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(Settings {
                id: row.get(0)?,
                currency: row.get(1)?,
                analysis_model: row.get(2)?,
                analysis_temperature: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    )?;

    Ok(settings)
}

pub fn get_settings(db: &Database) -> Result<Settings> {
    let conn = db.conn.lock()?;
    read_settings(&conn)
}

pub fn update_settings(db: &Database, settings: UpdateSettingsInput) -> Result<Settings> {
    if let Some(temperature) = settings.analysis_temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(JournalError::validation(
                "analysis_temperature",
                format!("{} is outside 0.0-2.0", temperature),
            ));
        }
    }
    if let Some(model) = &settings.analysis_model {
        if model.trim().is_empty() {
            return Err(JournalError::validation("analysis_model", "must not be empty"));
        }
    }

    let conn = db.conn.lock()?;

    // Build dynamic UPDATE query
    let mut updates = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(val) = settings.currency {
        updates.push("currency = ?");
        values.push(Box::new(val));
    }
    if let Some(val) = settings.analysis_model {
        updates.push("analysis_model = ?");
        values.push(Box::new(val.trim().to_string()));
    }
    if let Some(val) = settings.analysis_temperature {
        updates.push("analysis_temperature = ?");
        values.push(Box::new(val));
    }

    updates.push("updated_at = strftime('%s', 'now')");

    let query = format!("UPDATE settings SET {} WHERE id = 1", updates.join(", "));
    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

    conn.execute(&query, params.as_slice())?;

    read_settings(&conn)
}
