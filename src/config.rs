use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::secure_storage::{ANALYSIS_API_KEY, STORE_FILE};
use crate::api::{GeminiConfig, SecureStorage, gemini::DEFAULT_BASE_URL};
use crate::error::Result;
use crate::models::Settings;

pub const APP_DIR_NAME: &str = "fx-trade-journal";
pub const DB_FILE_NAME: &str = "trade_journal.db";
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 60;

/// Where the journal keeps its database and credential file
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub analysis_timeout: Duration,
}

impl AppConfig {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| default_data_dir(|k| std::env::var(k).ok()));
        Self {
            data_dir,
            analysis_timeout: Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS),
        }
    }

    pub fn with_analysis_timeout(mut self, secs: u64) -> Self {
        self.analysis_timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn credentials(&self) -> Result<SecureStorage> {
        Ok(SecureStorage::new(&self.data_dir)?)
    }

    /// Environment first, then the encrypted store.
    /// An unreadable store is logged and treated as holding no key.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_or_stored(api_key_from_env(|k| std::env::var(k).ok()))
    }

    fn api_key_or_stored(&self, from_env: Option<String>) -> Option<String> {
        if from_env.is_some() {
            log::debug!("Using analysis API key from the environment");
            return from_env;
        }
        match self.stored_api_key() {
            Ok(key) => key,
            Err(e) => {
                log::warn!("Cannot read the stored API key, continuing without one: {}", e);
                None
            }
        }
    }

    pub fn stored_api_key(&self) -> Result<Option<String>> {
        // Don't create the store just to find it empty
        if !has_credential_store(&self.data_dir) {
            return Ok(None);
        }
        Ok(self.credentials()?.retrieve(ANALYSIS_API_KEY)?)
    }

    pub fn gemini_config(&self, settings: &Settings) -> GeminiConfig {
        GeminiConfig {
            api_key: self.resolve_api_key(),
            model: settings.analysis_model.clone(),
            temperature: settings.analysis_temperature,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: self.analysis_timeout,
        }
    }
}

fn has_credential_store(data_dir: &Path) -> bool {
    data_dir.join(STORE_FILE).exists()
}

/// `$XDG_DATA_HOME/fx-trade-journal`, else `$HOME/.local/share/fx-trade-journal`,
/// else a directory next to the working directory
pub fn default_data_dir(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
    if let Some(xdg) = non_empty("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join(APP_DIR_NAME);
    }
    if let Some(home) = non_empty("HOME") {
        return PathBuf::from(home).join(".local").join("share").join(APP_DIR_NAME);
    }
    PathBuf::from(format!(".{}", APP_DIR_NAME))
}

pub fn api_key_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|&name| lookup(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

pub fn setup_logging(debug: bool) {
    use env_logger::{Builder, Env, Target};
    use log::LevelFilter;

    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    builder.target(Target::Stderr);

    if debug {
        builder.filter_level(LevelFilter::Debug);
    }

    builder.init();
}
