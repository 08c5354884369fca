use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "$";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ANALYSIS_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub id: i32,
    pub currency: String,
    pub analysis_model: String,
    pub analysis_temperature: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsInput {
    pub currency: Option<String>,
    pub analysis_model: Option<String>,
    pub analysis_temperature: Option<f64>,
}
