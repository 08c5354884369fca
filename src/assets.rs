//! Catalogue of instruments offered as pair suggestions.

pub const FOREX_PAIRS: &[&str] = &[
    // Majors
    "EUR/USD", "USD/JPY", "GBP/USD", "USD/CHF", "AUD/USD", "USD/CAD", "NZD/USD",
    // EUR crosses
    "EUR/GBP", "EUR/JPY", "EUR/CHF", "EUR/AUD", "EUR/CAD", "EUR/NZD", "EUR/SEK", "EUR/NOK",
    // GBP crosses
    "GBP/JPY", "GBP/CHF", "GBP/AUD", "GBP/CAD", "GBP/NZD",
    // AUD crosses
    "AUD/JPY", "AUD/CHF", "AUD/CAD", "AUD/NZD",
    // Other crosses
    "CHF/JPY", "CAD/JPY", "NZD/JPY", "CAD/CHF", "NZD/CHF",
    // Exotics
    "USD/ZAR", "USD/TRY", "USD/SGD", "USD/SEK", "USD/RUB", "USD/PLN", "USD/NOK",
    "USD/MXN", "USD/HUF", "USD/HKD", "EUR/TRY", "EUR/ZAR", "USD/CNH", "USD/DKK",
];

pub const CRYPTO_PAIRS: &[&str] = &[
    "BTC/USD", "ETH/USD", "XRP/USD", "LTC/USD", "BCH/USD", "ADA/USD", "DOT/USD",
    "LINK/USD", "XLM/USD", "DOGE/USD", "SOL/USD", "BNB/USD", "UNI/USD", "AAVE/USD",
    "MATIC/USD", "TRX/USD", "ATOM/USD", "AVAX/USD",
];

pub const INDICES: &[&str] = &[
    "US30", "SPX500", "NAS100", "US2000", "VIX",
    "UK100", "GER40", "FRA40", "EUSTX50", "ESP35", "ITA40", "SMI20",
    "JPN225", "AUS200", "HKG50", "CN50", "IN50",
];

pub const COMMODITIES: &[&str] = &[
    "XAU/USD", "XAG/USD", "XPT/USD", "XPD/USD", "COPPER",
    "USOIL", "UKOIL", "NATGAS",
    "CORN", "WHEAT", "SOYBEANS", "SUGAR",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Forex,
    Crypto,
    Index,
    Commodity,
}

/// Every known symbol, sorted
pub fn all_tradable_assets() -> Vec<&'static str> {
    let mut all: Vec<&'static str> = FOREX_PAIRS
        .iter()
        .chain(CRYPTO_PAIRS)
        .chain(INDICES)
        .chain(COMMODITIES)
        .copied()
        .collect();
    all.sort_unstable();
    all
}

pub fn asset_class(symbol: &str) -> Option<AssetClass> {
    let symbol = symbol.trim().to_uppercase();
    let symbol = symbol.as_str();
    if FOREX_PAIRS.contains(&symbol) {
        Some(AssetClass::Forex)
    } else if CRYPTO_PAIRS.contains(&symbol) {
        Some(AssetClass::Crypto)
    } else if INDICES.contains(&symbol) {
        Some(AssetClass::Index)
    } else if COMMODITIES.contains(&symbol) {
        Some(AssetClass::Commodity)
    } else {
        None
    }
}

pub fn is_known(symbol: &str) -> bool {
    asset_class(symbol).is_some()
}

/// Case-insensitive substring match over the sorted catalogue
pub fn suggest(query: &str) -> Vec<&'static str> {
    let query = query.trim().to_uppercase();
    all_tradable_assets()
        .into_iter()
        .filter(|s| s.contains(query.as_str()))
        .collect()
}
