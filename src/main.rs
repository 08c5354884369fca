use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use trade_journal::api::secure_storage::{ANALYSIS_API_KEY, key_preview};
use trade_journal::api::GeminiClient;
use trade_journal::assets;
use trade_journal::commands::{
    DateRange, export_all_data, get_dashboard_stats, get_equity_curve, get_settings, get_trade,
    get_trades, import_all_data, update_settings,
};
use trade_journal::config::{
    AppConfig, DEFAULT_ANALYSIS_TIMEOUT_SECS, api_key_from_env, setup_logging,
};
use trade_journal::db::Database;
use trade_journal::form::TradeForm;
use trade_journal::models::{TradeDirection, TradeFilters, UpdateSettingsInput};
use trade_journal::render;
use trade_journal::Journal;
use trade_journal::journal::delete_if_confirmed;

#[derive(Parser, Debug)]
#[command(name = "trade-journal", version)]
#[command(about = "Personal FX and crypto trade journal with AI trade reviews")]
struct Cli {
    /// Directory holding the journal database and credential store
    #[arg(long, env = "TRADE_JOURNAL_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Seconds to wait for an analysis response
    #[arg(long, env = "TRADE_JOURNAL_ANALYSIS_TIMEOUT", global = true, default_value_t = DEFAULT_ANALYSIS_TIMEOUT_SECS)]
    analysis_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log a new trade and get it reviewed
    Add(TradeFields),
    /// Change a trade; it is reviewed again before saving
    Edit {
        id: String,
        #[command(flatten)]
        fields: TradeFields,
    },
    /// Show one trade with its analysis
    Show { id: String },
    /// List trades, newest first
    List {
        #[arg(long)]
        pair: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Delete a trade
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Performance dashboard and equity curve
    Stats {
        /// today, week, month, 3months, 6months, year or all
        #[arg(long, default_value = "all")]
        range: DateRange,
        #[arg(long)]
        json: bool,
    },
    /// Write a full backup as JSON
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore a backup or a bare trade array
    Import { file: PathBuf },
    /// List tradable symbols, optionally filtered
    Assets { filter: Option<String> },
    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Manage the stored Gemini API key
    #[command(subcommand)]
    Key(KeyCommand),
}

#[derive(Args, Debug)]
struct TradeFields {
    #[arg(long)]
    pair: Option<String>,
    /// YYYY-MM-DD, defaults to today for new trades
    #[arg(long)]
    date: Option<String>,
    /// long/buy or short/sell
    #[arg(long)]
    direction: Option<TradeDirection>,
    #[arg(long, allow_hyphen_values = true)]
    entry: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    exit: Option<String>,
    /// Defaults to the value implied by entry and exit
    #[arg(long, allow_hyphen_values = true)]
    pnl: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    /// Chart image sent along for analysis
    #[arg(long)]
    screenshot: Option<PathBuf>,
}

impl TradeFields {
    fn apply(self, form: &mut TradeForm) {
        let reprice = self.entry.is_some() || self.exit.is_some() || self.direction.is_some();

        if let Some(pair) = self.pair {
            form.set_pair(&pair);
        }
        if let Some(date) = self.date {
            form.date = date;
        }
        if let Some(direction) = self.direction {
            form.direction = direction;
        }
        if let Some(entry) = self.entry {
            form.entry = entry;
        }
        if let Some(exit) = self.exit {
            form.exit = exit;
        }
        if let Some(notes) = self.notes {
            form.notes = notes;
        }
        if self.screenshot.is_some() {
            form.screenshot_path = self.screenshot;
        }

        match self.pnl {
            Some(pnl) => form.pnl = pnl,
            None if reprice || form.pnl.is_empty() => form.apply_suggested_pnl(),
            None => {}
        }
    }
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print current settings
    Show,
    /// Change one or more settings
    Set {
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCommand {
    /// Store a key, read from stdin when not given
    Set { value: Option<String> },
    /// Remove the stored key
    Clear,
    /// Show where the key comes from
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.debug);

    let config = AppConfig::new(cli.data_dir).with_analysis_timeout(cli.analysis_timeout);
    config
        .ensure_data_dir()
        .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;
    log::debug!("Data directory: {:?}", config.data_dir);

    if let Command::Key(cmd) = cli.command {
        return run_key_command(&config, cmd);
    }

    let db = open_database(&config)?;
    run_command(&config, db, cli.command).await
}

fn open_database(config: &AppConfig) -> anyhow::Result<Arc<Database>> {
    let db_path = config.db_path();
    let path = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;

    let db = Database::new(path).with_context(|| {
        format!(
            "Database initialization failed. Backups are kept in {:?}",
            config.data_dir.join("backups")
        )
    })?;
    Ok(Arc::new(db))
}

fn open_journal(config: &AppConfig, db: Arc<Database>) -> anyhow::Result<Journal> {
    let settings = get_settings(&db)?;
    let client = GeminiClient::new(config.gemini_config(&settings))?;
    Ok(Journal::new(db, Arc::new(client)))
}

async fn run_command(config: &AppConfig, db: Arc<Database>, command: Command) -> anyhow::Result<()> {
    let currency = get_settings(&db)?.currency;
    let today = chrono::Local::now().date_naive();

    match command {
        Command::Add(fields) => {
            let mut form = TradeForm::new(today);
            fields.apply(&mut form);
            let (draft, screenshot) = form.submit()?;

            let journal = open_journal(config, db)?;
            println!("Analyzing trade...");
            let trade = journal.save_trade(draft, screenshot, None).await?;
            print!("{}", render::render_trade_card(&trade, &currency, true));
        }
        Command::Edit { id, fields } => {
            let existing = get_trade(&db, &id)?;
            let mut form = TradeForm::from_trade(&existing);
            fields.apply(&mut form);
            let (draft, screenshot) = form.submit()?;

            let journal = open_journal(config, db)?;
            println!("Analyzing trade...");
            let trade = journal.save_trade(draft, screenshot, Some(&id)).await?;
            print!("{}", render::render_trade_card(&trade, &currency, true));
        }
        Command::Show { id } => {
            let trade = get_trade(&db, &id)?;
            print!("{}", render::render_trade_card(&trade, &currency, true));
        }
        Command::List { pair, from, to } => {
            let filters = TradeFilters {
                pair,
                start_date: from,
                end_date: to,
            };
            let trades = get_trades(&db, Some(&filters))?;
            print!("{}", render::render_trade_list(&trades, &currency));
        }
        Command::Delete { id, yes } => {
            // Fail on unknown ids before asking
            get_trade(&db, &id)?;
            let confirmed = yes || confirm("Are you sure you want to delete this trade?")?;
            if delete_if_confirmed(&db, &id, confirmed)? {
                println!("Deleted {}", id);
            } else {
                println!("Nothing deleted");
            }
        }
        Command::Stats { range, json } => {
            let stats = get_dashboard_stats(&db, range)?;
            let curve = get_equity_curve(&db, range)?;
            if json {
                let out = serde_json::json!({ "stats": stats, "equityCurve": curve });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print!("{}", render::render_dashboard(&stats, &currency));
                println!();
                print!("{}", render::render_equity_chart(&curve, &currency));
            }
        }
        Command::Export { output } => {
            let data = export_all_data(&db)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, data)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Exported to {:?}", path);
                }
                None => println!("{}", data),
            }
        }
        Command::Import { file } => {
            let data = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let result = import_all_data(&db, &data)?;
            println!(
                "Imported {} trades{}",
                result.trades_imported,
                if result.settings_restored { " and settings" } else { "" }
            );
        }
        Command::Assets { filter } => {
            let symbols = match filter {
                Some(q) => assets::suggest(&q),
                None => assets::all_tradable_assets(),
            };
            for symbol in symbols {
                match assets::asset_class(symbol) {
                    Some(class) => println!("{:<10} {:?}", symbol, class),
                    None => println!("{}", symbol),
                }
            }
        }
        Command::Settings(SettingsCommand::Show) => {
            let settings = get_settings(&db)?;
            println!("Currency:    {}", settings.currency);
            println!("Model:       {}", settings.analysis_model);
            println!("Temperature: {}", settings.analysis_temperature);
        }
        Command::Settings(SettingsCommand::Set {
            currency,
            model,
            temperature,
        }) => {
            if currency.is_none() && model.is_none() && temperature.is_none() {
                bail!("Nothing to update: pass --currency, --model or --temperature");
            }
            let settings = update_settings(
                &db,
                UpdateSettingsInput {
                    currency,
                    analysis_model: model,
                    analysis_temperature: temperature,
                },
            )?;
            println!(
                "Saved: currency {}, model {}, temperature {}",
                settings.currency, settings.analysis_model, settings.analysis_temperature
            );
        }
        Command::Key(cmd) => run_key_command(config, cmd)?,
    }

    Ok(())
}

fn run_key_command(config: &AppConfig, cmd: KeyCommand) -> anyhow::Result<()> {
    match cmd {
        KeyCommand::Set { value } => {
            let value = match value {
                Some(v) => v,
                None => prompt("Gemini API key: ")?,
            };
            let value = value.trim();
            if value.is_empty() {
                bail!("API key cannot be empty");
            }
            config.credentials()?.store(ANALYSIS_API_KEY, value)?;
            println!("Stored API key {}", key_preview(value));
        }
        KeyCommand::Clear => {
            if config.credentials()?.delete(ANALYSIS_API_KEY)? {
                println!("Stored API key removed");
            } else {
                println!("No stored API key");
            }
        }
        KeyCommand::Status => {
            if let Some(key) = api_key_from_env(|k| std::env::var(k).ok()) {
                println!("Using key from environment: {}", key_preview(&key));
            } else if let Some(key) = config.stored_api_key()? {
                println!("Using stored key: {}", key_preview(&key));
            } else {
                println!("No API key configured. Set GEMINI_API_KEY or run `trade-journal key set`.");
            }
        }
    }
    Ok(())
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}
