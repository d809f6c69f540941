//! Settings for the `divvy` binary.
//!
//! Read from `settings.toml` (optional), then `DIVVY_*` environment
//! variables (`DIVVY_APP__LEVEL=debug`), then command-line flags.
//!
//! ```toml
//! account = "5b7e0c9a-3f1d-4a55-9a43-2f0c1d6e8b21"
//! database = { sqlite = "./divvy.db" }
//!
//! [app]
//! level = "info"
//!
//! [engine]
//! reconciliation = "strict"
//! debounce_ms = 300
//!
//! [profile]
//! email = "alice@example.com"
//! full_name = "Alice"
//! ```

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use engine::ReconciliationMode;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Parser)]
#[command(name = "divvy", version)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the account whose balances are watched.
    #[arg(long)]
    account: Option<Uuid>,
    /// Override the log level.
    #[arg(long)]
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub reconciliation: ReconciliationMode,
    pub debounce_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reconciliation: ReconciliationMode::default(),
            debounce_ms: 300,
        }
    }
}

/// Profile written for `account` on start-up if it has none yet.
#[derive(Debug, Deserialize)]
pub struct Profile {
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub engine: EngineSettings,
    pub account: Option<Uuid>,
    pub profile: Option<Profile>,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let args = Args::parse();

        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let mut settings: Settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("DIVVY").separator("__"))
            .build()?
            .try_deserialize()?;

        if let Some(account) = args.account {
            settings.account = Some(account);
        }
        if let Some(level) = args.level {
            settings.app.level = level;
        }
        Ok(settings)
    }
}
