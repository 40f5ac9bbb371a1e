//! Application settings.
//!
//! Read from `settings.toml` (optional) and then from `BILLSPLIT__*`
//! environment variables, e.g. `BILLSPLIT__APP__LEVEL=debug`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Where the ledger lives.
///
/// ```toml
/// [database]
/// sqlite = "./billsplit.db"
/// ```
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("./billsplit.db".to_string())
    }
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Self::Memory => "sqlite::memory:".to_string(),
            Self::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    pub fn new(file: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("BILLSPLIT").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
