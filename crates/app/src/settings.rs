//! Application settings, read from `pocketbook.toml` with environment
//! overrides (`POCKETBOOK_API__BASE_URL=...` etc).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    /// Log level for the per-crate tracing filter.
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    /// Where the bearer credential lives at rest.
    pub token_file: String,
}

#[derive(Debug, Deserialize)]
pub struct Webhook {
    pub callback_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub api: Api,
    pub webhook: Option<Webhook>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("app.level", "info")?
            .set_default("database.path", "./pocketbook.db")?
            .set_default("api.base_url", "https://api.up.com.au/api/v1")?
            .set_default("api.token_file", "./pocketbook-token.json")?
            .add_source(File::with_name("pocketbook").required(false))
            .add_source(Environment::with_prefix("POCKETBOOK").separator("__"))
            .build()?
            .try_deserialize()
    }
}
