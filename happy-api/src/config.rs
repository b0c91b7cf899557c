use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

use happy_shared::clients::db::PoolSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_db_host")]
    pub db_host: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    #[serde(default = "default_db_user")]
    pub db_user: String,
    #[serde(default)]
    pub db_password: String,
    #[serde(default = "default_db_dialect")]
    pub db_dialect: String,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_ttl")]
    pub jwt_ttl_secs: i64,
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub db_acquire_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub db_idle_timeout_secs: u64,
    #[serde(default)]
    pub auto_migrate: bool,
    #[serde(default = "default_env")]
    pub env: String,
}

fn default_port() -> u16 { 5000 }
fn default_db_host() -> String { "localhost".into() }
fn default_db_port() -> u16 { 5432 }
fn default_db_name() -> String { "happy_lunch".into() }
fn default_db_user() -> String { "postgres".into() }
fn default_db_dialect() -> String { "postgres".into() }
fn default_jwt_secret() -> String { "development-secret-change-in-production".into() }
fn default_jwt_ttl() -> i64 { 7 * 24 * 60 * 60 }
fn default_max_connections() -> u32 { 100 }
fn default_acquire_timeout() -> u64 { 60 }
fn default_idle_timeout() -> u64 { 10 }
fn default_env() -> String { "development".into() }

impl AppConfig {
    /// Reads `.env`, then plain variables (`PORT`, `DB_HOST`, ...), then
    /// `HAPPY_LUNCH__*` variables, later sources winning.
    pub fn load() -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to read .env file");
            }
        }

        let source = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .add_source(
                config::Environment::with_prefix("HAPPY_LUNCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_source(source)
    }

    pub fn from_source(source: config::Config) -> anyhow::Result<Self> {
        let config: Self = source
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !self.db_dialect.eq_ignore_ascii_case("postgres") {
            bail!("unsupported DB_DIALECT '{}', only postgres is supported", self.db_dialect);
        }
        if self.jwt_secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        if self.jwt_ttl_secs <= 0 {
            bail!("JWT_TTL_SECS must be positive");
        }
        if self.db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be at least 1");
        }
        if self.is_production() && self.jwt_secret == default_jwt_secret() {
            tracing::warn!("running in production with the development JWT secret");
        }
        Ok(())
    }

    /// `DATABASE_URL` when set, otherwise assembled from the `DB_*` parts.
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ if self.db_password.is_empty() => format!(
                "postgres://{}@{}:{}/{}",
                self.db_user, self.db_host, self.db_port, self.db_name
            ),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
            ),
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            acquire_timeout: Duration::from_secs(self.db_acquire_timeout_secs),
            idle_timeout: Duration::from_secs(self.db_idle_timeout_secs),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}
