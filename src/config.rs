use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

use crate::core_types::OrgType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Per-module levels layered over `log_level`, e.g. `medtrace::store: debug`
    #[serde(default)]
    pub log_targets: BTreeMap<String, String>,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL. Without it the ledger runs in memory.
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Directory entries loaded when running without PostgreSQL
    #[serde(default)]
    pub seed: SeedConfig,
}

fn default_jwt_secret() -> String {
    "medtrace-dev-secret-change-me".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SeedConfig {
    pub organizations: Vec<SeedOrganization>,
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SeedOrganization {
    pub id: String,
    pub name: String,
    pub org_type: OrgType,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SeedProduct {
    pub id: String,
    pub name: String,
    pub owner_org_id: String,
}

/// Ledger behaviour knobs
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Organization that receives inactive-product alerts besides the product owner
    pub admin_organization_id: Option<String>,
    pub transaction_timeout_ms: u64,
    pub history_default_window_days: i64,
    pub recall_window_hours: i64,
    /// Shelf life used when neither the caller nor the issuer supplies one
    pub default_expiry_months: u32,
    pub history_max_page_size: u32,
    /// Upper bound on units minted by one lot
    pub max_lot_quantity: u32,
    /// How often the binary drains the notification outbox; 0 disables it
    pub notification_poll_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            admin_organization_id: None,
            transaction_timeout_ms: 5_000,
            history_default_window_days: 3,
            recall_window_hours: 24,
            default_expiry_months: 24,
            history_max_page_size: 100,
            max_lot_quantity: 100_000,
            notification_poll_ms: 1_000,
        }
    }
}

/// Environment variable that replaces `jwt_secret`
pub const JWT_SECRET_ENV: &str = "MEDTRACE_JWT_SECRET";
/// Environment variable that replaces `postgres_url`
pub const POSTGRES_URL_ENV: &str = "MEDTRACE_POSTGRES_URL";

impl AppConfig {
    /// Read `config/<env>.yaml` and apply environment overrides. Outside `dev`
    /// the built-in JWT secret is refused.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config =
            Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        if env != "dev" && config.uses_dev_secret() {
            anyhow::bail!("jwt_secret is not set for env '{}'; export {}", env, JWT_SECRET_ENV);
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup(JWT_SECRET_ENV).filter(|v| !v.is_empty()) {
            self.jwt_secret = secret;
        }
        if let Some(url) = lookup(POSTGRES_URL_ENV).filter(|v| !v.is_empty()) {
            self.postgres_url = Some(url);
        }
    }

    /// True while the JWT secret is missing or still the built-in development value
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret.is_empty() || self.jwt_secret == default_jwt_secret()
    }
}
