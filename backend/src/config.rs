use anyhow::{bail, Context};
use chrono::Duration;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub tac: TacConfig,
    pub whatsapp: WhatsAppConfig,
    pub league: LeagueConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub rust_log: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub data_file: PathBuf,
    /// Load `<data_file>.bak` when the primary file cannot be parsed.
    pub restore_from_backup: bool,
}

impl StorageConfig {
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            restore_from_backup: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub admin_token: String,
    /// Zero disables session expiry.
    pub session_ttl_secs: u64,
}

impl AuthConfig {
    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::seconds(self.session_ttl_secs as i64))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TacConfig {
    pub code_length: u32,
    pub expiry_secs: u64,
    pub max_attempts: u32,
    pub expose_code: bool,
    pub sweep_interval_secs: u64,
    pub default_country_code: String,
}

impl TacConfig {
    pub fn expiry(&self) -> Duration {
        Duration::seconds(self.expiry_secs as i64)
    }
}

impl Default for TacConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            expiry_secs: 300,
            max_attempts: 5,
            expose_code: false,
            sweep_interval_secs: 600,
            default_country_code: "+60".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppConfig {
    pub phone_id: Option<String>,
    pub access_token: Option<String>,
    pub template_name: String,
    pub api_base: String,
}

impl WhatsAppConfig {
    pub fn is_configured(&self) -> bool {
        self.phone_id.is_some() && self.access_token.is_some()
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            phone_id: None,
            access_token: None,
            template_name: "verification_code".to_string(),
            api_base: "https://graph.facebook.com/v21.0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeagueConfig {
    pub default_season: String,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            default_season: "2026-S1".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let admin_token = env::var("ADMIN_TOKEN").context("ADMIN_TOKEN must be set")?;
        if admin_token.trim().is_empty() {
            bail!("ADMIN_TOKEN must not be empty");
        }

        let port: u16 = env_parse("PORT", 8080)?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| crate::telemetry::DEFAULT_LOG_FILTER.to_string());

        let data_file = env::var("DATA_FILE").unwrap_or_else(|_| "data/store.json".to_string());
        let restore_from_backup = env_flag("STORE_RESTORE_FROM_BACKUP")?;

        let session_ttl_secs: u64 = env_parse("SESSION_TTL_SECS", 0)?;

        let defaults = TacConfig::default();
        let code_length: u32 = env_parse("TAC_CODE_LENGTH", defaults.code_length)?;
        if !(4..=9).contains(&code_length) {
            bail!("TAC_CODE_LENGTH must be between 4 and 9, got {code_length}");
        }
        let max_attempts: u32 = env_parse("TAC_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            bail!("TAC_MAX_ATTEMPTS must be at least 1");
        }
        let tac = TacConfig {
            code_length,
            expiry_secs: env_parse("TAC_EXPIRY_SECS", defaults.expiry_secs)?,
            max_attempts,
            expose_code: env_flag("EXPOSE_TAC_CODE")?,
            sweep_interval_secs: env_parse("TAC_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            default_country_code: env::var("DEFAULT_COUNTRY_CODE")
                .unwrap_or(defaults.default_country_code),
        };

        let whatsapp_defaults = WhatsAppConfig::default();
        let whatsapp = WhatsAppConfig {
            phone_id: env_opt("WHATSAPP_PHONE_ID"),
            access_token: env_opt("WHATSAPP_ACCESS_TOKEN"),
            template_name: env::var("WHATSAPP_TEMPLATE_NAME")
                .unwrap_or(whatsapp_defaults.template_name),
            api_base: env::var("WHATSAPP_API_BASE").unwrap_or(whatsapp_defaults.api_base),
        };

        let default_season =
            env::var("DEFAULT_SEASON").unwrap_or_else(|_| LeagueConfig::default().default_season);

        Ok(Config {
            server: ServerConfig { port, host, rust_log },
            storage: StorageConfig {
                data_file: PathBuf::from(data_file),
                restore_from_backup,
            },
            auth: AuthConfig {
                admin_token,
                session_ttl_secs,
            },
            tac,
            whatsapp,
            league: LeagueConfig { default_season },
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        _ => Ok(default),
    }
}

fn env_flag(key: &str) -> Result<bool, anyhow::Error> {
    match env::var(key) {
        Ok(raw) => parse_flag(&raw).with_context(|| format!("{key} must be true or false, got {raw}")),
        Err(_) => Ok(false),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
