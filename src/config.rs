use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub student_rps: u32,
    pub examiner_rps: u32,
    pub evidence_dir: String,
    pub evidence_retention_hours: i64,
    pub evidence_max_file_bytes: u64,
    pub evidence_max_total_bytes: u64,
    pub trust_warning_threshold: i32,
    pub trust_critical_threshold: i32,
    pub trust_reduction_low: i32,
    pub trust_reduction_medium: i32,
    pub trust_reduction_high: i32,
    pub examiner_email_webhook_url: Option<String>,
    pub database_max_connections: u32,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            student_rps: get_env_parse("STUDENT_RPS")?,
            examiner_rps: get_env_parse("EXAMINER_RPS")?,
            evidence_dir: env::var("EVIDENCE_DIR")
                .unwrap_or_else(|_| "uploads/evidence".to_string()),
            evidence_retention_hours: get_env_parse_or("EVIDENCE_RETENTION_HOURS", 48)?,
            evidence_max_file_bytes: get_env_parse_or("EVIDENCE_MAX_FILE_BYTES", 10 * 1024 * 1024)?,
            evidence_max_total_bytes: get_env_parse_or(
                "EVIDENCE_MAX_TOTAL_BYTES",
                1024 * 1024 * 1024,
            )?,
            trust_warning_threshold: get_env_parse_or("TRUST_WARNING_THRESHOLD", 80)?,
            trust_critical_threshold: get_env_parse_or("TRUST_CRITICAL_THRESHOLD", 50)?,
            trust_reduction_low: get_env_parse_or("TRUST_REDUCTION_LOW", 5)?,
            trust_reduction_medium: get_env_parse_or("TRUST_REDUCTION_MEDIUM", 10)?,
            trust_reduction_high: get_env_parse_or("TRUST_REDUCTION_HIGH", 20)?,
            examiner_email_webhook_url: env::var("EXAMINER_EMAIL_WEBHOOK_URL").ok(),
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 50)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
