use crate::error::{Error, Result};
use crate::services::grading_service::{GradingPolicy, ManualGrading, TextMatch, TimeAttribution};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub sweep_interval_secs: u64,
    pub abandon_grace_secs: i64,
    pub grading: GradingPolicy,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let grading = GradingPolicy {
            text_match: get_env_parse_or("GRADING_TEXT_MATCH", TextMatch::default())?,
            manual_grading: get_env_parse_or("GRADING_MANUAL_TYPES", ManualGrading::default())?,
            time_attribution: get_env_parse_or(
                "GRADING_TIME_ATTRIBUTION",
                TimeAttribution::default(),
            )?,
        };

        Ok(Self {
            database_url: get_env("DATABASE_URL")?,
            db_max_connections: get_env_parse_or("DB_MAX_CONNECTIONS", 10)?,
            sweep_interval_secs: get_env_parse_or("SWEEP_INTERVAL_SECS", 60)?,
            abandon_grace_secs: get_env_parse_or("ABANDON_GRACE_SECS", 30)?,
            grading,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
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
