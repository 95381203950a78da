use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub email_host: String,
    pub email_port: u16,
    pub email_secure: bool,
    pub email_user: Option<String>,
    pub email_password: Option<String>,
    pub email_from: String,
    pub email_enabled: bool,
    pub metrics_enabled: bool,
    pub notification_rate_limit: u32,
    pub poll_interval_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        Ok(Self {
            http_addr,
            db_host: env_or("DB_HOST", "localhost"),
            db_port: env_or_parse("DB_PORT", "5432")?,
            db_user: env_or("DB_USER", "postgres"),
            db_password: env_or("DB_PASSWORD", ""),
            db_name: env_or("DB_NAME", "herald"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            email_host: env_or("EMAIL_HOST", "localhost"),
            email_port: env_or_parse("EMAIL_PORT", "587")?,
            email_secure: env_or_parse("EMAIL_SECURE", "false")?,
            email_user: std::env::var("EMAIL_USER").ok(),
            email_password: std::env::var("EMAIL_PASSWORD").ok(),
            email_from: env_or("EMAIL_FROM", "notifications@localhost"),
            email_enabled: env_or_parse("EMAIL_ENABLED", "false")?,
            metrics_enabled: env_or_parse("METRICS_ENABLED", "false")?,
            notification_rate_limit: env_or_parse("NOTIFICATION_RATE_LIMIT", "100")?,
            poll_interval_seconds: env_or_parse("POLL_INTERVAL_SECONDS", "60")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
