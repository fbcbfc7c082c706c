use std::{str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

/// Connection manager knobs: pool size, startup attempts and the fixed retry delay.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub max_retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub query_retries: u32,
    pub acquire_timeout_ms: u64,
}

impl DbConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub bcrypt_cost: u32,
    pub reset_token_ttl_minutes: i64,
    pub ip_hash_salt: String,
    pub guest_max_requests: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub db: DbConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub gemini: GeminiConfig,
    /// `None` disables outgoing mail; reset emails are then only logged.
    pub smtp: Option<SmtpConfig>,
    pub webapp_url: String,
    pub cron_secret: Option<String>,
}

pub const DEFAULT_IP_SALT: &str = "default-salt";

/// Upper bounds that keep expiry arithmetic far from overflow.
pub const JWT_TTL_DAYS_MAX: i64 = 365;
pub const RESET_TOKEN_TTL_MINUTES_MAX: i64 = 7 * 24 * 60;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let db = DbConfig {
            url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            max_retry_attempts: env_or("DB_MAX_RETRY_ATTEMPTS", 3),
            retry_delay_ms: env_or("DB_RETRY_DELAY", 2_000),
            query_retries: env_or("DB_QUERY_RETRIES", 3),
            acquire_timeout_ms: env_or("DB_ACQUIRE_TIMEOUT", 10_000),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "trendbits".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "trendbits-users".into()),
            ttl_days: env_or("JWT_TTL_DAYS", 7_i64).clamp(1, JWT_TTL_DAYS_MAX),
        };
        let security = SecurityConfig {
            bcrypt_cost: env_or("BCRYPT_ROUNDS", 12),
            reset_token_ttl_minutes: env_or("RESET_TOKEN_EXPIRY_MINUTES", 60_i64)
                .clamp(1, RESET_TOKEN_TTL_MINUTES_MAX),
            ip_hash_salt: std::env::var("IP_HASH_SALT")
                .unwrap_or_else(|_| DEFAULT_IP_SALT.into()),
            guest_max_requests: env_or("GUEST_MAX_REQUESTS", 2),
        };
        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is required")?,
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-lite".into()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            timeout_secs: env_or("GEMINI_TIMEOUT_SECS", 60),
        };
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: env_or("SMTP_PORT", 465),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("SMTP_FROM").context("SMTP_FROM is required with SMTP_HOST")?,
            }),
            _ => None,
        };
        let webapp_url = std::env::var("WEBAPP_URL")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .trim_end_matches('/')
            .to_string();
        let cron_secret = std::env::var("TREND_CRON_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Self {
            db,
            jwt,
            security,
            gemini,
            smtp,
            webapp_url,
            cron_secret,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok().as_deref(), default)
}

fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}
