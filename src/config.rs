use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

pub const DEV_SECRET_KEY: &str = "dev-secret-key";

/// Session lifetime bounds in minutes: one minute up to one year.
pub const SESSION_TTL_RANGE: std::ops::RangeInclusive<i64> = 1..=525_600;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://attendance.db?mode=rwc".into());
        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let session = SessionConfig {
            secret: std::env::var("SECRET_KEY").unwrap_or_else(|_| DEV_SECRET_KEY.into()),
            issuer: "attendance".into(),
            audience: "attendance-session".into(),
            ttl_minutes: check_ttl(parse_env("SESSION_TTL_MINUTES", 60 * 12)?)
                .context("invalid value for SESSION_TTL_MINUTES")?,
            cookie_secure: parse_env("SESSION_COOKIE_SECURE", false)?,
        };
        Ok(Self {
            database_url,
            upload_dir,
            session,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.session.secret == DEV_SECRET_KEY
    }
}

fn check_ttl(minutes: i64) -> anyhow::Result<i64> {
    anyhow::ensure!(
        SESSION_TTL_RANGE.contains(&minutes),
        "session ttl {minutes} minutes is outside {}..={}",
        SESSION_TTL_RANGE.start(),
        SESSION_TTL_RANGE.end()
    );
    Ok(minutes)
}

fn parse_env<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
