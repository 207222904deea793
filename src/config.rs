use std::env;

use crate::errors::AppError;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 8;
/// Minimum length actix's cookie `Key` accepts.
pub const SESSION_KEY_MIN_LEN: usize = 64;

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub session_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. Split out so it can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL must be set".to_string()))?;

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                AppError::Validation(format!("DB_MAX_CONNECTIONS must be a positive integer, got '{raw}'"))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let session_key = match lookup("SESSION_KEY") {
            Some(val) if val.len() >= SESSION_KEY_MIN_LEN => Some(val),
            Some(val) => {
                log::warn!(
                    "SESSION_KEY too short ({} bytes, need {SESSION_KEY_MIN_LEN}+), generating random key",
                    val.len()
                );
                None
            }
            None => {
                log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
                None
            }
        };

        Ok(AppConfig { database_url, bind_addr, max_connections, session_key })
    }
}
