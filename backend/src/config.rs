use std::env;

/// The six day labels tracked per employee, in display order.
pub const DAYS_ORDER: [&str; 6] = ["ПТ", "СБ", "ПН", "ВТ", "СР", "ЧТ"];

/// The two fixed team keys. The key set never changes at runtime.
pub const TEAM_KEYS: [&str; 2] = ["left", "right"];

/// Sales target for a single day, shown next to the day totals.
pub const TARGET_DAILY: i64 = 4_000_000;

/// Sales target for the whole six-day cycle.
pub const WEEKLY_TARGET: i64 = 24_000_000;

pub fn is_valid_day(day: &str) -> bool {
    DAYS_ORDER.contains(&day)
}

pub fn is_valid_team(key: &str) -> bool {
    TEAM_KEYS.contains(&key)
}

/// Runtime configuration, read from the environment with defaults that
/// work for local development.
#[derive(Debug, Clone)]
pub struct Config {
    /// sqlx connection URL, built from the `DB_FILE` variable
    pub database_url: String,
    /// Shared admin capability presented in the `x-admin-token` header
    pub admin_token: String,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        let db_file = env::var("DB_FILE").unwrap_or_else(|_| "scoreboard.db".to_string());
        Self {
            database_url: format!("sqlite:{}", db_file),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "admin".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
        }
    }
}
