use std::env;

use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, NaiveTime};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub recovery_token_ttl: i64,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_recovery_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    /// Base URL of the front end, used to build password reset links.
    pub app_url: String,
    pub log_dir: String,
    pub run_migrations: bool,

    /// Allowed work-location tags for check-in.
    pub work_locations: Vec<String>,
    /// Offset used to bucket timestamps into local calendar days.
    pub utc_offset: FixedOffset,
    pub day_shift_start: NaiveTime,
    pub night_shift_start: NaiveTime,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let offset_minutes: i32 = parse(&or_default("UTC_OFFSET_MINUTES", "0"), "UTC_OFFSET_MINUTES")?;
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| anyhow!("UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        let work_locations: Vec<String> = or_default("WORK_LOCATIONS", "GHCL,kajli")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if work_locations.is_empty() {
            return Err(anyhow!("WORK_LOCATIONS must name at least one location"));
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            // default 15 min
            access_token_ttl: parse(&or_default("ACCESS_TOKEN_TTL", "900"), "ACCESS_TOKEN_TTL")?,
            // default 30 days
            refresh_token_ttl: parse(&or_default("REFRESH_TOKEN_TTL", "2592000"), "REFRESH_TOKEN_TTL")?,
            // default 1 hour
            recovery_token_ttl: parse(&or_default("RECOVERY_TOKEN_TTL", "3600"), "RECOVERY_TOKEN_TTL")?,

            rate_login_per_min: parse(&or_default("RATE_LOGIN_PER_MIN", "60"), "RATE_LOGIN_PER_MIN")?,
            rate_refresh_per_min: parse(&or_default("RATE_REFRESH_PER_MIN", "30"), "RATE_REFRESH_PER_MIN")?,
            rate_recovery_per_min: parse(&or_default("RATE_RECOVERY_PER_MIN", "10"), "RATE_RECOVERY_PER_MIN")?,
            rate_protected_per_min: parse(
                &or_default("RATE_PROTECTED_PER_MIN", "1000"),
                "RATE_PROTECTED_PER_MIN",
            )?,

            api_prefix: or_default("API_PREFIX", "/api"),
            app_url: or_default("APP_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            log_dir: or_default("LOG_DIR", "logs"),
            run_migrations: parse(&or_default("RUN_MIGRATIONS", "true"), "RUN_MIGRATIONS")?,

            work_locations,
            utc_offset,
            day_shift_start: parse_time(&or_default("DAY_SHIFT_START", "06:00"), "DAY_SHIFT_START")?,
            night_shift_start: parse_time(&or_default("NIGHT_SHIFT_START", "18:00"), "NIGHT_SHIFT_START")?,
        })
    }

    /// Case-insensitive match against the configured locations, returning the canonical tag.
    pub fn resolve_work_location(&self, requested: &str) -> Option<&str> {
        let requested = requested.trim();
        self.work_locations
            .iter()
            .find(|loc| loc.eq_ignore_ascii_case(requested))
            .map(String::as_str)
    }
}

fn parse<T>(value: &str, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {value:?}"))
}

fn parse_time(value: &str, key: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("invalid value for {key} (expected HH:MM): {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://root@localhost/attendance"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.access_token_ttl, 900);
        assert_eq!(config.refresh_token_ttl, 2_592_000);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.work_locations, vec!["GHCL", "kajli"]);
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
        assert_eq!(config.day_shift_start, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert!(config.run_migrations);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn offset_and_locations_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("UTC_OFFSET_MINUTES", "330"));
        pairs.push(("WORK_LOCATIONS", " Plant A , ,Warehouse "));
        pairs.push(("APP_URL", "https://attendance.example.com/"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.utc_offset.local_minus_utc(), 330 * 60);
        assert_eq!(config.work_locations, vec!["Plant A", "Warehouse"]);
        assert_eq!(config.app_url, "https://attendance.example.com");
        assert_eq!(config.resolve_work_location("warehouse"), Some("Warehouse"));
        assert_eq!(config.resolve_work_location("Office"), None);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ACCESS_TOKEN_TTL", "fifteen"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("ACCESS_TOKEN_TTL"));
    }
}
