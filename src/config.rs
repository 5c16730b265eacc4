use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_DB_PATH: &str = "data/xsmb.db";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub database_url: String,
    pub http_timeout_secs: u64,
}

pub fn load() -> Result<Config> {
    from_source(|key| env::var(key).ok())
}

/// Builds a config from any key lookup; `load` uses the process environment.
pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

    let api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY"));
    let model = non_empty("XSMB_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let api_base = non_empty("XSMB_API_BASE")
        .map(|base| base.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let database_url = non_empty("XSMB_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

    let http_timeout_secs = match non_empty("XSMB_HTTP_TIMEOUT_SECS") {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("XSMB_HTTP_TIMEOUT_SECS must be a number of seconds, got {:?}", raw))?,
        None => DEFAULT_HTTP_TIMEOUT_SECS,
    };

    Ok(Config {
        api_key,
        model,
        api_base,
        database_url,
        http_timeout_secs,
    })
}
