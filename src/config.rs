use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_THINKING_BUDGET: u32 = 2048;
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` when neither `GEMINI_API_KEY` nor `API_KEY` is set. Generation
    /// then fails up front instead of the server refusing to start.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub thinking_budget: u32,
    pub request_timeout: Duration,
    /// Reject stories that do not have exactly six chapters.
    pub strict_chapter_count: bool,
    pub bind: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            thinking_budget: DEFAULT_THINKING_BUDGET,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            strict_chapter_count: false,
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = var("GEMINI_API_KEY").or_else(|| var("API_KEY"));
        let api_url = var("NARRADOR_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let model = var("NARRADOR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Config {
            api_key,
            api_url,
            model,
            temperature: parse_or(var("NARRADOR_TEMPERATURE"), "NARRADOR_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            thinking_budget: parse_or(
                var("NARRADOR_THINKING_BUDGET"),
                "NARRADOR_THINKING_BUDGET",
                DEFAULT_THINKING_BUDGET,
            )?,
            request_timeout: Duration::from_secs(parse_or(
                var("NARRADOR_REQUEST_TIMEOUT_SECS"),
                "NARRADOR_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            strict_chapter_count: parse_or(var("NARRADOR_STRICT_CHAPTERS"), "NARRADOR_STRICT_CHAPTERS", false)?,
            bind: var("NARRADOR_BIND")
                .unwrap_or_else(|| DEFAULT_BIND.to_string())
                .parse()
                .context("NARRADOR_BIND must be a socket address like 0.0.0.0:3000")?,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.thinking_budget, 2048);
        assert!(!config.strict_chapter_count);
        assert_eq!(config.bind.port(), 3000);
    }

    #[test]
    fn gemini_key_takes_precedence_and_blank_keys_are_ignored() {
        let config = config_from(&[("GEMINI_API_KEY", "g"), ("API_KEY", "a")]).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("g"));

        let config = config_from(&[("GEMINI_API_KEY", "  "), ("API_KEY", "a")]).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("a"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("NARRADOR_API_URL", "http://localhost:8080/v1beta/"),
            ("NARRADOR_TEMPERATURE", "0.9"),
            ("NARRADOR_STRICT_CHAPTERS", "true"),
            ("NARRADOR_BIND", "127.0.0.1:8000"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:8080/v1beta");
        assert!((config.temperature - 0.9).abs() < f32::EPSILON);
        assert!(config.strict_chapter_count);
        assert_eq!(config.bind.port(), 8000);
    }

    #[test]
    fn bad_values_are_startup_errors() {
        let err = config_from(&[("NARRADOR_THINKING_BUDGET", "lots")]).unwrap_err();
        assert!(err.to_string().contains("NARRADOR_THINKING_BUDGET"));
    }
}
