//! Runtime configuration.

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Default Claude model for generation.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Default response budget for a generation call.
pub const DEFAULT_MAX_TOKENS: usize = 4096;

/// Default cap on result pages followed per range query.
pub const DEFAULT_MAX_QUERY_PAGES: usize = 10;

/// Credentials, database handles and tuning for a chronicler.
#[derive(Clone)]
pub struct Config {
    pub notion_token: String,
    pub anthropic_api_key: String,

    /// Claude model used for generation.
    pub model: String,

    pub timeline_database_id: String,
    pub location_database_id: String,

    /// Maximum tokens for generation responses.
    pub max_tokens: usize,

    /// Sampling temperature for generation, 0.0 to 1.0.
    pub temperature: f32,

    /// Maximum result pages fetched per range query.
    pub max_query_pages: usize,
}

impl Config {
    pub fn new(
        notion_token: impl Into<String>,
        anthropic_api_key: impl Into<String>,
        timeline_database_id: impl Into<String>,
        location_database_id: impl Into<String>,
    ) -> Self {
        Self {
            notion_token: notion_token.into(),
            anthropic_api_key: anthropic_api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeline_database_id: timeline_database_id.into(),
            location_database_id: location_database_id.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: crate::requester::DEFAULT_TEMPERATURE,
            max_query_pages: DEFAULT_MAX_QUERY_PAGES,
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// Required: `NOTION_TOKEN`, `ANTHROPIC_API_KEY`, `TIMELINE_DATABASE_ID`,
    /// `LOCATION_DATABASE_ID`. Optional: `MODEL_NAME`, `KAUTOS_TEMPERATURE`,
    /// `KAUTOS_MAX_TOKENS`, `KAUTOS_MAX_QUERY_PAGES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let mut config = Self::new(
            required("NOTION_TOKEN")?,
            required("ANTHROPIC_API_KEY")?,
            required("TIMELINE_DATABASE_ID")?,
            required("LOCATION_DATABASE_ID")?,
        );

        if let Some(model) = lookup("MODEL_NAME").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(temperature) = parse_optional::<f32, _>(&lookup, "KAUTOS_TEMPERATURE")? {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ConfigError::Invalid {
                    var: "KAUTOS_TEMPERATURE",
                    value: temperature.to_string(),
                });
            }
            config.temperature = temperature;
        }
        if let Some(max_tokens) = parse_optional(&lookup, "KAUTOS_MAX_TOKENS")? {
            config.max_tokens = max_tokens;
        }
        if let Some(pages) = parse_optional::<usize, _>(&lookup, "KAUTOS_MAX_QUERY_PAGES")? {
            if pages == 0 {
                return Err(ConfigError::Invalid {
                    var: "KAUTOS_MAX_QUERY_PAGES",
                    value: pages.to_string(),
                });
            }
            config.max_query_pages = pages;
        }

        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Set the generation temperature, clamped to 0.0..=1.0.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_query_pages(mut self, pages: usize) -> Self {
        self.max_query_pages = pages.max(1);
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("notion_token", &"<redacted>")
            .field("anthropic_api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeline_database_id", &self.timeline_database_id)
            .field("location_database_id", &self.location_database_id)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_query_pages", &self.max_query_pages)
            .finish()
    }
}

fn parse_optional<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
