use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_RECIPE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_VIDEO_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TEMPERATURE: f32 = 1.0;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Settings for the Gemini side of the bot. The Telegram token is read
/// separately by `Bot::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub recipe_model: String,
    pub image_model: String,
    pub video_model: String,
    /// Sampling temperature for the recipe call, high for variety.
    pub temperature: f32,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("API_KEY"))
            .ok_or(Error::MissingEnv("GEMINI_API_KEY"))?;

        let temperature = match get("MEAL_TEMPERATURE") {
            Some(raw) => parse_temperature(&raw)?,
            None => DEFAULT_TEMPERATURE,
        };

        let timeout_secs = match get("GEMINI_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| Error::InvalidEnv {
                    name: "GEMINI_TIMEOUT_SECS",
                    value: raw.clone(),
                    reason: "expected a positive number of seconds".to_string(),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            api_key,
            base_url: get("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            recipe_model: get("MEAL_RECIPE_MODEL")
                .unwrap_or_else(|| DEFAULT_RECIPE_MODEL.to_string()),
            image_model: get("MEAL_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            video_model: get("MEAL_VIDEO_MODEL").unwrap_or_else(|| DEFAULT_VIDEO_MODEL.to_string()),
            temperature,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_temperature(raw: &str) -> Result<f32> {
    let invalid = |reason: &str| Error::InvalidEnv {
        name: "MEAL_TEMPERATURE",
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let value: f32 = raw.trim().parse().map_err(|_| invalid("not a number"))?;
    if !(0.0..=2.0).contains(&value) {
        return Err(invalid("must be between 0.0 and 2.0"));
    }
    Ok(value)
}
