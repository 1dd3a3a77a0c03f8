//! Configuration management utilities

use serde::{Deserialize, Serialize};

const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_REVIEW_MODEL: &str = "gemini-2.0-flash-exp";
const DEFAULT_TIMEZONE: &str = "Asia/Seoul";
const DEFAULT_REVIEW_LANGUAGE: &str = "Korean";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
    /// Model used by the chat front ends and the text-to-SQL helper
    pub chat_model: String,
    /// Multimodal model used for paper review
    pub review_model: String,
    /// IANA timezone used by the time tool when the model omits one
    pub default_timezone: String,
    /// Language the paper review is written in
    pub review_language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "agent-rs".to_string(),
            environment: "development".to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            review_model: DEFAULT_REVIEW_MODEL.to_string(),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            review_language: DEFAULT_REVIEW_LANGUAGE.to_string(),
        }
    }
}

impl Config {
    /// Build a configuration from the process environment
    ///
    /// Recognized variables: `AGENT_ENV`, `AGENT_CHAT_MODEL`,
    /// `AGENT_REVIEW_MODEL`, `AGENT_TIMEZONE`, `AGENT_REVIEW_LANGUAGE`.
    /// Unset or blank variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str, fallback: String| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(fallback)
        };

        let defaults = Self::default();
        Self {
            environment: read("AGENT_ENV", defaults.environment),
            chat_model: read("AGENT_CHAT_MODEL", defaults.chat_model),
            review_model: read("AGENT_REVIEW_MODEL", defaults.review_model),
            default_timezone: read("AGENT_TIMEZONE", defaults.default_timezone),
            review_language: read("AGENT_REVIEW_LANGUAGE", defaults.review_language),
            app_name: defaults.app_name,
        }
    }
}
