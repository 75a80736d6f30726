use std::env;

use tracing::warn;

use crate::{app_error, censor::entities::EntityKind, error::AppError};

pub const DEFAULT_LABEL_SELECTOR_KEY: &str = "app.kubernetes.io/name";
pub const DEFAULT_VERSION_PATH: &str = "/version";
pub const DEFAULT_LOG_LINES: u32 = 10;
pub const DEFAULT_TRUFFLEHOG_BIN: &str = "trufflehog";

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub app_token: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub label_selector_key: String,
    pub version_path: String,
    pub default_log_lines: u32,
    pub trufflehog_bin: String,
    pub censor_entities: Vec<EntityKind>,
    pub slack: SlackConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let bot_token = required("SLACK_BOT_TOKEN")?;
        let app_token = required("SLACK_APP_TOKEN")?;

        let default_log_lines = match env::var("DEFAULT_LOG_LINES") {
            Ok(v) => v
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| app_error!("DEFAULT_LOG_LINES must be a positive integer, got {v:?}"))?,
            Err(_) => DEFAULT_LOG_LINES,
        };

        let censor_entities = match env::var("CENSOR_ENTITIES") {
            Ok(v) => parse_entities(&v),
            Err(_) => EntityKind::ALL.to_vec(),
        };

        Ok(Self {
            label_selector_key: optional("APPLICATION_LABEL_SELECTOR_KEY", DEFAULT_LABEL_SELECTOR_KEY),
            version_path: optional("APPLICATION_VERSION_URL", DEFAULT_VERSION_PATH),
            default_log_lines,
            trufflehog_bin: optional("TRUFFLEHOG_BIN", DEFAULT_TRUFFLEHOG_BIN),
            censor_entities,
            slack: SlackConfig {
                bot_token,
                app_token,
            },
        })
    }
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| app_error!("Missing {name} in environment variables"))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_entities(value: &str) -> Vec<EntityKind> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<EntityKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!("Ignoring CENSOR_ENTITIES entry: {e}");
                None
            }
        })
        .collect()
}
