//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use crate::roster::AliasTable;
use std::path::Path;

/// Guildbot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token. Required; startup fails without it.
    pub discord_token: String,

    /// Name the bot answers to in chat (also used by the engagement
    /// heuristics for explicit-name mentions).
    pub bot_name: String,

    /// Completion-endpoint configuration.
    pub completion: CompletionConfig,

    /// Conversation-history bounds.
    pub history: HistoryConfig,

    /// Liveness endpoint and keepalive settings.
    pub health: HealthConfig,

    /// Handle → human-name alias table.
    pub aliases: AliasTable,
}

/// Completion-endpoint configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL, e.g. `https://openrouter.ai/api/v1`.
    pub base_url: String,

    /// API key. A missing key is not fatal at startup; model turns degrade
    /// to a static "not configured" reply until it is set.
    pub api_key: Option<String>,

    /// Model identifier passed through to the endpoint.
    pub model: String,

    /// Generation budget per turn.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,
}

/// Conversation-history bounds.
#[derive(Debug, Clone, Copy)]
pub struct HistoryConfig {
    /// Maximum non-system turns retained per conversation.
    pub max_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_turns: 20 }
    }
}

/// Liveness endpoint and keepalive settings.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Port for the local liveness endpoint.
    pub port: u16,

    /// Public URL to self-ping so free-tier hosts don't idle the process
    /// out. Keepalive is disabled when unset.
    pub keepalive_url: Option<String>,

    /// Seconds between keepalive pings.
    pub keepalive_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            keepalive_url: None,
            keepalive_interval_secs: 600,
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `DISCORD_BOT_TOKEN` is required. `OPENROUTER_API_KEY` is optional;
    /// see [`CompletionConfig::api_key`]. Everything else has defaults and
    /// `GUILDBOT_*` overrides.
    pub fn load() -> Result<Self> {
        let discord_token = std::env::var("DISCORD_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingCredential("DISCORD_BOT_TOKEN"))?;

        let completion = CompletionConfig {
            base_url: env_or("GUILDBOT_COMPLETION_URL", "https://openrouter.ai/api/v1"),
            api_key: std::env::var("OPENROUTER_API_KEY").ok(),
            model: env_or("GUILDBOT_MODEL", "meta-llama/llama-4-maverick:free"),
            max_tokens: 500,
            temperature: 0.7,
        };

        let health = HealthConfig {
            port: std::env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(8080),
            keepalive_url: std::env::var("GUILDBOT_KEEPALIVE_URL").ok(),
            keepalive_interval_secs: std::env::var("GUILDBOT_KEEPALIVE_INTERVAL_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(600),
        };

        let aliases = match std::env::var("GUILDBOT_ALIAS_FILE") {
            Ok(path) => load_alias_table(Path::new(&path))?,
            Err(_) => AliasTable::default(),
        };

        Ok(Self {
            discord_token,
            bot_name: env_or("GUILDBOT_NAME", "Guildbot"),
            completion,
            history: HistoryConfig::default(),
            health,
            aliases,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Load the alias table from a TOML file of `handle = ["Name", ...]`
/// entries.
fn load_alias_table(path: &Path) -> Result<AliasTable> {
    let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::AliasTable {
        path: path.display().to_string(),
        detail: error.to_string(),
    })?;

    let table = toml::from_str(&raw).map_err(|error| ConfigError::AliasTable {
        path: path.display().to_string(),
        detail: error.to_string(),
    })?;

    Ok(table)
}
