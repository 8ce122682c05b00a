//! Configuration from environment variables and `mallard.yml`.
//!
//! Everything the relay hardcodes nowhere: the upstream origin, the
//! User-Agent pool, the model alias table, timeouts, and the inbound
//! rate-limit window.
//!
//! **Environment variables:**
//! - `PORT`: server port (default: 3000)
//! - `MALLARD_UPSTREAM_URL`: upstream origin (default: https://duckduckgo.com)
//! - `REQUEST_TIMEOUT_SECS`: upstream request timeout (default: 30)
//!
//! A `mallard.yml` file can override the rest:
//!
//! ```yaml
//! stream_dialect: duckchat
//! token_retries: 3
//! rate_limit:
//!   window_secs: 60
//!   max_requests: 100
//! models:
//!   default: gpt-4o-mini
//!   aliases:
//!     "1": gpt-4o-mini
//! user_agents:
//!   - "Mozilla/5.0 ..."
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use mallard_providers::{Dialect, DuckChatConfig};

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub upstream_url: String,
    pub request_timeout_secs: u64,
    /// Retries after a failed token fetch; 0 means a single attempt.
    pub token_retries: u32,
    pub dialect: Dialect,
    pub rate_limit: RateLimitConfig,
    /// Overrides for the default browser identity pool.
    pub user_agents: Option<Vec<String>>,
    /// Overrides for the short-code model table.
    pub model_aliases: Option<HashMap<String, String>>,
    pub default_model: Option<String>,
}

/// Fixed-window inbound rate limit.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u32 {
    100
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MallardYamlConfig {
    stream_dialect: Option<Dialect>,
    token_retries: Option<u32>,
    #[serde(default)]
    rate_limit: Option<RateLimitConfig>,
    user_agents: Option<Vec<String>>,
    #[serde(default)]
    models: Option<ModelsSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelsSection {
    default: Option<String>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let upstream_defaults = DuckChatConfig::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            upstream_url: env::var("MALLARD_UPSTREAM_URL")
                .unwrap_or(upstream_defaults.base_url),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(upstream_defaults.timeout_secs),
            token_retries: 0,
            dialect: Dialect::default(),
            rate_limit: RateLimitConfig::default(),
            user_agents: None,
            model_aliases: None,
            default_model: None,
        }
    }
}

impl ProxyConfig {
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read mallard.yml from {:?}", path))?;

        let yaml: MallardYamlConfig =
            serde_yaml::from_str(&content).context("Failed to parse mallard.yml")?;

        let mut config = Self::default();
        if let Some(dialect) = yaml.stream_dialect {
            config.dialect = dialect;
        }
        if let Some(retries) = yaml.token_retries {
            config.token_retries = retries;
        }
        if let Some(rate_limit) = yaml.rate_limit {
            config.rate_limit = rate_limit;
        }
        config.user_agents = yaml.user_agents;
        if let Some(models) = yaml.models {
            config.default_model = models.default;
            if !models.aliases.is_empty() {
                config.model_aliases = Some(models.aliases);
            }
        }
        Ok(config)
    }

    /// The upstream-client view of this configuration.
    pub fn to_duckchat_config(&self) -> DuckChatConfig {
        let mut upstream = DuckChatConfig::default()
            .with_base_url(self.upstream_url.clone())
            .with_timeout_secs(self.request_timeout_secs)
            .with_token_retries(self.token_retries)
            .with_dialect(self.dialect);

        if let Some(agents) = &self.user_agents {
            upstream.user_agents = agents.clone();
        }
        if let Some(aliases) = &self.model_aliases {
            upstream.model_aliases = aliases.clone();
        }
        if let Some(default_model) = &self.default_model {
            upstream.default_model = default_model.clone();
        }
        upstream
    }
}
