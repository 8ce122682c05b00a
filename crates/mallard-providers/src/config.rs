//! Upstream client configuration.

use std::collections::HashMap;

use crate::stream::Dialect;

const DEFAULT_BASE_URL: &str = "https://duckduckgo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Real browser User-Agent strings for the default identity pool.
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Windows NT 10.0; rv:123.0) Gecko/20100101 Firefox/123.0",
];

fn default_model_aliases() -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    aliases.insert("1".to_string(), "gpt-4o-mini".to_string());
    aliases.insert("2".to_string(), "claude-3-haiku-20240307".to_string());
    aliases.insert(
        "3".to_string(),
        "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo".to_string(),
    );
    aliases.insert(
        "4".to_string(),
        "mistralai/Mixtral-8x7B-Instruct-v0.1".to_string(),
    );
    aliases
}

/// Configuration for the duckchat upstream client.
#[derive(Debug, Clone)]
pub struct DuckChatConfig {
    /// Upstream origin, e.g. `https://duckduckgo.com`.
    pub base_url: String,
    /// Request timeout applied to the token fetch, the dispatch, and body reads.
    pub timeout_secs: u64,
    /// Retries after a failed token fetch. 0 means a single attempt.
    pub token_retries: u32,
    /// Delay unit for the linear token backoff (1x, 2x, 3x, ...).
    pub token_backoff_step_ms: u64,
    /// User-Agent pool for the default identity provider.
    pub user_agents: Vec<String>,
    /// Short model codes mapped to full upstream model names.
    pub model_aliases: HashMap<String, String>,
    /// Fallback for unknown codes.
    pub default_model: String,
    /// Which stream delimiter convention the upstream speaks.
    pub dialect: Dialect,
}

impl Default for DuckChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_retries: 0,
            token_backoff_step_ms: 1_000,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            model_aliases: default_model_aliases(),
            default_model: DEFAULT_MODEL.to_string(),
            dialect: Dialect::default(),
        }
    }
}

impl DuckChatConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_token_retries(mut self, retries: u32) -> Self {
        self.token_retries = retries;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Resolve a short model code through the alias table.
    ///
    /// Anything not in the table (including `None`) falls back to the default
    /// model; full model names are the business of the pass-through surface,
    /// not this table.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        requested
            .and_then(|code| self.model_aliases.get(code))
            .cloned()
            .unwrap_or_else(|| self.default_model.clone())
    }

    pub(crate) fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
