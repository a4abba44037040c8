use anyhow::{Context, Result};

/// Application configuration, read from the environment once at startup.
///
/// Missing required values abort before any client is constructed; there is
/// no runtime re-reading of the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub confluence: ConfluenceConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone)]
pub struct ConfluenceConfig {
    /// Site base URL without a trailing slash, e.g. `https://acme.atlassian.net`.
    pub base_url: String,
    pub username: String,
    pub api_token: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 5;

impl Config {
    /// Load and validate configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let timeout_secs = optional_u64("HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be > 0");
        }

        let confluence = ConfluenceConfig {
            base_url: normalize_base_url(&require_env("CONFLUENCE_BASE_URL")?),
            username: require_env("CONFLUENCE_USERNAME")?,
            api_token: require_env("CONFLUENCE_API_TOKEN")?,
            timeout_secs,
        };

        let llm = LlmConfig {
            api_key: require_env("OPENAI_API_KEY")?,
            base_url: normalize_base_url(
                &std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| default_llm_base_url()),
            ),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| default_model()),
            max_retries: optional_u64("LLM_MAX_RETRIES")?
                .map(|v| v as u32)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            timeout_secs,
        };

        Ok(Self { confluence, llm })
    }
}

fn require_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("Missing required environment variable: {}", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("Environment variable {} is set but empty", name);
    }
    Ok(value)
}

fn optional_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => {
            let parsed = raw
                .parse::<u64>()
                .with_context(|| format!("{} must be an integer, got '{}'", name, raw))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

/// Trim trailing slashes so URL joining never doubles them.
fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
