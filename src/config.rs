//! Runtime configuration read from the environment.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::{
    DEFAULT_API_BASE, DEFAULT_BIND_ADDR, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_OLLAMA_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_PROMPT_CMD,
};

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote keyword/analysis service, without trailing slash.
    pub api_base: String,
    pub bind_addr: String,
    pub prompt_cmd: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub http_timeout: Duration,
    /// Cookie signing key. `None` means a random key is generated per process.
    pub session_secret: Option<Vec<u8>>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base = normalize_base_url(
            "ISMART_API_BASE",
            &env::var("ISMART_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        )?;
        let ollama_url = normalize_base_url(
            "ISMART_OLLAMA_URL",
            &env::var("ISMART_OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
        )?;

        let timeout_secs = match env::var("ISMART_HTTP_TIMEOUT_SECS") {
            Ok(v) => v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: "ISMART_HTTP_TIMEOUT_SECS",
                value: v.clone(),
            })?,
            Err(_) => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            api_base,
            bind_addr: env::var("ISMART_BIND").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            prompt_cmd: env::var("ISMART_PROMPT_CMD")
                .unwrap_or_else(|_| DEFAULT_PROMPT_CMD.to_string()),
            ollama_url,
            ollama_model: env::var("ISMART_OLLAMA_MODEL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string()),
            http_timeout: Duration::from_secs(timeout_secs),
            session_secret: env::var("ISMART_SESSION_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.into_bytes()),
        })
    }

    /// Configuration pointing at the given service, all other values default.
    pub fn with_api_base(api_base: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: normalize_base_url("api_base", api_base)?,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            prompt_cmd: DEFAULT_PROMPT_CMD.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            session_secret: None,
        })
    }
}

/// Parse an http(s) base URL and strip trailing slashes so endpoint paths
/// can be appended with `format!("{}/...")`.
pub fn normalize_base_url(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        var,
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            var,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            var,
            reason: "no host in URL".to_string(),
        });
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}
