//! Local keyword-extraction strategies.
//!
//! Three variants share the [`KeywordStrategy`] trait:
//! - `PromptCommandModel`: an external prompt command (`<cmd> -p <prompt>`)
//! - `OllamaModel`: a local Ollama server over HTTP
//! - `HeuristicStrategy`: deterministic word-length tokenization
//!
//! Which one a workspace uses is decided once by [`discover_local_strategy`]
//! at startup, not probed again on every call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::KeywordError;
use crate::keywords::heuristic_keywords;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A local source of free-text keyword output.
#[async_trait]
pub trait KeywordStrategy: Send + Sync {
    /// Short identifier used in logs and notices.
    fn name(&self) -> &'static str;

    /// Produce raw text for the given research prompt. The caller parses it.
    async fn generate(&self, prompt: &str) -> Result<String, KeywordError>;
}

// ============================================================================
// Instructions
// ============================================================================

pub fn expert_keyword_instruction(topic: &str) -> String {
    format!(
        "You are an expert research assistant.\n\
        Analyze the topic and extract only the most domain-specific and relevant scientific keywords.\n\n\
        Guidelines:\n\
        - Provide a maximum of 7 keywords (fewer are fine).\n\
        - Include only precise, topic-related terms.\n\
        - Exclude generic or broad words like \"growth\", \"development\", \"yield\", \"biomass\", or \"physiology\".\n\
        - Focus on terminology relevant to the specific field, experiment type, or measurement methods.\n\
        - Output only the keywords separated by commas, no extra text.\n\n\
        Topic: \"{}\"",
        topic
    )
}

pub fn brief_keyword_instruction(topic: &str) -> String {
    format!(
        "Generate up to 7 research-specific keywords directly relevant to this topic.\n\
        Exclude general or unrelated terms.\n\
        Only output keywords separated by commas.\n\n\
        Topic: \"{}\"",
        topic
    )
}

// ============================================================================
// Prompt Command
// ============================================================================

/// Runs a prompt-capable CLI and returns its stdout.
pub struct PromptCommandModel {
    command: String,
}

impl PromptCommandModel {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Available when the command resolves on `PATH`.
    pub fn probe(command: &str) -> Option<Self> {
        match which::which(command) {
            Ok(path) => {
                debug!(command, path = %path.display(), "prompt command found");
                Some(Self::new(command))
            }
            Err(_) => None,
        }
    }
}

#[async_trait]
impl KeywordStrategy for PromptCommandModel {
    fn name(&self) -> &'static str {
        "prompt-command"
    }

    /// The child is killed if this future is dropped, so a dismissed
    /// workspace does not leave the command running.
    async fn generate(&self, prompt: &str) -> Result<String, KeywordError> {
        let instruction = expert_keyword_instruction(prompt);

        let output = Command::new(&self.command)
            .args(["-p", &instruction])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| KeywordError::Strategy(format!("could not run prompt command: {}", e)))?;

        if !output.status.success() {
            return Err(KeywordError::Strategy(format!(
                "prompt command exited with {}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ============================================================================
// Ollama
// ============================================================================

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

/// Talks to a local Ollama server.
pub struct OllamaModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaModel {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Available when `GET /api/tags` answers 2xx within the probe timeout.
    pub async fn probe(client: reqwest::Client, base_url: &str, model: &str) -> Option<Self> {
        let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
        match client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(r) if r.status().is_success() => Some(Self::new(client, base_url, model)),
            Ok(r) => {
                debug!(status = %r.status(), "ollama probe rejected");
                None
            }
            Err(_) => None,
        }
    }
}

#[async_trait]
impl KeywordStrategy for OllamaModel {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String, KeywordError> {
        let instruction = brief_keyword_instruction(prompt);
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&OllamaGenerateRequest {
                model: &self.model,
                prompt: &instruction,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| KeywordError::Strategy(format!("ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(KeywordError::Strategy(format!(
                "ollama returned {}",
                response.status()
            )));
        }

        let body: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| KeywordError::Strategy(format!("unreadable ollama response: {}", e)))?;
        Ok(body.response)
    }
}

// ============================================================================
// Heuristic
// ============================================================================

pub struct HeuristicStrategy;

#[async_trait]
impl KeywordStrategy for HeuristicStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn generate(&self, prompt: &str) -> Result<String, KeywordError> {
        Ok(heuristic_keywords(prompt).join(", "))
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Pick the local strategy: the prompt command if present, else Ollama if
/// it answers, else the heuristic.
pub async fn discover_local_strategy(
    config: &Config,
    client: reqwest::Client,
) -> Arc<dyn KeywordStrategy> {
    let strategy: Arc<dyn KeywordStrategy> =
        if let Some(model) = PromptCommandModel::probe(&config.prompt_cmd) {
            Arc::new(model)
        } else if let Some(model) =
            OllamaModel::probe(client, &config.ollama_url, &config.ollama_model).await
        {
            Arc::new(model)
        } else {
            Arc::new(HeuristicStrategy)
        };

    info!(strategy = strategy.name(), "local keyword strategy selected");
    strategy
}
