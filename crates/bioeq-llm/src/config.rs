//! `[llm]` configuration and backend construction.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::backend::{LlmBackend, LlmError, OllamaBackend, OpenAiCompatibleBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// No delegate; extraction relies on patterns alone.
    Disabled,
    Ollama,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> LlmProvider { LlmProvider::Disabled }
fn default_base_url() -> String { "http://localhost:11434".to_string() }
fn default_model()    -> String { "llama3.1:8b".to_string() }
fn default_timeout()  -> u64 { 60 }
fn default_max_tokens() -> u32 { 512 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    /// Build the configured backend, `None` when disabled.
    pub fn build_backend(&self) -> Result<Option<Arc<dyn LlmBackend>>, LlmError> {
        let timeout = Duration::from_secs(self.timeout_secs);
        let backend: Arc<dyn LlmBackend> = match self.provider {
            LlmProvider::Disabled => return Ok(None),
            LlmProvider::Ollama => Arc::new(OllamaBackend::new(&self.base_url, &self.model, timeout)?),
            LlmProvider::OpenaiCompatible => {
                let key = self
                    .api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .map(SecretString::from);
                Arc::new(OpenAiCompatibleBackend::new(&self.base_url, &self.model, key, timeout)?)
            }
        };
        Ok(Some(backend))
    }
}
