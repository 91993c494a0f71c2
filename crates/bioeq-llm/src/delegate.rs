//! Semantic delegate: a text-in, text-out seam the extractor falls back to.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{LlmBackend, LlmError, LlmRequest, Message};

#[async_trait]
pub trait SemanticDelegate: Send + Sync {
    /// Send an instruction plus a passage, return the raw reply.
    async fn complete(&self, instruction: &str, text: &str) -> Result<String, LlmError>;
}

/// Delegate backed by a chat-completion backend.
pub struct LlmDelegate {
    backend: Arc<dyn LlmBackend>,
    max_tokens: u32,
}

impl LlmDelegate {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend, max_tokens: 512 }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl SemanticDelegate for LlmDelegate {
    async fn complete(&self, instruction: &str, text: &str) -> Result<String, LlmError> {
        let req = LlmRequest {
            messages: vec![Message::system(instruction), Message::user(text)],
            model: None,
            max_tokens: Some(self.max_tokens),
            temperature: Some(0.0),
        };
        let resp = self.backend.complete(req).await?;
        debug!(
            model = %resp.model,
            prompt_tokens = resp.prompt_tokens,
            completion_tokens = resp.completion_tokens,
            "Delegate completion"
        );
        if resp.content.trim().is_empty() {
            return Err(LlmError::EmptyCompletion(self.backend.model_id().to_string()));
        }
        Ok(resp.content)
    }
}

// ── Mock Implementation for Testing ──────────────────────────────────────────

/// Replays canned replies in order, then repeats the last one.
/// `failing()` errors on every call.
#[derive(Default)]
pub struct MockDelegate {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply.into());
        }
        self
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticDelegate for MockDelegate {
    async fn complete(&self, _instruction: &str, _text: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LlmError::Unavailable("mock delegate offline".into()));
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        let mut last = self
            .last
            .lock()
            .map_err(|_| LlmError::Unavailable("mock delegate poisoned".into()))?;
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .ok_or_else(|| LlmError::EmptyCompletion("mock".into()))
    }
}
