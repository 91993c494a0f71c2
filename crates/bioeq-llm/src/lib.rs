//! bioeq-llm — LLM backend abstraction and the semantic delegate seam
//! used by extraction when patterns find nothing.

pub mod backend;
pub mod config;
pub mod delegate;

pub use backend::{LlmBackend, LlmError};
pub use config::{LlmConfig, LlmProvider};
pub use delegate::{LlmDelegate, MockDelegate, SemanticDelegate};
