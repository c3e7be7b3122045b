//! Model-backed adapters for the approval engine.
//!
//! - `llm`: the `LlmClient` boundary and HTTP clients for Ollama, OpenAI,
//!   Anthropic and Gemini
//! - `classifier`: `PromptClassifier`, the engine's department classifier
//! - `webhook`: `WebhookApprover`, which hands fully approved invoices on
//!
//! The model only suggests a department. Thresholds, approvers and workload
//! are decided by the engine against stored data.

pub mod classifier;
pub mod llm;
pub mod webhook;

pub use classifier::PromptClassifier;
pub use llm::{HttpLlmClient, LlmClient, LlmError};
pub use webhook::WebhookApprover;
