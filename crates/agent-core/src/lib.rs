//! # agent-core
//!
//! Provider-agnostic LLM plumbing consumed by the assistant workflow.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ┌────────────────┐   ┌─────────────┐   ┌─────────────────┐  │
//! │  │  ReactAgent    │───│ ToolRegistry│   │  LlmProvider    │  │
//! │  │ (ReasoningLoop)│───┼─────────────┼──▶│  (Strategy)     │  │
//! │  └────────────────┘   └─────────────┘   └─────────────────┘  │
//! │  ┌──────────────────────┐                        ▲           │
//! │  │ ProviderStructuredLlm│────────────────────────┘           │
//! │  │   (StructuredLlm)    │                                    │
//! │  └──────────────────────┘                                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `StructuredLlm` and `ReasoningLoop` are the collaborator contracts the
//! workflow depends on; the provider-backed types here are their default
//! implementations.

pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod structured;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use reasoning::{AgentConfig, ReactAgent, ReasoningLoop, ReasoningOutcome};
pub use structured::{ProviderStructuredLlm, ResponseSchema, StructuredLlm};
pub use tool::{ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
