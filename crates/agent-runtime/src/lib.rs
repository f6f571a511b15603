//! # agent-runtime
//!
//! Concrete [`LlmProvider`](agent_core::LlmProvider) implementations.
//!
//! ## Providers
//!
//! - **Ollama** (default feature): local inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OllamaProvider;
//!
//! let provider = Arc::new(OllamaProvider::from_env());
//! let reasoner = ReactAgent::with_defaults(provider.clone());
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};
