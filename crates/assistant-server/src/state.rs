//! Application State

use std::sync::Arc;

use agent_core::LlmProvider;
use assistant_workflow::Workflow;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The compiled workflow graph with its checkpoint store
    pub workflow: Arc<Workflow>,
    
    /// LLM provider, kept for health reporting
    pub provider: Arc<dyn LlmProvider>,
    
    pub model: String,
}
