//! Memory consolidation

use std::collections::HashSet;

use agent_core::structured::invoke_typed;

use super::{structured_error, NodeId};
use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::prompts::memory_messages;
use crate::schemas::{StructuredResponse, UpdateMemoryResponse};
use crate::state::{Route, SessionState, StateUpdate};

/// Rewrite the long-lived memory fields from the whole conversation.
/// The only writer of `conversation_summary` and `active_documents`.
pub async fn update_memory(state: &SessionState, ctx: &WorkflowContext) -> Result<StateUpdate> {
    const NODE: NodeId = NodeId::UpdateMemory;
    
    let messages = memory_messages(&state.message_log);
    let memory: UpdateMemoryResponse =
        invoke_typed(ctx.consolidator(), &messages, &UpdateMemoryResponse::schema())
            .await
            .map_err(|e| structured_error(NODE, e))?;
    memory
        .validate()
        .map_err(|reason| WorkflowError::ContractViolation { node: NODE.as_str(), reason })?;
    
    let mut seen = HashSet::new();
    let documents: Vec<String> = memory
        .document_ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect();
    
    tracing::debug!(documents = ?documents, history = state.message_log.len(), "Memory consolidated");
    
    Ok(StateUpdate::new()
        .conversation_summary(memory.summary)
        .active_documents(documents)
        .next_step(Route::End)
        .action(NODE.as_str()))
}
