//! Workflow Graph
//!
//! ```text
//! classify_intent ──next_step──┬─▶ qa_agent ──────────┐
//!                              ├─▶ summarization_agent ├─▶ update_memory ─▶ end
//!                              ├─▶ calculation_agent ──┘
//!                              └─▶ end
//! ```
//!
//! Nodes run one at a time. The merged state is checkpointed after every
//! node, so a failing node leaves the previous snapshot in the store.

use std::sync::Arc;

use tracing::Instrument;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::nodes::{classify_intent, run_specialist, update_memory, NodeId, Specialist};
use crate::state::{merge, Field, Route, SessionId, SessionState, StateUpdate};

/// Fields a caller may supply when starting a turn; the rest belong to nodes
const INPUT_FIELDS: [Field; 3] = [Field::UserInput, Field::UserId, Field::SessionId];

/// The compiled graph: collaborators plus a checkpoint store
pub struct Workflow {
    ctx: WorkflowContext,
    store: Arc<dyn CheckpointStore>,
}

impl Workflow {
    pub fn new(ctx: WorkflowContext, store: Arc<dyn CheckpointStore>) -> Self {
        Self { ctx, store }
    }
    
    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }
    
    pub fn store(&self) -> &dyn CheckpointStore {
        self.store.as_ref()
    }
    
    /// Latest state of a session, if it has run before
    pub fn session(&self, session_id: &SessionId) -> Result<Option<SessionState>> {
        self.store.get(session_id)
    }
    
    pub fn checkpoints(&self, session_id: &SessionId) -> Result<Vec<Checkpoint>> {
        self.store.history(session_id)
    }
    
    /// Run one conversational turn.
    ///
    /// `input` must carry a non-blank `user_input`. Prior state for
    /// `session_id` is restored from the store; a new session starts empty.
    pub async fn run(&self, input: StateUpdate, session_id: &SessionId) -> Result<SessionState> {
        let span = tracing::info_span!("workflow_run", session_id = %session_id);
        self.run_turn(input, session_id).instrument(span).await
    }
    
    async fn run_turn(&self, input: StateUpdate, session_id: &SessionId) -> Result<SessionState> {
        let blank = input.user_input.as_deref().is_none_or(|s| s.trim().is_empty());
        if blank {
            return Err(WorkflowError::MissingInput {
                node: NodeId::ClassifyIntent.as_str(),
                field: "user_input",
            });
        }
        if let Some(field) = input.fields().into_iter().find(|f| !INPUT_FIELDS.contains(f)) {
            return Err(WorkflowError::StateCorruption(format!(
                "`{field}` is written by the workflow and cannot be supplied as input"
            )));
        }
        
        let mut state = match self.store.get(session_id)? {
            Some(previous) => {
                tracing::debug!(messages = previous.message_log.len(), "Resuming session");
                previous
            }
            None => SessionState::new(session_id.clone()),
        };
        state.begin_turn();
        state = merge(&state, input)?;
        
        let mut current = Some(NodeId::ClassifyIntent);
        while let Some(node) = current {
            tracing::debug!(node = %node, "Entering node");
            let update = self.dispatch(node, &state).await.inspect_err(|e| {
                tracing::error!(node = %node, error = %e, kind = e.kind(), "Node failed");
            })?;
            state = merge(&state, update)?;
            let step = self.store.put(session_id, node, &state)?;
            tracing::debug!(node = %node, step, "Node complete");
            
            current = next_node(node, &state)?;
        }
        
        tracing::info!(
            actions = ?state.actions_taken,
            tools = ?state.tools_used,
            "Turn complete"
        );
        Ok(state)
    }
    
    async fn dispatch(&self, node: NodeId, state: &SessionState) -> Result<StateUpdate> {
        match node {
            NodeId::ClassifyIntent => classify_intent(state, &self.ctx).await,
            NodeId::QaAgent => run_specialist(Specialist::Qa, state, &self.ctx).await,
            NodeId::SummarizationAgent => run_specialist(Specialist::Summarization, state, &self.ctx).await,
            NodeId::CalculationAgent => run_specialist(Specialist::Calculation, state, &self.ctx).await,
            NodeId::UpdateMemory => update_memory(state, &self.ctx).await,
        }
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow").field("ctx", &self.ctx).finish_non_exhaustive()
    }
}

/// Edge selection. Only `classify_intent` consults `next_step`; the other
/// edges are static.
pub fn next_node(current: NodeId, state: &SessionState) -> Result<Option<NodeId>> {
    match current {
        NodeId::ClassifyIntent => match state.next_step {
            Some(Route::QaAgent) => Ok(Some(NodeId::QaAgent)),
            Some(Route::SummarizationAgent) => Ok(Some(NodeId::SummarizationAgent)),
            Some(Route::CalculationAgent) => Ok(Some(NodeId::CalculationAgent)),
            Some(Route::End) => Ok(None),
            Some(route @ Route::UpdateMemory) => Err(WorkflowError::RouterViolation {
                from: current.as_str(),
                route: route.as_str().to_string(),
            }),
            None => Err(WorkflowError::RouterViolation {
                from: current.as_str(),
                route: "<unset>".into(),
            }),
        },
        NodeId::QaAgent | NodeId::SummarizationAgent | NodeId::CalculationAgent => {
            Ok(Some(NodeId::UpdateMemory))
        }
        NodeId::UpdateMemory => Ok(None),
    }
}
