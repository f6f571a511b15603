//! Workflow Nodes
//!
//! Each node reads the current state, calls one collaborator, and returns a
//! [`StateUpdate`](crate::state::StateUpdate). Nodes never mutate state.

mod classify;
mod memory;
mod specialist;

pub use classify::{classify_intent, route_for};
pub use memory::update_memory;
pub use specialist::{run_specialist, Specialist};

use agent_core::AgentError;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::state::SessionState;

/// Node identifiers; also the names recorded in `actions_taken`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    ClassifyIntent,
    QaAgent,
    SummarizationAgent,
    CalculationAgent,
    UpdateMemory,
}

impl NodeId {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeId::ClassifyIntent => "classify_intent",
            NodeId::QaAgent => "qa_agent",
            NodeId::SummarizationAgent => "summarization_agent",
            NodeId::CalculationAgent => "calculation_agent",
            NodeId::UpdateMemory => "update_memory",
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-blank `user_input`, or a missing-input error for `node`
pub(crate) fn require_input(state: &SessionState, node: NodeId) -> Result<&str, WorkflowError> {
    state
        .user_input
        .as_deref()
        .filter(|input| !input.trim().is_empty())
        .ok_or(WorkflowError::MissingInput {
            node: node.as_str(),
            field: "user_input",
        })
}

/// Map a structured-call failure: shape problems are contract violations
pub(crate) fn structured_error(node: NodeId, err: AgentError) -> WorkflowError {
    match err {
        AgentError::Parse(reason) => WorkflowError::ContractViolation {
            node: node.as_str(),
            reason,
        },
        AgentError::Json(e) => WorkflowError::ContractViolation {
            node: node.as_str(),
            reason: e.to_string(),
        },
        source => WorkflowError::Collaborator {
            node: node.as_str(),
            source,
        },
    }
}
