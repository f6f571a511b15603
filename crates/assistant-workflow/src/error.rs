//! Error Types for the Workflow

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Everything that aborts a turn. None of these are retried by the graph.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A required collaborator handle is missing
    #[error("Configuration error: {0}")]
    Config(String),
    
    #[error("Missing input: `{field}` is required by {node}")]
    MissingInput {
        node: &'static str,
        field: &'static str,
    },
    
    /// A structured collaborator returned something outside its schema
    #[error("Contract violation in {node}: {reason}")]
    ContractViolation {
        node: &'static str,
        reason: String,
    },
    
    /// The reasoning loop could not produce a conforming answer
    #[error("Specialist {node} failed: {reason}")]
    SpecialistFailure {
        node: &'static str,
        reason: String,
    },
    
    /// `next_step` names a route with no edge from the current node
    #[error("No edge from {from} for route `{route}`")]
    RouterViolation {
        from: &'static str,
        route: String,
    },
    
    /// A partial update was rejected by the merge policy
    #[error("State corruption: {0}")]
    StateCorruption(String),
    
    /// A collaborator failed for reasons unrelated to its output shape
    #[error("Collaborator error in {node}: {source}")]
    Collaborator {
        node: &'static str,
        #[source]
        source: AgentError,
    },
    
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl WorkflowError {
    /// Stable machine-readable code
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Config(_) => "CONFIG",
            WorkflowError::MissingInput { .. } => "MISSING_INPUT",
            WorkflowError::ContractViolation { .. } => "CONTRACT_VIOLATION",
            WorkflowError::SpecialistFailure { .. } => "SPECIALIST_FAILURE",
            WorkflowError::RouterViolation { .. } => "ROUTER_VIOLATION",
            WorkflowError::StateCorruption(_) => "STATE_CORRUPTION",
            WorkflowError::Collaborator { .. } => "COLLABORATOR",
            WorkflowError::Checkpoint(_) => "CHECKPOINT",
        }
    }
    
    /// Caller-facing message
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::MissingInput { .. } => "Please enter a message.".into(),
            WorkflowError::ContractViolation { .. } | WorkflowError::SpecialistFailure { .. } => {
                "The assistant could not produce a well-formed answer. Please try again.".into()
            }
            WorkflowError::Collaborator { source, .. } => source.user_message(),
            _ => "An internal error occurred while processing your message.".into(),
        }
    }
}
