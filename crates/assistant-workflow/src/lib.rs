//! # Assistant Workflow
//!
//! An intent-routed conversational workflow. Each user turn is classified,
//! handed to one specialist, and folded back into a persistent memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Workflow                            │
//! │  ┌────────────────┐   ┌──────────────┐   ┌───────────────┐   │
//! │  │ classify_intent│──▶│  specialist  │──▶│ update_memory │   │
//! │  └────────────────┘   │ qa / summary │   └───────────────┘   │
//! │          │            │ / calculation│           │           │
//! │          │            └──────────────┘           │           │
//! │          ▼                    ▼                  ▼           │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ merge(SessionState, StateUpdate) ─▶ CheckpointStore    │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nodes return partial [`StateUpdate`]s; [`merge`] applies them with a
//! per-field policy. Collaborators (structured model calls and the
//! tool-using reasoning loop) come from `agent-core` and are passed in
//! through a [`WorkflowContext`].

pub mod checkpoint;
pub mod context;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod schemas;
pub mod state;

#[cfg(test)]
mod testing;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use context::{WorkflowConfig, WorkflowContext, WorkflowContextBuilder};
pub use error::{Result, WorkflowError};
pub use graph::{next_node, Workflow};
pub use nodes::{NodeId, Specialist};
pub use schemas::{
    AnswerResponse, CalculationResponse, IntentType, StructuredResponse, SummarizationResponse,
    UpdateMemoryResponse, UserIntent,
};
pub use state::{merge, Field, MergePolicy, Route, SessionId, SessionState, StateUpdate, MERGE_POLICY};
