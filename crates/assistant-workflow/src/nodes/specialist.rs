//! Specialist nodes: question answering, summarization, calculation
//!
//! All three share one shape and differ only in instructions and response
//! schema. The reasoning loop owns tool use; the node records which tools
//! ran and passes the conforming answer through.

use agent_core::{AgentError, ResponseSchema};
use serde_json::{Map, Value};

use super::{require_input, NodeId};
use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::prompts::{
    chat_messages, CALCULATION_SYSTEM_PROMPT, QA_SYSTEM_PROMPT, SUMMARIZATION_SYSTEM_PROMPT,
};
use crate::schemas::{
    AnswerResponse, CalculationResponse, StructuredResponse, SummarizationResponse,
};
use crate::state::{Route, SessionState, StateUpdate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Specialist {
    Qa,
    Summarization,
    Calculation,
}

impl Specialist {
    pub fn node(self) -> NodeId {
        match self {
            Specialist::Qa => NodeId::QaAgent,
            Specialist::Summarization => NodeId::SummarizationAgent,
            Specialist::Calculation => NodeId::CalculationAgent,
        }
    }
    
    pub fn system_prompt(self) -> &'static str {
        match self {
            Specialist::Qa => QA_SYSTEM_PROMPT,
            Specialist::Summarization => SUMMARIZATION_SYSTEM_PROMPT,
            Specialist::Calculation => CALCULATION_SYSTEM_PROMPT,
        }
    }
    
    pub fn schema(self) -> ResponseSchema {
        match self {
            Specialist::Qa => AnswerResponse::schema(),
            Specialist::Summarization => SummarizationResponse::schema(),
            Specialist::Calculation => CalculationResponse::schema(),
        }
    }
    
    /// Type-check the answer and return it as a keyed record with defaults filled
    pub fn conform(self, value: Value) -> std::result::Result<Map<String, Value>, String> {
        match self {
            Specialist::Qa => conform::<AnswerResponse>(value),
            Specialist::Summarization => conform::<SummarizationResponse>(value),
            Specialist::Calculation => conform::<CalculationResponse>(value),
        }
    }
}

fn conform<T: StructuredResponse>(value: Value) -> std::result::Result<Map<String, Value>, String> {
    let typed: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
    typed.validate()?;
    
    match serde_json::to_value(&typed).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected an object, got {other}")),
    }
}

fn specialist_error(node: NodeId, err: AgentError) -> WorkflowError {
    match err {
        AgentError::MaxIterations(_) | AgentError::Parse(_) | AgentError::Json(_) => {
            WorkflowError::SpecialistFailure {
                node: node.as_str(),
                reason: err.to_string(),
            }
        }
        source => WorkflowError::Collaborator {
            node: node.as_str(),
            source,
        },
    }
}

pub async fn run_specialist(
    specialist: Specialist,
    state: &SessionState,
    ctx: &WorkflowContext,
) -> Result<StateUpdate> {
    let node = specialist.node();
    let user_input = require_input(state, node)?;
    
    let messages = chat_messages(specialist.system_prompt(), &state.message_log, user_input);
    let outcome = ctx
        .reasoner()
        .invoke(messages, &specialist.schema(), ctx.tools())
        .await
        .map_err(|e| specialist_error(node, e))?;
    
    let response = specialist
        .conform(outcome.structured)
        .map_err(|reason| WorkflowError::SpecialistFailure { node: node.as_str(), reason })?;
    
    tracing::info!(
        node = %node,
        tools = ?outcome.tools_invoked,
        messages = outcome.messages.len(),
        "Specialist answered"
    );
    
    Ok(StateUpdate::new()
        .append_messages(outcome.messages)
        .action(node.as_str())
        .current_response(response)
        .tools_used(outcome.tools_invoked)
        .next_step(Route::UpdateMemory))
}
