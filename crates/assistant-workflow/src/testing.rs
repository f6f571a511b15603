//! Scripted collaborator doubles for tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agent_core::{
    AgentError, Message, ReasoningLoop, ReasoningOutcome, ResponseSchema, Result, StructuredLlm,
    ToolRegistry,
};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::WorkflowContext;

/// Replays canned structured replies in order and records every request
#[derive(Default)]
pub struct ScriptedStructured {
    replies: Mutex<VecDeque<Result<Value>>>,
    pub requests: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedStructured {
    pub fn new(replies: Vec<Result<Value>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        })
    }
    
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl StructuredLlm for ScriptedStructured {
    async fn invoke_structured(&self, messages: &[Message], schema: &ResponseSchema) -> Result<Value> {
        self.requests.lock().unwrap().push((schema.name.clone(), messages.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Provider("script exhausted".into())))
    }
}

/// Replays canned reasoning outcomes in order and records every request
#[derive(Default)]
pub struct ScriptedReasoner {
    outcomes: Mutex<VecDeque<Result<ReasoningOutcome>>>,
    pub requests: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedReasoner {
    pub fn new(outcomes: Vec<Result<ReasoningOutcome>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::default(),
        })
    }
    
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasoningLoop for ScriptedReasoner {
    async fn invoke(
        &self,
        messages: Vec<Message>,
        schema: &ResponseSchema,
        _tools: &ToolRegistry,
    ) -> Result<ReasoningOutcome> {
        self.requests.lock().unwrap().push((schema.name.clone(), messages));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Provider("script exhausted".into())))
    }
}

pub fn intent_reply(intent_type: &str, confidence: f64) -> Result<Value> {
    Ok(json!({
        "intent_type": intent_type,
        "confidence": confidence,
        "reasoning": format!("looks like {intent_type}"),
    }))
}

pub fn memory_reply(summary: &str, document_ids: &[&str]) -> Result<Value> {
    Ok(json!({ "summary": summary, "document_ids": document_ids }))
}

/// A reasoning outcome whose trace shows `tools` being called before answering
pub fn outcome(input: &str, structured: Value, tools: &[&str]) -> Result<ReasoningOutcome> {
    let mut messages = vec![Message::user(input)];
    for tool in tools {
        messages.push(Message::assistant(format!("calling {tool}")));
        messages.push(Message::tool(*tool, "ok", None));
    }
    messages.push(Message::assistant(structured.to_string()));
    
    Ok(ReasoningOutcome {
        structured,
        messages,
        tools_invoked: tools.iter().map(|t| (*t).to_string()).collect(),
    })
}

pub fn answer(question: &str, answer: &str) -> Value {
    json!({
        "question": question,
        "answer": answer,
        "sources": ["doc-geo"],
        "confidence": 0.92,
    })
}

pub fn context(
    classifier: Arc<ScriptedStructured>,
    reasoner: Arc<ScriptedReasoner>,
    consolidator: Arc<ScriptedStructured>,
) -> WorkflowContext {
    WorkflowContext::builder()
        .classifier(classifier)
        .reasoner(reasoner)
        .consolidator(consolidator)
        .build()
        .unwrap()
}
