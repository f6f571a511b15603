//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern: the model may call tools any
//! number of times before committing to one structured final answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::structured::{extract_json, ResponseSchema};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// What a reasoning run produced
#[derive(Clone, Debug)]
pub struct ReasoningOutcome {
    /// Final answer, conforming to the requested schema
    pub structured: Value,
    
    /// Messages emitted during the run, starting at the trailing user input.
    /// Corrective prompts sent to the model are not included.
    pub messages: Vec<Message>,
    
    /// Names of tools invoked, in invocation order
    pub tools_invoked: Vec<String>,
}

/// Tool-using reasoning collaborator
#[async_trait]
pub trait ReasoningLoop: Send + Sync {
    async fn invoke(
        &self,
        messages: Vec<Message>,
        schema: &ResponseSchema,
        tools: &ToolRegistry,
    ) -> Result<ReasoningOutcome>;
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum model calls before giving up
    pub max_iterations: usize,
    
    /// Generation options
    pub generation: GenerationOptions,
    
    /// Whether to describe registered tools in the system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

const TOOL_PROTOCOL_PROMPT: &str = r#"When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, continue reasoning. When you are ready to answer,
reply with the final JSON object only."#;

/// [`ReasoningLoop`] driving an [`LlmProvider`] with fenced tool calls
pub struct ReactAgent {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
}

impl ReactAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self { provider, config }
    }
    
    pub fn with_defaults(provider: Arc<dyn LlmProvider>) -> Self {
        Self::new(provider, AgentConfig::default())
    }
    
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
    
    fn build_protocol_prompt(&self, schema: &ResponseSchema, tools: &ToolRegistry) -> String {
        let mut prompt = String::new();
        
        if self.config.inject_tool_descriptions && !tools.is_empty() {
            prompt.push_str(TOOL_PROTOCOL_PROMPT);
            prompt.push_str("\n\n");
            prompt.push_str(&tools.generate_prompt_section());
        }
        
        prompt.push_str(&schema.instructions());
        prompt
    }
    
    /// Parse a tool call from LLM response
    fn parse_tool_call(content: &str) -> Option<ToolCall> {
        let tool_start = "```tool";
        let tool_end = "```";
        
        let mut call = if let Some(start_idx) = content.find(tool_start) {
            let after_marker = &content[start_idx + tool_start.len()..];
            let end_idx = after_marker.find(tool_end)?;
            serde_json::from_str::<ToolCall>(after_marker[..end_idx].trim()).ok()?
        } else {
            // Bare JSON with a "tool" key
            let value = extract_json(content)?;
            if !value.get("tool").is_some_and(Value::is_string) {
                return None;
            }
            serde_json::from_value::<ToolCall>(value).ok()?
        };
        
        if call.id.is_none() {
            call.id = Some(uuid::Uuid::new_v4().to_string());
        }
        Some(call)
    }
    
    async fn execute_tool(tools: &ToolRegistry, call: &ToolCall) -> ToolResult {
        match tools.execute(call).await {
            Ok(mut result) => {
                result.id = call.id.clone();
                result
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult {
                    id: call.id.clone(),
                    ..ToolResult::failure(call.name.clone(), format!("Error: {}", e))
                }
            }
        }
    }
    
    fn format_tool_result(result: &ToolResult) -> String {
        if result.success {
            format!("[Tool '{}' returned]\n{}", result.name, result.output)
        } else {
            format!("[Tool '{}' failed]\n{}", result.name, result.output)
        }
    }
}

#[async_trait]
impl ReasoningLoop for ReactAgent {
    async fn invoke(
        &self,
        mut conversation: Vec<Message>,
        schema: &ResponseSchema,
        tools: &ToolRegistry,
    ) -> Result<ReasoningOutcome> {
        let emitted_from = match conversation.last() {
            Some(last) if last.role == Role::User => conversation.len() - 1,
            _ => conversation.len(),
        };
        let protocol = Message::system(self.build_protocol_prompt(schema, tools));
        
        // `conversation` is what the model sees; corrective prompts stay out of `emitted`
        let mut emitted = conversation[emitted_from..].to_vec();
        let mut tools_invoked = Vec::new();
        
        for iteration in 1..=self.config.max_iterations {
            let mut request = Vec::with_capacity(conversation.len() + 1);
            request.push(protocol.clone());
            request.extend(conversation.iter().cloned());
            
            let completion = self.provider
                .complete(&request, &self.config.generation)
                .await?;
            let content = completion.content;
            let reply = Message::assistant(&content);
            conversation.push(reply.clone());
            emitted.push(reply);
            
            if let Some(call) = Self::parse_tool_call(&content) {
                tracing::debug!(tool = %call.name, iteration, "Executing tool");
                let result = Self::execute_tool(tools, &call).await;
                let observation = Message::tool(
                    call.name.clone(),
                    Self::format_tool_result(&result),
                    call.id.clone(),
                );
                conversation.push(observation.clone());
                emitted.push(observation);
                tools_invoked.push(call.name);
                continue;
            }
            
            let verdict = extract_json(&content)
                .ok_or_else(|| AgentError::Parse("no JSON object in reply".into()))
                .and_then(|value| schema.check(&value).map(|()| value));
            
            match verdict {
                Ok(structured) => {
                    return Ok(ReasoningOutcome {
                        structured,
                        messages: emitted,
                        tools_invoked,
                    });
                }
                Err(e) => {
                    tracing::debug!(schema = %schema.name, iteration, error = %e, "Final answer rejected");
                    conversation.push(Message::user(format!(
                        "Your last reply was not a valid {} object ({}). Reply with the JSON object only.",
                        schema.name, e
                    )));
                }
            }
        }
        
        Err(AgentError::MaxIterations(self.config.max_iterations))
    }
}
