//! Structured Output
//!
//! Asks a provider for a single JSON object matching a [`ResponseSchema`]
//! and checks the reply against it. No free-text fallback: a reply that is
//! not a conforming object is a [`AgentError::Parse`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::ParameterSchema;

/// Shape of a structured answer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Schema name, e.g. `UserIntent`
    pub name: String,
    
    /// What the object represents
    pub description: String,
    
    /// Top-level fields of the object
    pub fields: Vec<ParameterSchema>,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }
    
    /// Add a field
    pub fn field(mut self, field: ParameterSchema) -> Self {
        self.fields.push(field);
        self
    }
    
    /// Prompt text telling the model how to format its answer
    pub fn instructions(&self) -> String {
        let mut text = format!(
            "Respond with a single JSON object ({}: {}) inside a ```json block.\nFields:\n",
            self.name, self.description
        );
        for field in &self.fields {
            let required = if field.required { "required" } else { "optional" };
            text.push_str(&format!(
                "- `{}` ({}, {}): {}",
                field.name, field.param_type, required, field.description
            ));
            if let Some(values) = &field.enum_values {
                let allowed: Vec<String> = values.iter().map(Value::to_string).collect();
                text.push_str(&format!(" One of: {}.", allowed.join(", ")));
            }
            text.push('\n');
        }
        text
    }
    
    /// Check a value against the schema: object shape, required fields,
    /// JSON types and enum membership
    pub fn check(&self, value: &Value) -> Result<()> {
        let object = value.as_object().ok_or_else(|| {
            AgentError::Parse(format!("{}: expected a JSON object", self.name))
        })?;
        
        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(AgentError::Parse(format!(
                        "{}: missing required field `{}`",
                        self.name, field.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(v) => {
                    if !type_matches(&field.param_type, v) {
                        return Err(AgentError::Parse(format!(
                            "{}: field `{}` should be {}",
                            self.name, field.name, field.param_type
                        )));
                    }
                    if let Some(allowed) = &field.enum_values {
                        if !allowed.contains(v) {
                            return Err(AgentError::Parse(format!(
                                "{}: field `{}` has unexpected value {}",
                                self.name, field.name, v
                            )));
                        }
                    }
                }
            }
        }
        
        Ok(())
    }
}

fn type_matches(param_type: &str, value: &Value) -> bool {
    match param_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Pull the first JSON object out of model output.
///
/// Prefers a fenced ```json block; otherwise scans for the first `{` that
/// starts a parseable object.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(body[..end].trim()) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }
    
    text.match_indices('{').find_map(|(idx, _)| {
        serde_json::Deserializer::from_str(&text[idx..])
            .into_iter::<Value>()
            .next()
            .and_then(std::result::Result::ok)
            .filter(Value::is_object)
    })
}

/// Structured-output collaborator
#[async_trait]
pub trait StructuredLlm: Send + Sync {
    /// Produce exactly one object conforming to `schema`
    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &ResponseSchema,
    ) -> Result<Value>;
}

/// Call a structured collaborator and deserialize the object into `T`
pub async fn invoke_typed<T: DeserializeOwned>(
    llm: &dyn StructuredLlm,
    messages: &[Message],
    schema: &ResponseSchema,
) -> Result<T> {
    let value = llm.invoke_structured(messages, schema).await?;
    serde_json::from_value(value)
        .map_err(|e| AgentError::Parse(format!("{}: {}", schema.name, e)))
}

/// [`StructuredLlm`] backed by any [`LlmProvider`] via prompt instructions
pub struct ProviderStructuredLlm {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
}

impl ProviderStructuredLlm {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self { provider, options }
    }
}

#[async_trait]
impl StructuredLlm for ProviderStructuredLlm {
    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &ResponseSchema,
    ) -> Result<Value> {
        let mut request = messages.to_vec();
        request.push(Message::system(schema.instructions()));
        
        let completion = self.provider.complete(&request, &self.options).await?;
        tracing::debug!(schema = %schema.name, model = %completion.model, "Structured completion received");
        
        let value = extract_json(&completion.content).ok_or_else(|| {
            AgentError::Parse(format!("{}: no JSON object in model output", schema.name))
        })?;
        schema.check(&value)?;
        
        Ok(value)
    }
}
