//! Structured Response Shapes
//!
//! The typed objects exchanged with structured collaborators, each paired
//! with the [`ResponseSchema`] the model is asked to fill.

use agent_core::{ParameterSchema, ResponseSchema};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed structured answer with its schema and value-level checks
pub trait StructuredResponse: Serialize + DeserializeOwned {
    fn schema() -> ResponseSchema;
    
    /// Constraints serde cannot express (ranges, non-empty text)
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

fn unit_interval(name: &str, value: f64) -> std::result::Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{name} must be between 0 and 1, got {value}"))
    }
}

/// Classified intent of a user turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    Qa,
    Summarization,
    Calculation,
    Unknown,
}

impl IntentType {
    pub const ALL: [IntentType; 4] = [
        IntentType::Qa,
        IntentType::Summarization,
        IntentType::Calculation,
        IntentType::Unknown,
    ];
    
    pub fn as_str(self) -> &'static str {
        match self {
            IntentType::Qa => "qa",
            IntentType::Summarization => "summarization",
            IntentType::Calculation => "calculation",
            IntentType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserIntent {
    pub intent_type: IntentType,
    pub confidence: f64,
    pub reasoning: String,
}

impl StructuredResponse for UserIntent {
    fn schema() -> ResponseSchema {
        ResponseSchema::new("UserIntent", "Classification of the user's latest message")
            .field(
                ParameterSchema::required("intent_type", "string", "The classified intent")
                    .with_enum(IntentType::ALL.map(IntentType::as_str)),
            )
            .field(ParameterSchema::required("confidence", "number", "Confidence score between 0 and 1"))
            .field(ParameterSchema::required("reasoning", "string", "Explanation for the classification"))
    }
    
    fn validate(&self) -> std::result::Result<(), String> {
        unit_interval("confidence", self.confidence)
    }
}

/// Answer to a question
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
    pub confidence: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl StructuredResponse for AnswerResponse {
    fn schema() -> ResponseSchema {
        ResponseSchema::new("AnswerResponse", "Answer to the user's question")
            .field(ParameterSchema::required("question", "string", "The original user question"))
            .field(ParameterSchema::required("answer", "string", "The generated answer"))
            .field(ParameterSchema::required("sources", "array", "Source document IDs used"))
            .field(ParameterSchema::required("confidence", "number", "Confidence score between 0 and 1"))
    }
    
    fn validate(&self) -> std::result::Result<(), String> {
        unit_interval("confidence", self.confidence)
    }
}

/// Summary of one or more documents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummarizationResponse {
    pub original_length: u64,
    pub summary: String,
    pub key_points: Vec<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl StructuredResponse for SummarizationResponse {
    fn schema() -> ResponseSchema {
        ResponseSchema::new("SummarizationResponse", "Summary of the requested content")
            .field(ParameterSchema::required("original_length", "integer", "Length of the original text"))
            .field(ParameterSchema::required("summary", "string", "The generated summary"))
            .field(ParameterSchema::required("key_points", "array", "Key points extracted"))
            .field(ParameterSchema::optional("document_ids", "array", "Documents summarized"))
    }
}

/// Result of a calculation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculationResponse {
    pub expression: String,
    pub result: f64,
    pub explanation: String,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl StructuredResponse for CalculationResponse {
    fn schema() -> ResponseSchema {
        ResponseSchema::new("CalculationResponse", "Result of the requested calculation")
            .field(ParameterSchema::required("expression", "string", "The mathematical expression"))
            .field(ParameterSchema::required("result", "number", "The calculated result"))
            .field(ParameterSchema::required("explanation", "string", "Step-by-step explanation"))
            .field(ParameterSchema::optional("units", "string", "Units if applicable"))
    }
    
    fn validate(&self) -> std::result::Result<(), String> {
        if self.result.is_finite() {
            Ok(())
        } else {
            Err("result must be a finite number".into())
        }
    }
}

/// Consolidated long-lived memory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateMemoryResponse {
    pub summary: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
}

impl StructuredResponse for UpdateMemoryResponse {
    fn schema() -> ResponseSchema {
        ResponseSchema::new("UpdateMemoryResponse", "Memory of the conversation so far")
            .field(ParameterSchema::required("summary", "string", "Summary of the conversation up to this point"))
            .field(ParameterSchema::optional(
                "document_ids",
                "array",
                "Document IDs relevant to the user's last message",
            ))
    }
    
    fn validate(&self) -> std::result::Result<(), String> {
        if self.summary.trim().is_empty() {
            Err("summary must not be empty".into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_rejects_unknown_variant() {
        let bad = serde_json::from_value::<UserIntent>(json!({
            "intent_type": "poetry", "confidence": 0.4, "reasoning": "?"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_intent_confidence_range() {
        let intent = UserIntent { intent_type: IntentType::Qa, confidence: 1.5, reasoning: String::new() };
        assert!(intent.validate().is_err());
        let intent = UserIntent { confidence: 0.0, ..intent };
        assert!(intent.validate().is_ok());
    }

    #[test]
    fn test_intent_schema_lists_every_variant() {
        let schema = UserIntent::schema();
        let allowed = schema.fields[0].enum_values.clone().unwrap();
        assert_eq!(allowed.len(), IntentType::ALL.len());
        assert!(schema.check(&json!({"intent_type": "unknown", "confidence": 0.1, "reasoning": "r"})).is_ok());
    }

    #[test]
    fn test_answer_timestamp_defaults() {
        let answer: AnswerResponse = serde_json::from_value(json!({
            "question": "q", "answer": "a", "sources": [], "confidence": 0.9
        }))
        .unwrap();
        assert!(answer.timestamp <= Utc::now());
    }

    #[test]
    fn test_memory_summary_required() {
        let memory = UpdateMemoryResponse { summary: "  ".into(), document_ids: Vec::new() };
        assert!(memory.validate().is_err());
    }
}
