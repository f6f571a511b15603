//! Workflow Context
//!
//! Collaborator handles and settings, passed explicitly to every node.

use std::sync::Arc;

use agent_core::{ReasoningLoop, StructuredLlm, ToolRegistry};

use crate::error::{Result, WorkflowError};

/// Workflow-level settings
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    /// Classifications below this confidence are logged as warnings.
    /// Routing ignores confidence.
    pub low_confidence_threshold: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.5,
        }
    }
}

impl WorkflowConfig {
    /// Read `LOW_CONFIDENCE_THRESHOLD`, falling back to the default
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let low_confidence_threshold = std::env::var("LOW_CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.low_confidence_threshold);
        
        Self { low_confidence_threshold }
    }
}

/// Everything a node may call out to
#[derive(Clone)]
pub struct WorkflowContext {
    classifier: Arc<dyn StructuredLlm>,
    reasoner: Arc<dyn ReasoningLoop>,
    consolidator: Arc<dyn StructuredLlm>,
    tools: Arc<ToolRegistry>,
    config: WorkflowConfig,
}

impl WorkflowContext {
    pub fn builder() -> WorkflowContextBuilder {
        WorkflowContextBuilder::default()
    }
    
    /// Structured collaborator for intent classification
    pub fn classifier(&self) -> &dyn StructuredLlm {
        self.classifier.as_ref()
    }
    
    /// Tool-using collaborator for the specialists
    pub fn reasoner(&self) -> &dyn ReasoningLoop {
        self.reasoner.as_ref()
    }
    
    /// Structured collaborator for memory consolidation
    pub fn consolidator(&self) -> &dyn StructuredLlm {
        self.consolidator.as_ref()
    }
    
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
    
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`WorkflowContext`]
#[derive(Default)]
pub struct WorkflowContextBuilder {
    classifier: Option<Arc<dyn StructuredLlm>>,
    reasoner: Option<Arc<dyn ReasoningLoop>>,
    consolidator: Option<Arc<dyn StructuredLlm>>,
    tools: ToolRegistry,
    config: WorkflowConfig,
}

impl WorkflowContextBuilder {
    /// Use one structured collaborator for both classification and memory
    pub fn language_model(self, llm: Arc<dyn StructuredLlm>) -> Self {
        self.classifier(llm.clone()).consolidator(llm)
    }
    
    pub fn classifier(mut self, llm: Arc<dyn StructuredLlm>) -> Self {
        self.classifier = Some(llm);
        self
    }
    
    pub fn consolidator(mut self, llm: Arc<dyn StructuredLlm>) -> Self {
        self.consolidator = Some(llm);
        self
    }
    
    pub fn reasoner(mut self, reasoner: Arc<dyn ReasoningLoop>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }
    
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }
    
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }
    
    /// Fails with [`WorkflowError::Config`] if a collaborator is missing
    pub fn build(self) -> Result<WorkflowContext> {
        let classifier = self.classifier
            .ok_or_else(|| WorkflowError::Config("intent classifier is required".into()))?;
        let reasoner = self.reasoner
            .ok_or_else(|| WorkflowError::Config("reasoning loop is required".into()))?;
        let consolidator = self.consolidator
            .ok_or_else(|| WorkflowError::Config("memory consolidator is required".into()))?;
        
        Ok(WorkflowContext {
            classifier,
            reasoner,
            consolidator,
            tools: Arc::new(self.tools),
            config: self.config,
        })
    }
}
