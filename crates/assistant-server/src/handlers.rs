//! HTTP Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use assistant_workflow::{NodeId, Route, SessionId, SessionState, StateUpdate, WorkflowError};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub ollama_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: SessionId,
    pub intent: Option<String>,
    pub next_step: Option<Route>,
    pub response: Option<Map<String, Value>>,
    pub tools_used: Vec<String>,
    pub actions_taken: Vec<String>,
    pub conversation_summary: String,
    pub active_documents: Option<Vec<String>>,
}

impl ChatResponse {
    fn from_state(session_id: SessionId, state: SessionState) -> Self {
        Self {
            session_id,
            intent: state.intent.map(|i| i.intent_type.as_str().to_string()),
            next_step: state.next_step,
            response: state.current_response,
            tools_used: state.tools_used,
            actions_taken: state.actions_taken,
            conversation_summary: state.conversation_summary,
            active_documents: state.active_documents,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckpointSummary {
    pub step: u64,
    pub node: NodeId,
    pub next_step: Option<Route>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn workflow_error(err: &WorkflowError) -> ApiError {
    let status = match err {
        WorkflowError::MissingInput { .. } => StatusCode::BAD_REQUEST,
        WorkflowError::ContractViolation { .. }
        | WorkflowError::SpecialistFailure { .. }
        | WorkflowError::Collaborator { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, kind = err.kind(), "Workflow error");
    }
    api_error(status, err.user_message(), err.kind())
}

fn session_id(raw: &str) -> Result<SessionId, ApiError> {
    let id = SessionId::from_string(raw);
    if id.is_portable() {
        Ok(id)
    } else {
        Err(api_error(StatusCode::BAD_REQUEST, "Invalid session id", "INVALID_SESSION_ID"))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ollama_connected = state.provider.health_check().await.unwrap_or(false);
    
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.model.clone(),
        ollama_connected,
    })
}

/// Run one conversational turn
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let id = match payload.session_id.as_deref() {
        Some(raw) => session_id(raw)?,
        None => SessionId::new(),
    };
    
    let mut input = StateUpdate::new().user_input(payload.message);
    if let Some(user_id) = payload.user_id {
        input = input.user_id(user_id);
    }
    
    let final_state = state
        .workflow
        .run(input, &id)
        .await
        .map_err(|e| workflow_error(&e))?;
    
    Ok(Json(ChatResponse::from_state(id, final_state)))
}

/// Latest checkpointed state of a session
pub async fn get_session(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<SessionState>, ApiError> {
    let id = session_id(&raw)?;
    match state.workflow.session(&id).map_err(|e| workflow_error(&e))? {
        Some(session) => Ok(Json(session)),
        None => Err(api_error(StatusCode::NOT_FOUND, "Session not found", "NOT_FOUND")),
    }
}

/// Checkpoint history of a session, oldest first
pub async fn list_checkpoints(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Vec<CheckpointSummary>>, ApiError> {
    let id = session_id(&raw)?;
    let history = state.workflow.checkpoints(&id).map_err(|e| workflow_error(&e))?;
    
    Ok(Json(
        history
            .into_iter()
            .map(|c| CheckpointSummary {
                step: c.step,
                node: c.node,
                next_step: c.state.next_step,
                created_at: c.created_at,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agent_core::provider::{Completion, ModelInfo, ProviderInfo};
    use agent_core::{
        AgentError, GenerationOptions, LlmProvider, Message, ReasoningLoop, ReasoningOutcome,
        ResponseSchema, StructuredLlm, ToolRegistry,
    };
    use assistant_workflow::{MemoryCheckpointStore, Workflow, WorkflowContext};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    struct OfflineProvider;

    #[async_trait]
    impl LlmProvider for OfflineProvider {
        async fn info(&self) -> agent_core::Result<ProviderInfo> {
            Ok(ProviderInfo { name: "offline".into(), models: vec![] })
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(false)
        }

        async fn complete(&self, _: &[Message], _: &GenerationOptions) -> agent_core::Result<Completion> {
            Err(AgentError::ProviderUnavailable("offline".into()))
        }

        async fn list_models(&self) -> agent_core::Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    /// Answers by schema name; the classifier always says "qa"
    struct CannedStructured;

    #[async_trait]
    impl StructuredLlm for CannedStructured {
        async fn invoke_structured(&self, _: &[Message], schema: &ResponseSchema) -> agent_core::Result<Value> {
            match schema.name.as_str() {
                "UserIntent" => Ok(json!({ "intent_type": "qa", "confidence": 0.9, "reasoning": "question" })),
                "UpdateMemoryResponse" => Ok(json!({ "summary": "User asked a question.", "document_ids": ["doc-1"] })),
                other => Err(AgentError::Parse(format!("unexpected schema {other}"))),
            }
        }
    }

    struct CannedReasoner {
        fail: bool,
    }

    #[async_trait]
    impl ReasoningLoop for CannedReasoner {
        async fn invoke(
            &self,
            messages: Vec<Message>,
            _: &ResponseSchema,
            _: &ToolRegistry,
        ) -> agent_core::Result<ReasoningOutcome> {
            if self.fail {
                return Err(AgentError::MaxIterations(10));
            }
            let question = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            let structured = json!({ "question": question, "answer": "42", "sources": [], "confidence": 0.8 });
            Ok(ReasoningOutcome {
                messages: vec![Message::user(question), Message::assistant(structured.to_string())],
                structured,
                tools_invoked: vec![],
            })
        }
    }

    fn app(fail: bool) -> axum::Router {
        let ctx = WorkflowContext::builder()
            .language_model(Arc::new(CannedStructured))
            .reasoner(Arc::new(CannedReasoner { fail }))
            .build()
            .unwrap();
        crate::router(AppState {
            workflow: Arc::new(Workflow::new(ctx, Arc::new(MemoryCheckpointStore::new()))),
            provider: Arc::new(OfflineProvider),
            model: "test-model".into(),
        })
    }

    async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn chat(body: Value) -> Request<Body> {
        Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(false), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["ollama_connected"], false);
    }

    #[tokio::test]
    async fn test_chat_turn_and_session_lookup() {
        let app = app(false);
        let (status, body) = send(&app, chat(json!({ "message": "What is six times seven?", "session_id": "s-1" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "s-1");
        assert_eq!(body["intent"], "qa");
        assert_eq!(body["next_step"], "end");
        assert_eq!(body["response"]["answer"], "42");
        assert_eq!(body["actions_taken"], json!(["classify_intent", "qa_agent", "update_memory"]));
        assert_eq!(body["active_documents"], json!(["doc-1"]));

        let (status, session) = send(&app, get("/api/sessions/s-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["conversation_summary"], "User asked a question.");

        let (status, history) = send(&app, get("/api/sessions/s-1/checkpoints")).await;
        assert_eq!(status, StatusCode::OK);
        let nodes: Vec<&str> = history.as_array().unwrap().iter().map(|c| c["node"].as_str().unwrap()).collect();
        assert_eq!(nodes, vec!["classify_intent", "qa_agent", "update_memory"]);
    }

    #[tokio::test]
    async fn test_new_session_gets_an_id() {
        let (status, body) = send(&app(false), chat(json!({ "message": "hello?" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["session_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let (status, body) = send(&app(false), chat(json!({ "message": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_INPUT");

        let (status, body) = send(&app(true), chat(json!({ "message": "hard question" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "SPECIALIST_FAILURE");

        let (status, body) = send(&app(false), get("/api/sessions/nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, body) = send(&app(false), chat(json!({ "message": "hi", "session_id": "a/b" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_SESSION_ID");

        let long_id = "a".repeat(SessionId::MAX_LEN + 1);
        let (status, body) = send(&app(false), chat(json!({ "message": "hi", "session_id": long_id }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_SESSION_ID");
    }
}
