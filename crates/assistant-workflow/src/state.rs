//! Session State & Merge Policy
//!
//! Every node returns a [`StateUpdate`]; [`merge`] folds it into the running
//! [`SessionState`] according to the per-field table in [`MERGE_POLICY`].

use std::collections::HashSet;

use agent_core::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, WorkflowError};
use crate::schemas::UserIntent;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Longest id usable as a file name or URL segment
    pub const MAX_LEN: usize = 128;
    
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    
    pub fn as_str(&self) -> &str {
        &self.0
    }
    
    /// Non-empty, at most [`Self::MAX_LEN`] bytes of ASCII letters, digits,
    /// `-` and `_`
    pub fn is_portable(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= Self::MAX_LEN
            && self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Routing target held in `next_step`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    QaAgent,
    SummarizationAgent,
    CalculationAgent,
    UpdateMemory,
    End,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::QaAgent => "qa_agent",
            Route::SummarizationAgent => "summarization_agent",
            Route::CalculationAgent => "calculation_agent",
            Route::UpdateMemory => "update_memory",
            Route::End => "end",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record threaded through every node of a turn
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub user_input: Option<String>,
    
    /// Whole conversation, append-only
    #[serde(default)]
    pub message_log: Vec<Message>,
    
    #[serde(default)]
    pub intent: Option<UserIntent>,
    
    #[serde(default)]
    pub next_step: Option<Route>,
    
    #[serde(default)]
    pub conversation_summary: String,
    
    /// Ordered, duplicate-free document IDs
    #[serde(default)]
    pub active_documents: Option<Vec<String>>,
    
    #[serde(default)]
    pub current_response: Option<Map<String, Value>>,
    
    #[serde(default)]
    pub tools_used: Vec<String>,
    
    /// Node names executed in the current turn, in order
    #[serde(default)]
    pub actions_taken: Vec<String>,
    
    #[serde(default)]
    pub session_id: Option<SessionId>,
    
    #[serde(default)]
    pub user_id: Option<String>,
}

impl SessionState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Default::default()
        }
    }
    
    /// Reset per-turn bookkeeping before a new invocation.
    ///
    /// `actions_taken` only ever grows through [`merge`], so the turn
    /// boundary is the one place it is cleared.
    pub fn begin_turn(&mut self) {
        self.actions_taken.clear();
        self.next_step = None;
    }
}

/// A node's partial update. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_log: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<UserIntent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_documents: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_response: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_taken: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Parse an update from loosely-typed JSON. Undeclared fields and
    /// ill-typed values are rejected, never coerced.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| WorkflowError::StateCorruption(format!("invalid partial update: {e}")))
    }
    
    pub fn user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = Some(input.into());
        self
    }
    
    pub fn append_messages(mut self, messages: Vec<Message>) -> Self {
        self.message_log.get_or_insert_with(Vec::new).extend(messages);
        self
    }
    
    pub fn intent(mut self, intent: UserIntent) -> Self {
        self.intent = Some(intent);
        self
    }
    
    pub fn next_step(mut self, route: Route) -> Self {
        self.next_step = Some(route);
        self
    }
    
    pub fn conversation_summary(mut self, summary: impl Into<String>) -> Self {
        self.conversation_summary = Some(summary.into());
        self
    }
    
    pub fn active_documents(mut self, documents: Vec<String>) -> Self {
        self.active_documents = Some(documents);
        self
    }
    
    pub fn current_response(mut self, response: Map<String, Value>) -> Self {
        self.current_response = Some(response);
        self
    }
    
    pub fn tools_used(mut self, tools: Vec<String>) -> Self {
        self.tools_used = Some(tools);
        self
    }
    
    /// Record that a node ran
    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.actions_taken.get_or_insert_with(Vec::new).push(name.into());
        self
    }
    
    pub fn session_id(mut self, id: SessionId) -> Self {
        self.session_id = Some(id);
        self
    }
    
    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }
    
    /// Fields carried by this update
    pub fn fields(&self) -> Vec<Field> {
        let present = [
            self.user_input.is_some(),
            self.message_log.is_some(),
            self.intent.is_some(),
            self.next_step.is_some(),
            self.conversation_summary.is_some(),
            self.active_documents.is_some(),
            self.current_response.is_some(),
            self.tools_used.is_some(),
            self.actions_taken.is_some(),
            self.session_id.is_some(),
            self.user_id.is_some(),
        ];
        Field::ALL
            .into_iter()
            .zip(present)
            .filter_map(|(field, set)| set.then_some(field))
            .collect()
    }
}

/// Declared state fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    UserInput,
    MessageLog,
    Intent,
    NextStep,
    ConversationSummary,
    ActiveDocuments,
    CurrentResponse,
    ToolsUsed,
    ActionsTaken,
    SessionId,
    UserId,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::UserInput,
        Field::MessageLog,
        Field::Intent,
        Field::NextStep,
        Field::ConversationSummary,
        Field::ActiveDocuments,
        Field::CurrentResponse,
        Field::ToolsUsed,
        Field::ActionsTaken,
        Field::SessionId,
        Field::UserId,
    ];
    
    pub fn as_str(self) -> &'static str {
        match self {
            Field::UserInput => "user_input",
            Field::MessageLog => "message_log",
            Field::Intent => "intent",
            Field::NextStep => "next_step",
            Field::ConversationSummary => "conversation_summary",
            Field::ActiveDocuments => "active_documents",
            Field::CurrentResponse => "current_response",
            Field::ToolsUsed => "tools_used",
            Field::ActionsTaken => "actions_taken",
            Field::SessionId => "session_id",
            Field::UserId => "user_id",
        }
    }
    
    /// Policy from [`MERGE_POLICY`]
    pub fn policy(self) -> MergePolicy {
        MERGE_POLICY
            .iter()
            .find(|(field, _)| *field == self)
            .map_or(MergePolicy::Replace, |(_, policy)| *policy)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an incoming value combines with the current one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// New value overwrites the old
    Replace,
    /// New entries are concatenated after the existing ones
    Append,
    /// May be set once; later updates must carry the same value
    Immutable,
}

pub const MERGE_POLICY: [(Field, MergePolicy); 11] = [
    (Field::UserInput, MergePolicy::Replace),
    (Field::MessageLog, MergePolicy::Append),
    (Field::Intent, MergePolicy::Replace),
    (Field::NextStep, MergePolicy::Replace),
    (Field::ConversationSummary, MergePolicy::Replace),
    (Field::ActiveDocuments, MergePolicy::Replace),
    (Field::CurrentResponse, MergePolicy::Replace),
    (Field::ToolsUsed, MergePolicy::Replace),
    (Field::ActionsTaken, MergePolicy::Append),
    (Field::SessionId, MergePolicy::Immutable),
    (Field::UserId, MergePolicy::Immutable),
];

/// Storage slot a policy can act on
trait Slot: PartialEq {
    /// Concatenate `other`; `false` if the slot is not a sequence
    fn append(&mut self, other: Self) -> bool;
    
    fn is_unset(&self) -> bool;
}

impl<T: PartialEq> Slot for Vec<T> {
    fn append(&mut self, other: Self) -> bool {
        self.extend(other);
        true
    }
    
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<T: PartialEq> Slot for Option<T> {
    fn append(&mut self, _other: Self) -> bool {
        false
    }
    
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl Slot for String {
    fn append(&mut self, _other: Self) -> bool {
        false
    }
    
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

fn apply<T: Slot>(field: Field, slot: &mut T, value: Option<T>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    
    match field.policy() {
        MergePolicy::Replace => *slot = value,
        MergePolicy::Append => {
            if !slot.append(value) {
                return Err(WorkflowError::StateCorruption(format!(
                    "`{field}` is not a sequence and cannot be appended"
                )));
            }
        }
        MergePolicy::Immutable => {
            if slot.is_unset() {
                *slot = value;
            } else if *slot != value {
                return Err(WorkflowError::StateCorruption(format!(
                    "`{field}` is immutable once set"
                )));
            }
        }
    }
    
    Ok(())
}

/// Value-level checks the type system does not cover
fn validate(update: &StateUpdate) -> Result<()> {
    if let Some(intent) = &update.intent {
        if !(0.0..=1.0).contains(&intent.confidence) {
            return Err(WorkflowError::StateCorruption(format!(
                "`intent.confidence` out of range: {}",
                intent.confidence
            )));
        }
    }
    
    if let Some(documents) = &update.active_documents {
        let mut seen = HashSet::new();
        if let Some(dup) = documents.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(WorkflowError::StateCorruption(format!(
                "`active_documents` contains duplicate id `{dup}`"
            )));
        }
    }
    
    Ok(())
}

/// Fold a partial update into the state. On error the update is rejected
/// as a whole and the caller's state is not modified.
pub fn merge(state: &SessionState, update: StateUpdate) -> Result<SessionState> {
    validate(&update)?;
    
    let StateUpdate {
        user_input,
        message_log,
        intent,
        next_step,
        conversation_summary,
        active_documents,
        current_response,
        tools_used,
        actions_taken,
        session_id,
        user_id,
    } = update;
    
    let mut next = state.clone();
    apply(Field::UserInput, &mut next.user_input, user_input.map(Some))?;
    apply(Field::MessageLog, &mut next.message_log, message_log)?;
    apply(Field::Intent, &mut next.intent, intent.map(Some))?;
    apply(Field::NextStep, &mut next.next_step, next_step.map(Some))?;
    apply(Field::ConversationSummary, &mut next.conversation_summary, conversation_summary)?;
    apply(Field::ActiveDocuments, &mut next.active_documents, active_documents.map(Some))?;
    apply(Field::CurrentResponse, &mut next.current_response, current_response.map(Some))?;
    apply(Field::ToolsUsed, &mut next.tools_used, tools_used)?;
    apply(Field::ActionsTaken, &mut next.actions_taken, actions_taken)?;
    apply(Field::SessionId, &mut next.session_id, session_id.map(Some))?;
    apply(Field::UserId, &mut next.user_id, user_id.map(Some))?;
    
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::IntentType;
    use serde_json::json;

    fn intent(confidence: f64) -> UserIntent {
        UserIntent {
            intent_type: IntentType::Qa,
            confidence,
            reasoning: "asks a question".into(),
        }
    }

    fn full_replace_update() -> StateUpdate {
        let mut response = Map::new();
        response.insert("answer".into(), json!("Paris"));
        StateUpdate::new()
            .user_input("What is the capital of France?")
            .intent(intent(0.9))
            .next_step(Route::QaAgent)
            .conversation_summary("User asked about France.")
            .active_documents(vec!["doc-1".into(), "doc-2".into()])
            .current_response(response)
            .tools_used(vec!["search".into()])
    }

    #[test]
    fn test_policy_table_covers_every_field_once() {
        for field in Field::ALL {
            let entries = MERGE_POLICY.iter().filter(|(f, _)| *f == field).count();
            assert_eq!(entries, 1, "{field} should have exactly one policy");
        }
        assert_eq!(Field::MessageLog.policy(), MergePolicy::Append);
        assert_eq!(Field::ActionsTaken.policy(), MergePolicy::Append);
        assert_eq!(Field::ToolsUsed.policy(), MergePolicy::Replace);
    }

    #[test]
    fn test_replace_fields_are_idempotent() {
        let base = SessionState::new(SessionId::from_string("s-1"));
        let once = merge(&base, full_replace_update()).unwrap();
        let twice = merge(&once, full_replace_update()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_overwrites() {
        let base = merge(&SessionState::default(), StateUpdate::new().tools_used(vec!["a".into(), "b".into()])).unwrap();
        let next = merge(&base, StateUpdate::new().tools_used(vec!["c".into()])).unwrap();
        assert_eq!(next.tools_used, vec!["c".to_string()]);
    }

    #[test]
    fn test_message_log_appends_in_order() {
        let m0 = Message::user("first");
        let m1 = Message::assistant("second");
        let m2 = Message::user("second");

        let state = merge(&SessionState::default(), StateUpdate::new().append_messages(vec![m0.clone()])).unwrap();
        let state = merge(&state, StateUpdate::new().append_messages(vec![m1.clone()])).unwrap();
        let state = merge(&state, StateUpdate::new().append_messages(vec![m2.clone()])).unwrap();
        // replaying the same message is not deduplicated
        let state = merge(&state, StateUpdate::new().append_messages(vec![m2.clone()])).unwrap();

        assert_eq!(state.message_log, vec![m0, m1, m2.clone(), m2]);
    }

    #[test]
    fn test_actions_accumulate() {
        let state = merge(&SessionState::default(), StateUpdate::new().action("classify_intent")).unwrap();
        let state = merge(&state, StateUpdate::new().action("qa_agent")).unwrap();
        let state = merge(&state, StateUpdate::new().tools_used(Vec::new())).unwrap();
        assert_eq!(state.actions_taken, vec!["classify_intent", "qa_agent"]);
    }

    #[test]
    fn test_portable_session_ids() {
        assert!(SessionId::new().is_portable());
        assert!(SessionId::from_string("user_7-chat").is_portable());
        assert!(SessionId::from_string("a".repeat(SessionId::MAX_LEN)).is_portable());
        assert!(!SessionId::from_string("a".repeat(SessionId::MAX_LEN + 1)).is_portable());
        assert!(!SessionId::from_string("").is_portable());
        assert!(!SessionId::from_string("../etc").is_portable());
    }

    #[test]
    fn test_session_id_is_immutable() {
        let state = SessionState::new(SessionId::from_string("s-1"));
        let same = merge(&state, StateUpdate::new().session_id(SessionId::from_string("s-1")));
        assert!(same.is_ok());

        let other = merge(&state, StateUpdate::new().session_id(SessionId::from_string("s-2")));
        assert!(matches!(other, Err(WorkflowError::StateCorruption(_))));

        let state = merge(&state, StateUpdate::new().user_id("u-1")).unwrap();
        assert!(merge(&state, StateUpdate::new().user_id("u-2")).is_err());
    }

    #[test]
    fn test_rejected_update_leaves_state_untouched() {
        let state = SessionState::new(SessionId::from_string("s-1"));
        let update = StateUpdate::new()
            .conversation_summary("should not land")
            .session_id(SessionId::from_string("other"));
        assert!(merge(&state, update).is_err());
        assert!(state.conversation_summary.is_empty());
    }

    #[test]
    fn test_value_checks() {
        let bad_intent = merge(&SessionState::default(), StateUpdate::new().intent(intent(1.2)));
        assert!(matches!(bad_intent, Err(WorkflowError::StateCorruption(_))));

        let dup_docs = merge(
            &SessionState::default(),
            StateUpdate::new().active_documents(vec!["d".into(), "d".into()]),
        );
        assert!(matches!(dup_docs, Err(WorkflowError::StateCorruption(_))));
    }

    #[test]
    fn test_from_value_rejects_unknown_and_ill_typed_fields() {
        let unknown = StateUpdate::from_value(json!({"mood": "happy"}));
        assert!(matches!(unknown, Err(WorkflowError::StateCorruption(_))));

        let ill_typed = StateUpdate::from_value(json!({"tools_used": "search"}));
        assert!(matches!(ill_typed, Err(WorkflowError::StateCorruption(_))));

        let bad_route = StateUpdate::from_value(json!({"next_step": "poetry_agent"}));
        assert!(matches!(bad_route, Err(WorkflowError::StateCorruption(_))));

        let ok = StateUpdate::from_value(json!({"next_step": "update_memory", "actions_taken": ["qa_agent"]})).unwrap();
        assert_eq!(ok.fields(), vec![Field::NextStep, Field::ActionsTaken]);
    }

    #[test]
    fn test_route_serde_names() {
        assert_eq!(serde_json::to_value(Route::QaAgent).unwrap(), json!("qa_agent"));
        assert_eq!(serde_json::to_value(Route::End).unwrap(), json!("end"));
        for route in [Route::QaAgent, Route::SummarizationAgent, Route::CalculationAgent, Route::UpdateMemory, Route::End] {
            assert_eq!(serde_json::to_value(route).unwrap(), json!(route.as_str()));
        }
    }

    #[test]
    fn test_begin_turn_resets_bookkeeping() {
        let mut state = merge(
            &SessionState::default(),
            StateUpdate::new().action("classify_intent").next_step(Route::End).conversation_summary("kept"),
        )
        .unwrap();
        state.begin_turn();
        assert!(state.actions_taken.is_empty());
        assert!(state.next_step.is_none());
        assert_eq!(state.conversation_summary, "kept");
    }
}
