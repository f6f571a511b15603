//! Intent classification and the routing table

use agent_core::structured::invoke_typed;

use super::{require_input, structured_error, NodeId};
use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::prompts::intent_classification_messages;
use crate::schemas::{IntentType, StructuredResponse, UserIntent};
use crate::state::{Route, SessionState, StateUpdate};

/// Routing table. `unknown` falls back to question answering.
pub fn route_for(intent_type: IntentType) -> Route {
    match intent_type {
        IntentType::Qa => Route::QaAgent,
        IntentType::Summarization => Route::SummarizationAgent,
        IntentType::Calculation => Route::CalculationAgent,
        IntentType::Unknown => Route::QaAgent,
    }
}

pub async fn classify_intent(state: &SessionState, ctx: &WorkflowContext) -> Result<StateUpdate> {
    const NODE: NodeId = NodeId::ClassifyIntent;
    let user_input = require_input(state, NODE)?;
    
    let messages = intent_classification_messages(user_input, &state.message_log);
    let intent: UserIntent = invoke_typed(ctx.classifier(), &messages, &UserIntent::schema())
        .await
        .map_err(|e| structured_error(NODE, e))?;
    intent
        .validate()
        .map_err(|reason| WorkflowError::ContractViolation { node: NODE.as_str(), reason })?;
    
    let route = route_for(intent.intent_type);
    if intent.confidence < ctx.config().low_confidence_threshold {
        tracing::warn!(
            intent = %intent.intent_type,
            confidence = intent.confidence,
            %route,
            "Low-confidence classification"
        );
    }
    tracing::info!(intent = %intent.intent_type, confidence = intent.confidence, %route, "Intent classified");
    
    Ok(StateUpdate::new()
        .intent(intent)
        .next_step(route)
        .action(NODE.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, intent_reply, ScriptedReasoner, ScriptedStructured};
    use agent_core::{AgentError, Message};

    fn state(input: &str) -> SessionState {
        SessionState {
            user_input: Some(input.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_routing_table_is_total() {
        let routes: Vec<Route> = IntentType::ALL.into_iter().map(route_for).collect();
        assert_eq!(
            routes,
            vec![Route::QaAgent, Route::SummarizationAgent, Route::CalculationAgent, Route::QaAgent]
        );
    }

    #[tokio::test]
    async fn test_classify_each_intent() {
        for (kind, expected) in [
            ("qa", Route::QaAgent),
            ("summarization", Route::SummarizationAgent),
            ("calculation", Route::CalculationAgent),
            ("unknown", Route::QaAgent),
        ] {
            let classifier = ScriptedStructured::new(vec![intent_reply(kind, 0.8)]);
            let ctx = context(classifier, ScriptedReasoner::new(Vec::new()), ScriptedStructured::new(Vec::new()));

            let update = classify_intent(&state("something"), &ctx).await.unwrap();
            assert_eq!(update.next_step, Some(expected), "intent {kind}");
            assert_eq!(update.actions_taken, Some(vec!["classify_intent".to_string()]));
            assert_eq!(update.intent.unwrap().intent_type.as_str(), kind);
        }
    }

    #[tokio::test]
    async fn test_low_confidence_does_not_change_route() {
        let classifier = ScriptedStructured::new(vec![intent_reply("calculation", 0.05)]);
        let ctx = context(classifier, ScriptedReasoner::new(Vec::new()), ScriptedStructured::new(Vec::new()));

        let update = classify_intent(&state("2 + 2"), &ctx).await.unwrap();
        assert_eq!(update.next_step, Some(Route::CalculationAgent));
    }

    #[tokio::test]
    async fn test_history_is_included_in_prompt() {
        let classifier = ScriptedStructured::new(vec![intent_reply("qa", 0.9)]);
        let ctx = context(classifier.clone(), ScriptedReasoner::new(Vec::new()), ScriptedStructured::new(Vec::new()));
        let mut current = state("and its population?");
        current.message_log = vec![Message::user("What is the capital of France?"), Message::assistant("Paris")];

        classify_intent(&current, &ctx).await.unwrap();

        let requests = classifier.requests.lock().unwrap();
        let (schema, messages) = &requests[0];
        assert_eq!(schema, "UserIntent");
        assert!(messages[0].content.contains("capital of France"));
        assert!(messages[0].content.contains("and its population?"));
    }

    #[tokio::test]
    async fn test_missing_input_skips_collaborator() {
        let classifier = ScriptedStructured::new(vec![intent_reply("qa", 0.9)]);
        let ctx = context(classifier.clone(), ScriptedReasoner::new(Vec::new()), ScriptedStructured::new(Vec::new()));

        let err = classify_intent(&state("   "), &ctx).await.unwrap_err();
        assert!(matches!(err, WorkflowError::MissingInput { .. }));
        assert_eq!(classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_classification_is_contract_violation() {
        let classifier = ScriptedStructured::new(vec![
            Ok(serde_json::json!({"intent_type": "poetry", "confidence": 0.9, "reasoning": "?"})),
            intent_reply("qa", 3.0),
            Err(AgentError::ProviderUnavailable("connection refused".into())),
        ]);
        let ctx = context(classifier, ScriptedReasoner::new(Vec::new()), ScriptedStructured::new(Vec::new()));

        let unknown_variant = classify_intent(&state("hi"), &ctx).await.unwrap_err();
        assert!(matches!(unknown_variant, WorkflowError::ContractViolation { .. }));

        let out_of_range = classify_intent(&state("hi"), &ctx).await.unwrap_err();
        assert!(matches!(out_of_range, WorkflowError::ContractViolation { .. }));

        let transport = classify_intent(&state("hi"), &ctx).await.unwrap_err();
        assert!(matches!(transport, WorkflowError::Collaborator { .. }));
    }
}
