//! Prompt Texts
//!
//! Instructions for each node. The structured collaborators append the JSON
//! format instructions themselves, so these only describe the task.

use agent_core::message::transcript;
use agent_core::Message;

pub const INTENT_CLASSIFICATION_PROMPT: &str = r#"You are an intent classifier for a document assistant.

Classify the user's latest message into exactly one intent:
- "qa": a question to be answered from documents or general knowledge
- "summarization": a request to summarize documents or earlier content
- "calculation": a request to compute or evaluate something numeric
- "unknown": anything else

Use the conversation history to resolve follow-ups such as "and the second one?".

Conversation history:
{conversation_history}

User message:
{user_input}"#;

pub const QA_SYSTEM_PROMPT: &str = r#"You are a careful document assistant answering questions.

Use the available tools to search documents before answering whenever the
question concerns document content. Cite the IDs of documents you relied on
in `sources`, and lower `confidence` when the evidence is thin."#;

pub const SUMMARIZATION_SYSTEM_PROMPT: &str = r#"You are a document assistant producing summaries.

Retrieve the documents the user refers to, then summarize them faithfully.
Report the length of the original text, the key points, and the IDs of every
document you summarized."#;

pub const CALCULATION_SYSTEM_PROMPT: &str = r#"You are a document assistant performing calculations.

Identify the expression the user wants evaluated, pulling numbers from
documents if needed. Always use the calculator tool rather than mental
arithmetic, and explain each step."#;

pub const MEMORY_SUMMARY_PROMPT: &str = r#"Summarize the conversation so far in a few sentences so it can be resumed later.

Also list the IDs of documents that are still relevant to the user's last
message. Leave the list empty if no documents are relevant."#;

const EMPTY_HISTORY: &str = "(no previous messages)";

/// Build the classifier request from the current input and history
pub fn intent_classification_messages(user_input: &str, history: &[Message]) -> Vec<Message> {
    let history = if history.is_empty() {
        EMPTY_HISTORY.to_string()
    } else {
        transcript(history)
    };
    
    let prompt = fill(
        INTENT_CLASSIFICATION_PROMPT,
        &[("{conversation_history}", history.as_str()), ("{user_input}", user_input)],
    );
    
    vec![Message::system(prompt)]
}

/// Substitute placeholders in a single scan of `template`. Substituted text
/// is never rescanned, so braces inside values come through verbatim.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// System instructions, then history, then the current input
pub fn chat_messages(system_prompt: &str, history: &[Message], user_input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user_input));
    messages
}

/// Consolidator request over the entire log
pub fn memory_messages(history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(MEMORY_SUMMARY_PROMPT));
    messages.extend(history.iter().cloned());
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::Role;

    #[test]
    fn test_classification_prompt_is_filled() {
        let messages = intent_classification_messages("What is 2 + 2?", &[]);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("What is 2 + 2?"));
        assert!(messages[0].content.contains(EMPTY_HISTORY));
        assert!(!messages[0].content.contains("{user_input}"));
    }

    #[test]
    fn test_braces_in_history_are_not_substituted() {
        let history = vec![
            Message::user("what does {user_input} mean in a template?"),
            Message::assistant("It is a placeholder, like {conversation_history}."),
        ];
        let prompt = &intent_classification_messages("CURRENT-TURN", &history)[0].content;

        assert_eq!(prompt.matches("CURRENT-TURN").count(), 1);
        assert!(prompt.contains("what does {user_input} mean in a template?"));
        assert!(prompt.contains("like {conversation_history}."));
        assert!(prompt.trim_end().ends_with("CURRENT-TURN"));
    }

    #[test]
    fn test_fill_leaves_unknown_braces() {
        let out = fill("{a} {b} {", &[("{a}", "x{b}")]);
        assert_eq!(out, "x{b} {b} {");
    }

    #[test]
    fn test_chat_messages_order() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let messages = chat_messages(QA_SYSTEM_PROMPT, &history, "next");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages.last().unwrap().content, "next");
    }
}
