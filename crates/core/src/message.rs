//! Message and Conversation domain types.
//!
//! A request enters as one user message; the pipeline appends the draft and
//! evaluator replies to a request-scoped [`Conversation`] that is never
//! persisted by this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a logical session (client-supplied or generated).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use the client-supplied id when it is non-blank, otherwise mint one.
    pub fn or_new(candidate: Option<&str>) -> Self {
        match candidate.map(str::trim) {
            Some(id) if !id.is_empty() => Self(id.to_string()),
            _ => Self::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    /// Tool execution result fed back to the completion capability
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,

    /// Tool invocations requested by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// For tool results: the call being answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    pub timestamp: DateTime<Utc>,

    /// Free-form annotations (which agent produced the message, etc.)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// An assistant turn that asks for tool invocations.
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<MessageToolCall>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        msg.tool_calls = calls;
        msg
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Tag the message with the agent that produced it.
    pub fn from_agent(mut self, label: &str) -> Self {
        self.metadata
            .insert("agent".into(), serde_json::Value::String(label.to_string()));
        self
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    pub id: String,
    pub name: String,

    /// Arguments as a JSON string, exactly as the capability produced them
    pub arguments: String,
}

/// Request-scoped, append-only conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: SessionId,
    messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a conversation from prior history plus the new question.
    pub fn seeded(session_id: SessionId, history: Vec<Message>, question: &str) -> Self {
        let mut conv = Self::new(session_id);
        conv.messages = history;
        conv.push(Message::user(question));
        conv
    }

    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Immutable copy handed to concurrent evaluators.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("¿Qué es la diligencia debida?");
        assert_eq!(msg.role, Role::User);
        assert!(msg.tool_calls.is_empty());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn tool_result_links_call() {
        let msg = Message::tool_result("call_7", "ok");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_7"));
    }

    #[test]
    fn agent_tag_is_recorded() {
        let msg = Message::assistant("draft").from_agent("initial");
        assert_eq!(msg.metadata["agent"], "initial");
    }

    #[test]
    fn session_id_falls_back_when_blank() {
        assert_eq!(SessionId::or_new(Some("abc")).as_str(), "abc");
        assert_ne!(SessionId::or_new(Some("  ")).as_str(), "  ");
        assert!(!SessionId::or_new(None).as_str().is_empty());
    }

    #[test]
    fn seeded_conversation_appends_question_last() {
        let conv = Conversation::seeded(
            SessionId::new(),
            vec![Message::user("previous"), Message::assistant("answer")],
            "new question",
        );
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[2].content, "new question");
        assert!(conv.updated_at >= conv.created_at);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut conv = Conversation::new(SessionId::new());
        conv.push(Message::user("q"));
        let snap = conv.snapshot();
        conv.push(Message::assistant("a"));
        assert_eq!(snap.len(), 1);
        assert_eq!(conv.len(), 2);
    }
}
