//! The conversation transcript.
//!
//! A [`Transcript`] is an append-only, ordered list of [`ChatMessage`]s.  Model replies are
//! opened as placeholders and then filled in place, by id, as fragments arrive.  Messages are
//! never removed or reordered.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::types::{Content, Role};
use crate::utils;

/// Session-unique, monotonically increasing message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// The raw sequence number.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Lifecycle of a message.
///
/// Only model placeholders pass through `Pending` and `Streaming`; every other message is
/// created `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    /// Placeholder opened, no fragment received yet.
    Pending,
    /// At least one fragment received, stream still open.
    Streaming,
    /// Complete.
    Done,
    /// The stream feeding this placeholder failed or was interrupted.
    Failed,
}

impl MessageState {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageState::Done | MessageState::Failed)
    }
}

/// One entry of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable identifier.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Display text accumulated so far.
    pub text: String,
    /// Lifecycle state.
    pub state: MessageState,
    /// When the message was appended.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl ChatMessage {
    /// True while a reply placeholder waits for its first fragment.
    pub fn is_thinking(&self) -> bool {
        self.state == MessageState::Pending
    }

    /// True while the message can still change.
    pub fn is_in_flight(&self) -> bool {
        !self.state.is_terminal()
    }

    /// The message as a request turn.
    pub fn to_content(&self) -> Content {
        Content::new(self.role, self.text.clone())
    }
}

/// Ordered chat history for one session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transcript that opens with a model greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(Role::Model, greeting.into(), MessageState::Done);
        transcript
    }

    fn push(&mut self, role: Role, text: String, state: MessageState) -> MessageId {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.messages.push(ChatMessage {
            id,
            role,
            text,
            state,
            created_at: utils::time::now(),
        });
        id
    }

    /// Append a finished user message.
    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::User, text.into(), MessageState::Done)
    }

    /// Append a finished model message, e.g. a fallback notice.
    pub fn push_model(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::Model, text.into(), MessageState::Done)
    }

    /// Open an empty model placeholder in the `Pending` state.
    ///
    /// Fails if another message is still in flight.
    pub fn open_placeholder(&mut self) -> Result<MessageId> {
        if let Some(id) = self.in_flight() {
            return Err(Error::validation(
                format!("{id} is still in flight"),
                Some("placeholder".to_string()),
            ));
        }
        Ok(self.push(Role::Model, String::new(), MessageState::Pending))
    }

    fn get_mut(&mut self, id: MessageId) -> Result<&mut ChatMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::validation(format!("no message {id}"), Some("id".to_string())))
    }

    fn in_flight_mut(&mut self, id: MessageId) -> Result<&mut ChatMessage> {
        let message = self.get_mut(id)?;
        if message.role == Role::User {
            return Err(Error::validation(
                format!("{id} is a user message and cannot change"),
                Some("id".to_string()),
            ));
        }
        if message.state.is_terminal() {
            return Err(Error::validation(
                format!("{id} is already {:?}", message.state),
                Some("state".to_string()),
            ));
        }
        Ok(message)
    }

    /// Append a streamed fragment to an in-flight placeholder.
    pub fn append_fragment(&mut self, id: MessageId, fragment: &str) -> Result<()> {
        let message = self.in_flight_mut(id)?;
        message.text.push_str(fragment);
        message.state = MessageState::Streaming;
        Ok(())
    }

    /// Mark an in-flight placeholder complete.  An empty reply is valid.
    pub fn finish(&mut self, id: MessageId) -> Result<()> {
        self.in_flight_mut(id)?.state = MessageState::Done;
        Ok(())
    }

    /// Mark an in-flight placeholder failed, keeping any text received so far.
    pub fn fail(&mut self, id: MessageId) -> Result<()> {
        self.in_flight_mut(id)?.state = MessageState::Failed;
        Ok(())
    }

    /// Look up a message by id.
    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// The in-flight message, if any.
    pub fn in_flight(&self) -> Option<MessageId> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_in_flight())
            .map(|m| m.id)
    }

    /// All messages, in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if no message has been appended.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The transcript as request history, oldest first.
    ///
    /// Messages without text are skipped; the service rejects empty parts.
    pub fn history(&self) -> Vec<Content> {
        self.messages
            .iter()
            .filter(|m| !m.text.is_empty())
            .map(ChatMessage::to_content)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut transcript = Transcript::new();
        let a = transcript.push_user("one");
        let b = transcript.push_model("two");
        let c = transcript.push_user("three");
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), "msg-1");
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn placeholder_lifecycle() {
        let mut transcript = Transcript::new();
        transcript.push_user("What is CGPA?");
        let id = transcript.open_placeholder().unwrap();

        let placeholder = transcript.get(id).unwrap();
        assert!(placeholder.is_thinking());
        assert_eq!(placeholder.text, "");
        assert_eq!(transcript.in_flight(), Some(id));

        transcript.append_fragment(id, "CGPA ").unwrap();
        assert!(!transcript.get(id).unwrap().is_thinking());
        assert_eq!(transcript.get(id).unwrap().state, MessageState::Streaming);
        transcript.append_fragment(id, "is your ").unwrap();
        transcript.finish(id).unwrap();

        let reply = transcript.get(id).unwrap();
        assert_eq!(reply.text, "CGPA is your ");
        assert_eq!(reply.state, MessageState::Done);
        assert_eq!(transcript.in_flight(), None);
    }

    #[test]
    fn empty_reply_is_valid() {
        let mut transcript = Transcript::new();
        let id = transcript.open_placeholder().unwrap();
        transcript.finish(id).unwrap();
        let reply = transcript.get(id).unwrap();
        assert_eq!(reply.text, "");
        assert!(!reply.is_thinking());
    }

    #[test]
    fn only_one_in_flight() {
        let mut transcript = Transcript::new();
        transcript.open_placeholder().unwrap();
        let err = transcript.open_placeholder().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn user_messages_are_immutable() {
        let mut transcript = Transcript::new();
        let id = transcript.push_user("hello");
        assert!(transcript.append_fragment(id, "!").unwrap_err().is_validation());
        assert!(transcript.fail(id).unwrap_err().is_validation());
        assert_eq!(transcript.get(id).unwrap().text, "hello");
    }

    #[test]
    fn terminal_messages_reject_fragments() {
        let mut transcript = Transcript::new();
        let id = transcript.open_placeholder().unwrap();
        transcript.append_fragment(id, "partial").unwrap();
        transcript.fail(id).unwrap();
        assert!(transcript.append_fragment(id, "more").is_err());
        assert!(transcript.finish(id).is_err());

        let failed = transcript.get(id).unwrap();
        assert_eq!(failed.text, "partial");
        assert_eq!(failed.state, MessageState::Failed);
    }

    #[test]
    fn unknown_id() {
        let mut transcript = Transcript::new();
        let id = transcript.push_user("x");
        let mut other = Transcript::new();
        assert!(other.finish(id).is_err());
    }

    #[test]
    fn history_skips_empty_messages() {
        let mut transcript = Transcript::with_greeting("Hello!");
        transcript.push_user("first");
        let failed = transcript.open_placeholder().unwrap();
        transcript.fail(failed).unwrap();
        transcript.push_model("fallback");

        let history = transcript.history();
        assert_eq!(
            history,
            vec![
                Content::model("Hello!"),
                Content::user("first"),
                Content::model("fallback"),
            ]
        );
    }

    #[test]
    fn message_json_shape() {
        let mut transcript = Transcript::new();
        let id = transcript.open_placeholder().unwrap();
        let json = serde_json::to_value(transcript.get(id).unwrap()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["role"], "model");
        assert_eq!(json["state"], "pending");
        assert!(json["created_at"].is_string());
    }
}
