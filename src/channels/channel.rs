//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// An inbound text message or button press.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Name of the channel it arrived on.
    pub channel: String,
    pub user_id: String,
    pub user_name: Option<String>,
    /// Typed text. Empty for button presses.
    pub content: String,
    /// Payload of the pressed button, if this is a button press.
    pub callback_data: Option<String>,
    /// Channel-specific routing data (e.g. `chat_id`).
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            user_id: user_id.into(),
            user_name: None,
            content: content.into(),
            callback_data: None,
            metadata: serde_json::json!({}),
            received_at: Utc::now(),
        }
    }

    /// A button press carrying `data`.
    pub fn callback(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(channel, user_id, "");
        msg.callback_data = Some(data.into());
        msg
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Chat the message belongs to: `metadata.chat_id`, else the user id.
    pub fn chat_id(&self) -> &str {
        self.metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.user_id)
    }

    /// Key of the conversation session: `<channel>:<chat id>`.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id())
    }
}

/// A button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    /// Payload delivered back as `IncomingMessage::callback_data`.
    pub data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// A reply to send back on the originating channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub content: String,
    /// Button rows, top to bottom.
    pub buttons: Vec<Vec<InlineButton>>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            buttons: Vec::new(),
        }
    }

    /// Attach buttons, one per row.
    pub fn with_button_column(mut self, buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        self.buttons = buttons.into_iter().map(|b| vec![b]).collect();
        self
    }

    /// All buttons in display order.
    pub fn flat_buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.buttons.iter().flatten()
    }
}

/// Progress notice sent while a long step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Waiting on the language model.
    Thinking(String),
    /// A short informational line.
    Status(String),
}

/// Stream of inbound messages from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, used for routing responses.
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a response to the chat `msg` came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Show a progress notice in the chat identified by `metadata`.
    async fn send_status(
        &self,
        status: StatusUpdate,
        metadata: &serde_json::Value,
    ) -> Result<(), ChannelError>;

    /// Check the channel can reach its backend.
    async fn health_check(&self) -> Result<(), ChannelError>;

    /// Stop the channel.
    async fn shutdown(&self) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_prefers_chat_id() {
        let msg = IncomingMessage::new("telegram", "42", "hi")
            .with_metadata(serde_json::json!({"chat_id": "-100123"}));
        assert_eq!(msg.session_key(), "telegram:-100123");
    }

    #[test]
    fn session_key_falls_back_to_user() {
        let msg = IncomingMessage::new("cli", "local-user", "hi");
        assert_eq!(msg.session_key(), "cli:local-user");
    }

    #[test]
    fn callback_message_has_no_text() {
        let msg = IncomingMessage::callback("telegram", "42", "trait_chatty");
        assert!(msg.content.is_empty());
        assert_eq!(msg.callback_data.as_deref(), Some("trait_chatty"));
    }

    #[test]
    fn button_column_is_one_per_row() {
        let resp = OutgoingResponse::text("pick").with_button_column([
            InlineButton::new("A", "a"),
            InlineButton::new("B", "b"),
        ]);
        assert_eq!(resp.buttons.len(), 2);
        let data: Vec<&str> = resp.flat_buttons().map(|b| b.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b"]);
    }
}
