//! Inbound webhook payload.
//!
//! Deliberately lenient: every field is optional so a partial update still
//! parses, and the dispatcher decides what is usable.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub edited_message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub from: Option<Sender>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Update {
    /// Parse a raw webhook body. Anything that is not a JSON object yields `None`.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// The new message, or the edited one if there is no new message.
    pub fn into_message(self) -> Option<IncomingMessage> {
        self.message.or(self.edited_message)
    }
}

impl IncomingMessage {
    pub fn chat_id(&self) -> Option<i64> {
        self.chat.as_ref().and_then(|c| c.id)
    }

    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().and_then(|f| f.id)
    }

    pub fn username(&self) -> &str {
        self.from
            .as_ref()
            .and_then(|f| f.username.as_deref())
            .unwrap_or("")
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or("")
    }
}
