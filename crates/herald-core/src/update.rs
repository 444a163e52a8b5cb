//! Inbound update model.
//!
//! Only the fields the runtime itself routes on are typed. Everything else the
//! upstream sends is preserved verbatim in the flattened `extra` maps, so a
//! decoded update can be re-serialized without loss.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One inbound event from the messaging platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Monotonically increasing identifier assigned by the upstream.
    pub update_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_channel_post: Option<Message>,

    /// Callback query body, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<Value>,

    /// Any other update kinds.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Update {
    /// Creates an empty update with the given id.
    pub fn new(update_id: i64) -> Self {
        Self {
            update_id,
            ..Default::default()
        }
    }

    /// Attaches a message body.
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    /// Returns whichever message-like body this update carries.
    pub fn any_message(&self) -> Option<&Message> {
        self.message
            .as_ref()
            .or(self.edited_message.as_ref())
            .or(self.channel_post.as_ref())
            .or(self.edited_channel_post.as_ref())
    }
}

/// A chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,

    /// Unix timestamp.
    pub date: i64,

    pub chat: Chat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption_entities: Vec<MessageEntity>,

    /// Content and service fields (`photo`, `sticker`, `new_chat_members`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Creates a plain text message in `chat_id`.
    pub fn text(message_id: i64, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            message_id,
            chat: Chat::private(chat_id),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Returns `true` if the message carries a non-null `field`.
    ///
    /// Checks the typed fields first, then the flattened extras.
    pub fn has(&self, field: &str) -> bool {
        match field {
            "text" => self.text.is_some(),
            "caption" => self.caption.is_some(),
            "from" => self.from.is_some(),
            _ => self.extra.get(field).is_some_and(|v| !v.is_null()),
        }
    }

    /// Returns the first entity of `kind` in the text entities.
    pub fn first_entity(&self, kind: &str) -> Option<&MessageEntity> {
        self.entities.iter().find(|e| e.kind == kind)
    }
}

/// The chat a message belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,

    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Chat {
    /// A private chat with the given id.
    pub fn private(id: i64) -> Self {
        Self {
            id,
            kind: "private".to_string(),
            ..Default::default()
        }
    }
}

/// A user or bot account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    #[serde(default)]
    pub is_bot: bool,

    #[serde(default)]
    pub first_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A special span in a message text (command, mention, link, ...).
///
/// `offset` and `length` are counted in UTF-16 code units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

impl MessageEntity {
    pub const BOT_COMMAND: &'static str = "bot_command";

    /// A `bot_command` entity.
    pub fn bot_command(offset: usize, length: usize) -> Self {
        Self {
            kind: Self::BOT_COMMAND.to_string(),
            offset,
            length,
        }
    }

    pub fn is_bot_command(&self) -> bool {
        self.kind == Self::BOT_COMMAND
    }
}
