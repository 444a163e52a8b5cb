//! Message-type detection.
//!
//! [`MessageKind::detect`] inspects which payload field a message carries and
//! returns the most specific kind. Service events (members joining, pinned
//! messages, payments, ...) win over ordinary content.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use herald_core::Message;

/// Returned when parsing an unknown kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown message kind: {0}")]
pub struct UnknownMessageKind(pub String);

/// Declares the enum, its wire names and the detection order in one place.
///
/// Each variant maps to the message field whose presence identifies it; the
/// listing order is the detection priority.
macro_rules! message_kinds {
    ($($(#[$meta:meta])* $variant:ident => $field:literal,)*) => {
        /// Classification of a message by its payload.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum MessageKind {
            $($(#[$meta])* $variant,)*
            /// No known payload field is present.
            Unknown,
        }

        impl MessageKind {
            const DETECTION_ORDER: &'static [MessageKind] = &[$(MessageKind::$variant,)*];

            /// The message field (and wire name) of this kind.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(MessageKind::$variant => $field,)*
                    MessageKind::Unknown => "unknown",
                }
            }
        }

        impl FromStr for MessageKind {
            type Err = UnknownMessageKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($field => Ok(MessageKind::$variant),)*
                    "unknown" => Ok(MessageKind::Unknown),
                    other => Err(UnknownMessageKind(other.to_string())),
                }
            }
        }
    };
}

message_kinds! {
    // Chat lifecycle
    NewChatMembers => "new_chat_members",
    LeftChatMember => "left_chat_member",
    NewChatTitle => "new_chat_title",
    NewChatPhoto => "new_chat_photo",
    DeleteChatPhoto => "delete_chat_photo",
    GroupChatCreated => "group_chat_created",
    SupergroupChatCreated => "supergroup_chat_created",
    ChannelChatCreated => "channel_chat_created",
    MessageAutoDeleteTimerChanged => "message_auto_delete_timer_changed",
    MigrateToChatId => "migrate_to_chat_id",
    MigrateFromChatId => "migrate_from_chat_id",
    PinnedMessage => "pinned_message",

    // Payments
    SuccessfulPayment => "successful_payment",
    RefundedPayment => "refunded_payment",

    // Misc service events
    UsersShared => "users_shared",
    ChatShared => "chat_shared",
    WriteAccessAllowed => "write_access_allowed",
    ProximityAlertTriggered => "proximity_alert_triggered",

    // Topics
    ForumTopicCreated => "forum_topic_created",
    ForumTopicEdited => "forum_topic_edited",
    ForumTopicClosed => "forum_topic_closed",
    ForumTopicReopened => "forum_topic_reopened",
    GeneralForumTopicHidden => "general_forum_topic_hidden",
    GeneralForumTopicUnhidden => "general_forum_topic_unhidden",

    // Video chats
    VideoChatScheduled => "video_chat_scheduled",
    VideoChatStarted => "video_chat_started",
    VideoChatEnded => "video_chat_ended",
    VideoChatParticipantsInvited => "video_chat_participants_invited",

    WebAppData => "web_app_data",
    BoostAdded => "boost_added",
    ChatBackgroundSet => "chat_background_set",

    // Gifts and giveaways
    GiveawayCompleted => "giveaway_completed",
    GiveawayCreated => "giveaway_created",
    GiveawayWinners => "giveaway_winners",
    Gift => "gift",
    UniqueGift => "unique_gift",

    PassportData => "passport_data",
    ConnectedWebsite => "connected_website",

    // Content
    Text => "text",
    Animation => "animation",
    Audio => "audio",
    Document => "document",
    Photo => "photo",
    Sticker => "sticker",
    Story => "story",
    Video => "video",
    VideoNote => "video_note",
    Voice => "voice",
    Contact => "contact",
    Dice => "dice",
    Game => "game",
    Poll => "poll",
    Venue => "venue",
    Location => "location",
    Invoice => "invoice",
    PaidMedia => "paid_media",
    Giveaway => "giveaway",
}

impl MessageKind {
    /// Returns the most specific kind of `message`.
    pub fn detect(message: &Message) -> Self {
        Self::DETECTION_ORDER
            .iter()
            .copied()
            .find(|kind| message.has(kind.as_str()))
            .unwrap_or(MessageKind::Unknown)
    }

    /// Returns `true` for service messages (everything that is not content).
    pub fn is_service(self) -> bool {
        let first_content = Self::DETECTION_ORDER
            .iter()
            .position(|k| *k == MessageKind::Text)
            .unwrap_or(Self::DETECTION_ORDER.len());
        Self::DETECTION_ORDER
            .iter()
            .position(|k| *k == self)
            .is_some_and(|pos| pos < first_content)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
