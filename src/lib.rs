//! Guildbot: a Discord assistant that bridges guild chatter to a
//! chat-completion endpoint.
//!
//! Inbound events become conversational turns; turns are batched with
//! per-channel context and submitted to the completion service; the reply is
//! scanned for an embedded direct-message directive, which is executed
//! before the text is relayed back to the originating channel.

pub mod actions;
pub mod config;
pub mod conversation;
pub mod directive;
pub mod engagement;
pub mod error;
pub mod health;
pub mod llm;
pub mod messaging;
pub mod orchestrator;
pub mod roster;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Identifier for one conversation surface: a guild channel, or the DM
/// channel of a private conversation. Stable for the surface's lifetime and
/// the sole key into the history store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(pub u64);

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConversationKey {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message-equivalent unit in a conversation history.
///
/// The speaker of a user turn is kept as a separate field rather than baked
/// into `content`; the attribution form the model sees is a rendering
/// decision made at the wire boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub speaker: Option<String>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            speaker: None,
        }
    }

    pub fn user(content: impl Into<String>, speaker: Option<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            speaker,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            speaker: None,
        }
    }
}
