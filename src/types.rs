use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;

static LOCAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Identity of a message in the local list.
///
/// Messages created on this side carry a `Local` id until a refetch replaces
/// them with the persisted copy, which carries the backend's id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum MessageId {
    Local(u64),
    Server(String),
}

// Anything arriving over the wire is a server id, whether it is encoded as a
// string or a number.
impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => MessageId::Server(id),
            RawId::Number(id) => MessageId::Server(id.to_string()),
        })
    }
}

impl MessageId {
    pub fn next_local() -> Self {
        MessageId::Local(LOCAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MessageId::Local(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Local(id) => write!(f, "local-{id}"),
            MessageId::Server(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_used: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::next_local(),
            role: Role::User,
            content: content.into(),
            is_streaming: false,
            agent_used: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn assistant_placeholder(id: MessageId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            is_streaming: true,
            agent_used: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Appends a streamed fragment. Finalized messages are immutable, so the
    /// fragment is dropped and `false` returned.
    pub fn append(&mut self, fragment: &str) -> bool {
        if !self.is_streaming {
            return false;
        }
        self.content.push_str(fragment);
        true
    }

    pub fn finalize(&mut self) {
        self.is_streaming = false;
    }
}

/// Body of the request that opens a chat stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}
