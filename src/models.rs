//! Data models and structures
//!
//! Defines the chat turns accepted by the relay, the uniform result shape
//! returned to callers, and environment-driven configuration.

use serde::{Deserialize, Serialize, Serializer};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Image reference inside a multipart turn; `url` is a data URI or URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One content segment in a vision-augmented turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Turn content: plain text or an ordered list of parts.
///
/// Variant order matters for `#[serde(untagged)]` decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One role-tagged chat message as sent by the tutoring UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: TurnContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatTurn {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: TurnContent::Text(content.into()),
            name: None,
        }
    }

    /// Short, log-safe rendering of the turn's content.
    pub fn preview(&self, max_chars: usize) -> String {
        let flattened = match &self.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => text.as_str(),
                    ContentPart::ImageUrl { .. } => "[image]",
                })
                .collect::<Vec<_>>()
                .join(" "),
        };
        flattened.chars().take(max_chars).collect()
    }
}

/// A validated turn paired with the exact JSON the caller sent.
///
/// Serializes as `raw`, so fields `ChatTurn` does not model still reach the
/// provider untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundTurn {
    pub turn: ChatTurn,
    pub raw: serde_json::Value,
}

impl InboundTurn {
    /// Validate `raw` as a `ChatTurn`, keeping the original value.
    pub fn from_value(raw: serde_json::Value) -> serde_json::Result<Self> {
        let turn = ChatTurn::deserialize(&raw)?;
        Ok(Self { turn, raw })
    }

    pub fn text(role: Role, content: impl Into<String>) -> Self {
        let turn = ChatTurn::text(role, content);
        let mut raw = serde_json::Map::new();
        raw.insert(
            "role".to_string(),
            serde_json::Value::String(role.as_str().to_string()),
        );
        if let TurnContent::Text(text) = &turn.content {
            raw.insert(
                "content".to_string(),
                serde_json::Value::String(text.clone()),
            );
        }
        Self {
            turn,
            raw: serde_json::Value::Object(raw),
        }
    }
}

impl Serialize for InboundTurn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// Body returned to the caller: exactly one of `reply` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionResult {
    Reply(String),
    Error(String),
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub bind_addr: SocketAddr,
    pub upstream_timeout: Duration,
    pub cors_allowed_origins: String,
    pub max_body_bytes: usize,
}

/// A missing `.env` is fine; an unreadable or malformed one is not.
fn check_dotenv<T>(result: std::result::Result<T, dotenvy::Error>) -> crate::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        check_dotenv(dotenvy::dotenv())?;
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| crate::Error::Config("OPENAI_API_KEY not set".to_string()))?;

        let bind_addr = lookup("RELAY_BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3001".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| crate::Error::Config(format!("Invalid RELAY_BIND_ADDR: {}", e)))?;

        let timeout_secs = lookup("UPSTREAM_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| {
                    crate::Error::Config(format!("Invalid UPSTREAM_TIMEOUT_SECS: {}", e))
                })
            })
            .transpose()?
            .unwrap_or(30);

        let max_body_bytes = lookup("MAX_BODY_BYTES")
            .map(|raw| {
                raw.parse::<usize>()
                    .map_err(|e| crate::Error::Config(format!("Invalid MAX_BODY_BYTES: {}", e)))
            })
            .transpose()?
            .unwrap_or(10 * 1024 * 1024);

        Ok(Self {
            openai_api_key,
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            bind_addr,
            upstream_timeout: Duration::from_secs(timeout_secs),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string()),
            max_body_bytes,
        })
    }
}
