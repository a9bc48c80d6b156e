use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// One side of an exchange as kept in short-term memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub role: TurnRole,
    pub text: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
}

impl TurnRecord {
    pub fn new(role: TurnRole, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text, chrono::Utc::now().timestamp())
    }
}
