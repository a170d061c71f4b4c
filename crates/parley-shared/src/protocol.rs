//! JSON bodies exchanged over the REST API.
//!
//! Request bodies keep every field optional so that a missing field turns
//! into a [`ValidationError`] instead of a deserialization failure. Each one
//! has a `validate` method producing the checked form.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Message, Role};

/// Treat empty strings the same as absent fields.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `POST /api/chats`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub title: Option<String>,
}

impl CreateChatRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }

    pub fn validate(self) -> Result<String, ValidationError> {
        required(self.title).ok_or(ValidationError::MissingField("Title"))
    }
}

/// `PATCH /api/chats/:id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenameChatRequest {
    #[serde(default)]
    pub title: Option<String>,
}

impl RenameChatRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }

    pub fn validate(self) -> Result<String, ValidationError> {
        required(self.title).ok_or(ValidationError::MissingField("Title"))
    }
}

/// `POST /api/chats/:id/messages`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl SendMessageRequest {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User.as_str().to_string()),
            content: Some(content.into()),
        }
    }

    pub fn validate(self) -> Result<(Role, String), ValidationError> {
        let (Some(role), Some(content)) = (required(self.role), required(self.content)) else {
            return Err(ValidationError::MissingFields("Role and content"));
        };
        Ok((role.parse()?, content))
    }
}

/// `POST /api/chats/:id/prompt`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendPromptRequest {
    #[serde(default)]
    pub content: Option<String>,
}

impl SendPromptRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    pub fn validate(self) -> Result<String, ValidationError> {
        required(self.content).ok_or(ValidationError::MissingField("Content"))
    }
}

/// Reply of `POST /api/chats/:id/prompt`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptReply {
    /// The text the user sent, echoed back.
    pub user_message: String,
    /// The stored assistant message.
    pub ai_message: Message,
}

/// `POST /api/prompts`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePromptRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl CreatePromptRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
        }
    }

    pub fn validate(self) -> Result<(String, String), ValidationError> {
        match (required(self.title), required(self.content)) {
            (Some(title), Some(content)) => Ok((title, content)),
            _ => Err(ValidationError::MissingFields("Title and content")),
        }
    }
}

/// Body of every non-success response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
