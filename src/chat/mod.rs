//! Read-only assistant that answers questions about a tenant's stable.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    config::ChatConfig,
    error::{CHAT_BACKEND, CHAT_FAILED, CHAT_NOT_CONFIGURED},
    AppError,
};

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiClient;
pub use prompt::{build_prompt, system_instruction, StableSnapshot};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat backend is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The model answered without any text part.
    #[error("empty reply from model")]
    EmptyReply,
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotConfigured => {
                AppError::new(CHAT_NOT_CONFIGURED, "Gemini API key not configured")
            }
            other => AppError::new(CHAT_FAILED, "Failed to generate response")
                .with_cause(AppError::new(CHAT_BACKEND, other.to_string())),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `false` when no model can be reached; requests are refused up front.
    fn is_configured(&self) -> bool {
        true
    }

    async fn reply(&self, system: &str, prompt: &str) -> Result<String, ChatError>;
}

/// Backend used when no API key is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredChat;

#[async_trait]
impl ChatBackend for UnconfiguredChat {
    fn is_configured(&self) -> bool {
        false
    }

    async fn reply(&self, _system: &str, _prompt: &str) -> Result<String, ChatError> {
        Err(ChatError::NotConfigured)
    }
}

pub fn from_config(config: &ChatConfig) -> Result<Arc<dyn ChatBackend>, ChatError> {
    if !config.is_configured() {
        return Ok(Arc::new(UnconfiguredChat));
    }
    Ok(Arc::new(GeminiClient::new(config)?))
}
