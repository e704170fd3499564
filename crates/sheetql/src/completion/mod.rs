//! The language-model completion capability: given a prompt, returns text or fails.

mod openai;

use serde::Serialize;
use thiserror::Error;

pub use openai::OpenAiCompletionService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Ordered chat messages sent in one completion call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Prompt {
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// All message contents joined, for logging and tests.
    #[must_use]
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no API key configured; set the {env_var} environment variable")]
    MissingApiKey { env_var: String },

    #[error("completion request failed")]
    Transport(#[source] reqwest::Error),

    #[error("completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response was malformed: {0}")]
    MalformedResponse(String),

    #[error("completion service unavailable: {0}")]
    Unavailable(String),
}

pub trait CompletionService {
    /// One call, no retries.
    fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError>;
}

impl<T: CompletionService + ?Sized> CompletionService for &T {
    fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        (**self).complete(prompt)
    }
}

impl<T: CompletionService + ?Sized> CompletionService for Box<T> {
    fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        (**self).complete(prompt)
    }
}
