use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, CompletionError, CompletionService, Prompt};
use crate::config::CompletionConfig;

const ERROR_BODY_LIMIT: usize = 500;

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompletionService {
    client: Client,
    config: CompletionConfig,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletionService {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(CompletionError::Transport)?;
        Ok(Self { client, config })
    }
}

impl CompletionService for OpenAiCompletionService {
    fn complete(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::MissingApiKey {
                env_var: self.config.api_key_env.clone(),
            })?;

        let request = ChatCompletionRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: &prompt.messages,
        };
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .map_err(CompletionError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: truncate_chars(body.trim(), ERROR_BODY_LIMIT),
            });
        }

        let decoded = response
            .json::<ChatCompletionResponse>()
            .map_err(|error| CompletionError::MalformedResponse(error.to_string()))?;
        decoded
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| CompletionError::MalformedResponse("response has no choices".to_string()))
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let prefix = value.chars().take(max_chars.saturating_sub(3)).collect::<String>();
    format!("{prefix}...")
}
