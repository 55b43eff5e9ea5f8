use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{GenerateError, PromptRole, TextGenerator};
use crate::config::ApiConfig;
use crate::prompts::PromptSet;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_completion_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator for any server speaking the OpenAI `/chat/completions` API.
///
/// Calls block until the server answers: there is no request timeout and no
/// retry.
pub struct OpenAiCompatGenerator {
    client: Client,
    config: ApiConfig,
    prompts: PromptSet,
}

impl OpenAiCompatGenerator {
    pub fn new(config: ApiConfig, prompts: PromptSet) -> Result<Self, GenerateError> {
        let client = Client::builder().timeout(None::<Duration>).build()?;
        Ok(Self {
            client,
            config,
            prompts,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        )
    }
}

impl TextGenerator for OpenAiCompatGenerator {
    fn generate(&self, role: PromptRole, context: &str) -> Result<String, GenerateError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: self.prompts.template(role),
                },
                ChatMessage {
                    role: "user",
                    content: context,
                },
            ],
            max_completion_tokens: self.config.max_tokens,
        };

        debug!(role = %role, model = %self.config.model, "sending completion request");
        let mut builder = self.client.post(self.endpoint()).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            warn!(role = %role, status = status.as_u16(), "completion request rejected");
            return Err(GenerateError::Status {
                status: status.as_u16(),
                body,
            });
        }
        completion_text(&body)
    }
}

/// First choice's message content, trimmed
fn completion_text(body: &str) -> Result<String, GenerateError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(GenerateError::EmptyResponse)
}
