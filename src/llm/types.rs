//! Request and response bodies for the OpenAI-compatible chat completions
//! endpoint used for enrichment.

use serde::{Deserialize, Serialize};

use super::error::LlmError;

/// Request body: a model identifier plus the ordered conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    /// System instruction first, then the user text to enrich.
    pub fn new(model: &str, system_prompt: &str, user_text: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: "system".into(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".into(),
                    content: user_text.to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    pub content: String,
}

/// Response envelope. Only `choices[0].message.content` is required; the
/// remaining fields are informational and may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Decode a 200 body and take the content of the first choice.
    pub fn first_content(body: &[u8]) -> Result<String, LlmError> {
        let response: ChatResponse =
            serde_json::from_slice(body).map_err(|e| LlmError::Decode(e.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Decode("no choices found in response".into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default)]
    pub total_time: f64,
}
