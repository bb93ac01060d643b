use crate::config::BackendSection;
use crate::models::Language;
use crate::traits::{CompletionBackend, Prompt, Translator};
use crate::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

const BACKEND: &str = "chat-completions";
const TRANSLATION_TEMPERATURE: f32 = 0.3;

/// OpenAI-compatible `/chat/completions` client, used for both translation
/// and generation.
pub struct ChatCompletionsClient {
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl ChatCompletionsClient {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, BackendError> {
        let base = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{endpoint}/")
        };
        Ok(Self {
            endpoint: Url::parse(&base)?.join("chat/completions")?,
            model: model.into(),
            api_key,
            client: Client::new(),
        })
    }

    pub fn from_config(section: &BackendSection) -> Result<Self, BackendError> {
        Self::new(&section.endpoint, section.model.clone(), section.api_key.clone())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn chat(&self, system: &str, user: &str, temperature: f32) -> Result<String, BackendError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&request_body(&self.model, system, user, temperature));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{status}: {}", body.chars().take(200).collect::<String>()),
            });
        }

        let parsed: Value = response.json().await?;
        parse_completion(&parsed)
    }
}

fn request_body(model: &str, system: &str, user: &str, temperature: f32) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ],
    })
}

fn parse_completion(parsed: &Value) -> Result<String, BackendError> {
    parsed
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| BackendError::BackendResponse {
            backend: BACKEND.to_string(),
            details: parsed
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("response has no message content")
                .to_string(),
        })
}

fn translation_instruction(source: Language, target: Language) -> String {
    let mut instruction = format!(
        "You are a professional translator specializing in {source} and {target}. \
         Translate the following text from {source} to {target}. \
         Maintain the original meaning, tone and context. \
         Copy bracketed placeholders such as [P0] and product names unchanged. \
         Provide only the translation without any explanations or additional text."
    );
    if target == Language::Chichewa {
        instruction.push_str(" Use natural, conversational Chichewa that native speakers would understand.");
    }
    instruction
}

#[async_trait]
impl Translator for ChatCompletionsClient {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, BackendError> {
        if source == target {
            return Ok(text.to_string());
        }
        self.chat(
            &translation_instruction(source, target),
            text,
            TRANSLATION_TEMPERATURE,
        )
        .await
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, BackendError> {
        self.chat(&prompt.system, &prompt.user, prompt.temperature).await
    }
}
