//! Completion providers.
//!
//! [`OpenAiCompleter`] speaks the `POST /v1/chat/completions` protocol
//! (OpenAI or any compatible endpoint via `llm.base_url`), with the same
//! retry policy as the embedding providers and an optional HTTP proxy.
//!
//! Some reasoning models reject parts of the request:
//! - models without system-role support get system messages folded into
//!   the first user message;
//! - fixed-temperature models get no `temperature` field.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use loyalty_monitor_core::completion::{Completer, CompletionOptions, Message, Role};

use crate::config::LlmConfig;
use crate::http::{build_client, send_json_with_retry};

const OPENAI_BASE_URL: &str = "https://api.openai.com";

const MODELS_WITHOUT_SYSTEM_ROLE: &[&str] = &["o1-mini", "gpt-o1-mini"];

const FIXED_TEMPERATURE_MODELS: &[&str] = &[
    "o1-mini",
    "gpt-o1-mini",
    "o3-mini",
    "gpt-o3-mini",
    "o4-mini",
    "gpt-o4-mini",
];

pub fn supports_system_role(model: &str) -> bool {
    !MODELS_WITHOUT_SYSTEM_ROLE.contains(&model)
}

pub fn supports_temperature(model: &str) -> bool {
    !FIXED_TEMPERATURE_MODELS.contains(&model)
}

/// Merge all system messages into the first user message.
///
/// The system text is prepended, separated by a blank line. If there is no
/// user message, the system text becomes one.
pub fn fold_system_messages(messages: &[Message]) -> Vec<Message> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let mut rest: Vec<Message> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();

    if system.is_empty() {
        return rest;
    }
    let preamble = system.join("\n\n");

    match rest.iter_mut().find(|m| m.role == Role::User) {
        Some(first_user) => {
            first_user.content = format!("{}\n\n{}", preamble, first_user.content);
        }
        None => rest.insert(0, Message::user(preamble)),
    }
    rest
}

/// Request body for `/v1/chat/completions`, adjusted for model quirks.
pub fn chat_request_body(
    model: &str,
    messages: &[Message],
    options: &CompletionOptions,
) -> serde_json::Value {
    let messages = if supports_system_role(model) {
        messages.to_vec()
    } else {
        fold_system_messages(messages)
    };

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
    });
    if supports_temperature(model) {
        body["temperature"] = serde_json::json!(options.temperature);
    }
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    body
}

/// Extract `choices[0].message.content`.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid chat completion response: missing choices[0].message.content"))
}

// ============ Disabled Provider ============

/// Completer used when `llm.provider = "disabled"`.
pub struct DisabledCompleter;

#[async_trait]
impl Completer for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _messages: &[Message], _options: &CompletionOptions) -> Result<String> {
        bail!("LLM provider is disabled; set [llm].provider in the config")
    }
}

// ============ OpenAI Provider ============

/// Chat completion client. Requires `OPENAI_API_KEY`.
pub struct OpenAiCompleter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl OpenAiCompleter {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            client: build_client(config.timeout_secs, config.proxy.as_deref())?,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            model,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<String> {
        let body = chat_request_body(&self.model, messages, options);
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let json = send_json_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
        })
        .await?;

        parse_chat_response(&json)
    }
}

/// Create the [`Completer`] named by `config.provider`.
pub fn create_completer(config: &LlmConfig) -> Result<Box<dyn Completer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledCompleter)),
        "openai" => Ok(Box::new(OpenAiCompleter::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// Completion options from config.
pub fn completion_options(config: &LlmConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}
