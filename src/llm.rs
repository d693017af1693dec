//! Hosted LLM completion client and prompt assembly.
//!
//! The default backend is Groq's OpenAI-compatible chat completions API
//! (`POST {base_url}/chat/completions`). One request per query: no retries,
//! no streaming, and no timeout unless `[llm].timeout_secs` is set.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{InsightError, InsightResult};

/// Returned when the model answers with no content.
pub const NO_ANSWER: &str = "No astrological insights available at this time.";

const PROMPT_TEMPLATE: &str = "\
You are an expert astrologer. Given the astrological context from the user's birth chart, planetary effects and related documents, provide a personalized and insightful astrological response to their query.

Birth Chart Details:
{birth_chart}

Planetary Effects:
{effects}

Relevant Astrological Literature Context:
{context}

Based on the above, respond to the following user query in detail:
User Query: {input}
";

/// Fills the prompt template. Effects are listed one per line as
/// `House <n>: <effect>`.
///
/// Placeholders are substituted in a single pass over the template, so
/// braces inside retrieved text or the query are copied verbatim.
pub fn render_prompt(
    birth_chart: &str,
    effects: &BTreeMap<u8, String>,
    context: &str,
    query: &str,
) -> String {
    let effects_text = effects
        .iter()
        .map(|(house, effect)| format!("House {}: {}", house, effect))
        .collect::<Vec<_>>()
        .join("\n");

    fill_template(
        PROMPT_TEMPLATE,
        &[
            ("{birth_chart}", birth_chart.trim_end()),
            ("{effects}", &effects_text),
            ("{context}", context),
            ("{input}", query),
        ],
    )
}

fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Removes markdown bold markers (`**`) from a model answer.
pub fn strip_bold(answer: &str) -> String {
    answer.replace("**", "")
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;

    /// Sends `prompt` as a single user message and returns the raw answer,
    /// or `None` if the model produced no content.
    async fn complete(&self, prompt: &str) -> InsightResult<Option<String>>;
}

/// Chat-completions client for Groq (or any OpenAI-compatible endpoint).
pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: Option<f64>,
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GroqClient {
    /// Reads the API key from the environment variable named by
    /// `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// [`InsightError::CredentialMissing`] when the variable is unset or blank.
    pub fn from_config(config: &LlmConfig) -> InsightResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| InsightError::CredentialMissing(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> InsightResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for GroqClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> InsightResult<Option<String>> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InsightError::UpstreamCallFailed(format!(
                "LLM API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> InsightResult<Option<String>> {
    let choices = json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| {
            InsightError::UpstreamCallFailed("Invalid LLM response: missing choices".to_string())
        })?;

    Ok(choices
        .first()
        .and_then(|c| c.pointer("/message/content"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string))
}
