use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};
use crate::prompt::Prompt;

/// Source of raw model output for a rendered prompt.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Returns the raw completion. Exactly one upstream request per call.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiBackend {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SynthesisError::Failed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.text(),
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisError::Failed(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(500).collect();
            return Err(SynthesisError::Failed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Failed(format!("malformed provider response: {e}")))?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SynthesisError::Failed("provider response has no completion".to_string()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Fixed-output backend with an optional delay. Clones share one call counter.
#[derive(Clone)]
pub struct ScriptedBackend {
    reply: std::result::Result<String, SynthesisError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            reply: Ok(output.into()),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A backend whose every call fails like an unreachable provider.
    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            reply: Err(SynthesisError::Failed(detail.into())),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_table::Table;

    fn prompt() -> Prompt {
        let table = Table::from_reader("a\n1\n".as_bytes()).unwrap();
        Prompt::new("how many rows?", &table.schema_preview(5))
    }

    #[tokio::test]
    async fn scripted_backend_counts_calls_across_clones() {
        let backend = ScriptedBackend::new("len(df)");
        let shared = backend.clone();
        assert_eq!(backend.complete(&prompt()).await.unwrap(), "len(df)");
        assert_eq!(shared.complete(&prompt()).await.unwrap(), "len(df)");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn failing_backend_reports_provider_failure() {
        let backend = ScriptedBackend::failing("connection refused");
        assert_eq!(
            backend.complete(&prompt()).await,
            Err(SynthesisError::Failed("connection refused".into()))
        );
    }

    #[test]
    fn endpoint_joins_base_url() {
        let backend =
            OpenAiBackend::new("https://api.openai.com/v1/", "key", "gpt-3.5-turbo", Duration::from_secs(30))
                .unwrap();
        assert_eq!(backend.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn chat_request_shape() {
        let request = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.0,
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"model":"m","messages":[{"role":"user","content":"hi"}],"temperature":0.0}"#
        );
    }
}
