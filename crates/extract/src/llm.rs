use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A hosted text/vision completion backend.
///
/// Implementations may fail with transport or rate-limit errors; callers decide
/// how to recover.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, image: Option<&Path>) -> Result<String>;

    /// Short backend description used in logs and health output.
    fn describe(&self) -> String;
}

/// Build a `reqwest::Client` with the request and connect timeouts applied.
pub fn http_client(request_timeout: Duration, connect_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Read an image from disk and return it base64 encoded.
pub async fn encode_image(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn default() -> Self {
        Self::new(
            "http://localhost:11434".to_string(),
            "llava".to_string(),
        )
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, prompt: &str, image: Option<&Path>) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let images = match image {
            Some(path) => vec![encode_image(path).await?],
            None => Vec::new(),
        };

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            images,
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama request failed: {} {}", status, body);
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }

    fn describe(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

/// Client for OpenAI-compatible `/v1/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: ChatContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            base_url,
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn build_content(prompt: &str, image: Option<&Path>) -> Result<ChatContent> {
        let Some(path) = image else {
            return Ok(ChatContent::Text(prompt.to_string()));
        };

        let encoded = encode_image(path).await?;
        Ok(ChatContent::Parts(vec![
            ContentPart::Text { text: prompt.to_string() },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/jpeg;base64,{}", encoded),
                },
            },
        ]))
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, prompt: &str, image: Option<&Path>) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: Self::build_content(prompt, image).await?,
            }],
        };

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI request failed: {} {}", status, body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("OpenAI response contained no message content")
    }

    fn describe(&self) -> String {
        format!("openai:{}", self.model)
    }
}
