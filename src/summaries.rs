//! Best-effort document summaries: a text-extraction service turns the file
//! into text, then a chat-completions endpoint condenses it. Neither failure
//! reaches the caller; each degrades to a fixed fallback string.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::AppConfig;

pub const EXTRACTION_FALLBACK: &str = "Erro ao processar documento com Docling.";
pub const SUMMARY_FALLBACK: &str = "IA indisponível no momento.";
pub const EMPTY_TEXT_SUMMARY: &str = "Sem conteúdo.";
pub const MAX_SUMMARY_INPUT_CHARS: usize = 6000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, program_name: &str) -> Result<String>;
}

/// Posts the file as multipart field `file` and reads `{"text": ...}` back.
pub struct HttpTextExtractor {
    client: Client,
    url: String,
}

impl HttpTextExtractor {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[derive(Deserialize)]
struct ExtractionResponse {
    text: Option<String>,
}

impl ExtractionResponse {
    /// A missing or null `text` means the file had no readable content.
    fn into_text(self) -> String {
        self.text.unwrap_or_default()
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let mut part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        if let Some(content_type) = content_type {
            part = part
                .mime_str(content_type)
                .context("invalid content type for extraction")?;
        }
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .context("extraction request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("extraction service returned {status}: {body}");
        }

        let parsed: ExtractionResponse = response
            .json()
            .await
            .context("extraction response was not valid JSON")?;
        Ok(parsed.into_text())
    }
}

/// OpenAI-compatible `POST {base}/chat/completions` client.
pub struct ChatCompletionSummarizer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatCompletionSummarizer {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn summary_prompt(text: &str, program_name: &str) -> String {
    format!(
        "You are an administrative assistant of a graduate program office.\n\
         Analyse the following document of the program {program_name} (Markdown formatted).\n\n\
         Write one running summary of at most 400 characters covering:\n\
         1. The main purpose of the document.\n\
         2. Critical dates (deadlines, validity).\n\
         3. Monetary amounts, if any.\n\n\
         Document:\n{text}"
    )
}

#[async_trait]
impl Summarizer for ChatCompletionSummarizer {
    async fn summarize(&self, text: &str, program_name: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": summary_prompt(text, program_name) }
            ],
        });

        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("summary request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("summary service returned {status}: {body}");
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("summary response was not valid JSON")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("summary response carried no content"))
    }
}

/// Stand-in used when a collaborator URL is not configured.
pub struct Unconfigured(&'static str);

#[async_trait]
impl TextExtractor for Unconfigured {
    async fn extract(&self, _: &str, _: Option<&str>, _: Vec<u8>) -> Result<String> {
        bail!("{} is not configured", self.0)
    }
}

#[async_trait]
impl Summarizer for Unconfigured {
    async fn summarize(&self, _: &str, _: &str) -> Result<String> {
        bail!("{} is not configured", self.0)
    }
}

/// Chains extraction and summarization and applies the fallbacks.
#[derive(Clone)]
pub struct SummaryPipeline {
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarizer>,
}

impl SummaryPipeline {
    pub fn new(extractor: Arc<dyn TextExtractor>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            extractor,
            summarizer,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let extractor: Arc<dyn TextExtractor> = match &config.extraction_service_url {
            Some(url) => Arc::new(HttpTextExtractor::new(client.clone(), url.clone())),
            None => Arc::new(Unconfigured("EXTRACTION_SERVICE_URL")),
        };
        let summarizer: Arc<dyn Summarizer> = match &config.summary_api_url {
            Some(url) => Arc::new(ChatCompletionSummarizer::new(
                client,
                url.clone(),
                config.summary_api_key.clone(),
                config.summary_model.clone(),
            )),
            None => Arc::new(Unconfigured("SUMMARY_API_URL")),
        };

        Ok(Self::new(extractor, summarizer))
    }

    pub async fn extract_text(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> String {
        match self.extractor.extract(filename, content_type, bytes).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, filename, "text extraction failed");
                EXTRACTION_FALLBACK.to_string()
            }
        }
    }

    pub async fn summarize(&self, text: &str, program_name: &str) -> String {
        if text.is_empty() {
            return EMPTY_TEXT_SUMMARY.to_string();
        }

        let excerpt = truncate_chars(text, MAX_SUMMARY_INPUT_CHARS);
        match self.summarizer.summarize(excerpt, program_name).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(error = %err, program = program_name, "summarization failed");
                SUMMARY_FALLBACK.to_string()
            }
        }
    }

    pub async fn run(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
        program_name: &str,
    ) -> String {
        let text = self.extract_text(filename, content_type, bytes).await;
        self.summarize(&text, program_name).await
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
