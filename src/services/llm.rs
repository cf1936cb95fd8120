use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::GeneratorConfig;

/// Chapters shorter than this (in characters, trimmed) are not worth titling.
pub const MIN_TITLE_CONTENT_CHARS: usize = 50;

const TITLE_CONTENT_LIMIT: usize = 4000;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("please select some text to generate an illustration")]
    EmptySelection,
    #[error("chapter needs at least {min} characters before a title can be suggested")]
    ContentTooShort { min: usize },
    #[error("no work is open")]
    NoActiveWork,
    #[error("chapter not found")]
    UnknownChapter,
    #[error("no image data returned from the model")]
    NoImageData,
    #[error("generation request failed")]
    Request(#[from] reqwest::Error),
    #[error("unexpected generation response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Validation errors are raised before any request is made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GenerationError::EmptySelection
                | GenerationError::ContentTooShort { .. }
                | GenerationError::NoActiveWork
                | GenerationError::UnknownChapter
        )
    }

    /// The text to show the writer.
    pub fn user_message(&self) -> String {
        if self.is_validation() {
            self.to_string()
        } else {
            "Generation failed. Please try again.".to_string()
        }
    }
}

pub fn validate_snippet(snippet: &str) -> Result<(), GenerationError> {
    if snippet.trim().is_empty() {
        return Err(GenerationError::EmptySelection);
    }
    Ok(())
}

pub fn validate_title_content(content: &str) -> Result<(), GenerationError> {
    if content.trim().chars().count() < MIN_TITLE_CONTENT_CHARS {
        return Err(GenerationError::ContentTooShort {
            min: MIN_TITLE_CONTENT_CHARS,
        });
    }
    Ok(())
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Returns the illustration as a `data:` URI.
    async fn generate_illustration(&self, snippet: &str) -> Result<String, GenerationError>;
    async fn generate_chapter_title(&self, content: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Option<String>,
    mime_type: Option<String>,
}

pub struct LLMClient {
    client: reqwest::Client,
    api_url: String,
    image_api_url: String,
    api_key: Option<String>,
    model: String,
}

impl LLMClient {
    pub fn new(config: &GeneratorConfig) -> Self {
        LLMClient {
            client: reqwest::Client::new(),
            api_url: config.llm_api_url.clone(),
            image_api_url: config.image_api_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
        }
    }

    fn post(&self, url: &str, body: serde_json::Value) -> reqwest::RequestBuilder {
        let mut request_builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", api_key));
        }
        request_builder
    }
}

#[async_trait]
impl ContentGenerator for LLMClient {
    async fn generate_illustration(&self, snippet: &str) -> Result<String, GenerationError> {
        validate_snippet(snippet)?;

        let prompt = format!(
            "Create an artistic, novel-style illustration based on the following text segment: \"{}\". The style should be evocative and suitable for a book illustration.",
            snippet
        );

        let response = self
            .post(
                &self.image_api_url,
                json!({
                    "model": self.model,
                    "prompt": prompt,
                    "aspect_ratio": "4:3",
                }),
            )
            .send()
            .await?
            .error_for_status()?;

        let image: ImageResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        let data = image
            .data
            .filter(|d| !d.is_empty())
            .ok_or(GenerationError::NoImageData)?;
        let mime_type = image.mime_type.unwrap_or_else(|| "image/png".to_string());

        Ok(format!("data:{};base64,{}", mime_type, data))
    }

    async fn generate_chapter_title(&self, content: &str) -> Result<String, GenerationError> {
        validate_title_content(content)?;

        let excerpt: String = content.chars().take(TITLE_CONTENT_LIMIT).collect();
        let prompt = format!(
            "Suggest a short, evocative title for this novel chapter. Reply with the title only, no quotes or explanation.\n\nChapter: {}",
            excerpt
        );

        let response = self
            .post(
                &self.api_url,
                json!({
                    "model": self.model,
                    "prompt": prompt,
                    "stream": false,
                    "options": {
                        "temperature": 0.7
                    }
                }),
            )
            .send()
            .await?
            .error_for_status()?;

        let response_text = response.text().await?;
        let completion: CompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let title = clean_title(&completion.response);
        if title.is_empty() {
            return Err(GenerationError::InvalidResponse("empty title".to_string()));
        }
        Ok(title)
    }
}

/// Models like to wrap titles in quotes or prefix them; keep the first line only.
fn clean_title(raw: &str) -> String {
    let line = raw.trim().lines().next().unwrap_or_default().trim();
    let line = line.strip_prefix("Title:").unwrap_or(line).trim();
    line.trim_matches(|c| c == '"' || c == '\'' || c == '*' || c == '“' || c == '”')
        .trim()
        .to_string()
}
