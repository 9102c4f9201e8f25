use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use crate::generation::TextGenerator;
use log::debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const EMBEDDING_MODEL: &str = "models/text-embedding-004";
const GENERATION_MODEL: &str = "models/gemini-2.0-flash";
/// Output dimension of text-embedding-004
pub const EMBEDDING_DIMENSION: usize = 768;
/// Largest batch accepted by batchEmbedContents
pub const MAX_BATCH_SIZE: usize = 100;

/// Configuration for Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embeddings_url: String,
    pub batch_embeddings_url: String,
    pub generate_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub dimension: usize,
}

impl GeminiConfig {
    /// Configuration for the public endpoints with the given key
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiConfig {
            api_key: api_key.into(),
            embeddings_url: format!("{}/{}:embedContent", API_BASE, EMBEDDING_MODEL),
            batch_embeddings_url: format!("{}/{}:batchEmbedContents", API_BASE, EMBEDDING_MODEL),
            generate_url: format!("{}/{}:generateContent", API_BASE, GENERATION_MODEL),
            embedding_model: EMBEDDING_MODEL.to_string(),
            generation_model: GENERATION_MODEL.to_string(),
            dimension: EMBEDDING_DIMENSION,
        }
    }

    /// Read the key once from `key_file`, then apply endpoint overrides from the environment
    pub fn from_key_file<P: AsRef<Path>>(key_file: P) -> Result<Self> {
        let api_key = read_api_key(key_file)?;
        Ok(GeminiConfig::new(api_key).with_env_overrides())
    }

    /// Replace endpoint URLs with `GEMINI_*_URL` environment variables when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("GEMINI_EMBEDDINGS_URL") {
            self.embeddings_url = url;
        }
        if let Ok(url) = env::var("GEMINI_BATCH_EMBEDDINGS_URL") {
            self.batch_embeddings_url = url;
        }
        if let Ok(url) = env::var("GEMINI_GENERATE_URL") {
            self.generate_url = url;
        }
        self
    }
}

// Keeps the key out of debug output
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("embeddings_url", &self.embeddings_url)
            .field("batch_embeddings_url", &self.batch_embeddings_url)
            .field("generate_url", &self.generate_url)
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Read an API key from a file, failing if it is missing, unreadable or blank
pub fn read_api_key<P: AsRef<Path>>(key_file: P) -> Result<String> {
    let path = key_file.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        RagError::Configuration(format!(
            "cannot read API key from {}: {}",
            path.display(),
            e
        ))
    })?;

    let key = contents.trim();
    if key.is_empty() {
        return Err(RagError::Configuration(format!(
            "API key file {} is empty",
            path.display()
        )));
    }

    Ok(key.to_string())
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        url: &str,
        request: &Req,
    ) -> Result<Resp> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_failure(status, error_text));
        }

        Ok(response.json().await?)
    }

    /// Generate embeddings for a text
    pub async fn get_embedding(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            content: Content::new(text),
        };

        let response: EmbeddingResponse = self.post(&self.config.embeddings_url, &request).await?;
        let embedding = Embedding::new(response.embedding.values);
        embedding.check_dimension(self.config.dimension)?;

        Ok(embedding)
    }

    /// Generate embeddings for many texts, `MAX_BATCH_SIZE` per request
    pub async fn get_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH_SIZE) {
            let request = BatchEmbeddingRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbeddingRequest {
                        model: &self.config.embedding_model,
                        content: Content::new(text),
                    })
                    .collect(),
            };

            let response: BatchEmbeddingResponse = self
                .post(&self.config.batch_embeddings_url, &request)
                .await?;

            if response.embeddings.len() != batch.len() {
                return Err(RagError::InvalidResponse(format!(
                    "requested {} embeddings, received {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            for data in response.embeddings {
                let embedding = Embedding::new(data.values);
                embedding.check_dimension(self.config.dimension)?;
                embeddings.push(embedding);
            }
            debug!("Embedded batch of {} texts", batch.len());
        }

        Ok(embeddings)
    }

    /// Generate text using Gemini model
    pub async fn generate_text(
        &self,
        prompt: &str,
        temperature: f32,
        top_p: f32,
        top_k: i32,
        max_output_tokens: i32,
    ) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.generation_model,
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature,
                top_p,
                top_k,
                max_output_tokens,
            },
        };

        let response_data: GenerateResponse =
            self.post(&self.config.generate_url, &request).await?;

        // Extract the generated text from the response
        response_data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| RagError::InvalidResponse("no response generated".to_string()))
    }

    /// Generate a response for an already assembled prompt
    pub async fn generate_answer(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt, 0.2, 0.8, 40, 1024).await
    }
}

impl Embedder for GeminiClient {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.get_embedding(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.get_embeddings(texts).await
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_answer(prompt).await
    }
}

/// Map a non-success HTTP status to the error taxonomy
pub(crate) fn classify_failure(status: StatusCode, body: String) -> RagError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RagError::Authentication(body),
        StatusCode::TOO_MANY_REQUESTS => RagError::RateLimited(body),
        StatusCode::PAYLOAD_TOO_LARGE => RagError::ContextTooLarge(body),
        StatusCode::BAD_REQUEST if reports_token_limit(&body) => RagError::ContextTooLarge(body),
        StatusCode::REQUEST_TIMEOUT => RagError::ServiceUnavailable(body),
        s if s.is_server_error() => RagError::ServiceUnavailable(format!("{} {}", s, body)),
        s => RagError::Api {
            status: s.as_u16(),
            message: body,
        },
    }
}

fn reports_token_limit(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("token count") || body.contains("exceeds the maximum")
}

// Request/response structures for the Gemini API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbeddingRequest<'a> {
    requests: Vec<EmbeddingRequest<'a>>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct BatchEmbeddingResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
}

impl<'a> Content<'a> {
    fn new(text: &'a str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: None,
        }
    }

    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: Some(role),
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "bad key".into()),
            RagError::Authentication(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, String::new()),
            RagError::Authentication(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, String::new()),
            RagError::RateLimited(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            RagError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            classify_failure(
                StatusCode::BAD_REQUEST,
                "The input token count (40000) exceeds the maximum number of tokens allowed".into()
            ),
            RagError::ContextTooLarge(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "malformed".into()),
            RagError::Api { status: 400, .. }
        ));
    }

    #[test]
    fn test_read_api_key_trims() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("key");
        fs::write(&path, "  secret-key\n").unwrap();

        assert_eq!(read_api_key(&path).unwrap(), "secret-key");
    }

    #[test]
    fn test_read_api_key_missing_or_blank() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            read_api_key(tmp.path().join("absent")),
            Err(RagError::Configuration(_))
        ));

        let blank = tmp.path().join("blank");
        fs::write(&blank, "\n\n").unwrap();
        assert!(matches!(
            read_api_key(&blank),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = GeminiConfig::new("super-secret");
        assert!(!format!("{:?}", config).contains("super-secret"));
    }

    #[test]
    fn test_embedding_request_shape() {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            content: Content::new("hello"),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "model": "models/text-embedding-004",
                "content": { "parts": [{ "text": "hello" }] }
            })
        );
    }

    #[test]
    fn test_parse_generate_response() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"109"}],"role":"model"}}]}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.candidates[0].content.parts[0].text, "109");
    }
}
