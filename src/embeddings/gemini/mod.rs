
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::GeminiConfig;
use crate::embeddings::{AnswerSynthesizer, EmbeddingProvider};
use crate::{Result, SiteQaError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking client for the Gemini REST API, covering text embeddings,
/// answer generation, and vision requests.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn png(bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/png".to_string(),
                data: BASE64.encode(bytes),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    content: Content,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<BatchEmbedEntry>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedEntry {
    model: String,
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ModelSummary {
    pub name: String,
}

impl GeminiClient {
    /// Create a client from configuration plus the API key resolved at
    /// startup. The key is held here and only here.
    #[inline]
    pub fn new(config: &GeminiConfig, api_key: String) -> Result<Self> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| SiteQaError::Config(format!("invalid provider base URL: {e}")))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            batch_size: config.batch_size,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Verify connectivity and key validity by listing available models.
    #[inline]
    pub fn health_check(&self) -> Result<Vec<ModelSummary>> {
        let url = self.endpoint("v1beta/models")?;
        debug!("Checking provider health at {}", url);

        let body = self.request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .header("x-goog-api-key", &self.api_key)
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let models: ModelsResponse = serde_json::from_str(&body)
            .map_err(|e| SiteQaError::Provider(format!("failed to parse model list: {e}")))?;

        debug!("Provider reachable, {} models visible", models.models.len());
        Ok(models.models)
    }

    /// Generate one embedding vector for a single text.
    #[inline]
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Embedding text ({} chars)", text.len());

        let request = EmbedRequest {
            content: Content {
                parts: vec![Part::text(text)],
            },
        };
        let url = self.endpoint(&format!(
            "v1beta/models/{}:embedContent",
            self.embedding_model
        ))?;

        let body = self.post_json(&url, &serde_json::to_string(&request).map_err(to_provider)?)?;
        let response: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| SiteQaError::Provider(format!("failed to parse embedding: {e}")))?;

        Ok(response.embedding.values)
    }

    /// Generate embeddings for many texts, splitting into batches of
    /// `batch_size` requests.
    #[inline]
    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts", texts.len());
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            vectors.extend(self.embed_single_batch(batch)?);
        }
        Ok(vectors)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() == 1 {
            return Ok(vec![self.embed_text(&texts[0])?]);
        }

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| BatchEmbedEntry {
                    model: format!("models/{}", self.embedding_model),
                    content: Content {
                        parts: vec![Part::text(text)],
                    },
                })
                .collect(),
        };
        let url = self.endpoint(&format!(
            "v1beta/models/{}:batchEmbedContents",
            self.embedding_model
        ))?;

        let body = self.post_json(&url, &serde_json::to_string(&request).map_err(to_provider)?)?;
        let response: BatchEmbedResponse = serde_json::from_str(&body)
            .map_err(|e| SiteQaError::Provider(format!("failed to parse batch embedding: {e}")))?;

        if response.embeddings.len() != texts.len() {
            return Err(SiteQaError::Provider(format!(
                "batch size mismatch: sent {} texts, got {} embeddings",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }

    /// Run a text-only generation request and return the combined reply.
    #[inline]
    pub fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_parts(vec![Part::text(prompt)])
    }

    /// Ask the vision model about a PNG image.
    #[inline]
    pub fn describe_image(&self, instruction: &str, png: &[u8]) -> Result<String> {
        self.generate_parts(vec![Part::text(instruction), Part::png(png)])
    }

    fn generate_parts(&self, parts: Vec<Part>) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };
        let url = self.endpoint(&format!("v1beta/models/{}:generateContent", self.chat_model))?;

        let body = self.post_json(&url, &serde_json::to_string(&request).map_err(to_provider)?)?;
        let response: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| SiteQaError::Provider(format!("failed to parse generation: {e}")))?;

        let answer = collect_candidate_text(&response);
        if answer.trim().is_empty() {
            return Err(SiteQaError::Provider(
                "provider returned an empty answer".to_string(),
            ));
        }
        Ok(answer)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SiteQaError::Provider(format!("failed to build provider URL: {e}")))
    }

    fn post_json(&self, url: &Url, body: &str) -> Result<String> {
        self.request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header("x-goog-api-key", &self.api_key)
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// Run a request with bounded retries and exponential backoff.
    ///
    /// Credential failures are fatal and never retried; 5xx and transport
    /// errors are transient and retried up to `retry_attempts` times.
    fn request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            match request_fn() {
                Ok(body) => return Ok(body),
                // Gemini reports invalid API keys as 400, alongside the
                // usual 401/403.
                Err(ureq::Error::StatusCode(status)) if matches!(status, 400 | 401 | 403) => {
                    return Err(SiteQaError::ProviderAuth(format!(
                        "HTTP {status} from provider; check your API key"
                    )));
                }
                Err(ureq::Error::StatusCode(status)) if status < 500 => {
                    return Err(SiteQaError::Provider(format!(
                        "HTTP {status} from provider"
                    )));
                }
                Err(error) => {
                    let transient = matches!(
                        error,
                        ureq::Error::StatusCode(_)
                            | ureq::Error::ConnectionFailed
                            | ureq::Error::HostNotFound
                            | ureq::Error::Timeout(_)
                            | ureq::Error::Io(_)
                    );
                    if !transient {
                        return Err(SiteQaError::Provider(format!(
                            "non-retryable provider error: {error}"
                        )));
                    }

                    warn!(
                        "Transient provider error (attempt {}/{}): {}",
                        attempt, self.retry_attempts, error
                    );
                    last_error = Some(error);

                    if attempt < self.retry_attempts {
                        let delay =
                            Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        Err(SiteQaError::Provider(match last_error {
            Some(error) => format!("request failed after {} attempts: {error}", self.retry_attempts),
            None => "request failed after retries".to_string(),
        }))
    }
}

fn collect_candidate_text(response: &GenerateResponse) -> String {
    response
        .candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

fn to_provider(e: serde_json::Error) -> SiteQaError {
    SiteQaError::Provider(format!("failed to serialize request: {e}"))
}

impl EmbeddingProvider for GeminiClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_texts(texts)
    }
}

impl AnswerSynthesizer for GeminiClient {
    #[inline]
    fn complete(&self, question: &str, context: &[String]) -> Result<String> {
        self.generate(&build_grounded_prompt(question, context))
    }
}

/// Build the grounded prompt sent to the chat model.
///
/// Context chunks are numbered so the model can cite them; with no context
/// the model is instructed to say the material does not cover the question.
pub fn build_grounded_prompt(question: &str, context: &[String]) -> String {
    let mut prompt = String::from(
        "You are an assistant answering questions about a website using only \
         the excerpts below.\n\
         Rules:\n\
         - Use only information stated in the excerpts.\n\
         - If the excerpts do not answer the question, reply exactly: \
         \"not found in the provided material\".\n\n",
    );

    if context.is_empty() {
        prompt.push_str("Excerpts: (none available)\n");
    } else {
        prompt.push_str("Excerpts:\n");
        for (i, chunk) in context.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n\n", i + 1, chunk));
        }
    }

    prompt.push_str(&format!("\nQuestion: {question}\nAnswer:"));
    prompt
}
