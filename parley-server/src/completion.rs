//! Outbound calls to the text generation backend.
//!
//! [`CompletionClient`] prefixes the caller's text with a fixed instruction,
//! sends it with the process-wide [`LlmConfig`] parameters, and absorbs any
//! backend failure into a fixed apology. The result is a [`Completion`] so
//! callers that care can tell a real answer from the fallback; callers that
//! only want text use [`Completion::into_text`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Instruction placed in front of every prompt.
pub const SYSTEM_PREFIX: &str = "You are a helpful AI assistant. User input: ";

/// Text returned in place of a completion when the backend fails.
pub const FALLBACK_TEXT: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

/// Errors reported by a [`GenerationBackend`].
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request could not be sent or the connection failed.
    #[error("backend request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("backend response decode failed: {0}")]
    Decode(String),

    /// No answer arrived within the configured timeout.
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),
}

/// Generation parameters shared by every call. Fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Model name passed to the backend.
    pub model: String,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// Request body sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name.
    pub model: String,
    /// Full prompt, instruction prefix included.
    pub prompt: String,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    text: String,
}

/// A text generation service.
///
/// Implementations must be cheap to share; the client calls them from
/// spawned tasks.
pub trait GenerationBackend: Send + Sync + 'static {
    /// Generates text for the given request.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<String, BackendError>> + Send;
}

/// Backend reached over HTTP at a fixed base URL.
///
/// Sends `POST {base_url}/generate` with a JSON [`GenerationRequest`] and
/// expects `{"text": "..."}` back.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    /// Creates a backend for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BackendError::Transport(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/generate", base_url.trim_end_matches('/')),
        })
    }

    /// Returns the full URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl GenerationBackend for HttpBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let decoded: GenerationResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(decoded.text)
    }
}

/// Outcome of a completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The backend produced this text.
    Generated(String),
    /// The backend failed; the fallback text stands in for an answer.
    Fallback {
        /// Description of the backend failure.
        reason: String,
    },
}

impl Completion {
    /// Returns `true` if this is the fallback rather than a real answer.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Returns the text to store as the assistant reply.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) => text,
            Self::Fallback { .. } => FALLBACK_TEXT.to_string(),
        }
    }
}

/// Wraps a backend with the fixed prompt prefix, shared parameters, a
/// timeout, and fallback-on-failure.
pub struct CompletionClient<B> {
    backend: B,
    config: LlmConfig,
    timeout: Duration,
}

impl<B: GenerationBackend> CompletionClient<B> {
    /// Creates a client around `backend`.
    pub const fn new(backend: B, config: LlmConfig, timeout: Duration) -> Self {
        Self {
            backend,
            config,
            timeout,
        }
    }

    /// Builds the backend request for caller-supplied `content`.
    pub fn request_for(&self, content: &str) -> GenerationRequest {
        GenerationRequest {
            model: self.config.model.clone(),
            prompt: format!("{SYSTEM_PREFIX}{content}"),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        }
    }

    /// Generates a reply to `content`. Never fails: backend errors and
    /// timeouts become [`Completion::Fallback`].
    pub async fn generate(&self, content: &str) -> Completion {
        let request = self.request_for(content);
        let result = tokio::time::timeout(self.timeout, self.backend.generate(&request))
            .await
            .unwrap_or(Err(BackendError::Timeout(self.timeout)));

        match result {
            Ok(text) => {
                tracing::debug!(model = %self.config.model, chars = text.len(), "completion received");
                Completion::Generated(text)
            }
            Err(e) => {
                tracing::warn!(model = %self.config.model, error = %e, "completion failed, using fallback");
                Completion::Fallback {
                    reason: e.to_string(),
                }
            }
        }
    }
}
