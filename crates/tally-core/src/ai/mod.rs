//! Pluggable language backend abstraction
//!
//! The query core uses a language model for exactly two things: structured
//! extraction of fields the rule-based parsers missed (a fallback only),
//! and phrasing the final answer from verified evidence. Both run behind
//! the `LanguageBackend` trait so tests can inject canned responses and no
//! network call ever executes in the test suite.
//!
//! # Architecture
//!
//! - `LanguageBackend` trait: defines the interface for all operations
//! - `AiClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Model name (default: llama3.2)

mod mock;
mod ollama;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use types::{AnswerContext, RawDateRange};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Trait defining the interface for all language backends
///
/// Every call is a blocking network operation with no internal retry; a
/// failed call means "no information from this source" to the caller.
/// Backends must be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    /// Extract a date range from a query that no rule-based strategy
    /// understood; `Ok(None)` means the model found no date either
    async fn extract_date_range(
        &self,
        query: &str,
        reference: DateTime<Utc>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>>;

    /// Extract merchant names from a query, optionally given a sample of
    /// known merchants for alias resolution; capped at 5 results
    async fn extract_merchants(&self, query: &str, known_merchants: &[String]) -> Result<Vec<String>>;

    /// Phrase a final answer from verified evidence
    async fn generate_answer(&self, context: &AnswerContext<'_>) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete language client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AiClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AiClient {
    /// Create a language client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `ollama` (default): Uses OLLAMA_HOST and OLLAMA_MODEL
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AiClient::Ollama),
            "mock" => Some(AiClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AiClient::Ollama)
            }
        }
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AiClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AiClient::Mock(MockBackend::new())
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AiClient::Ollama(b) => AiClient::Ollama(b.with_model(model)),
            AiClient::Mock(b) => AiClient::Mock(b.with_model(model)),
        }
    }
}

// Implement LanguageBackend for AiClient by delegating to the inner backend
#[async_trait]
impl LanguageBackend for AiClient {
    async fn extract_date_range(
        &self,
        query: &str,
        reference: DateTime<Utc>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        match self {
            AiClient::Ollama(b) => b.extract_date_range(query, reference).await,
            AiClient::Mock(b) => b.extract_date_range(query, reference).await,
        }
    }

    async fn extract_merchants(&self, query: &str, known_merchants: &[String]) -> Result<Vec<String>> {
        match self {
            AiClient::Ollama(b) => b.extract_merchants(query, known_merchants).await,
            AiClient::Mock(b) => b.extract_merchants(query, known_merchants).await,
        }
    }

    async fn generate_answer(&self, context: &AnswerContext<'_>) -> Result<String> {
        match self {
            AiClient::Ollama(b) => b.generate_answer(context).await,
            AiClient::Mock(b) => b.generate_answer(context).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AiClient::Ollama(b) => b.health_check().await,
            AiClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AiClient::Ollama(b) => b.model(),
            AiClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AiClient::Ollama(b) => b.host(),
            AiClient::Mock(b) => b.host(),
        }
    }
}
