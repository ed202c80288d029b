//! Tally Core Library
//!
//! Answers natural-language questions about purchase receipts by combining
//! metadata-filtered vector retrieval with deterministic auditing:
//! - Temporal resolver for absolute, relative, and named-period dates
//! - Merchant resolver with corpus learning and fuzzy matching
//! - Query parser composing both into a structured intent
//! - Retrieval filter builder for the hybrid-search predicate language
//! - Query engine with a deterministic aggregation audit that keeps the
//!   language model from hallucinating totals
//! - Pluggable language backends (Ollama, mock) for extraction fallbacks
//!   and answer phrasing

pub mod ai;
pub mod audit;
pub mod engine;
pub mod error;
pub mod filter;
pub mod merchant;
pub mod models;
pub mod parser;
pub mod retrieval;
pub mod temporal;

/// Test utilities including a mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AiClient, AnswerContext, LanguageBackend, MockBackend, OllamaBackend};
pub use audit::audit_aggregation;
pub use engine::QueryEngine;
pub use error::{Error, Result};
pub use filter::{FilterBuilder, Predicate, RetrievalFilter};
pub use merchant::{normalize_merchant_name, MerchantResolver};
pub use models::{
    Aggregation, AuditResult, CardNetwork, DateConstraint, FeatureFlag, Intent, ItemCategory,
    ItemSummary, Location, Metric, PaymentMethod, QueryMetadata, QueryResult, QueryType,
    ReceiptSummary, SumBasis,
};
pub use parser::QueryParser;
pub use retrieval::{Evidence, MockRetriever, Retriever};
pub use temporal::TemporalResolver;
