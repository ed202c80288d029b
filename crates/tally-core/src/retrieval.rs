//! Retrieval capability interface
//!
//! The query core depends on an external hybrid search (vector similarity
//! intersected with hard metadata constraints) through this narrow trait.
//! The index, embeddings, and chunking all live on the other side of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filter::RetrievalFilter;

/// Chunk type tag for authoritative receipt-level records
pub const CHUNK_RECEIPT_SUMMARY: &str = "receipt_summary";

/// Chunk type tag for line-item records
pub const CHUNK_ITEM_DETAIL: &str = "item_detail";

/// One retrieved metadata record (a single indexed chunk)
///
/// Produced externally and read-only to this core. The known fields are the
/// ones the pipeline actually reads; anything else the index attaches rides
/// along in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub receipt_id: String,
    pub chunk_type: String,
    /// Similarity score assigned by the retrieval capability
    #[serde(default)]
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name_normalized: Option<String>,
    /// ISO-formatted transaction date, for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<String>,
    /// Transaction time as epoch seconds, for range filtering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Forward-compatible escape hatch for metadata this core doesn't read
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The external hybrid-search capability
///
/// Calls are blocking network operations with no internal retry; failures
/// are surfaced to the caller, which treats them as "no information".
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Similarity-ranked search intersected with hard metadata constraints
    async fn hybrid_search(
        &self,
        query: &str,
        filter: &RetrievalFilter,
        top_k: usize,
    ) -> Result<Vec<Evidence>>;

    /// Most recent transaction timestamp in the index, if any data exists
    ///
    /// Used to anchor relative date expressions to the corpus' own recency
    /// rather than wall-clock time.
    async fn latest_transaction_ts(&self) -> Result<Option<DateTime<Utc>>>;
}

/// Canned retriever for testing and development
///
/// Returns a fixed evidence list regardless of query or filter, truncated
/// to `top_k`.
#[derive(Debug, Clone, Default)]
pub struct MockRetriever {
    evidence: Vec<Evidence>,
    latest: Option<DateTime<Utc>>,
}

impl MockRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evidence(mut self, evidence: Vec<Evidence>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_latest(mut self, latest: DateTime<Utc>) -> Self {
        self.latest = Some(latest);
        self
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn hybrid_search(
        &self,
        _query: &str,
        _filter: &RetrievalFilter,
        top_k: usize,
    ) -> Result<Vec<Evidence>> {
        Ok(self.evidence.iter().take(top_k).cloned().collect())
    }

    async fn latest_transaction_ts(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.latest)
    }
}
