//! Query engine orchestration
//!
//! Drives the full pipeline: anchor the temporal resolver to the corpus'
//! latest transaction, parse the query, build the retrieval filter, run
//! the hybrid search, deduplicate evidence, audit any requested
//! aggregation, and hand verified facts to the answer generator.
//!
//! `execute` never fails: leaf errors degrade to "no information" and the
//! outermost boundary converts unexpected failures into an error result.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::ai::{AiClient, AnswerContext, LanguageBackend};
use crate::audit::audit_aggregation;
use crate::error::Result;
use crate::filter;
use crate::merchant::MerchantResolver;
use crate::models::{
    AuditResult, Intent, ItemSummary, QueryMetadata, QueryResult, QueryType, ReceiptSummary,
};
use crate::parser::QueryParser;
use crate::retrieval::{Evidence, Retriever, CHUNK_ITEM_DETAIL, CHUNK_RECEIPT_SUMMARY};
use crate::temporal::TemporalResolver;

const DEFAULT_TOP_K: usize = 20;

const NO_MATCH_ANSWER: &str = "I couldn't find any receipts matching those criteria.";

const INTERNAL_ERROR_ANSWER: &str =
    "Sorry, something went wrong while answering that. Please try again.";

/// Central orchestrator for natural-language receipt queries
pub struct QueryEngine<R: Retriever> {
    retriever: R,
    ai: Option<AiClient>,
    merchants: Arc<MerchantResolver>,
    top_k: usize,
}

impl<R: Retriever> QueryEngine<R> {
    /// Create an engine over a retrieval capability, picking the language
    /// backend from the environment
    pub fn new(retriever: R) -> Self {
        Self {
            retriever,
            ai: AiClient::from_env(),
            merchants: Arc::new(MerchantResolver::new()),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Use an explicit language backend
    pub fn with_ai(mut self, ai: AiClient) -> Self {
        self.ai = Some(ai);
        self
    }

    /// Run without any language backend (rule-based extraction and
    /// template answers only)
    pub fn without_ai(mut self) -> Self {
        self.ai = None;
        self
    }

    /// Override how many results the hybrid search returns
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// The merchant corpus shared across queries
    pub fn merchant_resolver(&self) -> &Arc<MerchantResolver> {
        &self.merchants
    }

    /// Execute a full query pipeline from text to result
    ///
    /// Never fails to the caller: unexpected errors are logged and
    /// converted into an error-typed result with confidence 0.
    pub async fn execute(&self, query: &str) -> QueryResult {
        info!(query, "processing query");
        let started = Utc::now();

        match self.run(query).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, query, "query pipeline failed");
                QueryResult {
                    answer: INTERNAL_ERROR_ANSWER.to_string(),
                    receipts: Vec::new(),
                    items: Vec::new(),
                    confidence: 0.0,
                    query_type: QueryType::Error,
                    processing_time: elapsed_seconds(started),
                    metadata: QueryMetadata {
                        search_results_count: 0,
                        intent: Intent::new(query),
                        filter: None,
                        audit: None,
                    },
                }
            }
        }
    }

    async fn run(&self, query: &str) -> Result<QueryResult> {
        // Anchor relative date expressions to the corpus' own recency; a
        // failed lookup just means wall-clock anchoring
        let resolver = match self.retriever.latest_transaction_ts().await {
            Ok(Some(latest)) => TemporalResolver::anchored(latest),
            Ok(None) => TemporalResolver::new(),
            Err(e) => {
                warn!(error = %e, "could not read latest transaction timestamp");
                TemporalResolver::new()
            }
        };

        let started = Utc::now();
        let parser = QueryParser::new(resolver, Arc::clone(&self.merchants), self.ai.clone());
        let intent = parser.parse(query).await;

        let retrieval_filter = filter::from_intent(&intent);
        let expanded_query = expand_query(query, &intent.semantic_terms);
        debug!(filter = ?retrieval_filter.to_wire(), "built retrieval filter");

        let results = match self
            .retriever
            .hybrid_search(&expanded_query, &retrieval_filter, self.top_k)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "retrieval failed, treating as zero results");
                Vec::new()
            }
        };

        if results.is_empty() {
            info!(query, "no matching receipts");
            return Ok(QueryResult {
                answer: NO_MATCH_ANSWER.to_string(),
                receipts: Vec::new(),
                items: Vec::new(),
                confidence: 0.0,
                query_type: intent.query_type,
                processing_time: elapsed_seconds(started),
                metadata: QueryMetadata {
                    search_results_count: 0,
                    filter: retrieval_filter.to_wire(),
                    audit: None,
                    intent,
                },
            });
        }

        let (receipts, items) = dedupe_evidence(&results);
        self.merchants.learn(
            receipts
                .iter()
                .filter(|r| r.merchant_name != "Unknown")
                .map(|r| r.merchant_name.clone()),
        );

        let audit = audit_aggregation(&intent, &receipts, &items);
        let answer = self
            .generate_answer(query, &receipts, &items, audit.as_ref())
            .await;

        let mut confidence = (results.len() as f64 / 10.0).min(1.0);
        if audit.as_ref().is_some_and(|a| a.verified) {
            confidence = confidence.max(0.9);
        }

        let processing_time = elapsed_seconds(started);
        info!(
            query,
            matches = results.len(),
            receipts = receipts.len(),
            items = items.len(),
            processing_time,
            "query processed"
        );

        Ok(QueryResult {
            answer,
            confidence,
            query_type: intent.query_type,
            processing_time,
            metadata: QueryMetadata {
                search_results_count: results.len(),
                filter: retrieval_filter.to_wire(),
                audit,
                intent,
            },
            receipts,
            items,
        })
    }

    async fn generate_answer(
        &self,
        query: &str,
        receipts: &[ReceiptSummary],
        items: &[ItemSummary],
        audit: Option<&AuditResult>,
    ) -> String {
        let context = AnswerContext {
            query,
            receipts,
            items,
            audit,
        };

        if let Some(ref ai) = self.ai {
            match ai.generate_answer(&context).await {
                Ok(answer) => return answer,
                Err(e) => {
                    warn!(error = %e, "answer generation failed, using template");
                }
            }
        }

        template_answer(receipts, items, audit)
    }
}

fn elapsed_seconds(started: chrono::DateTime<Utc>) -> f64 {
    (Utc::now() - started).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0
}

/// Append semantic expansion keywords so vector ranking sees concrete
/// vocabulary for general terms
fn expand_query(query: &str, semantic_terms: &[String]) -> String {
    if semantic_terms.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", query, semantic_terms.join(" "))
    }
}

/// Template answer for when no language backend is available or it failed
fn template_answer(
    receipts: &[ReceiptSummary],
    items: &[ItemSummary],
    audit: Option<&AuditResult>,
) -> String {
    let entries = if items.is_empty() {
        receipts.len()
    } else {
        items.len()
    };

    let total = audit
        .filter(|a| a.aggregation == crate::models::Aggregation::Sum)
        .map(|a| a.value)
        .unwrap_or_else(|| receipts.iter().map(|r| r.total_amount).sum());

    format!("I found {entries} relevant entries totaling ${total:.2} in your receipts.")
}

/// Deduplicate raw search results into receipts and line items
///
/// Receipts collapse on `receipt_id`, preferring the authoritative summary
/// record over a stub view of the same receipt (upgrading in place when
/// the summary arrives later in the result list). Items collapse on
/// (receipt, name, price) so the same item surfaced by different chunks
/// appears once.
fn dedupe_evidence(results: &[Evidence]) -> (Vec<ReceiptSummary>, Vec<ItemSummary>) {
    let mut receipts: Vec<ReceiptSummary> = Vec::new();
    let mut receipt_index: HashMap<&str, usize> = HashMap::new();
    let mut items: Vec<ItemSummary> = Vec::new();
    let mut item_keys: HashSet<String> = HashSet::new();

    for evidence in results {
        let receipt_id = evidence.receipt_id.as_str();
        if receipt_id.is_empty() {
            continue;
        }

        if evidence.chunk_type == CHUNK_ITEM_DETAIL {
            let name = evidence.item_name.as_deref().unwrap_or("Unknown");
            let price = evidence.item_price.unwrap_or(0.0);
            let key = format!("{receipt_id}_{name}_{price:.2}");
            if item_keys.insert(key) {
                items.push(ItemSummary {
                    name: name.to_string(),
                    price,
                    category: evidence
                        .item_category
                        .clone()
                        .unwrap_or_else(|| "other".to_string()),
                    merchant: evidence
                        .merchant_name
                        .clone()
                        .unwrap_or_else(|| "Unknown".to_string()),
                    date: evidence.transaction_date.clone(),
                    payment_method: evidence.payment_method.clone(),
                    filename: evidence.filename.clone(),
                });
            }
        }

        match receipt_index.get(receipt_id) {
            None => {
                receipt_index.insert(receipt_id, receipts.len());
                receipts.push(receipt_summary_from(evidence));
            }
            Some(&index)
                if evidence.chunk_type == CHUNK_RECEIPT_SUMMARY && !receipts[index].is_summary =>
            {
                // Upgrade the stub to the authoritative summary record
                receipts[index] = receipt_summary_from(evidence);
            }
            Some(_) => {}
        }
    }

    (receipts, items)
}

fn receipt_summary_from(evidence: &Evidence) -> ReceiptSummary {
    let is_summary = evidence.chunk_type == CHUNK_RECEIPT_SUMMARY;
    let content = if is_summary {
        evidence.content.clone().unwrap_or_default()
    } else {
        format!(
            "Record found in {}",
            evidence.filename.as_deref().unwrap_or("receipt")
        )
    };

    ReceiptSummary {
        receipt_id: evidence.receipt_id.clone(),
        merchant_name: evidence
            .merchant_name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        transaction_date: evidence.transaction_date.clone(),
        total_amount: evidence.total_amount.unwrap_or(0.0),
        tax_amount: evidence.tax_amount,
        tip_amount: evidence.tip_amount,
        subtotal: evidence.subtotal,
        payment_method: evidence.payment_method.clone(),
        content,
        filename: evidence.filename.clone(),
        is_summary,
    }
}
