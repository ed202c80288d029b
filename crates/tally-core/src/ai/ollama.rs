//! Ollama backend implementation
//!
//! HTTP client for the Ollama API. Prompts are constrained to strict JSON
//! output for the extraction operations; answer generation is free text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::parsing::{parse_date_range, parse_merchants};
use super::types::AnswerContext;
use super::LanguageBackend;

/// Ollama backend over the non-streaming generate API
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables (`OLLAMA_HOST`, `OLLAMA_MODEL`)
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model))
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Http(response.error_for_status().unwrap_err()));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        debug!("Ollama response: {}", ollama_response.response);
        Ok(ollama_response.response)
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl LanguageBackend for OllamaBackend {
    async fn extract_date_range(
        &self,
        query: &str,
        reference: DateTime<Utc>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let prompt = format!(
            r#"Extract the date range from this query: "{query}"

Current date: {today}

Return JSON only:
{{"date_range": {{"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}}}}

If no date is mentioned, return: {{"date_range": null}}

Examples:
- "the weekend we hosted dinner" with no clear date -> {{"date_range": null}}
- "around the start of spring" -> {{"date_range": {{"start": "{year}-03-15", "end": "{year}-04-15"}}}}"#,
            today = reference.format("%Y-%m-%d"),
            year = reference.format("%Y"),
        );

        let response = self.generate(prompt).await?;
        parse_date_range(&response)
    }

    async fn extract_merchants(&self, query: &str, known_merchants: &[String]) -> Result<Vec<String>> {
        let mut prompt = format!(
            r#"Extract merchant/store names from this query: "{query}"

Return JSON only: {{"merchants": ["Merchant1", "Merchant2"]}}

Rules:
1. Extract ONLY merchant/store/restaurant names
2. Do NOT extract: dates, amounts, categories, items
3. Normalize to proper capitalization (e.g., "walmart" -> "Walmart")
4. If uncertain, return an empty list: {{"merchants": []}}
5. Maximum 5 merchants per query"#,
        );

        if !known_merchants.is_empty() {
            prompt.push_str(&format!(
                "\n\nKnown merchants in the database: {}",
                known_merchants.join(", ")
            ));
        }

        let response = self.generate(prompt).await?;
        let mut merchants = parse_merchants(&response)?;
        merchants.truncate(5);
        Ok(merchants)
    }

    async fn generate_answer(&self, context: &AnswerContext<'_>) -> Result<String> {
        let response = self.generate(build_answer_prompt(context)).await?;
        Ok(response.trim().to_string())
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.http_client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

/// Build the grounded answer prompt
///
/// Counts, the audited figure, and a bounded sample of the evidence go in;
/// the model is told to use the audited figure verbatim.
fn build_answer_prompt(context: &AnswerContext<'_>) -> String {
    let mut prompt = format!(
        r#"You are a professional financial assistant specialized in receipt data analysis. Be precise, concise, and helpful.

Question: "{}"

Grounding data found:
- Receipts matching: {}
- Items matching: {}
"#,
        context.query,
        context.receipts.len(),
        context.items.len(),
    );

    if let Some(audit) = context.audit {
        prompt.push_str(&format!(
            "- Verified {} over {} ({} values): {:.2}\n\
             Use this verified figure exactly as given; do not recompute it.\n",
            audit.aggregation.as_str(),
            audit.metric_field,
            audit.count,
            audit.value,
        ));
    }

    if !context.receipts.is_empty() {
        prompt.push_str("\nTop relevant receipts:\n");
        for receipt in context.receipts.iter().take(5) {
            prompt.push_str(&format!(
                "- {} ({}): ${:.2}",
                receipt.merchant_name,
                receipt.transaction_date.as_deref().unwrap_or("N/A"),
                receipt.total_amount,
            ));
            if let Some(ref method) = receipt.payment_method {
                prompt.push_str(&format!(" via {}", method));
            }
            prompt.push('\n');
        }
    }

    if !context.items.is_empty() {
        prompt.push_str("\nSpecific line items:\n");
        for item in context.items.iter().take(10) {
            prompt.push_str(&format!(
                "- {} (${:.2}) at {} on {}\n",
                item.name,
                item.price,
                item.merchant,
                item.date.as_deref().unwrap_or("N/A"),
            ));
        }
    }

    prompt.push_str(
        "\nInstructions: Provide a structured, professional response. \
         Name specific merchants or items when they were found. \
         If a total was asked for, state it clearly.",
    );
    prompt
}
