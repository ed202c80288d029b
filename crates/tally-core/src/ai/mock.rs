//! Mock backend for testing
//!
//! Provides predictable canned responses for all language operations.
//! Useful for unit tests and development without a running LLM server.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

use crate::error::Result;

use super::types::AnswerContext;
use super::LanguageBackend;

/// Mock language backend for testing
///
/// Returns deterministic responses: a fixed alias table for merchant
/// extraction, a single recognized natural-language period for date
/// extraction, and a template answer citing the audited figure.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self { healthy: true }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }

    /// Create a new instance with a different model (no-op for mock)
    pub fn with_model(&self, _model: &str) -> Self {
        self.clone()
    }
}

#[async_trait]
impl LanguageBackend for MockBackend {
    async fn extract_date_range(
        &self,
        query: &str,
        reference: DateTime<Utc>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        // One natural-language period no rule-based strategy understands
        if query.to_lowercase().contains("holiday season") {
            let start = NaiveDate::from_ymd_opt(reference.year(), 12, 1);
            let end = NaiveDate::from_ymd_opt(reference.year(), 12, 31);
            if let (Some(start), Some(end)) = (start, end) {
                return Ok(Some((
                    start.and_time(NaiveTime::MIN).and_utc(),
                    end.and_time(NaiveTime::MIN).and_utc(),
                )));
            }
        }
        Ok(None)
    }

    async fn extract_merchants(&self, query: &str, known_merchants: &[String]) -> Result<Vec<String>> {
        let lower = query.to_lowercase();
        let mut merchants = Vec::new();

        // Alias resolution a rule-based extractor can't do
        if lower.contains("wfm") {
            merchants.push("Whole Foods Market".to_string());
        }
        if lower.contains("that coffee place") {
            merchants.push("Starbucks".to_string());
        }

        // Lowercase mentions of known merchants
        for known in known_merchants {
            if lower.contains(&known.to_lowercase()) && !merchants.contains(known) {
                merchants.push(known.clone());
            }
        }

        merchants.truncate(5);
        Ok(merchants)
    }

    async fn generate_answer(&self, context: &AnswerContext<'_>) -> Result<String> {
        let mut answer = format!(
            "Found {} receipts and {} items for \"{}\".",
            context.receipts.len(),
            context.items.len(),
            context.query,
        );
        if let Some(audit) = context.audit {
            answer.push_str(&format!(
                " Verified {}: {:.2}.",
                audit.aggregation.as_str(),
                audit.value,
            ));
        }
        Ok(answer)
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_extract_merchants_aliases() {
        let mock = MockBackend::new();
        let merchants = mock
            .extract_merchants("how much did I spend at wfm", &[])
            .await
            .unwrap();
        assert_eq!(merchants, vec!["Whole Foods Market"]);
    }

    #[tokio::test]
    async fn test_mock_extract_merchants_from_known() {
        let mock = MockBackend::new();
        let known = vec!["Safeway".to_string()];
        let merchants = mock
            .extract_merchants("anything from safeway lately", &known)
            .await
            .unwrap();
        assert_eq!(merchants, vec!["Safeway"]);
    }

    #[tokio::test]
    async fn test_mock_extract_date_range() {
        let mock = MockBackend::new();
        let reference = NaiveDate::from_ymd_opt(2023, 12, 15)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc();

        let range = mock
            .extract_date_range("spending during the holiday season", reference)
            .await
            .unwrap();
        let (start, end) = range.unwrap();
        assert_eq!(start.date_naive().to_string(), "2023-12-01");
        assert_eq!(end.date_naive().to_string(), "2023-12-31");

        let none = mock
            .extract_date_range("no dates here", reference)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
