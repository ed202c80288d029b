//! Shared types for language backend operations

use serde::{Deserialize, Serialize};

use crate::models::{AuditResult, ItemSummary, ReceiptSummary};

/// A date range as returned by a language model (`YYYY-MM-DD` strings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDateRange {
    pub start: String,
    pub end: String,
}

/// Everything the answer-generation step is allowed to ground on
///
/// When `audit` is present the backend is instructed to cite that figure
/// verbatim instead of doing its own arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct AnswerContext<'a> {
    pub query: &'a str,
    pub receipts: &'a [ReceiptSummary],
    pub items: &'a [ItemSummary],
    pub audit: Option<&'a AuditResult>,
}
