//! Domain models for Tally

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// High-level classification of a query's intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Anchored to a date or date range
    Temporal,
    /// Focused on one or more merchants
    Merchant,
    /// Focused on an item category
    Category,
    /// Constrained by a dollar threshold
    Amount,
    /// About specific purchased items
    ItemSpecific,
    /// Asking for a computed figure (sum, average, count)
    Aggregation,
    /// No recognized pattern
    #[default]
    General,
    /// Pipeline failure surfaced to the caller
    Error,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::Merchant => "merchant",
            Self::Category => "category",
            Self::Amount => "amount",
            Self::ItemSpecific => "item_specific",
            Self::Aggregation => "aggregation",
            Self::General => "general",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which monetary field of a receipt a query is asking about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Total,
    Tax,
    Tip,
    Subtotal,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Tax => "tax",
            Self::Tip => "tip",
            Self::Subtotal => "subtotal",
        }
    }

    /// Metadata field carrying this metric on a receipt-level record
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Total => "total_amount",
            Self::Tax => "tax_amount",
            Self::Tip => "tip_amount",
            Self::Subtotal => "subtotal",
        }
    }

    /// Tax and subtotal only exist per receipt, never per line item
    pub fn is_receipt_only(&self) -> bool {
        matches!(self, Self::Tax | Self::Subtotal)
    }
}

/// Requested numeric aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Average,
    Count,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Count => "count",
        }
    }
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "average" | "avg" => Ok(Self::Average),
            "count" => Ok(Self::Count),
            _ => Err(format!("Unknown aggregation: {}", s)),
        }
    }
}

/// Whether an aggregation iterates over distinct receipts or distinct items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SumBasis {
    #[default]
    Receipts,
    Items,
}

impl SumBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receipts => "receipts",
            Self::Items => "items",
        }
    }
}

/// Payment method mentioned in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Credit,
    Debit,
    ApplePay,
    GooglePay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::ApplePay => "apple_pay",
            Self::GooglePay => "google_pay",
        }
    }
}

/// Card network mentioned in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardNetwork {
    Visa,
    Mastercard,
    Amex,
    Discover,
}

impl CardNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
        }
    }
}

/// Item categories produced by the upstream receipt chunker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Groceries,
    Restaurant,
    FastFood,
    CoffeeShop,
    Electronics,
    Pharmacy,
    Treats,
    Other,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groceries => "groceries",
            Self::Restaurant => "restaurant",
            Self::FastFood => "fast_food",
            Self::CoffeeShop => "coffee_shop",
            Self::Electronics => "electronics",
            Self::Pharmacy => "pharmacy",
            Self::Treats => "treats",
            Self::Other => "other",
        }
    }
}

/// Boolean receipt/item attributes a query can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    HasWarranty,
    IsReturn,
    HasTip,
    HasDiscounts,
    HasDeliveryFee,
}

impl FeatureFlag {
    /// Metadata field this flag filters on
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::HasWarranty => "has_warranty",
            Self::IsReturn => "is_return",
            Self::HasTip => "has_tip",
            Self::HasDiscounts => "has_discounts",
            Self::HasDeliveryFee => "has_delivery_fee",
        }
    }
}

/// A city/state constraint extracted from a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
}

/// A resolved temporal constraint
///
/// Either a concrete inclusive timestamp range, or a coarse month filter for
/// queries that name a month without enough context to bound the year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateConstraint {
    /// Inclusive UTC range; boundaries always fall on
    /// 00:00:00.000000 / 23:59:59.999999 of their respective days
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Month-of-year filter, optionally pinned to a year
    Month { month: u32, year: Option<i32> },
}

impl DateConstraint {
    pub fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Range { start, end }
    }
}

/// The structured representation of a parsed natural-language query
///
/// Built once per query by the parser and never mutated afterward.
/// Unparseable fragments are omitted rather than causing failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub raw_query: String,
    pub query_type: QueryType,
    /// Resolved date constraint, if any temporal expression was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateConstraint>,
    /// Display-cased merchant names, deduplicated case-insensitively
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub merchants: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub categories: Vec<ItemCategory>,
    /// Extra keywords appended to the retrieval query text for semantic
    /// ranking (e.g. "treats" expands to candy/chocolate/ice cream)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub semantic_terms: Vec<String>,
    pub metric: Metric,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    pub sum_basis: SumBasis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    /// AND-composed boolean attribute filters
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub feature_flags: BTreeMap<FeatureFlag, bool>,
    /// OR-composed flags for explicitly disjunctive requests
    /// ("receipts with a delivery fee or tip")
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub feature_any_of: Vec<FeatureFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_network: Option<CardNetwork>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Intent {
    /// An empty intent for a raw query, before any extraction has run
    pub fn new(raw_query: &str) -> Self {
        Self {
            raw_query: raw_query.to_string(),
            query_type: QueryType::General,
            date: None,
            merchants: Vec::new(),
            categories: Vec::new(),
            semantic_terms: Vec::new(),
            metric: Metric::Total,
            aggregation: None,
            sum_basis: SumBasis::Receipts,
            min_amount: None,
            max_amount: None,
            feature_flags: BTreeMap::new(),
            feature_any_of: Vec::new(),
            payment_method: None,
            card_network: None,
            location: None,
        }
    }
}

/// Output of the deterministic aggregation audit
///
/// Pure arithmetic over retrieved metadata; exists so the answer-generation
/// model can cite a verified figure instead of computing its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub aggregation: Aggregation,
    pub basis: SumBasis,
    /// Metadata field the values were read from
    pub metric_field: String,
    /// Number of distinct values that entered the computation
    pub count: usize,
    pub value: f64,
    pub verified: bool,
}

/// One deduplicated receipt in a query result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub receipt_id: String,
    pub merchant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<String>,
    pub total_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Whether this entry came from an authoritative summary record
    /// (as opposed to a stub view of the same receipt)
    pub is_summary: bool,
}

/// One deduplicated line item in a query result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSummary {
    pub name: String,
    pub price: f64,
    pub category: String,
    pub merchant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Metadata attached to a query result for inspection and citation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub search_results_count: usize,
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditResult>,
}

/// The final response for a single query invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub receipts: Vec<ReceiptSummary>,
    pub items: Vec<ItemSummary>,
    /// Heuristic confidence in [0, 1]
    pub confidence: f64,
    pub query_type: QueryType,
    /// Wall-clock seconds spent in the pipeline
    pub processing_time: f64,
    pub metadata: QueryMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_field_names() {
        assert_eq!(Metric::Total.field_name(), "total_amount");
        assert_eq!(Metric::Tax.field_name(), "tax_amount");
        assert_eq!(Metric::Tip.field_name(), "tip_amount");
        assert_eq!(Metric::Subtotal.field_name(), "subtotal");
    }

    #[test]
    fn test_receipt_only_metrics() {
        assert!(Metric::Tax.is_receipt_only());
        assert!(Metric::Subtotal.is_receipt_only());
        assert!(!Metric::Total.is_receipt_only());
        assert!(!Metric::Tip.is_receipt_only());
    }

    #[test]
    fn test_aggregation_from_str() {
        assert_eq!("sum".parse::<Aggregation>().unwrap(), Aggregation::Sum);
        assert_eq!("avg".parse::<Aggregation>().unwrap(), Aggregation::Average);
        assert!("median".parse::<Aggregation>().is_err());
    }

    #[test]
    fn test_intent_serializes_without_empty_fields() {
        let intent = Intent::new("test query");
        let json = serde_json::to_value(&intent).unwrap();
        assert!(json.get("merchants").is_none());
        assert!(json.get("date").is_none());
        assert_eq!(json["query_type"], "general");
    }
}
