//! Query parsing: natural language to structured intent
//!
//! Composes the temporal and merchant resolvers with category mapping,
//! payment detection, threshold extraction, and aggregation classification
//! to produce an `Intent`. Deterministic given the same reference date and
//! corpus state; unparseable fragments are omitted, never fatal.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::ai::AiClient;
use crate::merchant::MerchantResolver;
use crate::models::{
    Aggregation, CardNetwork, FeatureFlag, Intent, ItemCategory, Location, Metric, PaymentMethod,
    QueryType, SumBasis,
};
use crate::temporal::TemporalResolver;

/// Category-indicating substrings mapped to normalized tags
const CATEGORY_MAPPINGS: &[(&str, ItemCategory)] = &[
    ("coffee shop", ItemCategory::CoffeeShop),
    ("restaurant", ItemCategory::Restaurant),
    ("groceries", ItemCategory::Groceries),
    ("electronics", ItemCategory::Electronics),
    ("pharmacy", ItemCategory::Pharmacy),
    ("health", ItemCategory::Pharmacy),
    ("treats", ItemCategory::Treats),
];

/// Keyword groups expanded into the retrieval query text so semantic
/// ranking sees concrete vocabulary for a general term
const SEMANTIC_MAPPINGS: &[(&str, &[&str])] = &[
    (
        "health related",
        &["pharmacy", "health", "medicine", "vitamin", "supplement"],
    ),
    (
        "treats",
        &[
            "candy",
            "chocolate",
            "ice cream",
            "cake",
            "cookie",
            "donut",
            "dessert",
            "sweet",
        ],
    ),
    (
        "coffee shops",
        &["coffee", "starbucks", "dunkin", "cafe", "latte", "espresso"],
    ),
    (
        "restaurants",
        &[
            "restaurant",
            "burger",
            "pizza",
            "sandwich",
            "salad",
            "pasta",
            "steak",
        ],
    ),
];

/// Parses natural language queries into structured intents
pub struct QueryParser {
    temporal: TemporalResolver,
    merchants: Arc<MerchantResolver>,
    ai: Option<AiClient>,
    classifiers: Vec<(QueryType, Vec<Regex>)>,
}

impl QueryParser {
    /// Build a parser over a request-scoped temporal resolver and the
    /// process-lifetime merchant corpus
    pub fn new(
        temporal: TemporalResolver,
        merchants: Arc<MerchantResolver>,
        ai: Option<AiClient>,
    ) -> Self {
        Self {
            temporal,
            merchants,
            ai,
            classifiers: build_classifiers(),
        }
    }

    /// Extract all parameters and intent from a query
    ///
    /// Rule-based extraction always runs first; the language fallback only
    /// fills fields the rules left empty, never overwriting them.
    pub async fn parse(&self, query: &str) -> Intent {
        let lower = query.to_lowercase();
        let mut intent = Intent::new(query);

        intent.query_type = self.classify(&lower);
        intent.metric = extract_metric(&lower);
        intent.date = self.temporal.resolve(query);
        intent.merchants = self.merchants.extract(query);
        intent.categories = extract_categories(&lower);
        intent.semantic_terms = extract_semantic_terms(&lower);
        (intent.payment_method, intent.card_network) = extract_payment(&lower);
        (intent.feature_flags, intent.feature_any_of) = extract_feature_flags(&lower);
        (intent.min_amount, intent.max_amount) = extract_amounts(&lower);
        intent.aggregation = extract_aggregation(&lower);
        intent.location = extract_location(query);

        // Language fallback for fields the rules couldn't fill
        if intent.merchants.is_empty() {
            intent.merchants = self
                .merchants
                .extract_with_fallback(query, self.ai.as_ref())
                .await;
        }
        if intent.date.is_none() {
            intent.date = self
                .temporal
                .resolve_with_fallback(query, self.ai.as_ref())
                .await;
        }

        intent.sum_basis = derive_sum_basis(&intent, &lower);

        debug!(query, query_type = %intent.query_type, "parsed intent");
        intent
    }

    /// First pattern class that matches wins; `general` if none
    fn classify(&self, query: &str) -> QueryType {
        for (query_type, patterns) in &self.classifiers {
            if patterns.iter().any(|p| p.is_match(query)) {
                return *query_type;
            }
        }
        QueryType::General
    }
}

fn build_classifiers() -> Vec<(QueryType, Vec<Regex>)> {
    const MONTH_ALTERNATION: &str =
        "january|february|march|april|may|june|july|august|september|october|november|december";

    let table: Vec<(QueryType, Vec<String>)> = vec![
        (
            QueryType::Temporal,
            vec![
                format!(r"how much.* (?:in|during|for) (?:{MONTH_ALTERNATION})"),
                r"how much.* (?:last|this|past) (?:week|month|year)".to_string(),
                format!(r"show me.* (?:{MONTH_ALTERNATION})"),
                r"what did i buy (?:last|this|past) (?:week|month|year)".to_string(),
                r"(?:in|during) (?:20\d{2})".to_string(),
            ],
        ),
        (
            QueryType::Merchant,
            vec![
                r"show me.* (?:from|at) .*".to_string(),
                r"find all.* receipts? (?:from|at) .*".to_string(),
                r"how much.* (?:at|from) .*".to_string(),
            ],
        ),
        (
            QueryType::Category,
            vec![
                r"how much.* (?:coffee shops|restaurants|groceries|electronics)".to_string(),
                r"show me.* (?:electronics|groceries|pharmacy|health)".to_string(),
                r"what's.* (?:total|total spending) (?:at|in) (?:restaurants|coffee shops)"
                    .to_string(),
                r"list all.* (?:groceries|electronics)".to_string(),
            ],
        ),
        (
            QueryType::Amount,
            vec![
                r"over \$\d+".to_string(),
                r"under \$\d+".to_string(),
                r"between \$\d+ and \$\d+".to_string(),
                r"more than \$\d+".to_string(),
                r"less than \$\d+".to_string(),
            ],
        ),
        (
            QueryType::ItemSpecific,
            vec![
                r"find.* with warranty".to_string(),
                r"show me.* (?:phone|laptop|tv|tablet)".to_string(),
                r"list all.* (?:vitamins|medicine|supplements)".to_string(),
            ],
        ),
        (
            QueryType::Aggregation,
            vec![
                r"how much.* (?:total|sum)".to_string(),
                r"what's my total".to_string(),
                r"average".to_string(),
                r"count".to_string(),
            ],
        ),
    ];

    table
        .into_iter()
        .map(|(query_type, patterns)| {
            let compiled = patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect();
            (query_type, compiled)
        })
        .collect()
}

/// Tax if "tax" is present, tip on a word-boundary "tip", "subtotal" for
/// subtotal, else total
fn extract_metric(query: &str) -> Metric {
    if query.contains("tax") {
        return Metric::Tax;
    }
    if Regex::new(r"\btips?\b").is_ok_and(|re| re.is_match(query)) {
        return Metric::Tip;
    }
    if query.contains("subtotal") {
        return Metric::Subtotal;
    }
    Metric::Total
}

fn extract_categories(query: &str) -> Vec<ItemCategory> {
    let mut categories = Vec::new();
    for (term, category) in CATEGORY_MAPPINGS {
        if query.contains(term) && !categories.contains(category) {
            categories.push(*category);
        }
    }
    categories
}

fn extract_semantic_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for (group, keywords) in SEMANTIC_MAPPINGS {
        let triggered = query.contains(group) || keywords.iter().any(|kw| query.contains(kw));
        if triggered {
            for keyword in *keywords {
                if !terms.iter().any(|t| t == keyword) {
                    terms.push(keyword.to_string());
                }
            }
        }
    }
    terms
}

/// Payment method and card network keywords; a network mentioned without
/// an explicit method implies credit
fn extract_payment(query: &str) -> (Option<PaymentMethod>, Option<CardNetwork>) {
    let method = if query.contains("apple pay") {
        Some(PaymentMethod::ApplePay)
    } else if query.contains("google pay") {
        Some(PaymentMethod::GooglePay)
    } else if Regex::new(r"\bcash\b").is_ok_and(|re| re.is_match(query)) {
        Some(PaymentMethod::Cash)
    } else if query.contains("debit") {
        Some(PaymentMethod::Debit)
    } else if query.contains("credit") {
        Some(PaymentMethod::Credit)
    } else {
        None
    };

    let network = if query.contains("visa") {
        Some(CardNetwork::Visa)
    } else if query.contains("mastercard") {
        Some(CardNetwork::Mastercard)
    } else if query.contains("amex") || query.contains("american express") {
        Some(CardNetwork::Amex)
    } else if query.contains("discover") {
        Some(CardNetwork::Discover)
    } else {
        None
    };

    match (method, network) {
        (None, Some(network)) => (Some(PaymentMethod::Credit), Some(network)),
        other => other,
    }
}

fn extract_feature_flags(query: &str) -> (BTreeMap<FeatureFlag, bool>, Vec<FeatureFlag>) {
    let mut flags = BTreeMap::new();
    let tip_mentioned = Regex::new(r"\btips?\b").is_ok_and(|re| re.is_match(query));

    if query.contains("warranty") {
        flags.insert(FeatureFlag::HasWarranty, true);
    }
    if query.contains("return") || query.contains("refund") {
        flags.insert(FeatureFlag::IsReturn, true);
    }
    if query.contains("discount") {
        flags.insert(FeatureFlag::HasDiscounts, true);
    }
    if query.contains("delivery") {
        flags.insert(FeatureFlag::HasDeliveryFee, true);
    }
    if tip_mentioned {
        flags.insert(FeatureFlag::HasTip, true);
    }

    // "a delivery fee or a tip" is an explicitly disjunctive request, not
    // two independent constraints
    let disjunctive = Regex::new(r"delivery[a-z\s]*\bor\b[a-z\s]*tip|tip[a-z\s]*\bor\b[a-z\s]*delivery")
        .is_ok_and(|re| re.is_match(query));
    if disjunctive && flags.contains_key(&FeatureFlag::HasDeliveryFee) && tip_mentioned {
        flags.remove(&FeatureFlag::HasDeliveryFee);
        flags.remove(&FeatureFlag::HasTip);
        return (flags, vec![FeatureFlag::HasDeliveryFee, FeatureFlag::HasTip]);
    }

    (flags, Vec::new())
}

/// `$N` amounts with a direction keyword: over/more than/above set a
/// minimum, under/less than/below a maximum
fn extract_amounts(query: &str) -> (Option<f64>, Option<f64>) {
    let Ok(re) = Regex::new(r"\$(\d+(?:\.\d{1,2})?)") else {
        return (None, None);
    };

    let has_min_keyword = ["over", "more than", "above"]
        .iter()
        .any(|kw| query.contains(kw));
    let has_max_keyword = ["under", "less than", "below"]
        .iter()
        .any(|kw| query.contains(kw));

    let mut min = None;
    let mut max = None;
    for caps in re.captures_iter(query) {
        let Ok(amount) = caps[1].parse::<f64>() else {
            continue;
        };
        if has_min_keyword && min.is_none() {
            min = Some(amount);
        } else if has_max_keyword && max.is_none() {
            max = Some(amount);
        }
    }
    (min, max)
}

/// One aggregation per query; the first matching keyword group wins
fn extract_aggregation(query: &str) -> Option<Aggregation> {
    const SUM_KEYWORDS: &[&str] = &["total", "sum", "add up", "how much", "spent"];
    const AVERAGE_KEYWORDS: &[&str] = &["average", "avg"];
    const COUNT_KEYWORDS: &[&str] = &["count", "how many"];

    if SUM_KEYWORDS.iter().any(|kw| query.contains(kw)) {
        return Some(Aggregation::Sum);
    }
    if AVERAGE_KEYWORDS.iter().any(|kw| query.contains(kw)) {
        return Some(Aggregation::Average);
    }
    if COUNT_KEYWORDS.iter().any(|kw| query.contains(kw)) {
        return Some(Aggregation::Count);
    }
    None
}

/// "in <City>, <ST>" on the original-cased query
fn extract_location(query: &str) -> Option<Location> {
    let re = Regex::new(r"\bin ([A-Z][a-z]+(?: [A-Z][a-z]+)*),\s*([A-Z]{2})\b").ok()?;
    let caps = re.captures(query)?;
    Some(Location {
        city: Some(caps[1].to_string()),
        state: Some(caps[2].to_string()),
    })
}

/// Receipts for receipt-only metrics; items when the query is about
/// categories or individual purchases; receipts otherwise
fn derive_sum_basis(intent: &Intent, query: &str) -> SumBasis {
    if intent.metric.is_receipt_only() {
        return SumBasis::Receipts;
    }

    let item_query_type = matches!(
        intent.query_type,
        QueryType::Category | QueryType::ItemSpecific
    );
    let purchase_keywords = Regex::new(r"\b(?:items?|buy|bought|purchases?|purchased)\b")
        .is_ok_and(|re| re.is_match(query));

    if item_query_type || !intent.categories.is_empty() || purchase_keywords {
        SumBasis::Items
    } else {
        SumBasis::Receipts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateConstraint;
    use chrono::{NaiveDate, NaiveTime};

    fn parser() -> QueryParser {
        let reference = NaiveDate::from_ymd_opt(2024, 2, 7)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc();
        QueryParser::new(
            TemporalResolver::anchored(reference),
            Arc::new(MerchantResolver::new()),
            None,
        )
    }

    fn parser_with_mock_ai() -> QueryParser {
        let reference = NaiveDate::from_ymd_opt(2023, 12, 15)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc();
        QueryParser::new(
            TemporalResolver::anchored(reference),
            Arc::new(MerchantResolver::new()),
            Some(AiClient::mock()),
        )
    }

    #[tokio::test]
    async fn test_merchant_temporal_aggregation_query() {
        let intent = parser()
            .parse("How much did I spend at Walmart in January 2024?")
            .await;

        assert_eq!(intent.merchants, vec!["Walmart"]);
        assert_eq!(intent.aggregation, Some(Aggregation::Sum));
        assert_eq!(intent.sum_basis, SumBasis::Receipts);
        match intent.date.unwrap() {
            DateConstraint::Range { start, end } => {
                assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
                assert_eq!(end.to_rfc3339(), "2024-01-31T23:59:59.999999+00:00");
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_category_threshold_query() {
        let intent = parser().parse("List all groceries over $5").await;

        assert_eq!(intent.categories, vec![ItemCategory::Groceries]);
        assert_eq!(intent.min_amount, Some(5.0));
        assert_eq!(intent.sum_basis, SumBasis::Items);
        assert_eq!(intent.query_type, QueryType::Category);
    }

    #[tokio::test]
    async fn test_metric_extraction() {
        let parser = parser();
        assert_eq!(
            parser.parse("how much tax did I pay").await.metric,
            Metric::Tax
        );
        assert_eq!(
            parser.parse("what did I tip last month").await.metric,
            Metric::Tip
        );
        assert_eq!(
            parser.parse("subtotal at Costco").await.metric,
            Metric::Subtotal
        );
        assert_eq!(parser.parse("how much at Target").await.metric, Metric::Total);
    }

    #[tokio::test]
    async fn test_tip_metric_requires_word_boundary() {
        // "multiple" contains "tip" but must not read as a tip query
        let intent = parser().parse("multiple receipts from Safeway").await;
        assert_eq!(intent.metric, Metric::Total);
    }

    #[tokio::test]
    async fn test_receipt_only_metric_forces_receipt_basis() {
        let intent = parser().parse("total tax on my groceries").await;
        assert_eq!(intent.metric, Metric::Tax);
        assert_eq!(intent.sum_basis, SumBasis::Receipts);
    }

    #[tokio::test]
    async fn test_payment_method_and_network() {
        let parser = parser();

        let intent = parser.parse("receipts paid with apple pay").await;
        assert_eq!(intent.payment_method, Some(PaymentMethod::ApplePay));

        // A bare network implies a credit card
        let intent = parser.parse("what did I put on my visa").await;
        assert_eq!(intent.payment_method, Some(PaymentMethod::Credit));
        assert_eq!(intent.card_network, Some(CardNetwork::Visa));
    }

    #[tokio::test]
    async fn test_feature_flags_conjunctive() {
        let intent = parser().parse("find purchases with warranty").await;
        assert_eq!(intent.feature_flags.get(&FeatureFlag::HasWarranty), Some(&true));
        assert!(intent.feature_any_of.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_or_tip_is_disjunctive() {
        let intent = parser()
            .parse("receipts with a delivery fee or a tip")
            .await;
        assert_eq!(
            intent.feature_any_of,
            vec![FeatureFlag::HasDeliveryFee, FeatureFlag::HasTip]
        );
        assert!(!intent.feature_flags.contains_key(&FeatureFlag::HasDeliveryFee));
        assert!(!intent.feature_flags.contains_key(&FeatureFlag::HasTip));
    }

    #[tokio::test]
    async fn test_delivery_and_tip_stay_conjunctive_without_or() {
        let intent = parser().parse("delivery receipts with a tip").await;
        assert!(intent.feature_any_of.is_empty());
        assert_eq!(
            intent.feature_flags.get(&FeatureFlag::HasDeliveryFee),
            Some(&true)
        );
        assert_eq!(intent.feature_flags.get(&FeatureFlag::HasTip), Some(&true));
    }

    #[tokio::test]
    async fn test_max_amount() {
        let intent = parser().parse("show receipts under $20").await;
        assert_eq!(intent.max_amount, Some(20.0));
        assert_eq!(intent.min_amount, None);
    }

    #[tokio::test]
    async fn test_aggregation_count() {
        let intent = parser().parse("how many receipts from Target").await;
        assert_eq!(intent.aggregation, Some(Aggregation::Count));
    }

    #[tokio::test]
    async fn test_semantic_terms_expand_treats() {
        let intent = parser().parse("how much on treats").await;
        assert!(intent.semantic_terms.iter().any(|t| t == "candy"));
        assert!(intent.semantic_terms.iter().any(|t| t == "chocolate"));
    }

    #[tokio::test]
    async fn test_location_extraction() {
        let intent = parser().parse("receipts from Safeway in San Jose, CA").await;
        let location = intent.location.unwrap();
        assert_eq!(location.city.as_deref(), Some("San Jose"));
        assert_eq!(location.state.as_deref(), Some("CA"));
    }

    #[tokio::test]
    async fn test_unparseable_fragments_are_omitted() {
        let intent = parser().parse("stuff and things").await;
        assert_eq!(intent.query_type, QueryType::General);
        assert!(intent.merchants.is_empty());
        assert!(intent.date.is_none());
        assert!(intent.aggregation.is_none());
    }

    #[tokio::test]
    async fn test_fallback_fills_missing_merchants_only() {
        // "wfm" is invisible to the rule-based strategies; the mock backend
        // resolves the alias
        let intent = parser_with_mock_ai().parse("how much at wfm").await;
        assert_eq!(intent.merchants, vec!["Whole Foods Market"]);
    }

    #[tokio::test]
    async fn test_fallback_fills_missing_date_only() {
        let intent = parser_with_mock_ai()
            .parse("spending during the holiday season")
            .await;
        match intent.date.unwrap() {
            DateConstraint::Range { start, end } => {
                assert_eq!(start.date_naive().to_string(), "2023-12-01");
                assert_eq!(end.date_naive().to_string(), "2023-12-31");
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fallback_never_overwrites_rule_results() {
        // The rules resolve "January 2024" and "Walmart"; the mock backend
        // must not be consulted for either
        let intent = parser_with_mock_ai()
            .parse("How much at Walmart in January 2024")
            .await;
        assert_eq!(intent.merchants, vec!["Walmart"]);
        match intent.date.unwrap() {
            DateConstraint::Range { start, .. } => {
                assert_eq!(start.date_naive().to_string(), "2024-01-01");
            }
            other => panic!("expected range, got {:?}", other),
        }
    }
}
