//! Retrieval filter construction
//!
//! Translates a parsed `Intent` into the boolean/range predicate language
//! the retrieval capability accepts (equality, `$in`, `$gte`/`$lte`,
//! `$or`/`$and`). Filters are built once per query and never mutated after
//! construction.

use serde::Serialize;
use serde_json::{json, Value};

use crate::merchant::normalize_merchant_name;
use crate::models::{DateConstraint, FeatureFlag, Intent, SumBasis};

/// Store-suffixed spellings of well-known chains
///
/// The index carries whatever the receipt printed, so a query for "Walmart"
/// must also match receipts tagged "Walmart Supercenter".
const MERCHANT_VARIATIONS: &[(&str, &[&str])] = &[
    ("walmart", &["Walmart", "Walmart Supercenter"]),
    ("whole foods", &["Whole Foods", "Whole Foods Market"]),
    ("target", &["Target", "Target Store"]),
    ("best buy", &["Best Buy", "Best Buy Store"]),
    ("costco", &["Costco", "Costco Wholesale"]),
];

/// A single metadata predicate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Eq {
        field: String,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    Or(Vec<Predicate>),
}

impl Predicate {
    fn to_wire(&self) -> Value {
        match self {
            Predicate::Eq { field, value } => keyed(field, json!({ "$eq": value })),
            Predicate::In { field, values } => keyed(field, json!({ "$in": values })),
            Predicate::Range { field, gte, lte } => {
                let mut range = serde_json::Map::new();
                if let Some(gte) = gte {
                    range.insert("$gte".to_string(), gte.clone());
                }
                if let Some(lte) = lte {
                    range.insert("$lte".to_string(), lte.clone());
                }
                keyed(field, Value::Object(range))
            }
            Predicate::Or(predicates) => {
                json!({ "$or": predicates.iter().map(Predicate::to_wire).collect::<Vec<_>>() })
            }
        }
    }
}

fn keyed(field: &str, inner: Value) -> Value {
    let mut object = serde_json::Map::new();
    object.insert(field.to_string(), inner);
    Value::Object(object)
}

/// An immutable conjunction of predicates for one query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalFilter {
    clauses: Vec<Predicate>,
}

impl RetrievalFilter {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Predicate] {
        &self.clauses
    }

    /// Serialize to the wire format the retrieval capability accepts
    ///
    /// `None` when no constraints were extracted (pure semantic search).
    pub fn to_wire(&self) -> Option<Value> {
        match self.clauses.len() {
            0 => None,
            1 => Some(self.clauses[0].to_wire()),
            _ => Some(json!({
                "$and": self.clauses.iter().map(Predicate::to_wire).collect::<Vec<_>>()
            })),
        }
    }
}

/// Builder assembling filter predicates from intent fields
///
/// Each setter is a no-op when the corresponding intent field is absent,
/// so construction reads as a straight pipeline.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    clauses: Vec<Predicate>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merchant equality on normalized names, fanned out across known
    /// store-suffixed variations
    pub fn merchants(mut self, names: &[String]) -> Self {
        let mut normalized: Vec<String> = Vec::new();
        for name in names {
            let expanded = MERCHANT_VARIATIONS
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
                .map(|(_, variants)| variants.iter().map(|v| v.to_string()).collect::<Vec<_>>())
                .unwrap_or_else(|| vec![name.clone()]);

            for variant in expanded {
                let norm = normalize_merchant_name(&variant);
                if !norm.is_empty() && !normalized.contains(&norm) {
                    normalized.push(norm);
                }
            }
        }

        match normalized.len() {
            0 => {}
            1 => self.clauses.push(Predicate::Eq {
                field: "merchant_name_normalized".to_string(),
                value: json!(normalized[0]),
            }),
            _ => self.clauses.push(Predicate::In {
                field: "merchant_name_normalized".to_string(),
                values: normalized.into_iter().map(|n| json!(n)).collect(),
            }),
        }
        self
    }

    /// Timestamp range as integer epoch seconds, or coarse month/year
    /// equality for month-only constraints
    pub fn date(mut self, constraint: Option<&DateConstraint>) -> Self {
        match constraint {
            Some(DateConstraint::Range { start, end }) => {
                self.clauses.push(Predicate::Range {
                    field: "transaction_ts".to_string(),
                    gte: Some(json!(start.timestamp())),
                    lte: Some(json!(end.timestamp())),
                });
            }
            Some(DateConstraint::Month { month, year }) => {
                self.clauses.push(Predicate::Eq {
                    field: "transaction_month".to_string(),
                    value: json!(month),
                });
                if let Some(year) = year {
                    self.clauses.push(Predicate::Eq {
                        field: "transaction_year".to_string(),
                        value: json!(year),
                    });
                }
            }
            None => {}
        }
        self
    }

    /// Category filter, disjunctive across the item-level field and the
    /// receipt-level category list (the index tags either granularity)
    pub fn categories(mut self, categories: &[crate::models::ItemCategory]) -> Self {
        if categories.is_empty() {
            return self;
        }

        let tag_predicate = |field: &str| {
            if categories.len() == 1 {
                Predicate::Eq {
                    field: field.to_string(),
                    value: json!(categories[0].as_str()),
                }
            } else {
                Predicate::In {
                    field: field.to_string(),
                    values: categories.iter().map(|c| json!(c.as_str())).collect(),
                }
            }
        };

        self.clauses.push(Predicate::Or(vec![
            tag_predicate("item_category"),
            tag_predicate("categories"),
        ]));
        self
    }

    /// Dollar threshold on the metric field (or per-item price when the
    /// aggregation iterates over items)
    pub fn amount_threshold(
        mut self,
        field: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Self {
        if min.is_none() && max.is_none() {
            return self;
        }
        self.clauses.push(Predicate::Range {
            field: field.to_string(),
            gte: min.map(|v| json!(v)),
            lte: max.map(|v| json!(v)),
        });
        self
    }

    /// AND-composed boolean attribute filters
    pub fn feature_flags<'a, I>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = (&'a FeatureFlag, &'a bool)>,
    {
        for (flag, value) in flags {
            self.clauses.push(Predicate::Eq {
                field: flag.field_name().to_string(),
                value: json!(value),
            });
        }
        self
    }

    /// OR-composed flags for an explicitly disjunctive request
    pub fn feature_any_of(mut self, flags: &[FeatureFlag]) -> Self {
        if flags.is_empty() {
            return self;
        }
        self.clauses.push(Predicate::Or(
            flags
                .iter()
                .map(|flag| Predicate::Eq {
                    field: flag.field_name().to_string(),
                    value: json!(true),
                })
                .collect(),
        ));
        self
    }

    pub fn payment_method(mut self, method: Option<crate::models::PaymentMethod>) -> Self {
        if let Some(method) = method {
            self.clauses.push(Predicate::Eq {
                field: "payment_method".to_string(),
                value: json!(method.as_str()),
            });
        }
        self
    }

    pub fn card_network(mut self, network: Option<crate::models::CardNetwork>) -> Self {
        if let Some(network) = network {
            self.clauses.push(Predicate::Eq {
                field: "card_network".to_string(),
                value: json!(network.as_str()),
            });
        }
        self
    }

    pub fn location(mut self, location: Option<&crate::models::Location>) -> Self {
        if let Some(location) = location {
            if let Some(ref city) = location.city {
                self.clauses.push(Predicate::Eq {
                    field: "merchant_city".to_string(),
                    value: json!(city),
                });
            }
            if let Some(ref state) = location.state {
                self.clauses.push(Predicate::Eq {
                    field: "merchant_state".to_string(),
                    value: json!(state),
                });
            }
        }
        self
    }

    pub fn build(self) -> RetrievalFilter {
        RetrievalFilter {
            clauses: self.clauses,
        }
    }
}

/// Build the complete retrieval filter for a parsed intent
pub fn from_intent(intent: &Intent) -> RetrievalFilter {
    let threshold_field = if intent.sum_basis == SumBasis::Items {
        "item_price"
    } else {
        intent.metric.field_name()
    };

    FilterBuilder::new()
        .merchants(&intent.merchants)
        .date(intent.date.as_ref())
        .categories(&intent.categories)
        .amount_threshold(threshold_field, intent.min_amount, intent.max_amount)
        .feature_flags(&intent.feature_flags)
        .feature_any_of(&intent.feature_any_of)
        .payment_method(intent.payment_method)
        .card_network(intent.card_network)
        .location(intent.location.as_ref())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemCategory, PaymentMethod};
    use chrono::{NaiveDate, NaiveTime};

    fn utc(year: i32, month: u32, day: u32) -> chrono::DateTime<chrono::Utc> {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    #[test]
    fn test_empty_intent_produces_empty_filter() {
        let intent = Intent::new("anything");
        let filter = from_intent(&intent);
        assert!(filter.is_empty());
        assert!(filter.to_wire().is_none());
    }

    #[test]
    fn test_merchant_variation_fanout() {
        let filter = FilterBuilder::new()
            .merchants(&["Walmart".to_string()])
            .build();

        let wire = filter.to_wire().unwrap();
        let values = &wire["merchant_name_normalized"]["$in"];
        assert_eq!(values[0], "walmart");
        assert_eq!(values[1], "walmart supercenter");
    }

    #[test]
    fn test_merchant_variants_dedupe_after_normalization() {
        // "Target" and "Target Store" normalize identically
        let filter = FilterBuilder::new()
            .merchants(&["Target".to_string()])
            .build();

        let wire = filter.to_wire().unwrap();
        assert_eq!(wire["merchant_name_normalized"]["$eq"], "target");
    }

    #[test]
    fn test_date_range_uses_epoch_seconds() {
        let start = utc(2024, 1, 1);
        let end = utc(2024, 1, 31);
        let constraint = DateConstraint::range(start, end);
        let filter = FilterBuilder::new().date(Some(&constraint)).build();

        let wire = filter.to_wire().unwrap();
        assert_eq!(wire["transaction_ts"]["$gte"], start.timestamp());
        assert_eq!(wire["transaction_ts"]["$lte"], end.timestamp());
    }

    #[test]
    fn test_coarse_month_filter() {
        let constraint = DateConstraint::Month {
            month: 12,
            year: Some(2023),
        };
        let filter = FilterBuilder::new().date(Some(&constraint)).build();

        let wire = filter.to_wire().unwrap();
        let clauses = wire["$and"].as_array().unwrap();
        assert_eq!(clauses[0]["transaction_month"]["$eq"], 12);
        assert_eq!(clauses[1]["transaction_year"]["$eq"], 2023);
    }

    #[test]
    fn test_category_filter_covers_both_granularities() {
        let filter = FilterBuilder::new()
            .categories(&[ItemCategory::Groceries])
            .build();

        let wire = filter.to_wire().unwrap();
        let or = wire["$or"].as_array().unwrap();
        assert_eq!(or[0]["item_category"]["$eq"], "groceries");
        assert_eq!(or[1]["categories"]["$eq"], "groceries");
    }

    #[test]
    fn test_feature_any_of_is_disjunctive() {
        let filter = FilterBuilder::new()
            .feature_any_of(&[FeatureFlag::HasDeliveryFee, FeatureFlag::HasTip])
            .build();

        let wire = filter.to_wire().unwrap();
        let or = wire["$or"].as_array().unwrap();
        assert_eq!(or[0]["has_delivery_fee"]["$eq"], true);
        assert_eq!(or[1]["has_tip"]["$eq"], true);
    }

    #[test]
    fn test_threshold_field_follows_sum_basis() {
        let mut intent = Intent::new("groceries over $5");
        intent.categories = vec![ItemCategory::Groceries];
        intent.sum_basis = SumBasis::Items;
        intent.min_amount = Some(5.0);

        let filter = from_intent(&intent);
        let wire = filter.to_wire().unwrap();
        let clauses = wire["$and"].as_array().unwrap();
        assert!(clauses
            .iter()
            .any(|c| c.get("item_price").is_some_and(|p| p["$gte"] == 5.0)));
    }

    #[test]
    fn test_full_intent_composes_with_and() {
        let mut intent = Intent::new("visa receipts from Costco over $100");
        intent.merchants = vec!["Costco".to_string()];
        intent.min_amount = Some(100.0);
        intent.payment_method = Some(PaymentMethod::Credit);

        let filter = from_intent(&intent);
        let wire = filter.to_wire().unwrap();
        assert_eq!(wire["$and"].as_array().unwrap().len(), 3);
    }
}
