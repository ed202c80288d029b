//! Deterministic aggregation audit
//!
//! Recomputes sums, averages, and counts over the deduplicated evidence
//! set so the answer-generation model can cite a verified figure instead
//! of doing its own arithmetic. Pure functions over retrieved metadata;
//! the language backend is never consulted here.

use tracing::debug;

use crate::models::{
    Aggregation, AuditResult, Intent, ItemSummary, Metric, ReceiptSummary, SumBasis,
};

/// Recompute the requested aggregation over deduplicated evidence
///
/// Selects per-receipt metric values or per-item prices according to the
/// intent's sum basis. Returns `None` when the intent requests no
/// aggregation, or when no values exist for the requested metric/basis
/// (an omitted audit, not a zero).
pub fn audit_aggregation(
    intent: &Intent,
    receipts: &[ReceiptSummary],
    items: &[ItemSummary],
) -> Option<AuditResult> {
    let aggregation = intent.aggregation?;

    let (values, metric_field) = match intent.sum_basis {
        SumBasis::Receipts => (
            receipts
                .iter()
                .filter_map(|r| metric_value(r, intent.metric))
                .collect::<Vec<f64>>(),
            intent.metric.field_name(),
        ),
        SumBasis::Items => (
            items.iter().map(|i| i.price).collect::<Vec<f64>>(),
            "item_price",
        ),
    };

    if values.is_empty() {
        debug!(
            metric = intent.metric.as_str(),
            basis = intent.sum_basis.as_str(),
            "no values available for audit"
        );
        return None;
    }

    let count = values.len();
    let value = match aggregation {
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Average => values.iter().sum::<f64>() / count as f64,
        Aggregation::Count => count as f64,
    };

    Some(AuditResult {
        aggregation,
        basis: intent.sum_basis,
        metric_field: metric_field.to_string(),
        count,
        value,
        verified: true,
    })
}

fn metric_value(receipt: &ReceiptSummary, metric: Metric) -> Option<f64> {
    match metric {
        Metric::Total => Some(receipt.total_amount),
        Metric::Tax => receipt.tax_amount,
        Metric::Tip => receipt.tip_amount,
        Metric::Subtotal => receipt.subtotal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Aggregation;

    fn receipt(id: &str, total: f64) -> ReceiptSummary {
        ReceiptSummary {
            receipt_id: id.to_string(),
            merchant_name: "Test Mart".to_string(),
            transaction_date: Some("2024-01-10".to_string()),
            total_amount: total,
            tax_amount: None,
            tip_amount: None,
            subtotal: None,
            payment_method: None,
            content: String::new(),
            filename: None,
            is_summary: true,
        }
    }

    fn item(name: &str, price: f64) -> ItemSummary {
        ItemSummary {
            name: name.to_string(),
            price,
            category: "other".to_string(),
            merchant: "Test Mart".to_string(),
            date: None,
            payment_method: None,
            filename: None,
        }
    }

    fn intent_with(aggregation: Aggregation, basis: SumBasis) -> Intent {
        let mut intent = Intent::new("test");
        intent.aggregation = Some(aggregation);
        intent.sum_basis = basis;
        intent
    }

    #[test]
    fn test_sum_over_receipts() {
        let receipts = vec![receipt("r1", 14.84), receipt("r2", 10.00)];
        let intent = intent_with(Aggregation::Sum, SumBasis::Receipts);

        let audit = audit_aggregation(&intent, &receipts, &[]).unwrap();
        assert_eq!(audit.count, 2);
        assert!((audit.value - 24.84).abs() < 1e-9);
        assert_eq!(audit.metric_field, "total_amount");
        assert!(audit.verified);
    }

    #[test]
    fn test_average_over_items() {
        let items = vec![item("coffee", 4.0), item("bagel", 2.0)];
        let intent = intent_with(Aggregation::Average, SumBasis::Items);

        let audit = audit_aggregation(&intent, &[], &items).unwrap();
        assert_eq!(audit.count, 2);
        assert!((audit.value - 3.0).abs() < 1e-9);
        assert_eq!(audit.metric_field, "item_price");
    }

    #[test]
    fn test_count_over_items() {
        let items = vec![item("a", 1.0), item("b", 2.0), item("c", 3.0)];
        let intent = intent_with(Aggregation::Count, SumBasis::Items);

        let audit = audit_aggregation(&intent, &[], &items).unwrap();
        assert_eq!(audit.count, 3);
        assert!((audit.value - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_tax_metric_reads_tax_field() {
        let mut receipts = vec![receipt("r1", 50.0), receipt("r2", 30.0)];
        receipts[0].tax_amount = Some(4.5);
        receipts[1].tax_amount = Some(2.5);

        let mut intent = intent_with(Aggregation::Sum, SumBasis::Receipts);
        intent.metric = crate::models::Metric::Tax;

        let audit = audit_aggregation(&intent, &receipts, &[]).unwrap();
        assert!((audit.value - 7.0).abs() < 1e-9);
        assert_eq!(audit.metric_field, "tax_amount");
    }

    #[test]
    fn test_missing_metric_values_omit_audit() {
        // Receipts without tip data cannot verify a tip sum
        let receipts = vec![receipt("r1", 50.0)];
        let mut intent = intent_with(Aggregation::Sum, SumBasis::Receipts);
        intent.metric = crate::models::Metric::Tip;

        assert!(audit_aggregation(&intent, &receipts, &[]).is_none());
    }

    #[test]
    fn test_no_aggregation_requested() {
        let receipts = vec![receipt("r1", 50.0)];
        let intent = Intent::new("show me receipts");
        assert!(audit_aggregation(&intent, &receipts, &[]).is_none());
    }

    #[test]
    fn test_items_basis_with_no_items_omits_audit() {
        let receipts = vec![receipt("r1", 50.0)];
        let intent = intent_with(Aggregation::Sum, SumBasis::Items);
        assert!(audit_aggregation(&intent, &receipts, &[]).is_none());
    }
}
