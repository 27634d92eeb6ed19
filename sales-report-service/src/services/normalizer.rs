//! Flattens invoice and return documents into canonical line items.
//!
//! Normalization never fails. Missing or unparsable numbers read as zero,
//! unresolved names fall back to sentinels, and non-object entries are
//! skipped. All lookups are in memory: the catalog must be fully loaded
//! before this runs.

use crate::models::{LineItem, RawDocument, RecordKind, Transaction, UNSPECIFIED};
use crate::services::catalog::{CatalogIndex, CategoryVariant};
use crate::services::fields::{self, first_text, first_text_in, number_or_zero, FieldChain};
use serde_json::Value;
use std::collections::HashMap;

/// Nested `items` arrays are flattened down to this depth. Deeper nesting is
/// not produced by the invoicing flow and is treated as a plain entry.
pub const MAX_ITEM_DEPTH: usize = 2;

const ITEMS_KEY: &str = "items";

/// Unit cost of sold items keyed by (invoice number, item key). Returns that
/// omit cost borrow from here.
type SaleCostIndex = HashMap<(String, String), f64>;

/// Document-level fields shared by every line of one document.
struct DocumentContext<'a> {
    document: &'a RawDocument,
    kind: RecordKind,
    key: String,
    number: String,
    reference: Option<String>,
    date: String,
    branch_id: String,
    warehouse_id: String,
    seller: String,
    payment_method: String,
}

impl<'a> DocumentContext<'a> {
    fn new(transaction: &'a Transaction) -> Self {
        let document = transaction.document();
        let kind = transaction.kind();
        let number_chain = match kind {
            RecordKind::Sale => &fields::INVOICE_NUMBER,
            RecordKind::Return => &fields::RETURN_NUMBER,
        };
        let number = first_text(document, number_chain).unwrap_or_default();
        let reference = match kind {
            RecordKind::Sale => None,
            RecordKind::Return => first_text(document, &fields::RETURN_REFERENCE),
        };
        let key = first_text(document, &fields::DOCUMENT_ID).unwrap_or_else(|| number.clone());

        Self {
            document,
            kind,
            key,
            number,
            reference,
            date: first_text(document, &fields::DATE).unwrap_or_default(),
            branch_id: first_text(document, &fields::BRANCH).unwrap_or_default(),
            warehouse_id: first_text(document, &fields::WAREHOUSE).unwrap_or_default(),
            seller: first_text(document, &fields::SELLER).unwrap_or_default(),
            payment_method: first_text(document, &fields::PAYMENT_METHOD).unwrap_or_default(),
        }
    }

    fn quantity_chain(&self) -> &'static FieldChain {
        match self.kind {
            RecordKind::Sale => &fields::SALE_QUANTITY,
            RecordKind::Return => &fields::RETURN_QUANTITY,
        }
    }

    /// Invoice number a return's cost is borrowed from.
    fn cost_source_number(&self) -> &str {
        self.reference.as_deref().unwrap_or(&self.number)
    }
}

/// Normalize a batch of transactions, preserving input order.
///
/// Sales are processed first so that returns can borrow the unit cost of the
/// matching sold line.
pub fn normalize(transactions: &[Transaction], catalog: &CatalogIndex) -> Vec<LineItem> {
    let mut per_document: Vec<Vec<LineItem>> = vec![Vec::new(); transactions.len()];
    let mut sale_costs = SaleCostIndex::new();

    for (position, transaction) in transactions.iter().enumerate() {
        if transaction.kind() == RecordKind::Sale {
            let lines = normalize_document(transaction, catalog, &sale_costs);
            for line in &lines {
                if line.unit_cost != 0.0 {
                    sale_costs
                        .entry((line.invoice_number.clone(), item_key(line)))
                        .or_insert(line.unit_cost);
                }
            }
            per_document[position] = lines;
        }
    }

    for (position, transaction) in transactions.iter().enumerate() {
        if transaction.kind() == RecordKind::Return {
            per_document[position] = normalize_document(transaction, catalog, &sale_costs);
        }
    }

    let lines: Vec<LineItem> = per_document.into_iter().flatten().collect();
    tracing::debug!(
        documents = transactions.len(),
        line_items = lines.len(),
        "Normalized transactions"
    );
    lines
}

fn normalize_document(
    transaction: &Transaction,
    catalog: &CatalogIndex,
    sale_costs: &SaleCostIndex,
) -> Vec<LineItem> {
    let context = DocumentContext::new(transaction);
    let entries = match context.document.get(ITEMS_KEY) {
        Some(Value::Array(items)) => flatten_entries(items),
        _ => Vec::new(),
    };

    // Invoice-level extra discount is spread over lines by gross share.
    let extra_discount = number_or_zero(context.document, &fields::EXTRA_DISCOUNT);
    let grosses: Vec<f64> = entries
        .iter()
        .map(|entry| {
            number_or_zero(entry, &fields::UNIT_PRICE)
                * number_or_zero(entry, context.quantity_chain())
        })
        .collect();
    let total_gross: f64 = grosses.iter().sum();

    entries
        .iter()
        .zip(grosses)
        .enumerate()
        .map(|(index, (entry, gross))| {
            let extra_share = if extra_discount != 0.0 && total_gross != 0.0 {
                extra_discount * gross / total_gross
            } else {
                0.0
            };
            normalize_entry(&context, entry, index, extra_share, catalog, sale_costs)
        })
        .collect()
}

/// Depth-capped flatten of nested `items` arrays. An entry with a non-empty
/// nested array contributes its children instead of itself.
fn flatten_entries(items: &[Value]) -> Vec<&RawDocument> {
    let mut entries = Vec::new();
    collect_entries(items, 1, &mut entries);
    entries
}

fn collect_entries<'a>(items: &'a [Value], depth: usize, out: &mut Vec<&'a RawDocument>) {
    for entry in items.iter().filter_map(Value::as_object) {
        match entry.get(ITEMS_KEY) {
            Some(Value::Array(children)) if depth < MAX_ITEM_DEPTH && !children.is_empty() => {
                collect_entries(children, depth + 1, out)
            }
            _ => out.push(entry),
        }
    }
}

fn normalize_entry(
    context: &DocumentContext<'_>,
    entry: &RawDocument,
    index: usize,
    extra_share: f64,
    catalog: &CatalogIndex,
    sale_costs: &SaleCostIndex,
) -> LineItem {
    let layers = [entry, context.document];

    let item_number = first_text(entry, &fields::ITEM_NUMBER).unwrap_or_default();
    let item_name = first_text(entry, &fields::ITEM_NAME)
        .or_else(|| (!item_number.is_empty()).then(|| item_number.clone()))
        .unwrap_or_else(|| UNSPECIFIED.to_string());

    let quantity = number_or_zero(entry, context.quantity_chain());
    let unit_price = number_or_zero(entry, &fields::UNIT_PRICE);
    let gross = unit_price * quantity;

    let discount_value = number_or_zero(entry, &fields::DISCOUNT_VALUE);
    let discount_percent = number_or_zero(entry, &fields::DISCOUNT_PERCENT);
    let line_discount = if discount_value != 0.0 {
        discount_value
    } else {
        gross * discount_percent / 100.0
    };
    let discount = line_discount + extra_share;
    let after_discount = gross - discount;

    let tax_value = number_or_zero(entry, &fields::TAX_VALUE);
    let tax_percent = number_or_zero(entry, &fields::TAX_PERCENT);
    let tax = if tax_value != 0.0 {
        tax_value
    } else {
        after_discount * tax_percent / 100.0
    };
    let net = after_discount + tax;

    let mut unit_cost = number_or_zero(entry, &fields::UNIT_COST);
    if unit_cost == 0.0 && context.kind == RecordKind::Return {
        let borrowed_key = (
            context.cost_source_number().to_string(),
            if item_number.is_empty() {
                item_name.clone()
            } else {
                item_number.clone()
            },
        );
        if let Some(borrowed) = sale_costs.get(&borrowed_key) {
            tracing::trace!(
                return_number = %context.number,
                invoice_number = %borrowed_key.0,
                item = %borrowed_key.1,
                unit_cost = borrowed,
                "Borrowed unit cost from sold line"
            );
            unit_cost = *borrowed;
        }
    }
    let cost = unit_cost * quantity;

    let sign = context.kind.sign();
    let profit = sign * (after_discount - cost);

    LineItem {
        key: format!("{}-{}", context.key, index),
        invoice_number: context.number.clone(),
        reference_number: context.reference.clone(),
        date: context.date.clone(),
        branch_id: context.branch_id.clone(),
        warehouse_id: first_text(entry, &fields::WAREHOUSE)
            .unwrap_or_else(|| context.warehouse_id.clone()),
        category: catalog.resolve(&item_name, &item_number, CategoryVariant::Category),
        item_type: catalog.resolve(&item_name, &item_number, CategoryVariant::Type),
        unit: first_text(entry, &fields::UNIT).unwrap_or_default(),
        quantity,
        unit_price,
        unit_cost,
        gross,
        discount,
        discount_percent: if gross != 0.0 {
            discount / gross * 100.0
        } else {
            discount_percent
        },
        tax,
        tax_percent: if tax_value != 0.0 && after_discount != 0.0 {
            tax / after_discount * 100.0
        } else {
            tax_percent
        },
        net,
        cost,
        profit,
        customer_name: first_text_in(&layers, &fields::CUSTOMER_NAME).unwrap_or_default(),
        customer_phone: first_text_in(&layers, &fields::CUSTOMER_PHONE).unwrap_or_default(),
        seller: first_text(entry, &fields::SELLER).unwrap_or_else(|| context.seller.clone()),
        payment_method: context.payment_method.clone(),
        kind: context.kind,
        sign: if sign < 0.0 { -1 } else { 1 },
        item_number,
        item_name,
    }
}

fn item_key(line: &LineItem) -> String {
    if line.item_number.is_empty() {
        line.item_name.clone()
    } else {
        line.item_number.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EPSILON: f64 = 1e-9;

    fn sale(value: Value) -> Transaction {
        Transaction::from_value(RecordKind::Sale, value).unwrap()
    }

    fn sales_return(value: Value) -> Transaction {
        Transaction::from_value(RecordKind::Return, value).unwrap()
    }

    #[test]
    fn test_sale_line_figures() {
        let lines = normalize(
            &[sale(json!({
                "invoiceNumber": "INV-1",
                "items": [{
                    "itemNumber": "X1", "price": 100, "quantity": 2,
                    "discountValue": 10, "taxValue": 5, "cost": 60
                }]
            }))],
            &CatalogIndex::default(),
        );

        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.gross, 200.0);
        assert_eq!(line.discount, 10.0);
        assert_eq!(line.after_discount(), 190.0);
        assert_eq!(line.tax, 5.0);
        assert_eq!(line.net, 195.0);
        assert_eq!(line.cost, 120.0);
        assert_eq!(line.profit, 70.0);
        assert_eq!(line.sign, 1);
        assert_eq!(line.key, "INV-1-0");
    }

    #[test]
    fn test_percent_discount_and_tax() {
        let lines = normalize(
            &[sale(json!({
                "invoiceNumber": "INV-2",
                "items": [{ "price": 50, "quantity": 4, "discountPercent": 10, "taxPercent": 15 }]
            }))],
            &CatalogIndex::default(),
        );
        let line = &lines[0];
        assert!((line.discount - 20.0).abs() < EPSILON);
        assert!((line.tax - 27.0).abs() < EPSILON);
        assert!((line.net - 207.0).abs() < EPSILON);
        assert!((line.discount_percent - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_return_borrows_cost_and_negates_profit() {
        let lines = normalize(
            &[
                sales_return(json!({
                    "returnNumber": "RET-1",
                    "originalInvoiceNumber": "INV-1",
                    "items": [{ "itemNumber": "X1", "price": 100, "returnedQty": 1 }]
                })),
                sale(json!({
                    "invoiceNumber": "INV-1",
                    "items": [{ "itemNumber": "X1", "price": 100, "quantity": 2, "cost": 60 }]
                })),
            ],
            &CatalogIndex::default(),
        );

        // Input order is preserved even though sales are processed first.
        assert_eq!(lines[0].kind, RecordKind::Return);
        let returned = &lines[0];
        assert_eq!(returned.invoice_number, "RET-1");
        assert_eq!(returned.reference_number.as_deref(), Some("INV-1"));
        assert_eq!(returned.quantity, 1.0);
        assert_eq!(returned.cost, 60.0);
        assert_eq!(returned.profit, -(100.0 - 60.0));
        assert_eq!(returned.sign, -1);
    }

    #[test]
    fn test_return_without_matching_sale_keeps_zero_cost() {
        let lines = normalize(
            &[sales_return(json!({
                "returnNumber": "RET-2",
                "originalInvoiceNumber": "INV-404",
                "items": [{ "itemNumber": "X1", "price": 30, "returnedQty": 2 }]
            }))],
            &CatalogIndex::default(),
        );
        assert_eq!(lines[0].cost, 0.0);
        assert_eq!(lines[0].profit, -60.0);
    }

    #[test]
    fn test_non_numeric_price_is_zero() {
        let lines = normalize(
            &[sale(json!({
                "invoiceNumber": "INV-3",
                "items": [{ "itemName": "x", "price": "abc", "quantity": 3 }]
            }))],
            &CatalogIndex::default(),
        );
        assert_eq!(lines[0].gross, 0.0);
        assert_eq!(lines[0].net, 0.0);
    }

    #[test]
    fn test_phone_resolution_prefers_item_level_chain() {
        let lines = normalize(
            &[sale(json!({
                "invoiceNumber": "INV-4",
                "customerPhone": "doc-phone",
                "items": [
                    { "itemName": "a", "customerMobile": "A", "phone": "B" },
                    { "itemName": "b" }
                ]
            }))],
            &CatalogIndex::default(),
        );
        assert_eq!(lines[0].customer_phone, "A");
        assert_eq!(lines[1].customer_phone, "doc-phone");
    }

    #[test]
    fn test_item_name_fallbacks() {
        let lines = normalize(
            &[sale(json!({
                "invoiceNumber": "INV-5",
                "items": [{ "itemNumber": "X9" }, {}]
            }))],
            &CatalogIndex::default(),
        );
        assert_eq!(lines[0].item_name, "X9");
        assert_eq!(lines[1].item_name, UNSPECIFIED);
        assert_eq!(lines[1].category, "بدون فئة");
        assert_eq!(lines[1].item_type, "بدون تصنيف");
    }

    #[test]
    fn test_nested_items_are_flattened_one_level() {
        let lines = normalize(
            &[sale(json!({
                "invoiceNumber": "INV-6",
                "items": [
                    { "itemName": "bundle", "items": [
                        { "itemName": "part-a", "price": 10, "quantity": 1 },
                        { "itemName": "part-b", "price": 5, "quantity": 2,
                          "items": [{ "itemName": "too-deep" }] }
                    ]},
                    { "itemName": "single", "price": 1, "quantity": 1 }
                ]
            }))],
            &CatalogIndex::default(),
        );
        let names: Vec<&str> = lines.iter().map(|l| l.item_name.as_str()).collect();
        assert_eq!(names, vec!["part-a", "part-b", "single"]);
        assert_eq!(lines[2].key, "INV-6-2");
    }

    #[test]
    fn test_extra_discount_spread_by_gross() {
        let lines = normalize(
            &[sale(json!({
                "invoiceNumber": "INV-7",
                "extraDiscount": 30,
                "items": [
                    { "itemName": "a", "price": 100, "quantity": 1 },
                    { "itemName": "b", "price": 200, "quantity": 1 }
                ]
            }))],
            &CatalogIndex::default(),
        );
        assert!((lines[0].discount - 10.0).abs() < EPSILON);
        assert!((lines[1].discount - 20.0).abs() < EPSILON);
    }

    #[test]
    fn test_category_and_type_resolved_from_catalog() {
        let catalog = CatalogIndex::build(&[
            json!({ "id": 1, "type": "رئيسي", "name": "أجهزة" }),
            json!({ "id": 2, "parentId": 1, "type": "مستوى أول", "name": "تكييف" }),
            json!({ "id": 3, "parentId": 2, "type": "مستوى ثاني", "name": "مكيف" }),
        ]);
        let lines = normalize(
            &[sale(json!({ "invoiceNumber": "INV-8", "items": [{ "itemName": "مكيف" }] }))],
            &catalog,
        );
        assert_eq!(lines[0].category, "تكييف");
        assert_eq!(lines[0].item_type, "أجهزة");
    }

    #[test]
    fn test_net_and_sign_invariants_hold() {
        let lines = normalize(
            &[
                sale(json!({ "invoiceNumber": "A", "items": [
                    { "itemNumber": "1", "price": "12.5", "quantity": 3, "discountPercent": 7, "taxPercent": 15, "cost": 4 },
                    { "itemNumber": "2", "price": 9, "quantity": "x", "taxValue": 2 }
                ]})),
                sales_return(json!({ "returnNumber": "R", "originalInvoiceNumber": "A", "items": [
                    { "itemNumber": "1", "price": "12.5", "returnedQty": 1, "discountPercent": 7, "taxPercent": 15 }
                ]})),
            ],
            &CatalogIndex::default(),
        );
        for line in &lines {
            assert!((line.net - (line.gross - line.discount + line.tax)).abs() < EPSILON);
            let as_if_sale = line.after_discount() - line.cost;
            assert!((line.profit - f64::from(line.sign) * as_if_sale).abs() < EPSILON);
        }
    }
}
