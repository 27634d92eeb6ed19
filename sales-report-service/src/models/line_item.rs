use super::RecordKind;
use serde::Serialize;

/// One product line of an invoice or return in canonical shape.
///
/// Money fields (`gross`, `discount`, `tax`, `net`, `cost`) are stored as if
/// the record were a sale. Only `profit` carries the sign; aggregation applies
/// `sign` to the other components.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub key: String,
    pub invoice_number: String,
    pub reference_number: Option<String>,
    pub date: String,
    pub branch_id: String,
    pub warehouse_id: String,
    pub item_number: String,
    pub item_name: String,
    pub category: String,
    pub item_type: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub unit_cost: f64,
    pub gross: f64,
    pub discount: f64,
    pub discount_percent: f64,
    pub tax: f64,
    pub tax_percent: f64,
    pub net: f64,
    pub cost: f64,
    pub profit: f64,
    pub customer_name: String,
    pub customer_phone: String,
    pub seller: String,
    pub payment_method: String,
    pub kind: RecordKind,
    pub sign: i8,
}

impl LineItem {
    pub fn after_discount(&self) -> f64 {
        self.gross - self.discount
    }

    /// Apply the record's sign to a component.
    pub fn signed(&self, value: f64) -> f64 {
        f64::from(self.sign) * value
    }
}
