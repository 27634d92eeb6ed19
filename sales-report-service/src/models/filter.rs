use super::RecordKind;
use chrono::NaiveDate;

/// Filters the store can evaluate itself: equality and date range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchFilter {
    pub branch_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Filters applied in memory after normalization. Text filters are
/// case-insensitive substring matches; seller and payment method are
/// equality matches with alias resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItemFilter {
    pub invoice_number: Option<String>,
    pub payment_method: Option<String>,
    pub seller: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub item_name: Option<String>,
    pub item_number: Option<String>,
    pub kind: Option<RecordKind>,
}
