//! Document store abstraction.
//!
//! The pipeline only ever pushes equality and date-range constraints to the
//! store. Substring matching is done in memory after normalization.

use crate::services::fields;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::RwLock;

pub mod collections {
    pub const SALES_INVOICES: &str = "sales_invoices";
    pub const SALES_RETURNS: &str = "sales_returns";
    pub const INVENTORY_ITEMS: &str = "inventory_items";
    pub const BRANCHES: &str = "branches";
    pub const WAREHOUSES: &str = "warehouses";
    pub const ACCOUNTS: &str = "accounts";
    pub const SALES_REPRESENTATIVES: &str = "salesRepresentatives";
    pub const PAYMENT_METHODS: &str = "paymentMethods";
}

/// Candidate field names for one logical field, in lookup order. A document
/// is judged by the first candidate holding a usable value, the same way the
/// normalizer reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub candidates: Vec<String>,
}

impl FieldPath {
    pub fn new(candidates: &[&str]) -> Self {
        Self {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Text of the first candidate holding a usable value.
    pub fn resolve(&self, document: &Value) -> Option<String> {
        self.candidates
            .iter()
            .find_map(|field| document.get(field.as_str()).and_then(fields::text))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equality {
    pub path: FieldPath,
    pub value: String,
}

/// Inclusive day range on an ISO date string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub path: FieldPath,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// `YYYY-MM-DD` lower bound, inclusive.
    pub fn lower_bound(&self) -> Option<String> {
        self.from.map(|d| d.format("%Y-%m-%d").to_string())
    }

    /// `YYYY-MM-DD` of the day after `to`, exclusive. Comparing against the
    /// next day keeps timestamps like `2024-05-01T18:30` inside the range.
    pub fn upper_bound_exclusive(&self) -> Option<String> {
        self.to
            .and_then(|d| d.succ_opt())
            .map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn contains(&self, value: &str) -> bool {
        if let Some(lower) = self.lower_bound() {
            if value < lower.as_str() {
                return false;
            }
        }
        if let Some(upper) = self.upper_bound_exclusive() {
            if value >= upper.as_str() {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub equals: Vec<Equality>,
    pub date_range: Option<DateRange>,
}

impl DocumentQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_equal(mut self, candidates: &[&str], value: impl Into<String>) -> Self {
        self.equals.push(Equality {
            path: FieldPath::new(candidates),
            value: value.into(),
        });
        self
    }

    pub fn with_date_range(
        mut self,
        candidates: &[&str],
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Self {
        if from.is_some() || to.is_some() {
            self.date_range = Some(DateRange {
                path: FieldPath::new(candidates),
                from,
                to,
            });
        }
        self
    }

    /// Evaluate the query against a document the way the store would.
    pub fn matches(&self, document: &Value) -> bool {
        let equal = self.equals.iter().all(|condition| {
            condition.path.resolve(document).as_deref() == Some(condition.value.as_str())
        });
        if !equal {
            return false;
        }

        match &self.date_range {
            Some(range) => range
                .path
                .resolve(document)
                .is_some_and(|value| range.contains(&value)),
            None => true,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// In-process store with the same query semantics as [`MongoDb`]. Used for
/// local runs without a database and by the test suite.
///
/// [`MongoDb`]: crate::services::MongoDb
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, document: Value) {
        if let Ok(mut collections) = self.collections.write() {
            collections
                .entry(collection.to_string())
                .or_default()
                .push(document);
        }
    }

    pub fn insert_many(&self, collection: &str, documents: impl IntoIterator<Item = Value>) {
        for document in documents {
            self.insert(collection, document);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>, AppError> {
        let collections = self.collections.read().map_err(|_| {
            AppError::DatabaseError(anyhow::anyhow!("memory store lock poisoned"))
        })?;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| query.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_date_range_includes_whole_last_day() {
        let range = DateRange {
            path: FieldPath::new(&["date"]),
            from: Some(day("2024-05-01")),
            to: Some(day("2024-05-31")),
        };
        assert!(range.contains("2024-05-01"));
        assert!(range.contains("2024-05-31T23:10:00"));
        assert!(!range.contains("2024-06-01"));
        assert!(!range.contains("2024-04-30T23:59:59"));
    }

    #[test]
    fn test_query_equality_and_range() {
        let query = DocumentQuery::all()
            .with_equal(&["branchId"], "B1")
            .with_date_range(&["date"], Some(day("2024-05-01")), None);

        assert!(query.matches(&json!({ "branchId": "B1", "date": "2024-05-02" })));
        assert!(!query.matches(&json!({ "branchId": "B2", "date": "2024-05-02" })));
        assert!(!query.matches(&json!({ "branchId": "B1", "date": "2024-04-02" })));
        assert!(!query.matches(&json!({ "branchId": "B1" })));
    }

    #[test]
    fn test_first_usable_candidate_decides() {
        let query = DocumentQuery::all()
            .with_equal(&["branchId", "branch"], "B1")
            .with_date_range(
                &["date", "returnDate"],
                Some(day("2024-05-01")),
                Some(day("2024-05-31")),
            );

        assert!(query.matches(&json!({ "branch": "B1", "returnDate": "2024-05-03" })));
        assert!(query.matches(&json!({ "branchId": " ", "branch": "B1", "date": "2024-05-03" })));
        // A later candidate is ignored once an earlier one holds a value.
        assert!(!query.matches(&json!({ "branchId": "B2", "branch": "B1", "date": "2024-05-03" })));
        assert!(!query.matches(&json!({
            "branch": "B1",
            "date": "2024-04-30",
            "returnDate": "2024-05-03"
        })));
    }

    #[test]
    fn test_empty_date_range_is_dropped() {
        let query = DocumentQuery::all().with_date_range(&["date"], None, None);
        assert!(query.date_range.is_none());
        assert!(query.matches(&json!({})));
    }

    #[tokio::test]
    async fn test_memory_store_filters() {
        let store = MemoryStore::new();
        store.insert_many(
            collections::SALES_INVOICES,
            vec![
                json!({ "invoiceNumber": "INV-1", "branchId": "B1" }),
                json!({ "invoiceNumber": "INV-2", "branchId": "B2" }),
            ],
        );

        let found = store
            .find(
                collections::SALES_INVOICES,
                &DocumentQuery::all().with_equal(&["branchId"], "B2"),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["invoiceNumber"], "INV-2");

        let missing = store
            .find(collections::SALES_RETURNS, &DocumentQuery::all())
            .await
            .unwrap();
        assert!(missing.is_empty());
    }
}
