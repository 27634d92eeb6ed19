//! Common test utilities for sales-report-service integration tests.

use async_trait::async_trait;
use sales_report_service::config::{DatabaseConfig, ReportConfig, ReportSettings};
use sales_report_service::services::store::collections;
use sales_report_service::services::{DocumentQuery, DocumentStore, MemoryStore};
use sales_report_service::startup::AppState;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use service_core::error::AppError;
use service_core::observability::init_test_tracing;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    init_test_tracing("info,sales_report_service=debug");
}

#[allow(dead_code)]
pub fn test_config() -> ReportConfig {
    ReportConfig {
        common: CommonConfig::default(),
        service_name: "sales-report-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            uri: "mongodb://unused".to_string(),
            name: "erp".to_string(),
        },
        report: ReportSettings::default(),
    }
}

/// Store wrapper whose collections can be switched to fail at runtime.
#[allow(dead_code)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<String>>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail(&self, collection: &str) {
        self.failing.lock().unwrap().insert(collection.to_string());
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn find(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>, AppError> {
        if self.failing.lock().unwrap().contains(collection) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "connection to {} reset",
                collection
            )));
        }
        self.inner.find(collection, query).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        if self.failing.lock().unwrap().is_empty() {
            Ok(())
        } else {
            Err(AppError::ServiceUnavailable)
        }
    }
}

/// Catalog: أجهزة (main) -> Electronics (level 1) -> Phones (level 2), plus
/// a Phone item under Phones and a Cable item directly under Electronics.
pub fn seed_catalog(store: &MemoryStore) {
    store.insert_many(
        collections::INVENTORY_ITEMS,
        vec![
            json!({ "id": 1, "type": "رئيسي", "name": "أجهزة" }),
            json!({ "id": 2, "type": "مستوى أول", "name": "Electronics", "parentId": 1 }),
            json!({ "id": 3, "type": "مستوى ثاني", "name": "Phones", "parentId": 2 }),
            json!({ "id": 10, "name": "Phone", "code": "P-1", "parentId": 3 }),
            json!({ "id": 11, "name": "Cable", "code": "C-1", "parentId": 2 }),
        ],
    );
}

pub fn seed_directory(store: &MemoryStore) {
    store.insert_many(
        collections::BRANCHES,
        vec![
            json!({ "id": "B1", "name": "الفرع الرئيسي" }),
            json!({ "id": "B2", "name": "فرع جدة" }),
        ],
    );
    store.insert(
        collections::SALES_REPRESENTATIVES,
        json!({ "id": "S1", "name": "Omar", "accountNumber": "2101" }),
    );
    store.insert(
        collections::PAYMENT_METHODS,
        json!({ "id": "PM1", "name": "نقدي" }),
    );
}

/// INV-1: 2 x Phone @100, discount 10, tax 5 -> net 195.
/// INV-2: 3 x Cable @100 -> gross 300.
/// INV-3: Cable in branch B2.
/// R-1: 1 x Phone returned against INV-1, no cost on the return.
pub fn seed_transactions(store: &MemoryStore) {
    store.insert_many(
        collections::SALES_INVOICES,
        vec![
            json!({
                "invoiceNumber": "INV-1",
                "branchId": "B1",
                "date": "2024-05-02",
                "customerName": "Ali Hassan",
                "customerMobile": "0501111111",
                "phone": "0112222222",
                "seller": "S1",
                "paymentMethod": "PM1",
                "items": [
                    {
                        "itemNumber": "P-1",
                        "itemName": "Phone",
                        "quantity": 2,
                        "price": 100,
                        "cost": 60,
                        "discountValue": 10,
                        "taxValue": 5
                    }
                ]
            }),
            json!({
                "invoiceNumber": "INV-2",
                "branchId": "B1",
                "date": "2024-05-10T15:20:00",
                "customerName": "Sara",
                "seller": "Omar",
                "items": [
                    { "itemNumber": "C-1", "itemName": "Cable", "quantity": 3, "price": 100, "cost": 20 }
                ]
            }),
            json!({
                "invoiceNumber": "INV-3",
                "branchId": "B2",
                "date": "2024-06-01",
                "items": [
                    { "itemNumber": "C-1", "itemName": "Cable", "quantity": 1, "price": "abc" }
                ]
            }),
        ],
    );
    store.insert(
        collections::SALES_RETURNS,
        json!({
            "returnNumber": "R-1",
            "originalInvoiceNumber": "INV-1",
            "branchId": "B1",
            "date": "2024-05-12",
            "customerName": "Ali Hassan",
            "items": [
                { "itemNumber": "P-1", "itemName": "Phone", "returnedQty": 1, "price": 100 }
            ]
        }),
    );
}

pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    seed_catalog(&store);
    seed_directory(&store);
    seed_transactions(&store);
    store
}

#[allow(dead_code)]
pub fn test_state(store: Arc<dyn DocumentStore>) -> AppState {
    AppState::new(test_config(), store)
}

#[allow(dead_code)]
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
