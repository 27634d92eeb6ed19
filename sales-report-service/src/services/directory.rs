//! Reference lookups: branch/warehouse names, sellers and payment methods.

use crate::models::{RawDocument, UNSPECIFIED};
use crate::services::fields::{self, first_text};
use serde_json::Value;
use std::collections::HashMap;

/// Raw reference documents as fetched from the store.
#[derive(Debug, Clone, Default)]
pub struct DirectorySources {
    pub branches: Vec<Value>,
    pub warehouses: Vec<Value>,
    pub accounts: Vec<Value>,
    pub payment_methods: Vec<Value>,
}

/// A seller/delegate account. Documents reference sellers by any of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerAccount {
    pub id: String,
    pub name: String,
    pub account_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    branches: HashMap<String, String>,
    warehouses: HashMap<String, String>,
    payment_methods: HashMap<String, String>,
    sellers: Vec<SellerAccount>,
}

type SellerRule = fn(&Directory, &str, &str) -> bool;

/// Seller equality is attempted in this order; the first rule that matches
/// keeps the line.
const SELLER_RULES: &[(&str, SellerRule)] = &[
    ("direct", Directory::seller_direct),
    ("id_to_name", Directory::seller_id_to_name),
    ("name_to_id", Directory::seller_name_to_id),
    ("account_number", Directory::seller_account_number),
];

impl Directory {
    pub fn build(sources: &DirectorySources) -> Self {
        let mut sellers = Vec::new();
        for document in sources.accounts.iter().filter_map(Value::as_object) {
            let Some(id) = first_text(document, &fields::CATALOG_ID) else {
                continue;
            };
            let account_number = first_text(document, &fields::ACCOUNT_NUMBER);
            let name = first_text(document, &fields::DISPLAY_NAME)
                .unwrap_or_else(|| id.clone());
            sellers.push(SellerAccount {
                id,
                name,
                account_number,
            });
        }

        let directory = Self {
            branches: name_map(&sources.branches),
            warehouses: name_map(&sources.warehouses),
            payment_methods: name_map(&sources.payment_methods),
            sellers,
        };
        tracing::debug!(
            branches = directory.branches.len(),
            warehouses = directory.warehouses.len(),
            sellers = directory.sellers.len(),
            payment_methods = directory.payment_methods.len(),
            "Built lookup directory"
        );
        directory
    }

    /// Branch display name. Unknown ids are echoed back.
    pub fn branch_name(&self, id: &str) -> String {
        display(&self.branches, id)
    }

    pub fn warehouse_name(&self, id: &str) -> String {
        display(&self.warehouses, id)
    }

    pub fn payment_method_name(&self, id: &str) -> String {
        display(&self.payment_methods, id)
    }

    pub fn seller_name(&self, value: &str) -> String {
        if value.trim().is_empty() {
            return UNSPECIFIED.to_string();
        }
        self.sellers
            .iter()
            .find(|s| same(&s.id, value))
            .map(|s| s.name.clone())
            .unwrap_or_else(|| value.trim().to_string())
    }

    /// Does the seller recorded on a line (`actual`) refer to the seller the
    /// user filtered by (`wanted`)?
    pub fn seller_matches(&self, wanted: &str, actual: &str) -> bool {
        if actual.trim().is_empty() {
            return false;
        }
        SELLER_RULES
            .iter()
            .any(|(_, rule)| rule(self, wanted, actual))
    }

    fn seller_direct(&self, wanted: &str, actual: &str) -> bool {
        same(wanted, actual)
    }

    fn seller_id_to_name(&self, wanted: &str, actual: &str) -> bool {
        self.sellers
            .iter()
            .any(|s| same(&s.id, actual) && same(&s.name, wanted))
    }

    fn seller_name_to_id(&self, wanted: &str, actual: &str) -> bool {
        self.sellers
            .iter()
            .any(|s| same(&s.name, actual) && same(&s.id, wanted))
    }

    fn seller_account_number(&self, wanted: &str, actual: &str) -> bool {
        self.sellers.iter().any(|s| {
            let Some(number) = s.account_number.as_deref() else {
                return false;
            };
            let refers_to = |v: &str| same(&s.id, v) || same(&s.name, v) || same(number, v);
            (same(number, wanted) && refers_to(actual)) || (same(number, actual) && refers_to(wanted))
        })
    }

    /// Payment methods match directly or through the id -> name table.
    pub fn payment_method_matches(&self, wanted: &str, actual: &str) -> bool {
        if same(wanted, actual) {
            return true;
        }
        self.payment_methods.iter().any(|(id, name)| {
            (same(id, actual) && same(name, wanted)) || (same(name, actual) && same(id, wanted))
        })
    }
}

fn same(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

fn display(names: &HashMap<String, String>, id: &str) -> String {
    let id = id.trim();
    if id.is_empty() {
        return UNSPECIFIED.to_string();
    }
    names.get(id).cloned().unwrap_or_else(|| id.to_string())
}

fn name_map(documents: &[Value]) -> HashMap<String, String> {
    documents
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|document: &RawDocument| {
            let id = first_text(document, &fields::CATALOG_ID)?;
            let name = first_text(document, &fields::DISPLAY_NAME)?;
            Some((id, name))
        })
        .collect()
}
