use crate::models::{FetchFilter, RecordKind, Transaction};
use crate::services::catalog::CatalogIndex;
use crate::services::directory::{Directory, DirectorySources};
use crate::services::fields;
use crate::services::metrics::record_fetch_failure;
use crate::services::store::{collections, DocumentQuery, DocumentStore};
use serde_json::Value;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read {collection}: {source}")]
    Query {
        collection: &'static str,
        #[source]
        source: AppError,
    },
}

impl FetchError {
    pub fn collection(&self) -> &'static str {
        match self {
            FetchError::Query { collection, .. } => *collection,
        }
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::DatabaseError(anyhow::anyhow!(err.to_string()))
    }
}

/// Reads invoices, returns, the item catalog and reference collections.
#[derive(Clone)]
pub struct DocumentFetcher {
    store: Arc<dyn DocumentStore>,
}

impl DocumentFetcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The server-side part of a search: branch and warehouse equality plus
    /// the date range, each over the same field chain the normalizer reads.
    pub fn transaction_query(filter: &FetchFilter) -> DocumentQuery {
        let mut query = DocumentQuery::all();
        if let Some(branch_id) = non_blank(&filter.branch_id) {
            query = query.with_equal(fields::BRANCH.candidates, branch_id);
        }
        if let Some(warehouse_id) = non_blank(&filter.warehouse_id) {
            query = query.with_equal(fields::WAREHOUSE.candidates, warehouse_id);
        }
        query.with_date_range(fields::DATE.candidates, filter.date_from, filter.date_to)
    }

    /// Sales followed by returns. Both collections are read concurrently;
    /// either failing fails the whole fetch.
    pub async fn fetch_transactions(
        &self,
        filter: &FetchFilter,
        include_returns: bool,
    ) -> Result<Vec<Transaction>, FetchError> {
        let query = Self::transaction_query(filter);

        let (invoices, returns) = tokio::try_join!(
            self.read(collections::SALES_INVOICES, &query),
            async {
                if include_returns {
                    self.read(collections::SALES_RETURNS, &query).await
                } else {
                    Ok(Vec::new())
                }
            }
        )?;

        tracing::info!(
            invoices = invoices.len(),
            returns = returns.len(),
            include_returns,
            "Fetched transactions"
        );

        let mut transactions = Vec::with_capacity(invoices.len() + returns.len());
        transactions.extend(into_transactions(RecordKind::Sale, invoices));
        transactions.extend(into_transactions(RecordKind::Return, returns));
        Ok(transactions)
    }

    pub async fn fetch_catalog(&self) -> Result<CatalogIndex, FetchError> {
        let documents = self
            .read(collections::INVENTORY_ITEMS, &DocumentQuery::all())
            .await?;
        Ok(CatalogIndex::build(&documents))
    }

    /// Reference data for display names and alias matching. A collection that
    /// cannot be read contributes nothing; ids are then echoed raw.
    pub async fn fetch_directory(&self) -> Directory {
        let all = DocumentQuery::all();
        let (branches, warehouses, accounts, representatives, payment_methods) = tokio::join!(
            self.read_or_empty(collections::BRANCHES, &all),
            self.read_or_empty(collections::WAREHOUSES, &all),
            self.read_or_empty(collections::ACCOUNTS, &all),
            self.read_or_empty(collections::SALES_REPRESENTATIVES, &all),
            self.read_or_empty(collections::PAYMENT_METHODS, &all),
        );

        let mut sources = DirectorySources {
            branches,
            warehouses,
            accounts,
            payment_methods,
        };
        sources.accounts.extend(representatives);
        Directory::build(&sources)
    }

    async fn read(
        &self,
        collection: &'static str,
        query: &DocumentQuery,
    ) -> Result<Vec<Value>, FetchError> {
        self.store.find(collection, query).await.map_err(|source| {
            tracing::error!(collection = %collection, error = %source, "Fetch failed");
            record_fetch_failure(collection);
            FetchError::Query { collection, source }
        })
    }

    async fn read_or_empty(&self, collection: &'static str, query: &DocumentQuery) -> Vec<Value> {
        match self.read(collection, query).await {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!(collection = e.collection(), "Using empty reference data");
                Vec::new()
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn into_transactions(kind: RecordKind, documents: Vec<Value>) -> Vec<Transaction> {
    let total = documents.len();
    let transactions: Vec<Transaction> = documents
        .into_iter()
        .filter_map(|document| Transaction::from_value(kind, document))
        .collect();
    if transactions.len() < total {
        tracing::warn!(
            kind = %kind,
            skipped = total - transactions.len(),
            "Skipped documents that are not objects"
        );
    }
    transactions
}
