//! Fetch, normalize, aggregate.
//!
//! Each search runs against fresh state: catalog, transactions and the lookup
//! directory are read concurrently, then normalized once and reduced in
//! memory. Nothing is cached between searches.

use crate::models::{
    Dimension, FetchFilter, LineItem, LineItemFilter, RecordKind, Report, ReportTotals,
};
use crate::services::aggregator;
use crate::services::directory::Directory;
use crate::services::fetcher::DocumentFetcher;
use crate::services::generation::{SearchGenerations, SearchTicket};
use crate::services::metrics::{record_line_items, record_report_run};
use crate::services::normalizer;
use crate::services::store::DocumentStore;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub fetch: FetchFilter,
    pub filter: LineItemFilter,
    /// Overrides the configured default for reading returns.
    pub include_returns: Option<bool>,
    /// Searches from the same session supersede each other.
    pub session: Option<String>,
}

/// Normalized lines of one search together with the lookups needed to
/// filter and display them.
#[derive(Debug, Clone)]
pub struct PreparedLines {
    pub line_items: Vec<LineItem>,
    pub directory: Directory,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Ready(PreparedLines),
    /// A read failed. The search yields an empty result.
    Failed,
    /// A newer search for the same session started before this one finished.
    Superseded,
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub report: Report,
    pub fetch_failed: bool,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct LineItemsOutcome {
    pub line_items: Vec<LineItem>,
    pub totals: ReportTotals,
    pub directory: Directory,
    pub fetch_failed: bool,
    pub generation: u64,
}

pub struct ReportPipeline {
    fetcher: DocumentFetcher,
    generations: SearchGenerations,
    fetch_returns_default: bool,
}

impl ReportPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, fetch_returns_default: bool) -> Self {
        Self {
            fetcher: DocumentFetcher::new(store),
            generations: SearchGenerations::new(),
            fetch_returns_default,
        }
    }

    pub fn generations(&self) -> &SearchGenerations {
        &self.generations
    }

    /// Whether this search needs the returns collection at all.
    pub fn reads_returns(&self, request: &ReportRequest) -> bool {
        request.filter.kind != Some(RecordKind::Sale)
            && request.include_returns.unwrap_or(self.fetch_returns_default)
    }

    /// Read everything a search needs and normalize it.
    pub async fn prepare(&self, request: &ReportRequest, ticket: &SearchTicket) -> FetchOutcome {
        let include_returns = self.reads_returns(request);

        let (catalog, transactions, directory) = tokio::join!(
            self.fetcher.fetch_catalog(),
            self.fetcher.fetch_transactions(&request.fetch, include_returns),
            self.fetcher.fetch_directory(),
        );

        if !ticket.is_current() {
            tracing::info!(
                generation = ticket.generation(),
                "Discarding results of superseded search"
            );
            return FetchOutcome::Superseded;
        }

        let (catalog, transactions) = match (catalog, transactions) {
            (Ok(catalog), Ok(transactions)) => (catalog, transactions),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(
                    generation = ticket.generation(),
                    error = %e,
                    "Fetch failed, clearing results"
                );
                return FetchOutcome::Failed;
            }
        };

        let line_items = normalizer::normalize(&transactions, &catalog);
        let returns = line_items
            .iter()
            .filter(|item| item.kind == RecordKind::Return)
            .count();
        record_line_items(RecordKind::Sale.as_str(), line_items.len() - returns);
        record_line_items(RecordKind::Return.as_str(), returns);

        tracing::info!(
            generation = ticket.generation(),
            transactions = transactions.len(),
            line_items = line_items.len(),
            returns,
            "Search normalized"
        );

        FetchOutcome::Ready(PreparedLines {
            line_items,
            directory,
        })
    }

    /// Aggregated report for one dimension.
    #[instrument(skip(self, request))]
    pub async fn run(
        &self,
        request: &ReportRequest,
        dimension: Dimension,
    ) -> Result<ReportOutcome, AppError> {
        let ticket = self.generations.begin(request.session.as_deref());

        let (report, fetch_failed) = match self.prepare(request, &ticket).await {
            FetchOutcome::Ready(prepared) => {
                let report = aggregator::aggregate(
                    &prepared.line_items,
                    dimension,
                    &request.filter,
                    &prepared.directory,
                );
                record_report_run(dimension.as_str(), "ok");
                (report, false)
            }
            FetchOutcome::Failed => {
                record_report_run(dimension.as_str(), "fetch_failed");
                (Report::empty(dimension), true)
            }
            FetchOutcome::Superseded => {
                record_report_run(dimension.as_str(), "superseded");
                return Err(superseded(&ticket));
            }
        };

        tracing::info!(
            generation = ticket.generation(),
            rows = report.rows.len(),
            fetch_failed,
            "Report ready"
        );

        Ok(ReportOutcome {
            report,
            fetch_failed,
            generation: ticket.generation(),
        })
    }

    /// Filtered line items with their totals.
    #[instrument(skip(self, request))]
    pub async fn line_items(&self, request: &ReportRequest) -> Result<LineItemsOutcome, AppError> {
        const SUBJECT: &str = "lineItems";
        let ticket = self.generations.begin(request.session.as_deref());

        match self.prepare(request, &ticket).await {
            FetchOutcome::Ready(prepared) => {
                let selected: Vec<LineItem> = aggregator::filter_line_items(
                    &prepared.line_items,
                    &request.filter,
                    &prepared.directory,
                )
                .into_iter()
                .cloned()
                .collect();
                let totals = aggregator::totals(&selected);
                record_report_run(SUBJECT, "ok");
                tracing::info!(
                    generation = ticket.generation(),
                    line_items = selected.len(),
                    "Line items ready"
                );

                Ok(LineItemsOutcome {
                    line_items: selected,
                    totals,
                    directory: prepared.directory,
                    fetch_failed: false,
                    generation: ticket.generation(),
                })
            }
            FetchOutcome::Failed => {
                record_report_run(SUBJECT, "fetch_failed");
                Ok(LineItemsOutcome {
                    line_items: Vec::new(),
                    totals: ReportTotals::default(),
                    directory: Directory::default(),
                    fetch_failed: true,
                    generation: ticket.generation(),
                })
            }
            FetchOutcome::Superseded => {
                record_report_run(SUBJECT, "superseded");
                Err(superseded(&ticket))
            }
        }
    }
}

fn superseded(ticket: &SearchTicket) -> AppError {
    AppError::Conflict(anyhow::anyhow!(
        "Search {} was superseded by a newer search",
        ticket.generation()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{collections, MemoryStore};
    use serde_json::json;

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert(
            collections::SALES_INVOICES,
            json!({
                "invoiceNumber": "INV-1",
                "branchId": "B1",
                "date": "2024-05-02",
                "items": [
                    { "itemName": "Phone", "quantity": 2, "price": 100, "discountValue": 10, "taxValue": 5 }
                ]
            }),
        );
        store.insert(
            collections::SALES_RETURNS,
            json!({
                "returnNumber": "R-1",
                "invoiceNumber": "INV-1",
                "branchId": "B1",
                "date": "2024-05-03",
                "items": [ { "itemName": "Phone", "returnedQty": 1, "price": 100 } ]
            }),
        );
        Arc::new(store)
    }

    #[test]
    fn test_sale_only_filter_skips_returns() {
        let pipeline = ReportPipeline::new(store(), true);
        let mut request = ReportRequest::default();
        assert!(pipeline.reads_returns(&request));

        request.include_returns = Some(false);
        assert!(!pipeline.reads_returns(&request));

        request.include_returns = None;
        request.filter.kind = Some(RecordKind::Sale);
        assert!(!pipeline.reads_returns(&request));
    }

    #[tokio::test]
    async fn test_run_branch_report() {
        let pipeline = ReportPipeline::new(store(), true);
        let outcome = pipeline
            .run(&ReportRequest::default(), Dimension::Branch)
            .await
            .unwrap();

        assert!(!outcome.fetch_failed);
        assert_eq!(outcome.report.rows.len(), 1);
        assert_eq!(outcome.report.totals.line_count, 2);
        assert_eq!(outcome.report.totals.invoice_count, 2);
    }

    #[tokio::test]
    async fn test_line_items_respect_kind_filter() {
        let pipeline = ReportPipeline::new(store(), true);
        let request = ReportRequest {
            filter: LineItemFilter {
                kind: Some(RecordKind::Return),
                ..Default::default()
            },
            ..Default::default()
        };

        let outcome = pipeline.line_items(&request).await.unwrap();
        assert_eq!(outcome.line_items.len(), 1);
        assert_eq!(outcome.line_items[0].invoice_number, "R-1");
        assert_eq!(outcome.totals.line_count, 1);
    }

    #[tokio::test]
    async fn test_superseded_ticket_is_discarded() {
        let pipeline = ReportPipeline::new(store(), true);
        let stale = pipeline.generations().begin(Some("tab-1"));
        let _fresh = pipeline.generations().begin(Some("tab-1"));

        let outcome = pipeline.prepare(&ReportRequest::default(), &stale).await;
        assert!(matches!(outcome, FetchOutcome::Superseded));
    }
}
