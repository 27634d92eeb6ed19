use crate::models::{
    Dimension, FetchFilter, LineItem, LineItemFilter, RecordKind, ReportRow, ReportTotals,
};
use crate::services::directory::Directory;
use crate::services::export::ExportFormat;
use crate::services::pipeline::{LineItemsOutcome, ReportOutcome, ReportRequest};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

/// Query string shared by every report endpoint.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[validate(length(max = 64, message = "branchId is too long"))]
    pub branch_id: Option<String>,
    #[validate(length(max = 64, message = "warehouseId is too long"))]
    pub warehouse_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    #[validate(length(max = 128, message = "invoiceNumber is too long"))]
    pub invoice_number: Option<String>,
    #[validate(length(max = 128, message = "paymentMethod is too long"))]
    pub payment_method: Option<String>,
    #[validate(length(max = 128, message = "seller is too long"))]
    pub seller: Option<String>,
    #[validate(length(max = 128, message = "customerName is too long"))]
    pub customer_name: Option<String>,
    #[validate(length(max = 32, message = "customerPhone is too long"))]
    pub customer_phone: Option<String>,
    #[validate(length(max = 128, message = "itemName is too long"))]
    pub item_name: Option<String>,
    #[validate(length(max = 64, message = "itemNumber is too long"))]
    pub item_number: Option<String>,
    pub kind: Option<RecordKind>,
    pub include_returns: Option<bool>,
}

impl ReportQuery {
    /// Validate and split into the store-side and in-memory filters.
    pub fn into_request(self, session: Option<String>) -> Result<ReportRequest, AppError> {
        self.validate()?;

        let date_from = parse_date("dateFrom", self.date_from.as_deref())?;
        let date_to = parse_date("dateTo", self.date_to.as_deref())?;
        if let (Some(from), Some(to)) = (date_from, date_to) {
            if from > to {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "dateFrom {} is after dateTo {}",
                    from,
                    to
                )));
            }
        }

        Ok(ReportRequest {
            fetch: FetchFilter {
                branch_id: self.branch_id,
                warehouse_id: self.warehouse_id,
                date_from,
                date_to,
            },
            filter: LineItemFilter {
                invoice_number: self.invoice_number,
                payment_method: self.payment_method,
                seller: self.seller,
                customer_name: self.customer_name,
                customer_phone: self.customer_phone,
                item_name: self.item_name,
                item_number: self.item_number,
                kind: self.kind,
            },
            include_returns: self.include_returns,
            session,
        })
    }
}

fn parse_date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!("{} must be YYYY-MM-DD, got '{}'", name, v))
            }),
    }
}

/// Export endpoints read `format` (`xlsx` or `csv`) next to the report query.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub dimension: Dimension,
    pub rows: Vec<ReportRow>,
    pub totals: ReportTotals,
    pub fetch_failed: bool,
    pub generation: u64,
}

impl From<ReportOutcome> for ReportResponse {
    fn from(outcome: ReportOutcome) -> Self {
        Self {
            dimension: outcome.report.dimension,
            rows: outcome.report.rows,
            totals: outcome.report.totals,
            fetch_failed: outcome.fetch_failed,
            generation: outcome.generation,
        }
    }
}

/// A line item with its lookups resolved for display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemView {
    #[serde(flatten)]
    pub item: LineItem,
    pub branch_name: String,
    pub warehouse_name: String,
    pub seller_name: String,
    pub payment_method_name: String,
}

impl LineItemView {
    pub fn new(item: LineItem, directory: &Directory) -> Self {
        Self {
            branch_name: directory.branch_name(&item.branch_id),
            warehouse_name: directory.warehouse_name(&item.warehouse_id),
            seller_name: directory.seller_name(&item.seller),
            payment_method_name: directory.payment_method_name(&item.payment_method),
            item,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemsResponse {
    pub line_items: Vec<LineItemView>,
    pub totals: ReportTotals,
    pub fetch_failed: bool,
    pub generation: u64,
}

impl From<LineItemsOutcome> for LineItemsResponse {
    fn from(outcome: LineItemsOutcome) -> Self {
        let directory = outcome.directory;
        Self {
            line_items: outcome
                .line_items
                .into_iter()
                .map(|item| LineItemView::new(item, &directory))
                .collect(),
            totals: outcome.totals,
            fetch_failed: outcome.fetch_failed,
            generation: outcome.generation,
        }
    }
}
