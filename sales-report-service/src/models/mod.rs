//! Domain models for sales-report-service.

pub mod catalog;
pub mod filter;
pub mod line_item;
pub mod report;
pub mod transaction;

pub use catalog::{CatalogEntry, CatalogLevel};
pub use filter::{FetchFilter, LineItemFilter};
pub use line_item::LineItem;
pub use report::{BestSeller, Dimension, Report, ReportRow, ReportTotals};
pub use transaction::{RawDocument, RecordKind, Transaction};

/// Display value for an item, branch or warehouse that cannot be resolved.
pub const UNSPECIFIED: &str = "غير محدد";
