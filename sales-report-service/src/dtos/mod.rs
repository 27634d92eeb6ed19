pub mod reports;

pub use reports::{ExportQuery, LineItemView, LineItemsResponse, ReportQuery, ReportResponse};
