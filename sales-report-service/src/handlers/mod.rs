pub mod health;
pub mod reports;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use reports::{
    export_line_items, export_report, get_report, list_line_items, REPORT_SESSION_HEADER,
};
