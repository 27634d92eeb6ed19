use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grouping key for an aggregated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Branch,
    Category,
    Type,
    InvoiceNumber,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Category => "category",
            Self::Type => "type",
            Self::InvoiceNumber => "invoiceNumber",
        }
    }

    /// Heading of the grouping column in exported files.
    pub fn export_label(&self) -> &'static str {
        match self {
            Self::Branch => "Branch",
            Self::Category => "Category",
            Self::Type => "Type",
            Self::InvoiceNumber => "Invoice Number",
        }
    }

    /// Category and type reports surface the best-selling item per group.
    pub fn tracks_best_seller(&self) -> bool {
        matches!(self, Self::Category | Self::Type)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "branch" | "branches" => Ok(Self::Branch),
            "category" | "categories" => Ok(Self::Category),
            "type" | "types" => Ok(Self::Type),
            "invoice" | "invoices" | "invoicenumber" => Ok(Self::InvoiceNumber),
            _ => Err(format!("Invalid report dimension: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestSeller {
    pub item_name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub group_key: String,
    pub group_name: String,
    pub quantity: f64,
    pub gross: f64,
    pub discount: f64,
    pub after_discount: f64,
    pub tax: f64,
    pub net: f64,
    pub cost: f64,
    pub profit: f64,
    pub invoice_count: usize,
    pub line_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_seller: Option<BestSeller>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub quantity: f64,
    pub gross: f64,
    pub discount: f64,
    pub after_discount: f64,
    pub tax: f64,
    pub net: f64,
    pub cost: f64,
    pub profit: f64,
    pub invoice_count: usize,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub dimension: Dimension,
    pub rows: Vec<ReportRow>,
    pub totals: ReportTotals,
}

impl Report {
    pub fn empty(dimension: Dimension) -> Self {
        Self {
            dimension,
            rows: Vec::new(),
            totals: ReportTotals::default(),
        }
    }
}
