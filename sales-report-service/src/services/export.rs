//! Spreadsheet export of report rows and line items.
//!
//! Workbooks get a bold, frozen header row with an autofilter over the data
//! and a bold totals row below it. CSV files start with a UTF-8 byte order
//! mark so spreadsheet applications pick the right encoding for Arabic names.

use crate::models::{LineItem, Report, ReportTotals};
use crate::services::aggregator;
use crate::services::directory::Directory;
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet, XlsxError};
use serde::Deserialize;
use service_core::error::AppError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const BOM: &[u8] = b"\xEF\xBB\xBF";
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const AMOUNT_FORMAT: &str = "#,##0.00";
const QUANTITY_FORMAT: &str = "#,##0.###";
const HEADER_FILL: u32 = 0xD9E1F2;

/// Columns after the grouping key, which is headed by the dimension label.
const REPORT_COLUMNS: &[&str] = &[
    "Name",
    "Quantity",
    "Total Sales",
    "Discount",
    "After Discount",
    "Tax",
    "Net",
    "Cost",
    "Profit",
    "Invoices",
    "Lines",
];

const BEST_SELLER_COLUMNS: &[&str] = &["Best Seller", "Best Seller Quantity"];

const LINE_ITEM_COLUMNS: &[&str] = &[
    "Kind",
    "Invoice Number",
    "Reference Number",
    "Date",
    "Branch",
    "Warehouse",
    "Item Number",
    "Item Name",
    "Category",
    "Type",
    "Unit",
    "Quantity",
    "Unit Price",
    "Gross",
    "Discount",
    "Tax",
    "Net",
    "Cost",
    "Profit",
    "Customer",
    "Customer Phone",
    "Seller",
    "Payment Method",
];

/// Position of the quantity column in the line-item layout.
const LINE_ITEM_QUANTITY_COLUMN: usize = 11;

const TOTAL_LABEL: &str = "الإجمالي";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV buffer could not be flushed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Workbook could not be written: {0}")]
    Xlsx(#[from] XlsxError),
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Xlsx => XLSX_CONTENT_TYPE,
            Self::Csv => CSV_CONTENT_TYPE,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Invalid export format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Amount(f64),
    Quantity(f64),
    Count(usize),
    Empty,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn to_csv(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Amount(value) => amount(*value),
            Cell::Quantity(value) => quantity(*value),
            Cell::Count(count) => count.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// A header, data rows and a totals row, independent of the file format.
#[derive(Debug)]
struct Table {
    title: &'static str,
    header: Vec<&'static str>,
    rows: Vec<Vec<Cell>>,
    totals: Vec<Cell>,
}

pub fn export_file_name(
    prefix: &str,
    subject: &str,
    format: ExportFormat,
    now: NaiveDateTime,
) -> String {
    format!(
        "{}-{}-{}.{}",
        prefix,
        subject,
        now.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

/// One line per report row plus a trailing totals line.
pub fn export_report(
    report: &Report,
    format: ExportFormat,
    prefix: &str,
    now: NaiveDateTime,
) -> Result<ExportFile, ExportError> {
    let table = report_table(report);
    let file_name = export_file_name(prefix, report.dimension.as_str(), format, now);
    render(&table, format, file_name)
}

/// Detail export. Values carry the record's sign, so returns read negative.
pub fn export_line_items(
    items: &[&LineItem],
    directory: &Directory,
    format: ExportFormat,
    prefix: &str,
    now: NaiveDateTime,
) -> Result<ExportFile, ExportError> {
    let table = line_item_table(items, directory);
    let file_name = export_file_name(prefix, "line-items", format, now);
    render(&table, format, file_name)
}

fn report_table(report: &Report) -> Table {
    let best_seller = report.dimension.tracks_best_seller();

    let mut header = vec![report.dimension.export_label()];
    header.extend_from_slice(REPORT_COLUMNS);
    if best_seller {
        header.extend_from_slice(BEST_SELLER_COLUMNS);
    }

    let rows = report
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                Cell::text(&row.group_key),
                Cell::text(&row.group_name),
                Cell::Quantity(row.quantity),
                Cell::Amount(row.gross),
                Cell::Amount(row.discount),
                Cell::Amount(row.after_discount),
                Cell::Amount(row.tax),
                Cell::Amount(row.net),
                Cell::Amount(row.cost),
                Cell::Amount(row.profit),
                Cell::Count(row.invoice_count),
                Cell::Count(row.line_count),
            ];
            if best_seller {
                match &row.best_seller {
                    Some(best) => {
                        cells.push(Cell::text(&best.item_name));
                        cells.push(Cell::Quantity(best.quantity));
                    }
                    None => cells.extend([Cell::Empty, Cell::Empty]),
                }
            }
            cells
        })
        .collect();

    let mut totals = totals_cells(&report.totals);
    totals.resize(header.len(), Cell::Empty);

    Table {
        title: report.dimension.as_str(),
        header,
        rows,
        totals,
    }
}

fn line_item_table(items: &[&LineItem], directory: &Directory) -> Table {
    let rows = items
        .iter()
        .map(|item| {
            vec![
                Cell::text(item.kind.to_string()),
                Cell::text(&item.invoice_number),
                Cell::text(item.reference_number.clone().unwrap_or_default()),
                Cell::text(&item.date),
                Cell::text(directory.branch_name(&item.branch_id)),
                Cell::text(directory.warehouse_name(&item.warehouse_id)),
                Cell::text(&item.item_number),
                Cell::text(&item.item_name),
                Cell::text(&item.category),
                Cell::text(&item.item_type),
                Cell::text(&item.unit),
                Cell::Quantity(item.signed(item.quantity)),
                Cell::Amount(item.unit_price),
                Cell::Amount(item.signed(item.gross)),
                Cell::Amount(item.signed(item.discount)),
                Cell::Amount(item.signed(item.tax)),
                Cell::Amount(item.signed(item.net)),
                Cell::Amount(item.signed(item.cost)),
                Cell::Amount(item.profit),
                Cell::text(&item.customer_name),
                Cell::text(&item.customer_phone),
                Cell::text(directory.seller_name(&item.seller)),
                Cell::text(directory.payment_method_name(&item.payment_method)),
            ]
        })
        .collect();

    let sums = aggregator::totals(items.iter().copied());
    let mut totals = vec![Cell::text(TOTAL_LABEL)];
    totals.resize(LINE_ITEM_QUANTITY_COLUMN, Cell::Empty);
    totals.extend([
        Cell::Quantity(sums.quantity),
        Cell::Empty,
        Cell::Amount(sums.gross),
        Cell::Amount(sums.discount),
        Cell::Amount(sums.tax),
        Cell::Amount(sums.net),
        Cell::Amount(sums.cost),
        Cell::Amount(sums.profit),
    ]);
    totals.resize(LINE_ITEM_COLUMNS.len(), Cell::Empty);

    Table {
        title: "line-items",
        header: LINE_ITEM_COLUMNS.to_vec(),
        rows,
        totals,
    }
}

fn totals_cells(totals: &ReportTotals) -> Vec<Cell> {
    vec![
        Cell::text(TOTAL_LABEL),
        Cell::Empty,
        Cell::Quantity(totals.quantity),
        Cell::Amount(totals.gross),
        Cell::Amount(totals.discount),
        Cell::Amount(totals.after_discount),
        Cell::Amount(totals.tax),
        Cell::Amount(totals.net),
        Cell::Amount(totals.cost),
        Cell::Amount(totals.profit),
        Cell::Count(totals.invoice_count),
        Cell::Count(totals.line_count),
    ]
}

fn render(table: &Table, format: ExportFormat, file_name: String) -> Result<ExportFile, ExportError> {
    let bytes = match format {
        ExportFormat::Xlsx => render_xlsx(table)?,
        ExportFormat::Csv => render_csv(table)?,
    };
    tracing::info!(
        file_name = %file_name,
        format = %format,
        records = table.rows.len(),
        bytes = bytes.len(),
        "Export generated"
    );
    Ok(ExportFile {
        file_name,
        content_type: format.content_type(),
        bytes,
    })
}

fn render_csv(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(BOM.to_vec());
    writer.write_record(&table.header)?;
    for row in table.rows.iter().chain(std::iter::once(&table.totals)) {
        writer.write_record(row.iter().map(Cell::to_csv))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

struct CellFormats {
    header: Format,
    amount: Format,
    quantity: Format,
    count: Format,
    total: Format,
    total_amount: Format,
    total_quantity: Format,
}

impl CellFormats {
    fn new() -> Self {
        let amount = Format::new().set_num_format(AMOUNT_FORMAT);
        let quantity = Format::new().set_num_format(QUANTITY_FORMAT);
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(HEADER_FILL))
                .set_border(FormatBorder::Thin),
            count: Format::new(),
            total: Format::new().set_bold(),
            total_amount: amount.clone().set_bold(),
            total_quantity: quantity.clone().set_bold(),
            amount,
            quantity,
        }
    }
}

fn render_xlsx(table: &Table) -> Result<Vec<u8>, ExportError> {
    let formats = CellFormats::new();
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(table.title)?;
    worksheet.set_right_to_left(true);

    for (col, name) in table.header.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &formats.header)?;
    }

    let mut row_index: u32 = 1;
    for row in &table.rows {
        write_cells(worksheet, row_index, row, &formats, false)?;
        row_index += 1;
    }

    let last_col = table.header.len().saturating_sub(1) as u16;
    worksheet.set_freeze_panes(1, 0)?;
    // The filter covers the header and data rows; totals stay below it.
    worksheet.autofilter(0, 0, row_index - 1, last_col)?;
    write_cells(worksheet, row_index, &table.totals, &formats, true)?;
    worksheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

fn write_cells(
    worksheet: &mut Worksheet,
    row: u32,
    cells: &[Cell],
    formats: &CellFormats,
    total: bool,
) -> Result<(), XlsxError> {
    for (col, cell) in cells.iter().enumerate() {
        let col = col as u16;
        match cell {
            Cell::Text(text) if total => {
                worksheet.write_string_with_format(row, col, text, &formats.total)?;
            }
            Cell::Text(text) => {
                worksheet.write_string(row, col, text)?;
            }
            Cell::Amount(value) => {
                let format = if total { &formats.total_amount } else { &formats.amount };
                worksheet.write_number_with_format(
                    row,
                    col,
                    without_negative_zero(*value),
                    format,
                )?;
            }
            Cell::Quantity(value) => {
                let format = if total {
                    &formats.total_quantity
                } else {
                    &formats.quantity
                };
                worksheet.write_number_with_format(
                    row,
                    col,
                    without_negative_zero(*value),
                    format,
                )?;
            }
            Cell::Count(count) => {
                let format = if total { &formats.total } else { &formats.count };
                worksheet.write_number_with_format(row, col, *count as f64, format)?;
            }
            Cell::Empty => {}
        }
    }
    Ok(())
}

fn amount(value: f64) -> String {
    format!("{:.2}", without_negative_zero(value))
}

fn quantity(value: f64) -> String {
    let value = without_negative_zero(value);
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        let text = format!("{:.3}", value);
        text.trim_end_matches('0').to_string()
    }
}

fn without_negative_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BestSeller, Dimension, RecordKind, ReportRow};
    use chrono::NaiveDate;
    use std::io::{Cursor, Read};

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 31)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    fn body(file: &ExportFile) -> String {
        assert!(file.bytes.starts_with(BOM));
        String::from_utf8(file.bytes[BOM.len()..].to_vec()).unwrap()
    }

    fn workbook_part(file: &ExportFile, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(file.bytes.clone())).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut xml = String::new();
        part.read_to_string(&mut xml).unwrap();
        xml
    }

    fn row(key: &str, best_seller: Option<BestSeller>) -> ReportRow {
        ReportRow {
            group_key: key.to_string(),
            group_name: key.to_string(),
            quantity: 3.0,
            gross: 300.0,
            discount: 10.0,
            after_discount: 290.0,
            tax: 5.0,
            net: 295.0,
            cost: 150.0,
            profit: 140.0,
            invoice_count: 2,
            line_count: 3,
            best_seller,
        }
    }

    fn branch_report() -> Report {
        Report {
            dimension: Dimension::Branch,
            rows: vec![row("B1", None), row("B2", None)],
            totals: ReportTotals {
                quantity: 6.0,
                gross: 600.0,
                discount: 20.0,
                after_discount: 580.0,
                tax: 10.0,
                net: 590.0,
                cost: 300.0,
                profit: 280.0,
                invoice_count: 4,
                line_count: 6,
            },
        }
    }

    fn returned_phone() -> LineItem {
        LineItem {
            key: "R-1:0".to_string(),
            invoice_number: "R-1".to_string(),
            reference_number: Some("INV-1".to_string()),
            date: "2024-05-02".to_string(),
            branch_id: "B1".to_string(),
            warehouse_id: String::new(),
            item_number: "P-1".to_string(),
            item_name: "Phone".to_string(),
            category: "Electronics".to_string(),
            item_type: "Devices".to_string(),
            unit: "pcs".to_string(),
            quantity: 1.0,
            unit_price: 100.0,
            unit_cost: 60.0,
            gross: 100.0,
            discount: 0.0,
            discount_percent: 0.0,
            tax: 0.0,
            tax_percent: 0.0,
            net: 100.0,
            cost: 60.0,
            profit: -40.0,
            customer_name: "Ali".to_string(),
            customer_phone: "0500".to_string(),
            seller: String::new(),
            payment_method: "cash".to_string(),
            kind: RecordKind::Return,
            sign: -1,
        }
    }

    #[test]
    fn test_file_name_embeds_timestamp() {
        assert_eq!(
            export_file_name("sales-report", "branch", ExportFormat::Csv, at()),
            "sales-report-branch-20240531-140509.csv"
        );
        assert_eq!(
            export_file_name("sales-report", "branch", ExportFormat::Xlsx, at()),
            "sales-report-branch-20240531-140509.xlsx"
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("XLSX".parse::<ExportFormat>(), Ok(ExportFormat::Xlsx));
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert!("pdf".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::default(), ExportFormat::Xlsx);
    }

    #[test]
    fn test_branch_report_workbook() {
        let file = export_report(&branch_report(), ExportFormat::Xlsx, "sales-report", at()).unwrap();
        assert_eq!(file.content_type, XLSX_CONTENT_TYPE);
        assert_eq!(file.file_name, "sales-report-branch-20240531-140509.xlsx");

        let strings = workbook_part(&file, "xl/sharedStrings.xml");
        for column in ["Branch", "Total Sales", "Discount", "Tax", "Net", "Invoices"] {
            assert!(strings.contains(&format!("<t>{}</t>", column)), "{}", column);
        }
        assert!(strings.contains(TOTAL_LABEL));

        let sheet = workbook_part(&file, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"ySplit="1""#));
        assert!(sheet.contains(r#"state="frozen""#));
        // Header plus two rows; the totals row on line 4 stays outside.
        assert!(sheet.contains(r#"<autoFilter ref="A1:L3"/>"#));
        assert!(sheet.contains(r#"<row r="4""#));

        let styles = workbook_part(&file, "xl/styles.xml");
        assert!(styles.contains("<b/>"));
    }

    #[test]
    fn test_line_item_workbook_filters_every_column() {
        let item = returned_phone();
        let file = export_line_items(
            &[&item],
            &Directory::default(),
            ExportFormat::Xlsx,
            "sales-report",
            at(),
        )
        .unwrap();
        assert_eq!(file.file_name, "sales-report-line-items-20240531-140509.xlsx");

        let sheet = workbook_part(&file, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<autoFilter ref="A1:W2"/>"#));
        assert!(sheet.contains("<v>-100</v>"));
    }

    #[test]
    fn test_branch_report_csv() {
        let report = Report {
            rows: vec![row("B1", None)],
            ..branch_report()
        };

        let file = export_report(&report, ExportFormat::Csv, "sales-report", at()).unwrap();
        assert_eq!(file.content_type, CSV_CONTENT_TYPE);
        assert_eq!(file.file_name, "sales-report-branch-20240531-140509.csv");

        let text = body(&file);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Branch,Name,Quantity,Total Sales"));
        assert!(!lines[0].contains("Best Seller"));
        assert_eq!(
            lines[1],
            "B1,B1,3,300.00,10.00,290.00,5.00,295.00,150.00,140.00,2,3"
        );
        assert!(lines[2].starts_with("الإجمالي,,6,600.00"));
    }

    #[test]
    fn test_category_report_includes_best_seller() {
        let report = Report {
            dimension: Dimension::Category,
            rows: vec![row(
                "Electronics",
                Some(BestSeller {
                    item_name: "Phone".to_string(),
                    quantity: 2.0,
                }),
            )],
            totals: ReportTotals::default(),
        };

        let text = body(&export_report(&report, ExportFormat::Csv, "sales-report", at()).unwrap());
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("Best Seller,Best Seller Quantity"));
        assert!(lines[1].ends_with(",Phone,2"));
        assert!(lines[2].ends_with(",,"));
    }

    #[test]
    fn test_line_item_csv_signs_returns() {
        let item = returned_phone();
        let file = export_line_items(
            &[&item],
            &Directory::default(),
            ExportFormat::Csv,
            "sales-report",
            at(),
        )
        .unwrap();
        assert_eq!(file.file_name, "sales-report-line-items-20240531-140509.csv");

        let text = body(&file);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("return,R-1,INV-1,2024-05-02,B1,غير محدد,P-1"));
        assert!(lines[1].contains(",-1,100.00,-100.00,0.00,0.00,-100.00,-60.00,-40.00,"));
        assert_eq!(lines[2].split(',').count(), LINE_ITEM_COLUMNS.len());
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(amount(-0.0), "0.00");
        assert_eq!(quantity(2.5), "2.5");
        assert_eq!(quantity(-3.0), "-3");
    }
}
