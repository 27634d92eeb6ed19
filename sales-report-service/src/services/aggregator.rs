//! Grouping and reduction of normalized line items into report rows.
//!
//! Everything here is a pure function of its inputs. Each call builds its
//! own accumulators, so running a report twice over the same lines yields the
//! same rows.

use crate::models::{
    BestSeller, Dimension, LineItem, LineItemFilter, Report, ReportRow, ReportTotals, UNSPECIFIED,
};
use crate::services::directory::Directory;
use std::collections::{HashMap, HashSet};

/// Lines that pass every active filter, in input order.
pub fn filter_line_items<'a>(
    items: &'a [LineItem],
    filter: &LineItemFilter,
    directory: &Directory,
) -> Vec<&'a LineItem> {
    items
        .iter()
        .filter(|item| matches_filter(item, filter, directory))
        .collect()
}

pub fn matches_filter(item: &LineItem, filter: &LineItemFilter, directory: &Directory) -> bool {
    if let Some(kind) = filter.kind {
        if item.kind != kind {
            return false;
        }
    }
    if let Some(wanted) = active(&filter.invoice_number) {
        // Returns also match on the invoice they were raised against.
        let on_reference = item
            .reference_number
            .as_deref()
            .is_some_and(|reference| contains(reference, wanted));
        if !contains(&item.invoice_number, wanted) && !on_reference {
            return false;
        }
    }
    if let Some(wanted) = active(&filter.payment_method) {
        if !directory.payment_method_matches(wanted, &item.payment_method) {
            return false;
        }
    }
    if let Some(wanted) = active(&filter.seller) {
        if !directory.seller_matches(wanted, &item.seller) {
            return false;
        }
    }

    let substring_filters = [
        (&filter.customer_name, item.customer_name.as_str()),
        (&filter.customer_phone, item.customer_phone.as_str()),
        (&filter.item_name, item.item_name.as_str()),
        (&filter.item_number, item.item_number.as_str()),
    ];
    substring_filters
        .iter()
        .all(|(wanted, actual)| active(wanted).is_none_or(|wanted| contains(actual, wanted)))
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Running sums for one group. Components are added with the line's sign;
/// net and profit are derived from the sums at the end.
#[derive(Debug, Default)]
struct Accumulator {
    quantity: f64,
    gross: f64,
    discount: f64,
    tax: f64,
    cost: f64,
    invoices: HashSet<(String, &'static str)>,
    lines: usize,
}

impl Accumulator {
    fn add(&mut self, item: &LineItem) {
        self.quantity += item.signed(item.quantity);
        self.gross += item.signed(item.gross);
        self.discount += item.signed(item.discount);
        self.tax += item.signed(item.tax);
        self.cost += item.signed(item.cost);
        self.invoices
            .insert((item.invoice_number.clone(), item.kind.as_str()));
        self.lines += 1;
    }

    fn after_discount(&self) -> f64 {
        self.gross - self.discount
    }

    fn totals(&self) -> ReportTotals {
        let after_discount = self.after_discount();
        ReportTotals {
            quantity: self.quantity,
            gross: self.gross,
            discount: self.discount,
            after_discount,
            tax: self.tax,
            net: after_discount + self.tax,
            cost: self.cost,
            profit: after_discount - self.cost,
            invoice_count: self.invoices.len(),
            line_count: self.lines,
        }
    }
}

/// Per-item quantity tally in first-seen order.
#[derive(Debug, Default)]
struct ItemTally {
    order: Vec<(String, f64)>,
    positions: HashMap<String, usize>,
}

impl ItemTally {
    fn add(&mut self, item: &LineItem) {
        let quantity = item.signed(item.quantity);
        match self.positions.get(&item.item_name) {
            Some(&position) => self.order[position].1 += quantity,
            None => {
                self.positions
                    .insert(item.item_name.clone(), self.order.len());
                self.order.push((item.item_name.clone(), quantity));
            }
        }
    }

    /// Highest positive tally; ties go to the item seen first. A group whose
    /// returns cancel or exceed its sales has no best seller.
    fn best(&self) -> Option<BestSeller> {
        let mut best: Option<&(String, f64)> = None;
        for entry in &self.order {
            if best.is_none_or(|current| entry.1 > current.1) {
                best = Some(entry);
            }
        }
        best.filter(|(_, quantity)| *quantity > 0.0)
            .map(|(item_name, quantity)| BestSeller {
                item_name: item_name.clone(),
                quantity: *quantity,
            })
    }
}

struct Group {
    key: String,
    name: String,
    sums: Accumulator,
    tally: ItemTally,
}

fn group_key(item: &LineItem, dimension: Dimension) -> &str {
    match dimension {
        Dimension::Branch => &item.branch_id,
        Dimension::Category => &item.category,
        Dimension::Type => &item.item_type,
        Dimension::InvoiceNumber => &item.invoice_number,
    }
}

fn group_name(key: &str, dimension: Dimension, directory: &Directory) -> String {
    match dimension {
        Dimension::Branch => directory.branch_name(key),
        _ if key.trim().is_empty() => UNSPECIFIED.to_string(),
        _ => key.to_string(),
    }
}

/// Group the lines passing `filter` by `dimension` and reduce each group.
/// Rows come out in the order their group was first seen.
pub fn aggregate(
    items: &[LineItem],
    dimension: Dimension,
    filter: &LineItemFilter,
    directory: &Directory,
) -> Report {
    let mut groups: Vec<Group> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut overall = Accumulator::default();

    for item in items
        .iter()
        .filter(|item| matches_filter(item, filter, directory))
    {
        let key = group_key(item, dimension).trim();
        let position = match positions.get(key) {
            Some(&position) => position,
            None => {
                positions.insert(key.to_string(), groups.len());
                groups.push(Group {
                    key: key.to_string(),
                    name: group_name(key, dimension, directory),
                    sums: Accumulator::default(),
                    tally: ItemTally::default(),
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[position];
        group.sums.add(item);
        if dimension.tracks_best_seller() {
            group.tally.add(item);
        }
        overall.add(item);
    }

    let rows: Vec<ReportRow> = groups
        .into_iter()
        .map(|group| {
            let totals = group.sums.totals();
            ReportRow {
                group_key: group.key,
                group_name: group.name,
                quantity: totals.quantity,
                gross: totals.gross,
                discount: totals.discount,
                after_discount: totals.after_discount,
                tax: totals.tax,
                net: totals.net,
                cost: totals.cost,
                profit: totals.profit,
                invoice_count: totals.invoice_count,
                line_count: totals.line_count,
                best_seller: if dimension.tracks_best_seller() {
                    group.tally.best()
                } else {
                    None
                },
            }
        })
        .collect();

    tracing::debug!(
        dimension = %dimension,
        rows = rows.len(),
        line_items = overall.lines,
        "Aggregated report"
    );

    Report {
        dimension,
        rows,
        totals: overall.totals(),
    }
}

/// Totals over an arbitrary set of lines, using the same recompute-from-sums
/// rule as report rows.
pub fn totals<'a>(items: impl IntoIterator<Item = &'a LineItem>) -> ReportTotals {
    let mut sums = Accumulator::default();
    for item in items {
        sums.add(item);
    }
    sums.totals()
}
